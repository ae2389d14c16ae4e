//! Scripted agent for deterministic coordinator tests.

use async_trait::async_trait;
use curio_core::agent::{AgentError, AgentStep, AgentTurn, DiscoveryAgent};
use curio_protocol::{FunctionCall, FunctionName, FunctionResult, SessionId, ToolCallId};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// One scripted step, optionally delayed to simulate provider latency.
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    kind: StepKind,
    delay: Duration,
}

#[derive(Debug, Clone)]
enum StepKind {
    Step(AgentStep),
    Fail(String),
}

impl ScriptedStep {
    /// Yield a text fragment.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Step(AgentStep::Text(content.into())),
            delay: Duration::ZERO,
        }
    }

    /// Yield a function call with a fixed correlation id.
    pub fn call(call_id: ToolCallId, name: FunctionName, arguments: Value) -> Self {
        Self {
            kind: StepKind::Step(AgentStep::Call(FunctionCall {
                call_id,
                name,
                arguments,
            })),
            delay: Duration::ZERO,
        }
    }

    /// Fail the turn with a provider error.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Fail(message.into()),
            delay: Duration::ZERO,
        }
    }

    /// Sleep before the step is yielded.
    pub fn after_ms(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }
}

/// Agent that replays the same script on every turn and records what the
/// coordinator fed back.
pub struct ScriptedAgent {
    script: Vec<ScriptedStep>,
    steps_taken: Arc<AtomicUsize>,
    observed: Arc<Mutex<Vec<(ToolCallId, FunctionResult)>>>,
}

impl ScriptedAgent {
    /// Build an agent from a fixed script.
    pub fn new(script: Vec<ScriptedStep>) -> Arc<Self> {
        Arc::new(Self {
            script,
            steps_taken: Arc::new(AtomicUsize::new(0)),
            observed: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Convenience: a fresh correlation id for call steps.
    pub fn call_id() -> ToolCallId {
        Uuid::new_v4()
    }

    /// How many steps any turn has consumed so far.
    pub fn steps_taken(&self) -> usize {
        self.steps_taken.load(Ordering::SeqCst)
    }

    /// Results the coordinator delivered through `observe`.
    pub fn observed(&self) -> Vec<(ToolCallId, FunctionResult)> {
        self.observed.lock().clone()
    }
}

#[async_trait]
impl DiscoveryAgent for ScriptedAgent {
    async fn begin_turn(
        &self,
        _session_id: SessionId,
        _message: &str,
    ) -> Result<Box<dyn AgentTurn>, AgentError> {
        Ok(Box::new(ScriptedTurn {
            pending: self.script.iter().cloned().collect(),
            steps_taken: self.steps_taken.clone(),
            observed: self.observed.clone(),
        }))
    }
}

struct ScriptedTurn {
    pending: VecDeque<ScriptedStep>,
    steps_taken: Arc<AtomicUsize>,
    observed: Arc<Mutex<Vec<(ToolCallId, FunctionResult)>>>,
}

#[async_trait]
impl AgentTurn for ScriptedTurn {
    async fn next_step(&mut self) -> Result<Option<AgentStep>, AgentError> {
        let Some(step) = self.pending.pop_front() else {
            return Ok(None);
        };
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        self.steps_taken.fetch_add(1, Ordering::SeqCst);
        match step.kind {
            StepKind::Step(step) => Ok(Some(step)),
            StepKind::Fail(message) => Err(AgentError::Provider(message)),
        }
    }

    async fn observe(&mut self, call_id: ToolCallId, result: &FunctionResult) {
        self.observed.lock().push((call_id, result.clone()));
    }
}
