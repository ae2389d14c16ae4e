//! Per-session stream coordination: agent output in, ordered events out.

use crate::agent::{AgentStep, DiscoveryAgent};
use crate::error::CoreError;
use crate::executor::FunctionExecutor;
use crate::session::SessionStore;
use curio_protocol::{EventMsg, EventPayload, EventSink, SessionId, TurnId};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

/// Broadcast-backed event bus for one session's stream.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<EventMsg>,
}

impl EventBus {
    /// Create a new event bus with the given channel buffer size.
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        Self { sender }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventMsg> {
        self.sender.subscribe()
    }

    /// Emit an event; returns whether any listener received it.
    pub fn publish(&self, event: EventMsg) -> bool {
        self.sender.send(event).is_ok()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: EventMsg) {
        let _ = self.sender.send(event);
    }
}

/// One attached stream connection.
///
/// A later `attach` on the same coordinator supersedes this handle; the
/// server loop checks `is_current` and ends the old response, so a session
/// never has two live streams.
pub struct StreamHandle {
    /// Receiver for the session's events.
    pub events: broadcast::Receiver<EventMsg>,
    epoch: u64,
}

impl StreamHandle {
    /// Connection epoch this handle was attached at.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Drives one session's stream: `Idle → Streaming → (FunctionPending)* →
/// Streaming → Idle`, with at most one turn in flight.
pub struct StreamCoordinator {
    session_id: SessionId,
    bus: EventBus,
    agent: Arc<dyn DiscoveryAgent>,
    executor: Arc<FunctionExecutor>,
    /// Held for the duration of a turn; `try_lock` failure means Streaming.
    turn_gate: Arc<Mutex<()>>,
    /// Bumped on every attach so reconnection replaces, never duplicates.
    connection_epoch: AtomicU64,
}

impl StreamCoordinator {
    /// Create a coordinator for one session.
    pub fn new(
        session_id: SessionId,
        agent: Arc<dyn DiscoveryAgent>,
        executor: Arc<FunctionExecutor>,
        buffer: usize,
    ) -> Self {
        Self {
            session_id,
            bus: EventBus::new(buffer),
            agent,
            executor,
            turn_gate: Arc::new(Mutex::new(())),
            connection_epoch: AtomicU64::new(0),
        }
    }

    /// Session this coordinator belongs to.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Attach a stream connection, superseding any previous one.
    pub fn attach(&self) -> StreamHandle {
        let epoch = self.connection_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "stream attached (session_id={}, epoch={})",
            self.session_id, epoch
        );
        StreamHandle {
            events: self.bus.subscribe(),
            epoch,
        }
    }

    /// Whether a handle's epoch is still the live connection.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.connection_epoch.load(Ordering::SeqCst) == epoch
    }

    /// Whether a turn is currently streaming.
    pub fn is_streaming(&self) -> bool {
        self.turn_gate.try_lock().is_err()
    }

    /// Start a turn for an inbound user message.
    ///
    /// Deterministic choice for a message that arrives mid-turn: rejected
    /// with `TurnInProgress`, never queued.
    pub fn submit(&self, message: String) -> Result<TurnId, CoreError> {
        let permit = self
            .turn_gate
            .clone()
            .try_lock_owned()
            .map_err(|_| CoreError::TurnInProgress(self.session_id))?;
        let turn_id = Uuid::new_v4();
        info!(
            "turn accepted (session_id={}, turn_id={}, prompt_len={})",
            self.session_id,
            turn_id,
            message.len()
        );
        let runner = TurnRunner {
            session_id: self.session_id,
            bus: self.bus.clone(),
            agent: self.agent.clone(),
            executor: self.executor.clone(),
        };
        tokio::spawn(async move {
            runner.run(turn_id, message).await;
            drop(permit);
        });
        Ok(turn_id)
    }
}

/// Owned slice of coordinator state that one spawned turn works against.
struct TurnRunner {
    session_id: SessionId,
    bus: EventBus,
    agent: Arc<dyn DiscoveryAgent>,
    executor: Arc<FunctionExecutor>,
}

impl TurnRunner {
    /// Emit onto the bus; `false` means no listener remains.
    fn emit(&self, payload: EventPayload) -> bool {
        self.bus.publish(EventMsg::new(self.session_id, payload))
    }

    async fn run(&self, turn_id: TurnId, message: String) {
        let mut turn = match self.agent.begin_turn(self.session_id, &message).await {
            Ok(turn) => turn,
            Err(err) => {
                warn!(
                    "agent refused turn (session_id={}, turn_id={}): {err}",
                    self.session_id, turn_id
                );
                self.emit(EventPayload::Error {
                    error: "the assistant could not start a response".to_string(),
                });
                return;
            }
        };

        let mut streamed = String::new();
        loop {
            match turn.next_step().await {
                Ok(Some(AgentStep::Text(delta))) => {
                    if delta.is_empty() {
                        continue;
                    }
                    streamed.push_str(&delta);
                    if !self.emit(EventPayload::TextChunk {
                        content: delta,
                        partial: true,
                    }) {
                        self.abandon(turn_id, "text");
                        return;
                    }
                }
                Ok(Some(AgentStep::Call(intent))) => {
                    // Started goes out before execution so the client can show
                    // progress; execution itself is synchronous.
                    if !self.emit(EventPayload::FunctionCall {
                        function: intent.name,
                        parameters: intent.arguments.clone(),
                        tool_call_id: intent.call_id,
                    }) {
                        self.abandon(turn_id, "function_call");
                        return;
                    }
                    let result = self.executor.execute(self.session_id, &intent).await;
                    if !self.emit(EventPayload::FunctionResult {
                        function: intent.name,
                        result: result.clone(),
                        tool_call_id: intent.call_id,
                    }) {
                        // The call already ran; its result is discarded, not
                        // emitted, since no listener remains.
                        self.abandon(turn_id, "function_result");
                        return;
                    }
                    turn.observe(intent.call_id, &result).await;
                }
                Ok(None) => {
                    info!(
                        "turn completed (session_id={}, turn_id={}, response_len={})",
                        self.session_id,
                        turn_id,
                        streamed.len()
                    );
                    self.emit(EventPayload::Completion {
                        turn_id,
                        total_tokens: estimate_tokens(&streamed),
                    });
                    return;
                }
                Err(err) => {
                    warn!(
                        "turn aborted by provider (session_id={}, turn_id={}): {err}",
                        self.session_id, turn_id
                    );
                    self.emit(EventPayload::Error {
                        error: "the assistant failed mid-response; send your message again"
                            .to_string(),
                    });
                    return;
                }
            }
        }
    }

    fn abandon(&self, turn_id: TurnId, at: &str) {
        debug!(
            "abandoning turn, no listener (session_id={}, turn_id={}, at={})",
            self.session_id, turn_id, at
        );
    }
}

/// Whitespace-token estimate standing in for provider usage accounting.
fn estimate_tokens(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Keyed registry of per-session coordinators.
///
/// Passed by handle into the server; entries for sessions the store no
/// longer knows are pruned opportunistically on creation.
pub struct Coordinators {
    inner: RwLock<HashMap<SessionId, Arc<StreamCoordinator>>>,
    sessions: SessionStore,
    agent: Arc<dyn DiscoveryAgent>,
    executor: Arc<FunctionExecutor>,
    buffer: usize,
}

impl Coordinators {
    /// Create the registry with the shared collaborators.
    pub fn new(
        sessions: SessionStore,
        agent: Arc<dyn DiscoveryAgent>,
        executor: Arc<FunctionExecutor>,
        buffer: usize,
    ) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            sessions,
            agent,
            executor,
            buffer,
        }
    }

    /// Fetch or create the coordinator for an active session.
    pub fn get_or_create(&self, session_id: SessionId) -> Result<Arc<StreamCoordinator>, CoreError> {
        self.sessions.ensure_active(session_id)?;
        let mut inner = self.inner.write();
        inner.retain(|id, _| self.sessions.contains(*id));
        let coordinator = inner
            .entry(session_id)
            .or_insert_with(|| {
                Arc::new(StreamCoordinator::new(
                    session_id,
                    self.agent.clone(),
                    self.executor.clone(),
                    self.buffer,
                ))
            })
            .clone();
        Ok(coordinator)
    }

    /// Number of live coordinators, for observability.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether no coordinator is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
