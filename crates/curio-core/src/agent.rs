//! Agent seam: the narrow interface the coordinator needs from "an AI agent
//! that can stream text and emit function calls".

use async_trait::async_trait;
use curio_protocol::{FunctionCall, FunctionName, FunctionResult, SessionId, ToolCallId};
use serde_json::json;
use std::collections::VecDeque;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by an agent provider.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Upstream provider failure; fatal to the current turn only.
    #[error("provider error: {0}")]
    Provider(String),
}

/// One unit of agent output.
#[derive(Debug, Clone)]
pub enum AgentStep {
    /// Incremental response text.
    Text(String),
    /// Intent to invoke a backend function.
    Call(FunctionCall),
}

/// One in-progress assistant reply.
///
/// The coordinator drives `next_step` until it returns `None`, executing
/// calls as they appear and feeding each result back through `observe` so
/// the rest of the reply can incorporate it.
#[async_trait]
pub trait AgentTurn: Send {
    /// Produce the next fragment or intent, or `None` when the turn is done.
    async fn next_step(&mut self) -> Result<Option<AgentStep>, AgentError>;

    /// Deliver the result of a previously yielded call.
    async fn observe(&mut self, call_id: ToolCallId, result: &FunctionResult);
}

/// Factory for assistant replies; the entire LLM-provider surface.
#[async_trait]
pub trait DiscoveryAgent: Send + Sync {
    /// Start a reply to one user message.
    async fn begin_turn(
        &self,
        session_id: SessionId,
        message: &str,
    ) -> Result<Box<dyn AgentTurn>, AgentError>;
}

/// Keyword-routed mock agent for development and demos.
///
/// Routes a message to one of four canned intents, emits the matching
/// function call when the message carries enough to build one, and closes
/// with a line that reflects the observed result.
#[derive(Debug, Default)]
pub struct MockDiscoveryAgent;

impl MockDiscoveryAgent {
    /// Create the mock agent.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DiscoveryAgent for MockDiscoveryAgent {
    async fn begin_turn(
        &self,
        _session_id: SessionId,
        message: &str,
    ) -> Result<Box<dyn AgentTurn>, AgentError> {
        Ok(Box::new(MockTurn::for_message(message)))
    }
}

struct MockTurn {
    pending: VecDeque<AgentStep>,
}

impl MockTurn {
    fn for_message(message: &str) -> Self {
        let lowered = message.to_lowercase();
        let product_id = message
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_'))
            .find(|word| word.starts_with("prod_"))
            .map(str::to_string);

        let mut pending = VecDeque::new();
        if lowered.contains("recommend") {
            pending.push_back(AgentStep::Text(
                "Based on your interests, I have some great recommendations!".to_string(),
            ));
            if let Some(basis) = product_id.clone().or_else(|| category_in(&lowered)) {
                pending.push_back(call(
                    FunctionName::GetRecommendations,
                    json!({ "based_on": basis }),
                ));
            }
        } else if lowered.contains("cart") || lowered.contains("add") {
            pending.push_back(AgentStep::Text(
                "Great choice! I'll add that item to your cart.".to_string(),
            ));
            if let Some(product_id) = product_id.clone() {
                pending.push_back(call(
                    FunctionName::AddToCart,
                    json!({ "product_id": product_id }),
                ));
            }
        } else if lowered.contains("detail") || lowered.contains("tell me more") {
            pending.push_back(AgentStep::Text(
                "Let me get the detailed information for that product.".to_string(),
            ));
            if let Some(product_id) = product_id.clone() {
                pending.push_back(call(
                    FunctionName::ShowProductDetails,
                    json!({ "product_id": product_id }),
                ));
            }
        } else {
            pending.push_back(AgentStep::Text(
                "I'll help you search for products! Let me look that up for you.".to_string(),
            ));
            pending.push_back(call(
                FunctionName::SearchProducts,
                json!({ "query": message.trim() }),
            ));
        }
        Self { pending }
    }
}

fn call(name: FunctionName, arguments: serde_json::Value) -> AgentStep {
    AgentStep::Call(FunctionCall {
        call_id: Uuid::new_v4(),
        name,
        arguments,
    })
}

fn category_in(message: &str) -> Option<String> {
    ["electronics", "clothing", "home", "books", "sports", "beauty"]
        .into_iter()
        .find(|category| message.contains(category))
        .map(str::to_string)
}

#[async_trait]
impl AgentTurn for MockTurn {
    async fn next_step(&mut self) -> Result<Option<AgentStep>, AgentError> {
        Ok(self.pending.pop_front())
    }

    async fn observe(&mut self, _call_id: ToolCallId, result: &FunctionResult) {
        let line = if result.success {
            " Here is what I found for you.".to_string()
        } else {
            let reason = result
                .error
                .as_ref()
                .map(|failure| failure.message.clone())
                .unwrap_or_else(|| "something went wrong".to_string());
            format!(" I couldn't complete that: {reason}")
        };
        self.pending.push_back(AgentStep::Text(line));
    }
}
