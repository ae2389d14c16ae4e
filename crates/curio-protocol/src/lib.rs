//! Wire protocol types for Curio stream events, function calls, and common ids.

mod function;

pub use function::{
    ErrorCode, FailureDetails, FunctionCall, FunctionFailure, FunctionName, FunctionResult,
    Suggestion,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Unique identifier for a session.
pub type SessionId = Uuid;
/// Unique identifier for a turn.
pub type TurnId = Uuid;
/// Unique identifier for a function call within a turn.
pub type ToolCallId = Uuid;

/// Wrapper for events emitted on a session's stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventMsg {
    /// Unique id for the event.
    pub id: Uuid,
    /// Session id associated with the event.
    pub session_id: SessionId,
    /// Timestamp when the event was created.
    pub created_at: DateTime<Utc>,
    /// Event payload content.
    pub payload: EventPayload,
}

impl EventMsg {
    /// Wrap a payload in a fresh envelope for the given session.
    pub fn new(session_id: SessionId, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            created_at: Utc::now(),
            payload,
        }
    }
}

/// All events emitted during a streaming conversation.
///
/// The serde tag doubles as the SSE `event:` field and the content as the
/// `data:` JSON, so one enum describes both the in-process bus and the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type", content = "data")]
pub enum EventPayload {
    /// Stream attached and ready.
    Connection {
        status: String,
        session_id: SessionId,
    },
    /// Incremental assistant text.
    TextChunk { content: String, partial: bool },
    /// Function execution started.
    FunctionCall {
        function: FunctionName,
        parameters: Value,
        tool_call_id: ToolCallId,
    },
    /// Function execution completed.
    FunctionResult {
        function: FunctionName,
        result: FunctionResult,
        tool_call_id: ToolCallId,
    },
    /// Turn finished; the stream stays open for the next message.
    Completion { turn_id: TurnId, total_tokens: u64 },
    /// Turn aborted with a sanitized message.
    Error { error: String },
}

impl EventPayload {
    /// Name used as the SSE `event:` field.
    pub fn event_name(&self) -> &'static str {
        match self {
            EventPayload::Connection { .. } => "connection",
            EventPayload::TextChunk { .. } => "text_chunk",
            EventPayload::FunctionCall { .. } => "function_call",
            EventPayload::FunctionResult { .. } => "function_result",
            EventPayload::Completion { .. } => "completion",
            EventPayload::Error { .. } => "error",
        }
    }

    /// JSON carried in the SSE `data:` field.
    pub fn data(&self) -> Result<Value, ProtocolError> {
        let value = serde_json::to_value(self)?;
        let Value::Object(mut map) = value else {
            return Err(ProtocolError::MalformedEvent(
                "payload did not serialize to an object".to_string(),
            ));
        };
        Ok(map
            .remove("data")
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    /// Rebuild a payload from an SSE frame's event name and data JSON.
    pub fn from_wire(event: &str, data: &str) -> Result<Self, ProtocolError> {
        let data: Value = serde_json::from_str(data)?;
        let payload = serde_json::from_value(json!({ "type": event, "data": data }))
            .map_err(|_| ProtocolError::UnknownEvent(event.to_string()))?;
        Ok(payload)
    }
}

/// Errors returned when encoding or decoding wire events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Event name did not match any known payload, or its data was invalid.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    /// Payload structure violated wire expectations.
    #[error("malformed event: {0}")]
    MalformedEvent(String),
    /// JSON encode/decode failure.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Sink interface for coordinator events.
pub trait EventSink: Send + Sync {
    /// Emit an event to downstream listeners.
    fn emit(&self, event: EventMsg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn event_payload_round_trips_through_json() {
        let event = EventMsg::new(
            Uuid::new_v4(),
            EventPayload::FunctionResult {
                function: FunctionName::SearchProducts,
                result: FunctionResult::ok(json!({ "results": [], "total_count": 0 })),
                tool_call_id: Uuid::new_v4(),
            },
        );
        let encoded = serde_json::to_value(&event).expect("serialize");
        let decoded: EventMsg = serde_json::from_value(encoded.clone()).expect("deserialize");
        assert_eq!(serde_json::to_value(decoded).expect("reserialize"), encoded);
    }

    #[test]
    fn wire_names_and_data_match_the_serde_tag() {
        let payload = EventPayload::TextChunk {
            content: "Hello".to_string(),
            partial: true,
        };
        assert_eq!(payload.event_name(), "text_chunk");
        assert_eq!(
            payload.data().expect("data"),
            json!({ "content": "Hello", "partial": true })
        );

        let rebuilt =
            EventPayload::from_wire("text_chunk", r#"{"content":"Hello","partial":true}"#)
                .expect("from wire");
        assert_eq!(rebuilt, payload);
    }

    #[test]
    fn from_wire_rejects_unknown_events() {
        let err = EventPayload::from_wire("telemetry", "{}").expect_err("unknown event");
        let ProtocolError::UnknownEvent(name) = err else {
            panic!("expected unknown event, got {err:?}");
        };
        assert_eq!(name, "telemetry");
    }

    #[test]
    fn completion_data_carries_turn_and_tokens() {
        let turn_id = Uuid::new_v4();
        let payload = EventPayload::Completion {
            turn_id,
            total_tokens: 42,
        };
        assert_eq!(
            payload.data().expect("data"),
            json!({ "turn_id": turn_id, "total_tokens": 42 })
        );
    }
}
