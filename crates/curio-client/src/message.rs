//! Pure reducer from stream events to the local conversation view.

use chrono::{DateTime, Utc};
use curio_protocol::{EventPayload, FunctionName, FunctionResult, ToolCallId};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Role of a locally rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    /// Message typed by the user.
    User,
    /// Assistant response text.
    Assistant,
    /// Function call with its (eventual) result.
    Function,
    /// Error bubble, local or streamed.
    Error,
}

/// Function call attached to a message, updated in place when the result
/// arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionView {
    /// Operation being invoked.
    pub function: FunctionName,
    /// Correlation id shared between started and completed events.
    pub tool_call_id: ToolCallId,
    /// Arguments as emitted by the assistant.
    pub parameters: Value,
    /// Result, once the completed event lands.
    pub result: Option<FunctionResult>,
}

/// One rendered entry in the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Local message id.
    pub id: Uuid,
    /// Speaker role.
    pub role: MessageRole,
    /// Display content.
    pub content: String,
    /// Local creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Attached function exchange for function messages.
    pub function: Option<FunctionView>,
}

impl Message {
    fn new(role: MessageRole, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            created_at: Utc::now(),
            function: None,
        }
    }
}

/// Local projection of one session's conversation.
///
/// This is a projection of server-emitted events, not a replica: it is
/// discarded and rebuilt on reconnect, which also clears the correlation
/// map so it cannot grow across connections.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    /// tool_call_id → message id, scoped to one connection's lifetime.
    correlation: HashMap<ToolCallId, Uuid>,
    /// Trailing assistant message still receiving partial chunks.
    open_assistant: Option<Uuid>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered messages in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Discard all local state, including the correlation map.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.correlation.clear();
        self.open_assistant = None;
    }

    /// Optimistically append the user's outbound message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.close_assistant();
        self.messages
            .push(Message::new(MessageRole::User, content.into()));
    }

    /// Append a locally produced error bubble (e.g. send failure).
    pub fn push_local_error(&mut self, content: impl Into<String>) {
        self.close_assistant();
        self.messages
            .push(Message::new(MessageRole::Error, content.into()));
    }

    /// Fold one stream event into the conversation.
    pub fn apply(&mut self, payload: &EventPayload) {
        match payload {
            EventPayload::Connection { .. } => {}
            EventPayload::TextChunk { content, partial } => {
                self.append_text(content, *partial);
            }
            EventPayload::FunctionCall {
                function,
                parameters,
                tool_call_id,
            } => {
                self.close_assistant();
                let mut message = Message::new(MessageRole::Function, String::new());
                message.function = Some(FunctionView {
                    function: *function,
                    tool_call_id: *tool_call_id,
                    parameters: parameters.clone(),
                    result: None,
                });
                self.correlation.insert(*tool_call_id, message.id);
                self.messages.push(message);
            }
            EventPayload::FunctionResult {
                function,
                result,
                tool_call_id,
            } => {
                self.attach_result(*function, result, *tool_call_id);
            }
            EventPayload::Completion { .. } => {
                self.close_assistant();
            }
            EventPayload::Error { error } => {
                self.close_assistant();
                self.messages
                    .push(Message::new(MessageRole::Error, error.clone()));
            }
        }
    }

    fn append_text(&mut self, content: &str, partial: bool) {
        let open = self
            .open_assistant
            .and_then(|id| self.messages.iter_mut().find(|message| message.id == id));
        match open {
            Some(message) => message.content.push_str(content),
            None => {
                let message = Message::new(MessageRole::Assistant, content.to_string());
                self.open_assistant = Some(message.id);
                self.messages.push(message);
            }
        }
        if !partial {
            self.open_assistant = None;
        }
    }

    /// Update the message created at the matching started event in place;
    /// rendering stays idempotent per intent.
    fn attach_result(
        &mut self,
        function: FunctionName,
        result: &FunctionResult,
        tool_call_id: ToolCallId,
    ) {
        self.close_assistant();
        if let Some(message_id) = self.correlation.get(&tool_call_id)
            && let Some(message) = self
                .messages
                .iter_mut()
                .find(|message| message.id == *message_id)
            && let Some(view) = message.function.as_mut()
        {
            view.result = Some(result.clone());
            return;
        }
        // No matching started event (reconnected mid-turn): render standalone.
        let mut message = Message::new(MessageRole::Function, String::new());
        message.function = Some(FunctionView {
            function,
            tool_call_id,
            parameters: Value::Null,
            result: Some(result.clone()),
        });
        self.correlation.insert(tool_call_id, message.id);
        self.messages.push(message);
    }

    fn close_assistant(&mut self) {
        self.open_assistant = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curio_protocol::{ErrorCode, FunctionFailure};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn chunk(content: &str, partial: bool) -> EventPayload {
        EventPayload::TextChunk {
            content: content.to_string(),
            partial,
        }
    }

    #[test]
    fn partial_chunks_accumulate_into_one_assistant_message() {
        let mut conversation = Conversation::new();
        for content in ["Hello", " there", "!"] {
            conversation.apply(&chunk(content, true));
        }
        conversation.apply(&EventPayload::Completion {
            turn_id: Uuid::new_v4(),
            total_tokens: 2,
        });

        assert_eq!(conversation.messages().len(), 1);
        let message = &conversation.messages()[0];
        assert_eq!(message.role, MessageRole::Assistant);
        assert_eq!(message.content, "Hello there!".to_string());

        // Text after completion starts a fresh message.
        conversation.apply(&chunk("Next turn", true));
        assert_eq!(conversation.messages().len(), 2);
    }

    #[test]
    fn final_chunk_closes_the_current_message() {
        let mut conversation = Conversation::new();
        conversation.apply(&chunk("First", false));
        conversation.apply(&chunk("Second", true));
        assert_eq!(conversation.messages().len(), 2);
    }

    #[test]
    fn function_results_update_the_started_message_in_place() {
        let mut conversation = Conversation::new();
        let tool_call_id = Uuid::new_v4();
        conversation.apply(&chunk("Looking", true));
        conversation.apply(&EventPayload::FunctionCall {
            function: FunctionName::SearchProducts,
            parameters: json!({ "query": "headphones" }),
            tool_call_id,
        });
        conversation.apply(&EventPayload::FunctionResult {
            function: FunctionName::SearchProducts,
            result: FunctionResult::ok(json!({ "total_count": 1 })),
            tool_call_id,
        });

        assert_eq!(conversation.messages().len(), 2);
        let function = conversation.messages()[1]
            .function
            .as_ref()
            .expect("function view");
        assert_eq!(function.tool_call_id, tool_call_id);
        let result = function.result.as_ref().expect("result");
        assert_eq!(result.success, true);

        // Re-applying the same result is idempotent.
        conversation.apply(&EventPayload::FunctionResult {
            function: FunctionName::SearchProducts,
            result: FunctionResult::ok(json!({ "total_count": 1 })),
            tool_call_id,
        });
        assert_eq!(conversation.messages().len(), 2);
    }

    #[test]
    fn unmatched_results_render_standalone_after_reconnect() {
        let mut conversation = Conversation::new();
        let tool_call_id = Uuid::new_v4();
        conversation.apply(&EventPayload::FunctionResult {
            function: FunctionName::AddToCart,
            result: FunctionResult::failure(FunctionFailure::new(
                ErrorCode::InsufficientStock,
                "only 15 in stock, requested 1000",
            )),
            tool_call_id,
        });
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].role, MessageRole::Function);
    }

    #[test]
    fn stream_errors_become_error_bubbles_not_silent_drops() {
        let mut conversation = Conversation::new();
        conversation.apply(&chunk("partial", true));
        conversation.apply(&EventPayload::Error {
            error: "the assistant failed mid-response".to_string(),
        });
        assert_eq!(conversation.messages().len(), 2);
        assert_eq!(conversation.messages()[1].role, MessageRole::Error);

        // The aborted assistant message is closed; new text starts fresh.
        conversation.apply(&chunk("recovered", true));
        assert_eq!(conversation.messages().len(), 3);
    }

    #[test]
    fn reset_clears_messages_and_correlation() {
        let mut conversation = Conversation::new();
        let tool_call_id = Uuid::new_v4();
        conversation.push_user("hi");
        conversation.apply(&EventPayload::FunctionCall {
            function: FunctionName::SearchProducts,
            parameters: json!({}),
            tool_call_id,
        });
        conversation.reset();
        assert_eq!(conversation.messages().len(), 0);

        // A result for the pre-reset call no longer matches anything.
        conversation.apply(&EventPayload::FunctionResult {
            function: FunctionName::SearchProducts,
            result: FunctionResult::ok(json!({})),
            tool_call_id,
        });
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(
            conversation.messages()[0]
                .function
                .as_ref()
                .expect("view")
                .parameters,
            Value::Null
        );
    }
}
