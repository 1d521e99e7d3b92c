//! In-memory conversation history.
//!
//! The history is owned exclusively by the client instance: appended to after
//! each exchange, never truncated, never persisted. Message order is the
//! request order sent to the provider.

use crate::types::{ChatMessage, FunctionCallResponse, Role, ToolCall, ToolCallResponse};

/// Ordered conversation history.
///
/// Constructed once per client. A system prompt becomes the first message; a
/// seed context follows it as a user message, so the history opens
/// `[system, user]` before any exchange.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Create a history seeded with an optional system prompt and context.
    pub fn new(system_prompt: Option<&str>, context: Option<&str>) -> Self {
        let mut messages = Vec::new();
        if let Some(prompt) = system_prompt {
            messages.push(ChatMessage {
                role: Role::System,
                content: Some(prompt.to_string()),
                tool_call_id: None,
                tool_calls: None,
            });
        }
        if let Some(context) = context {
            messages.push(ChatMessage {
                role: Role::User,
                content: Some(context.to_string()),
                tool_call_id: None,
                tool_calls: None,
            });
        }
        Self { messages }
    }

    /// Append a user message.
    pub fn push_user(&mut self, content: &str) {
        self.messages.push(ChatMessage {
            role: Role::User,
            content: Some(content.to_string()),
            tool_call_id: None,
            tool_calls: None,
        });
    }

    /// Append an assistant message with its finalized tool calls.
    ///
    /// Tool calls are translated into the provider's message format so the
    /// next request round-trips them verbatim. An empty list is recorded as
    /// an absent field, not `[]` — some runtimes reject empty arrays here.
    pub fn push_assistant(&mut self, content: &str, tool_calls: &[ToolCall]) {
        let tool_calls = if tool_calls.is_empty() {
            None
        } else {
            Some(
                tool_calls
                    .iter()
                    .map(|tc| ToolCallResponse {
                        id: tc.id.clone(),
                        r#type: "function".to_string(),
                        function: FunctionCallResponse {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect(),
            )
        };
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: Some(content.to_string()),
            tool_call_id: None,
            tool_calls,
        });
    }

    /// The full message sequence, in request order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
