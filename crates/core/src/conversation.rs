//! Conversation-related types.
//!
//! A conversation is the literal chat transcript of a thread. It's also
//! the context sent to the model, so the insertion order of messages is
//! significant and messages are never modified once appended.

use std::collections::HashSet;
use std::fmt::{self, Display};

use lookout_model::{ModelMessage, ToolCall, ToolCallResult};
use serde::{Deserialize, Serialize};

/// The role of a message author.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human on the other side.
    User,
    /// The model.
    Assistant,
    /// A tool that ran on behalf of the model.
    Tool,
}

/// A single entry in the conversation log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// A user input.
    User {
        /// The input text.
        content: String,
    },
    /// An answer of the model.
    Assistant(AssistantMessage),
    /// The result of a tool call.
    Tool(ToolMessage),
}

/// An answer of the model, possibly requesting tool calls.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// The answer text, may be empty when `tool_calls` is not.
    #[serde(default)]
    pub content: String,
    /// Tool calls requested by the model, in the order they must run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// A tool result answering one tool call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMessage {
    /// The id of the [`ToolCall`] this message answers.
    pub tool_call_id: String,
    /// The tool output, or the error payload when `is_error` is set.
    pub content: String,
    /// Whether the tool failed.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

#[inline]
fn is_false(value: &bool) -> bool {
    !*value
}

impl Message {
    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    /// Creates a successful tool result.
    #[inline]
    pub fn tool_result<I, C>(tool_call_id: I, content: C) -> Self
    where
        I: Into<String>,
        C: Into<String>,
    {
        Message::Tool(ToolMessage {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: false,
        })
    }

    /// Creates a tool result carrying an error payload.
    #[inline]
    pub fn tool_error<I, C>(tool_call_id: I, content: C) -> Self
    where
        I: Into<String>,
        C: Into<String>,
    {
        Message::Tool(ToolMessage {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error: true,
        })
    }

    /// Returns the role of the author.
    #[inline]
    pub fn role(&self) -> Role {
        match self {
            Message::User { .. } => Role::User,
            Message::Assistant(_) => Role::Assistant,
            Message::Tool(_) => Role::Tool,
        }
    }

    /// Returns the text of this message.
    #[inline]
    pub fn content(&self) -> &str {
        match self {
            Message::User { content } => content,
            Message::Assistant(msg) => &msg.content,
            Message::Tool(msg) => &msg.content,
        }
    }

    /// Returns the tool calls requested by this message, empty for
    /// anything but assistant messages.
    #[inline]
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant(msg) => &msg.tool_calls,
            _ => &[],
        }
    }

    /// Returns the id of the tool call this message answers.
    #[inline]
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Message::Tool(msg) => Some(&msg.tool_call_id),
            _ => None,
        }
    }

    pub(crate) fn to_model_message(&self) -> ModelMessage {
        match self {
            Message::User { content } => ModelMessage::User(content.clone()),
            Message::Assistant(msg) => ModelMessage::Assistant {
                content: msg.content.clone(),
                tool_calls: msg.tool_calls.clone(),
            },
            Message::Tool(msg) => ModelMessage::Tool(ToolCallResult {
                id: msg.tool_call_id.clone(),
                content: msg.content.clone(),
            }),
        }
    }
}

/// A validated answer of the model.
///
/// The turn controller decides whether a turn continues by matching on
/// this type, so an answer is either final or a tool request, never
/// something in between.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssistantReply {
    /// A final answer without tool calls.
    Final(String),
    /// An answer requesting one or more tool calls.
    ToolRequest {
        /// Text accompanying the request, usually empty.
        content: String,
        /// The requested calls, never empty.
        calls: Vec<ToolCall>,
    },
}

impl AssistantReply {
    /// Converts the reply into a log entry.
    pub fn to_message(&self) -> Message {
        match self {
            AssistantReply::Final(content) => {
                Message::Assistant(AssistantMessage {
                    content: content.clone(),
                    tool_calls: vec![],
                })
            }
            AssistantReply::ToolRequest { content, calls } => {
                Message::Assistant(AssistantMessage {
                    content: content.clone(),
                    tool_calls: calls.clone(),
                })
            }
        }
    }
}

/// The ordered message log of a thread.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    /// The stable identifier of the thread.
    pub thread_id: String,
    /// Messages in insertion order.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ConversationState {
    /// Creates an empty conversation for a thread.
    #[inline]
    pub fn new<S: Into<String>>(thread_id: S) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: vec![],
        }
    }

    /// Returns the last message, if any.
    #[inline]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns the tool calls of the trailing assistant message that are
    /// still waiting for their results.
    ///
    /// This is only non-empty when a turn stopped between checkpointing a
    /// tool request and checkpointing all of its results.
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        let Some(assistant_idx) = self
            .messages
            .iter()
            .rposition(|msg| msg.role() != Role::Tool)
        else {
            return &[];
        };
        let calls = self.messages[assistant_idx].tool_calls();
        let answered = self.messages.len() - assistant_idx - 1;
        calls.get(answered..).unwrap_or(&[])
    }

    /// Verifies that every tool message answers a tool call of the
    /// immediately preceding assistant message, in the requested order,
    /// and that tool call ids are unique within their message.
    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        let mut expected: &[ToolCall] = &[];
        for (idx, msg) in self.messages.iter().enumerate() {
            match msg {
                Message::Tool(tool_msg) => {
                    let Some((call, rest)) = expected.split_first() else {
                        return Err(IntegrityError { index: idx });
                    };
                    if call.id != tool_msg.tool_call_id {
                        return Err(IntegrityError { index: idx });
                    }
                    expected = rest;
                }
                Message::Assistant(assistant) => {
                    let mut ids = HashSet::new();
                    if !assistant.tool_calls.iter().all(|c| ids.insert(&c.id)) {
                        return Err(IntegrityError { index: idx });
                    }
                    expected = &assistant.tool_calls;
                }
                Message::User { .. } => {
                    expected = &[];
                }
            }
        }
        Ok(())
    }
}

/// A broken link between tool messages and their tool calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntegrityError {
    /// Position of the offending message.
    pub index: usize,
}

impl Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message {} breaks the tool call sequence", self.index)
    }
}

impl std::error::Error for IntegrityError {}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use super::*;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_owned(),
            name: "search".to_owned(),
            arguments: Map::new(),
        }
    }

    fn request(ids: &[&str]) -> Message {
        AssistantReply::ToolRequest {
            content: String::new(),
            calls: ids.iter().map(|id| call(id)).collect(),
        }
        .to_message()
    }

    #[test]
    fn test_serialized_layout() {
        let msg = request(&["call:1"]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["tool_calls"][0]["id"], "call:1");

        let msg = Message::user("hi");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "role": "user", "content": "hi" })
        );

        let msg = Message::tool_result("call:1", "15°C");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["tool_call_id"], "call:1");
        assert!(value.get("is_error").is_none());

        let final_msg =
            AssistantReply::Final("done".to_owned()).to_message();
        let value = serde_json::to_value(&final_msg).unwrap();
        assert!(value.get("tool_calls").is_none());
        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, final_msg);
        assert_eq!(back.role(), Role::Assistant);
    }

    #[test]
    fn test_pending_tool_calls() {
        let mut state = ConversationState::new("t1");
        assert!(state.pending_tool_calls().is_empty());

        state.messages.push(Message::user("hi"));
        assert!(state.pending_tool_calls().is_empty());

        state.messages.push(request(&["a", "b"]));
        assert_eq!(state.pending_tool_calls().len(), 2);

        state.messages.push(Message::tool_result("a", "ok"));
        let pending = state.pending_tool_calls();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "b");

        state.messages.push(Message::tool_error("b", "boom"));
        assert!(state.pending_tool_calls().is_empty());
    }

    #[test]
    fn test_check_integrity() {
        let mut state = ConversationState::new("t1");
        state.messages.push(Message::user("hi"));
        state.messages.push(request(&["a", "b"]));
        state.messages.push(Message::tool_result("a", "ok"));
        state.messages.push(Message::tool_result("b", "ok"));
        state
            .messages
            .push(AssistantReply::Final("done".to_owned()).to_message());
        assert_eq!(state.check_integrity(), Ok(()));

        let mut swapped = state.clone();
        swapped.messages.swap(2, 3);
        assert_eq!(swapped.check_integrity(), Err(IntegrityError { index: 2 }));

        let mut orphan = ConversationState::new("t1");
        orphan.messages.push(Message::user("hi"));
        orphan.messages.push(Message::tool_result("a", "ok"));
        assert_eq!(orphan.check_integrity(), Err(IntegrityError { index: 1 }));

        let mut duplicated = ConversationState::new("t1");
        duplicated.messages.push(request(&["a", "a"]));
        assert_eq!(
            duplicated.check_integrity(),
            Err(IntegrityError { index: 0 })
        );
    }
}
