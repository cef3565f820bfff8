//! Message records exchanged between the user, the agents, and tools.

use serde::{Deserialize, Serialize};

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, echoed back in the tool result.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Arguments as a JSON object.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A message in a conversation.
///
/// Every message carries a unique id; the message reducer skips
/// duplicates by that identity, which makes replaying a delta a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// Inbound message from the end customer.
    Human {
        content: String,
        id: String,
        #[serde(default)]
        timestamp: i64,
    },
    /// Message produced by an agent. `name` identifies the node that
    /// produced it in a multi-agent graph.
    Ai {
        content: String,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
        #[serde(default)]
        name: Option<String>,
        id: String,
        #[serde(default)]
        timestamp: i64,
    },
    /// Result of one tool invocation.
    Tool {
        content: String,
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        is_error: bool,
        id: String,
        #[serde(default)]
        timestamp: i64,
    },
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Message {
    /// Create a human message.
    pub fn human(text: impl Into<String>) -> Self {
        Self::Human {
            content: text.into(),
            id: new_id(),
            timestamp: now_millis(),
        }
    }

    /// Create an agent message with no tool calls.
    pub fn ai(text: impl Into<String>) -> Self {
        Self::Ai {
            content: text.into(),
            tool_calls: vec![],
            name: None,
            id: new_id(),
            timestamp: now_millis(),
        }
    }

    /// Create an agent message attributed to a named node.
    pub fn ai_named(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Ai {
            content: text.into(),
            tool_calls: vec![],
            name: Some(name.into()),
            id: new_id(),
            timestamp: now_millis(),
        }
    }

    /// Create an agent message carrying tool calls.
    pub fn ai_with_tool_calls(
        name: impl Into<String>,
        text: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Self::Ai {
            content: text.into(),
            tool_calls,
            name: Some(name.into()),
            id: new_id(),
            timestamp: now_millis(),
        }
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            is_error,
            id: new_id(),
            timestamp: now_millis(),
        }
    }

    /// The message id used for identity-based dedup.
    pub fn id(&self) -> &str {
        match self {
            Self::Human { id, .. } | Self::Ai { id, .. } | Self::Tool { id, .. } => id,
        }
    }

    /// The role as a string.
    pub fn role(&self) -> &'static str {
        match self {
            Self::Human { .. } => "human",
            Self::Ai { .. } => "ai",
            Self::Tool { .. } => "tool",
        }
    }

    /// Text content of the message.
    pub fn content(&self) -> &str {
        match self {
            Self::Human { content, .. } | Self::Ai { content, .. } | Self::Tool { content, .. } => {
                content
            }
        }
    }

    /// Tool calls carried by an agent message.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Ai { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Whether this is a tool result, i.e. a transient transfer/tool
    /// artifact rather than a user-facing message.
    pub fn is_tool(&self) -> bool {
        matches!(self, Self::Tool { .. })
    }
}
