//! Tool trait and execution outcomes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use relay_core::{AgentMessageMode, ControlTransfer, Destination};

use crate::model::ToolSchema;

/// Result of a completed tool execution.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Content returned to the model.
    pub content: String,
    /// Whether the execution resulted in an error.
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: text.into(),
            is_error: false,
        }
    }

    /// Create an error result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

/// A tool's request to pause the run for human input.
#[derive(Debug, Clone)]
pub struct InterruptRequest {
    /// The question or request shown to the recipient.
    pub message: String,
    pub mode: AgentMessageMode,
    pub destination: Destination,
}

/// How a tool invocation ended. Transfers and suspensions are control
/// flow, not results: the agent loop stops and propagates them.
#[derive(Debug)]
pub enum ToolOutcome {
    Success(ToolResult),
    Transfer(ControlTransfer),
    Suspend(InterruptRequest),
}

/// Trait for executable tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used in model tool schemas)
    fn name(&self) -> &str;

    /// Tool description shown to the model verbatim
    fn description(&self) -> &str;

    /// JSON Schema for parameters
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments
    async fn execute(
        &self,
        tool_call_id: &str,
        arguments: serde_json::Value,
        cancel: CancellationToken,
    ) -> ToolOutcome;
}

/// Type alias for a shared tool
pub type BoxedTool = Arc<dyn Tool>;

/// Convert a tool to the schema handed to the model.
pub fn to_schema(tool: &dyn Tool) -> ToolSchema {
    ToolSchema {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters_schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                }
            })
        }
        async fn execute(
            &self,
            _tool_call_id: &str,
            arguments: serde_json::Value,
            _cancel: CancellationToken,
        ) -> ToolOutcome {
            let text = arguments
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or("(empty)");
            ToolOutcome::Success(ToolResult::text(text))
        }
    }

    #[tokio::test]
    async fn test_echo_tool_executes() {
        let outcome = EchoTool
            .execute("c1", serde_json::json!({"text": "hello"}), CancellationToken::new())
            .await;
        match outcome {
            ToolOutcome::Success(result) => {
                assert!(!result.is_error);
                assert_eq!(result.content, "hello");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_to_schema() {
        let schema = to_schema(&EchoTool);
        assert_eq!(schema.name, "echo");
        assert_eq!(schema.description, "Echoes input");
        assert_eq!(schema.parameters["type"], "object");
    }
}
