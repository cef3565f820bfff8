//! The handoff tool factory: control transfer expressed as a tool call.
//!
//! Routing is data, not free text: the model invokes a synthesized
//! `transfer_to_<agent>` tool whose validated call becomes a
//! [`ControlTransfer`] instruction for the runner. Tool-call schemas are
//! checked by the provider, which makes this far more reliable than
//! parsing control tokens out of prose.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use relay_core::{ControlTransfer, TransferScope, normalize_name};

use crate::tool::{Tool, ToolOutcome};

/// Prefix of tools that transfer control to another agent.
pub const TRANSFER_TOOL_PREFIX: &str = "transfer_to_";
/// Prefix of tools that hand control back up to a supervisor.
pub const TRANSFER_BACK_TOOL_PREFIX: &str = "transfer_back_to_";

/// Whether a tool name is a synthesized transfer tool. Used to keep
/// internal routing calls out of user-visible tool-call metadata.
pub fn is_transfer_tool(name: &str) -> bool {
    name.starts_with(TRANSFER_TOOL_PREFIX) || name.starts_with(TRANSFER_BACK_TOOL_PREFIX)
}

/// A synthesized control-transfer tool targeting one named node.
pub struct HandoffTool {
    tool_name: String,
    target: String,
    description: String,
    scope: TransferScope,
    takes_message: bool,
}

impl HandoffTool {
    /// Tool that hands the conversation to the named agent. The
    /// description is what the parent's model sees when choosing it.
    pub fn to_agent(target_name: &str, description: impl Into<String>) -> Self {
        let target = normalize_name(target_name);
        Self {
            tool_name: format!("{TRANSFER_TOOL_PREFIX}{target}"),
            target,
            description: description.into(),
            scope: TransferScope::Sibling,
            takes_message: true,
        }
    }

    /// Tool that returns the conversation to the supervisor, for when
    /// the current agent determines it cannot handle the case.
    pub fn back_to(supervisor_name: &str, scope: TransferScope) -> Self {
        let target = normalize_name(supervisor_name);
        Self {
            tool_name: format!("{TRANSFER_BACK_TOOL_PREFIX}{target}"),
            description: format!(
                "Hand the conversation back to {target} when this case cannot be handled here."
            ),
            target,
            scope,
            takes_message: false,
        }
    }

    /// Registered name of the node this tool transfers to.
    pub fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl Tool for HandoffTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        if self.takes_message {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "message_for_subagent": {
                        "type": "string",
                        "description": "Short instructions for the agent taking over.",
                    }
                },
                "required": ["message_for_subagent"],
            })
        } else {
            serde_json::json!({"type": "object", "properties": {}})
        }
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolOutcome {
        let mut transfer = ControlTransfer {
            target: self.target.clone(),
            scope: self.scope,
            note: None,
        };
        if self.takes_message {
            transfer.note = arguments
                .get("message_for_subagent")
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }
        ToolOutcome::Transfer(transfer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transfer_tool_naming() {
        let tool = HandoffTool::to_agent("Refunds  and Cancellations", "Handles refunds.");
        assert_eq!(tool.name(), "transfer_to_refunds_and_cancellations");
        assert_eq!(tool.target(), "refunds_and_cancellations");
        assert_eq!(tool.description(), "Handles refunds.");
    }

    #[tokio::test]
    async fn test_transfer_carries_note() {
        let tool = HandoffTool::to_agent("billing", "Billing agent.");
        let outcome = tool
            .execute(
                "c1",
                serde_json::json!({"message_for_subagent": "order 12345, wrong item"}),
                CancellationToken::new(),
            )
            .await;
        match outcome {
            ToolOutcome::Transfer(t) => {
                assert_eq!(t.target, "billing");
                assert_eq!(t.scope, TransferScope::Sibling);
                assert_eq!(t.note.as_deref(), Some("order 12345, wrong item"));
            }
            other => panic!("expected transfer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_back_tool_has_no_message_argument() {
        let tool = HandoffTool::back_to("Conversation Supervisor", TransferScope::Parent);
        assert_eq!(tool.name(), "transfer_back_to_conversation_supervisor");
        assert!(tool.parameters_schema()["properties"].as_object().unwrap().is_empty());

        let outcome = tool
            .execute("c1", serde_json::json!({}), CancellationToken::new())
            .await;
        match outcome {
            ToolOutcome::Transfer(t) => {
                assert_eq!(t.target, "conversation_supervisor");
                assert_eq!(t.scope, TransferScope::Parent);
                assert_eq!(t.note, None);
            }
            other => panic!("expected transfer, got {:?}", other),
        }
    }

    #[test]
    fn test_is_transfer_tool() {
        assert!(is_transfer_tool("transfer_to_billing"));
        assert!(is_transfer_tool("transfer_back_to_supervisor"));
        assert!(!is_transfer_tool("process_refund"));
    }
}
