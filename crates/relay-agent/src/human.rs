//! Human-in-the-loop tools: the only designated suspension points.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use relay_core::{AgentMessageMode, COMPLETE_HANDOFF_TEXT, Destination};

use crate::tool::{InterruptRequest, Tool, ToolOutcome};

/// A tool that suspends the run and waits for an externally supplied
/// answer. The resume value becomes the tool's result, as if it had
/// returned synchronously.
pub struct HumanInputTool {
    name: &'static str,
    description: &'static str,
    mode: AgentMessageMode,
    destination: Destination,
    /// Fixed message used when the tool takes no query argument.
    fixed_message: Option<&'static str>,
}

impl HumanInputTool {
    /// Ask a human operator a free-form question.
    pub fn ask_operator() -> Self {
        Self {
            name: "get_information_from_real_agent",
            description: "Ask a real human agent for information you cannot look up yourself. \
                          Returns the operator's answer.",
            mode: AgentMessageMode::Question,
            destination: Destination::Agent,
            fixed_message: None,
        }
    }

    /// Ask a human operator to approve or reject an action.
    pub fn confirm_with_operator() -> Self {
        Self {
            name: "confirm_action_with_real_agent",
            description: "Ask a real human agent to confirm an action before you perform it. \
                          Returns a confirmation or a negative answer.",
            mode: AgentMessageMode::Confirmation,
            destination: Destination::Agent,
            fixed_message: None,
        }
    }

    /// Ask a human operator to execute actions on the agent's behalf.
    pub fn request_operator_action() -> Self {
        Self {
            name: "real_human_agent_execute_actions",
            description: "Make a real human agent execute actions based on the provided query. \
                          Returns the operator's outcome report.",
            mode: AgentMessageMode::ActionRequest,
            destination: Destination::Agent,
            fixed_message: None,
        }
    }

    /// Hand the full conversation over to a human operator.
    pub fn complete_handoff() -> Self {
        Self {
            name: "handoff_conversation_to_real_agent",
            description: "Handoff the full conversation to a real agent.",
            mode: AgentMessageMode::CompleteHandoff,
            destination: Destination::Agent,
            fixed_message: Some(COMPLETE_HANDOFF_TEXT),
        }
    }
}

#[async_trait]
impl Tool for HumanInputTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        if self.fixed_message.is_some() {
            serde_json::json!({"type": "object", "properties": {}})
        } else {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The question or request for the human.",
                    }
                },
                "required": ["query"],
            })
        }
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolOutcome {
        let message = match self.fixed_message {
            Some(fixed) => fixed.to_string(),
            None => arguments
                .get("query")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        };
        ToolOutcome::Suspend(InterruptRequest {
            message,
            mode: self.mode,
            destination: self.destination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_question_tool_suspends_with_query() {
        let outcome = HumanInputTool::ask_operator()
            .execute(
                "c1",
                serde_json::json!({"query": "What is the refund policy for order 12345?"}),
                CancellationToken::new(),
            )
            .await;
        match outcome {
            ToolOutcome::Suspend(request) => {
                assert_eq!(request.message, "What is the refund policy for order 12345?");
                assert_eq!(request.mode, AgentMessageMode::Question);
                assert_eq!(request.destination, Destination::Agent);
            }
            other => panic!("expected suspension, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_handoff_uses_fixed_message() {
        let outcome = HumanInputTool::complete_handoff()
            .execute("c1", serde_json::json!({}), CancellationToken::new())
            .await;
        match outcome {
            ToolOutcome::Suspend(request) => {
                assert_eq!(request.message, COMPLETE_HANDOFF_TEXT);
                assert_eq!(request.mode, AgentMessageMode::CompleteHandoff);
            }
            other => panic!("expected suspension, got {:?}", other),
        }
    }
}
