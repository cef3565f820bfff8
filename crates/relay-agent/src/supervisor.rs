//! Supervisor assembly: an agent whose only job is routing.

use std::sync::Arc;

use crate::agent::AgentNode;
use crate::handoff::HandoffTool;
use crate::model::BoxedModel;
use crate::tool::BoxedTool;

/// Append the reachable-agents listing to a supervisor prompt, so the
/// model can choose a handoff by name and description.
pub fn prompt_with_agents(prompt: &str, agents: &[(String, String)]) -> String {
    if agents.is_empty() {
        return prompt.to_string();
    }
    let mut out = format!("{prompt}\n\n## Agents you can transfer to\n");
    for (name, description) in agents {
        out.push_str(&format!("- {name}: {description}\n"));
    }
    out
}

/// Build a supervisor node: its tool set is the handoff tools for its
/// children plus any shared utility tools. Parallel tool calls are
/// disabled so at most one handoff can happen per reasoning step.
pub fn build_supervisor(
    name: &str,
    prompt: &str,
    children: &[(String, String)],
    shared_tools: Vec<BoxedTool>,
    model: BoxedModel,
) -> AgentNode {
    let mut tools: Vec<BoxedTool> = children
        .iter()
        .map(|(child, description)| {
            Arc::new(HandoffTool::to_agent(child, description.clone())) as BoxedTool
        })
        .collect();
    tools.extend(shared_tools);

    AgentNode::new(name, prompt_with_agents(prompt, children), tools, model)
        .without_parallel_calls()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::model::{ChatModel, ChatRequest, ChatResponse, ModelError};

    struct SilentModel;

    #[async_trait]
    impl ChatModel for SilentModel {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, ModelError> {
            Ok(ChatResponse::text("ok"))
        }
    }

    fn children() -> Vec<(String, String)> {
        vec![
            ("refunds_and_cancellations".into(), "Handles refunds and cancellations.".into()),
            ("account_address_update".into(), "Updates account and shipping addresses.".into()),
        ]
    }

    #[test]
    fn test_prompt_enumerates_every_child() {
        let prompt = prompt_with_agents("You route conversations.", &children());
        assert!(prompt.contains("- refunds_and_cancellations: Handles refunds and cancellations."));
        assert!(prompt.contains("- account_address_update: Updates account and shipping addresses."));
    }

    #[test]
    fn test_prompt_unchanged_without_children() {
        assert_eq!(prompt_with_agents("base", &[]), "base");
    }

    #[test]
    fn test_supervisor_tools_are_handoffs() {
        let node = build_supervisor(
            "supervisor",
            "You route conversations.",
            &children(),
            vec![],
            Arc::new(SilentModel),
        );
        let names = node.tool_names();
        assert_eq!(
            names,
            vec![
                "transfer_to_refunds_and_cancellations",
                "transfer_to_account_address_update",
            ]
        );
    }
}
