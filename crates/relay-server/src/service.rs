//! Per-discussion orchestration: load, run, checkpoint, respond.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use relay_agent::{
    AgentSpec, ConversationGraphSpec, HumanInputTool, Runtime, build_conversation_graph,
    is_transfer_tool,
};
use relay_core::{
    BuildError, Checkpoint, CheckpointError, CheckpointStore, ConversationState, EngineError,
    Graph, GraphRunner, InterruptPayload, Message, RunOutcome, RunReport, StateDelta,
};

use crate::catalog;
use crate::config::{CaseCategoryConfig, ChannelConfig, ServerConfig};

/// Fallback answer when a completed run produced no agent message.
const NO_ANSWER_FALLBACK: &str = "I'm sorry, I couldn't process your request at this time.";

/// Whether an inbound message opens a run or resumes a suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    User,
    Agent,
}

/// One inbound API message, already validated.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub kind: InboundKind,
    pub text: String,
    pub discussion_id: String,
    pub channel_type_id: String,
}

/// The service's answer, mapped to the wire format by the app layer.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Who the message is for: `user` or `agent`.
    pub message_type: &'static str,
    pub message_text: String,
    pub message_id: String,
    pub metadata: serde_json::Value,
}

/// Errors surfaced to API callers.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("unknown channel type: {0}")]
    UnknownChannel(String),

    #[error("conversation {0} has no pending interrupt to resume")]
    NoPendingInterrupt(String),

    #[error("conversation {0} is suspended and waiting for an operator answer")]
    Suspended(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Errors raised while assembling the service at startup.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("case category '{category}' references unknown action id '{action}'")]
    UnknownAction { category: String, action: String },
}

/// Handles inbound messages against one compiled graph per channel,
/// serializing runs per discussion id.
pub struct ConversationService {
    store: Arc<dyn CheckpointStore>,
    graphs: HashMap<String, Arc<Graph>>,
    locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    step_budget: u32,
}

impl ConversationService {
    /// Compile every channel's graph up front. Configuration errors
    /// abort here, before the server starts accepting traffic.
    pub fn from_config(config: &ServerConfig, runtime: &Runtime) -> Result<Self, StartupError> {
        let mut graphs = HashMap::new();
        for channel in &config.channels {
            let spec = conversation_spec(config, channel)?;
            let graph = build_conversation_graph(spec, runtime.model.clone())?;
            tracing::info!(channel = channel.id.as_str(), "compiled conversation graph");
            graphs.insert(channel.id.clone(), Arc::new(graph));
        }
        Ok(Self {
            store: runtime.store.clone(),
            graphs,
            locks: parking_lot::Mutex::new(HashMap::new()),
            step_budget: config.step_budget,
        })
    }

    pub fn store(&self) -> Arc<dyn CheckpointStore> {
        self.store.clone()
    }

    /// Serialization point: inbound messages for one discussion id are
    /// processed strictly sequentially.
    fn lock_for(&self, discussion_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(discussion_id.to_string())
            .or_default()
            .clone()
    }

    /// Process one inbound message (or resume value) end to end.
    pub async fn handle(&self, inbound: InboundMessage) -> Result<OutboundMessage, ServiceError> {
        let graph = self
            .graphs
            .get(&inbound.channel_type_id)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownChannel(inbound.channel_type_id.clone()))?;

        let lock = self.lock_for(&inbound.discussion_id);
        let _guard = lock.lock().await;

        let mut checkpoint = self
            .store
            .load(&inbound.discussion_id)
            .await?
            .unwrap_or_else(|| Checkpoint::new(ConversationState::default()));

        match inbound.kind {
            InboundKind::User => {
                if checkpoint.is_suspended() {
                    // A new customer message cannot preempt a pending
                    // operator answer; fail fast without touching state.
                    return Err(ServiceError::Suspended(inbound.discussion_id));
                }
                let mut delta = StateDelta::default();
                delta.push_message(Message::human(&inbound.text));
                checkpoint.state.apply(&delta);
            }
            InboundKind::Agent => {
                let Some(pending) = checkpoint.pending_interrupt.take() else {
                    return Err(ServiceError::NoPendingInterrupt(inbound.discussion_id));
                };
                // The resume value becomes the suspended tool's result,
                // as if it had returned synchronously.
                let mut delta = StateDelta::default();
                delta.push_message(Message::tool_result(
                    &pending.tool_call_id,
                    &pending.tool_name,
                    &inbound.text,
                    false,
                ));
                checkpoint.state.apply(&delta);
            }
        }
        checkpoint.state.remaining_steps = self.step_budget;

        let outcome = GraphRunner::default()
            .run(&graph, &mut checkpoint.state)
            .await?;

        let outbound = match outcome {
            RunOutcome::Completed(report) => {
                checkpoint.pending_interrupt = None;
                let message_text = report
                    .final_message()
                    .map(|m| m.content().to_string())
                    .unwrap_or_else(|| NO_ANSWER_FALLBACK.to_string());
                OutboundMessage {
                    message_type: "user",
                    message_text,
                    message_id: uuid::Uuid::new_v4().to_string(),
                    metadata: response_metadata(&inbound.discussion_id, &report, None),
                }
            }
            RunOutcome::Suspended { pending, report } => {
                let payload = pending.payload.clone();
                checkpoint.pending_interrupt = Some(pending);
                OutboundMessage {
                    message_type: payload.destination.as_str(),
                    message_text: payload.user_message.clone(),
                    message_id: uuid::Uuid::new_v4().to_string(),
                    metadata: response_metadata(&inbound.discussion_id, &report, Some(&payload)),
                }
            }
            RunOutcome::Escalated { transfer, .. } => {
                return Err(EngineError::ParentTransferAtRoot(transfer.target).into());
            }
        };

        checkpoint.updated_at = chrono::Utc::now().timestamp_millis();
        self.store.save(&inbound.discussion_id, &checkpoint).await?;
        Ok(outbound)
    }
}

/// Response metadata: discussion id, executed domain tool calls
/// (internal transfer tools filtered out), and interrupt bookkeeping.
fn response_metadata(
    discussion_id: &str,
    report: &RunReport,
    interrupt: Option<&InterruptPayload>,
) -> serde_json::Value {
    let tool_calls: Vec<serde_json::Value> = report
        .delta
        .tools_called
        .iter()
        .filter(|record| !is_transfer_tool(&record.name))
        .map(|record| {
            json!({
                "tool_name": record.name,
                "tool_input": record.parameters,
                "tool_id": record.tool_call_id,
            })
        })
        .collect();

    let mut metadata = json!({
        "discussion_id": discussion_id,
        "tool_calls": tool_calls,
    });
    if let Some(payload) = interrupt {
        metadata["target_entity"] = json!(payload.destination.as_str());
        metadata["agent_message_mode"] = json!(payload.agent_message_mode.as_str());
        metadata["complete_handoff"] = json!(payload.is_complete_handoff());
    }
    metadata
}

/// Assemble the graph descriptor for one channel from configuration.
fn conversation_spec(
    config: &ServerConfig,
    channel: &ChannelConfig,
) -> Result<ConversationGraphSpec, StartupError> {
    let mut cases = Vec::with_capacity(config.case_categories.len());
    for category in &config.case_categories {
        cases.push(case_spec(category, channel)?);
    }

    Ok(ConversationGraphSpec {
        supervisor_name: config.supervisor_name.clone(),
        supervisor_prompt: format!(
            "{}\n\n## Channel\nYou are answering on the {} channel. {}",
            config.supervisor_prompt, channel.name, channel.instructions
        ),
        cases,
        shared_tools: vec![
            Arc::new(HumanInputTool::ask_operator()),
            Arc::new(HumanInputTool::confirm_with_operator()),
            Arc::new(HumanInputTool::request_operator_action()),
            Arc::new(HumanInputTool::complete_handoff()),
        ],
    })
}

fn case_spec(
    category: &CaseCategoryConfig,
    channel: &ChannelConfig,
) -> Result<AgentSpec, StartupError> {
    let mut prompt = category.instructions.clone();
    if !category.handoff_conditions.is_empty() {
        prompt.push_str(&format!(
            "\n\n## Handoff conditions\n{}",
            category.handoff_conditions
        ));
    }
    prompt.push_str(&format!(
        "\n\n## Channel\nYou are answering on the {} channel. {}",
        channel.name, channel.instructions
    ));

    let mut spec = AgentSpec::new(&category.name, &category.description, prompt);
    let mut has_knowledge = false;
    for action in &category.actions {
        let child = catalog::action_spec(action).ok_or_else(|| StartupError::UnknownAction {
            category: category.name.clone(),
            action: action.clone(),
        })?;
        has_knowledge = has_knowledge || child.name == "knowledge_handler";
        spec = spec.with_child(child);
    }
    // Every case can consult the shared knowledge agent.
    if !has_knowledge {
        spec = spec.with_child(catalog::knowledge_agent_spec());
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_spec_includes_actions_and_knowledge() {
        let config = ServerConfig::default();
        let spec = case_spec(&config.case_categories[0], &config.channels[0]).unwrap();
        let names: Vec<&str> = spec.children.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"order_lookup"));
        assert!(names.contains(&"refund_processor"));
        assert!(names.contains(&"knowledge_handler"));
    }

    #[test]
    fn test_unknown_action_id_fails_at_startup() {
        let mut config = ServerConfig::default();
        config.case_categories[0].actions.push("act_bogus".into());
        let err = case_spec(&config.case_categories[0], &config.channels[0]).unwrap_err();
        assert!(matches!(err, StartupError::UnknownAction { action, .. } if action == "act_bogus"));
    }

    #[test]
    fn test_case_prompt_carries_channel_rules() {
        let config = ServerConfig::default();
        let spec = case_spec(&config.case_categories[0], &config.channels[0]).unwrap();
        assert!(spec.prompt.contains("Email"));
        assert!(spec.prompt.contains("Handoff conditions"));
    }
}
