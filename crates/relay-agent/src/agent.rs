//! The tool-calling agent node: a bounded LLM reasoning loop.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use relay_core::{
    ConversationState, ControlTransfer, EngineError, InterruptPayload, Message, Node, NodeStep,
    PendingInterrupt, Result, StateDelta, ToolCallRecord, keys, normalize_name,
};

use crate::model::{BoxedModel, ChatRequest};
use crate::tool::{BoxedTool, ToolOutcome, to_schema};

/// Returned when the step budget runs out mid-reasoning.
const BUDGET_EXHAUSTED_ANSWER: &str =
    "Sorry, I need more steps to finish handling this request.";

/// An agent node: one model plus a fixed tool set, run as a bounded
/// reasoning loop.
///
/// Per step: call the model; a plain text answer ends the node, tool
/// calls are executed and their results fed back for another step.
/// Application errors in tools become error results the model can
/// recover from; transfers and suspensions stop the loop and propagate.
pub struct AgentNode {
    name: String,
    prompt: String,
    tools: Vec<BoxedTool>,
    model: BoxedModel,
    parallel_tool_calls: bool,
    /// Compiled JSON Schema validators keyed by tool name.
    schema_cache: HashMap<String, Arc<jsonschema::Validator>>,
}

impl AgentNode {
    pub fn new(
        name: &str,
        prompt: impl Into<String>,
        tools: Vec<BoxedTool>,
        model: BoxedModel,
    ) -> Self {
        let mut schema_cache = HashMap::new();
        for tool in &tools {
            match jsonschema::validator_for(&tool.parameters_schema()) {
                Ok(validator) => {
                    schema_cache.insert(tool.name().to_string(), Arc::new(validator));
                }
                Err(e) => {
                    tracing::warn!(
                        "Invalid tool parameter schema for '{}', skipping validation: {}",
                        tool.name(),
                        e
                    );
                }
            }
        }
        Self {
            name: normalize_name(name),
            prompt: prompt.into(),
            tools,
            model,
            parallel_tool_calls: true,
            schema_cache,
        }
    }

    /// Disable parallel tool calls on the underlying model. Required
    /// for nodes carrying handoff tools.
    pub fn without_parallel_calls(mut self) -> Self {
        self.parallel_tool_calls = false;
        self
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    fn find_tool(&self, name: &str) -> Option<&BoxedTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    fn system_prompt(&self, note: Option<&str>) -> String {
        match note {
            Some(note) => format!("{}\n\n## Message from your supervisor\n{}", self.prompt, note),
            None => self.prompt.clone(),
        }
    }

    /// Validate tool arguments; `Some(message)` describes a failure.
    fn validate_arguments(&self, tool_name: &str, arguments: &serde_json::Value) -> Option<String> {
        let validator = self.schema_cache.get(tool_name)?;
        let errors: Vec<String> = validator
            .iter_errors(arguments)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();

        if errors.is_empty() {
            None
        } else {
            Some(format!(
                "Tool argument validation failed:\n{}",
                errors.join("\n")
            ))
        }
    }
}

#[async_trait]
impl Node for AgentNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &ConversationState) -> Result<NodeStep> {
        let mut delta = StateDelta::default();
        let cancel = CancellationToken::new();

        // Consume the pending supervisor directive, if any: it is
        // delivered through this run's system prompt exactly once.
        let note = state.pending_supervisor_note().map(str::to_string);
        if note.is_some() {
            delta.supervisor_notes.push(None);
        }

        let mut history = state.messages.clone();
        let mut budget = state.remaining_steps;

        loop {
            if budget == 0 {
                tracing::warn!(node = self.name.as_str(), "step budget exhausted, forcing stop");
                delta.push_message(Message::ai_named(&self.name, BUDGET_EXHAUSTED_ANSWER));
                return Ok(NodeStep::end(delta));
            }
            budget -= 1;
            delta.steps_used += 1;

            let request = ChatRequest {
                system_prompt: self.system_prompt(note.as_deref()),
                messages: history.clone(),
                tools: self.tools.iter().map(|t| to_schema(t.as_ref())).collect(),
                parallel_tool_calls: self.parallel_tool_calls,
            };
            let response = self
                .model
                .complete(request)
                .await
                .map_err(|e| EngineError::Model(e.to_string()))?;

            if response.tool_calls.is_empty() {
                let message = Message::ai_named(&self.name, response.content);
                delta.push_message(message);
                return Ok(NodeStep::end(delta));
            }

            let assistant = Message::ai_with_tool_calls(
                &self.name,
                response.content.clone(),
                response.tool_calls.clone(),
            );
            delta.push_message(assistant.clone());
            history.push(assistant);

            let mut transfer: Option<ControlTransfer> = None;
            for call in &response.tool_calls {
                // At most one control transfer per reasoning step.
                if let Some(t) = &transfer {
                    let message = Message::tool_result(
                        &call.id,
                        &call.name,
                        format!("Skipped: control already transferred to {}", t.target),
                        true,
                    );
                    delta.push_message(message.clone());
                    history.push(message);
                    continue;
                }

                let Some(tool) = self.find_tool(&call.name) else {
                    let message = Message::tool_result(
                        &call.id,
                        &call.name,
                        format!("Tool not found: {}", call.name),
                        true,
                    );
                    delta.push_message(message.clone());
                    history.push(message);
                    continue;
                };

                if let Some(error) = self.validate_arguments(&call.name, &call.arguments) {
                    let message = Message::tool_result(&call.id, &call.name, error, true);
                    delta.push_message(message.clone());
                    history.push(message);
                    continue;
                }

                match tool
                    .execute(&call.id, call.arguments.clone(), cancel.clone())
                    .await
                {
                    ToolOutcome::Success(result) => {
                        delta.tools_called.push(ToolCallRecord::new(
                            &call.name,
                            result.content.clone(),
                            &call.id,
                            call.arguments.clone(),
                        ));
                        let message = Message::tool_result(
                            &call.id,
                            &call.name,
                            result.content,
                            result.is_error,
                        );
                        delta.push_message(message.clone());
                        history.push(message);
                    }
                    ToolOutcome::Transfer(t) => {
                        let content = match &t.note {
                            Some(note) => format!(
                                "Successfully transferred to {}\n\n## Message from the supervisor\n{}",
                                t.target, note
                            ),
                            None => format!("Successfully transferred to {}", t.target),
                        };
                        delta.tools_called.push(ToolCallRecord::new(
                            &call.name,
                            content.clone(),
                            &call.id,
                            call.arguments.clone(),
                        ));
                        let message = Message::tool_result(&call.id, &call.name, content, false);
                        delta.push_message(message.clone());
                        history.push(message);
                        if let Some(note) = &t.note {
                            delta.supervisor_notes.push(Some(note.clone()));
                        }
                        transfer = Some(t);
                    }
                    ToolOutcome::Suspend(request) => {
                        let payload = InterruptPayload {
                            user_message: request.message,
                            agent_message_mode: request.mode,
                            destination: request.destination,
                            tools_called: delta.tools_called.clone(),
                        };
                        delta.set_metadata(keys::NEXT_NODE, serde_json::json!(self.name));
                        delta.set_metadata(
                            keys::TARGET_ENTITY,
                            serde_json::json!(payload.destination.as_str()),
                        );
                        delta.set_metadata(
                            keys::AGENT_MESSAGE_MODE,
                            serde_json::json!(payload.agent_message_mode.as_str()),
                        );
                        delta.set_metadata(
                            keys::COMPLETE_HANDOFF,
                            serde_json::json!(payload.is_complete_handoff()),
                        );
                        // A suspension does not consume a reasoning step.
                        delta.steps_used = delta.steps_used.saturating_sub(1);
                        let pending = PendingInterrupt {
                            node: self.name.clone(),
                            tool_call_id: call.id.clone(),
                            tool_name: call.name.clone(),
                            payload,
                        };
                        return Ok(NodeStep::suspend(delta, pending));
                    }
                }
            }

            if let Some(t) = transfer {
                return Ok(NodeStep::transfer(delta, t));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    use super::*;
    use crate::handoff::HandoffTool;
    use crate::human::HumanInputTool;
    use crate::model::{ChatModel, ChatResponse, ModelError};
    use crate::tool::{Tool, ToolResult};
    use relay_core::{NodeExit, ToolCall};

    /// A mock model that replays canned responses and records requests.
    struct ScriptedModel {
        responses: Mutex<VecDeque<ChatResponse>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        fn boxed(responses: Vec<ChatResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ModelError> {
            self.requests.lock().push(request);
            Ok(self
                .responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| ChatResponse::text("done")))
        }
    }

    struct CountingTool {
        tool_name: String,
        result: ToolResult,
        calls: Arc<std::sync::atomic::AtomicU32>,
    }

    impl CountingTool {
        fn new(name: &str, result: ToolResult) -> (Arc<Self>, Arc<std::sync::atomic::AtomicU32>) {
            let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
            (
                Arc::new(Self {
                    tool_name: name.into(),
                    result,
                    calls: calls.clone(),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            &self.tool_name
        }
        fn description(&self) -> &str {
            "A test tool"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "order_id": { "type": "string" }
                }
            })
        }
        async fn execute(
            &self,
            _tool_call_id: &str,
            _arguments: serde_json::Value,
            _cancel: CancellationToken,
        ) -> ToolOutcome {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            ToolOutcome::Success(self.result.clone())
        }
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall::new(uuid::Uuid::new_v4().to_string(), name, arguments)
    }

    fn state_with(text: &str, budget: u32) -> ConversationState {
        let mut state = ConversationState::with_budget(budget);
        let mut delta = StateDelta::default();
        delta.push_message(Message::human(text));
        state.apply(&delta);
        state
    }

    #[tokio::test]
    async fn test_text_answer_ends_node() {
        let model = ScriptedModel::boxed(vec![ChatResponse::text("Your order has shipped.")]);
        let node = AgentNode::new("support", "You are support.", vec![], model);

        let step = node.run(&state_with("where is my order?", 10)).await.unwrap();
        assert!(matches!(step.exit, NodeExit::End));
        let last = step.delta.messages.last().unwrap();
        assert_eq!(last.content(), "Your order has shipped.");
        assert_eq!(step.delta.steps_used, 1);
    }

    #[tokio::test]
    async fn test_tool_call_is_executed_and_recorded() {
        let (tool, calls) = CountingTool::new("order_lookup", ToolResult::text("order 12345: shipped"));
        let model = ScriptedModel::boxed(vec![
            ChatResponse {
                content: String::new(),
                tool_calls: vec![call("order_lookup", serde_json::json!({"order_id": "12345"}))],
            },
            ChatResponse::text("Order 12345 has shipped."),
        ]);
        let node = AgentNode::new("support", "You are support.", vec![tool], model);

        let step = node.run(&state_with("where is order 12345?", 10)).await.unwrap();
        assert!(matches!(step.exit, NodeExit::End));
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 1);
        assert_eq!(step.delta.tools_called.len(), 1);
        assert_eq!(step.delta.tools_called[0].name, "order_lookup");
        assert_eq!(step.delta.steps_used, 2);
    }

    #[tokio::test]
    async fn test_tool_error_recovers_in_loop() {
        struct FailingTool;

        #[async_trait]
        impl Tool for FailingTool {
            fn name(&self) -> &str {
                "order_lookup"
            }
            fn description(&self) -> &str {
                "Looks up orders"
            }
            fn parameters_schema(&self) -> serde_json::Value {
                serde_json::json!({"type": "object", "properties": {}})
            }
            async fn execute(
                &self,
                _tool_call_id: &str,
                _arguments: serde_json::Value,
                _cancel: CancellationToken,
            ) -> ToolOutcome {
                ToolOutcome::Success(ToolResult::error("backend unavailable"))
            }
        }

        let model = ScriptedModel::boxed(vec![
            ChatResponse {
                content: String::new(),
                tool_calls: vec![call("order_lookup", serde_json::json!({}))],
            },
            ChatResponse::text("I could not reach the order system, please try later."),
        ]);
        let node = AgentNode::new("support", "You are support.", vec![Arc::new(FailingTool)], model);

        let step = node.run(&state_with("check my order", 10)).await.unwrap();
        // The error became a tool result and the model got to recover.
        assert!(matches!(step.exit, NodeExit::End));
        let error_message = step
            .delta
            .messages
            .iter()
            .find(|m| m.is_tool())
            .unwrap();
        assert!(error_message.content().contains("backend unavailable"));
        assert!(step.delta.messages.last().unwrap().content().contains("try later"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_result() {
        let model = ScriptedModel::boxed(vec![
            ChatResponse {
                content: String::new(),
                tool_calls: vec![call("no_such_tool", serde_json::json!({}))],
            },
            ChatResponse::text("done"),
        ]);
        let node = AgentNode::new("support", "You are support.", vec![], model);

        let step = node.run(&state_with("hi", 10)).await.unwrap();
        let tool_message = step.delta.messages.iter().find(|m| m.is_tool()).unwrap();
        assert!(tool_message.content().contains("Tool not found"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_rejected_before_execution() {
        let (tool, calls) = CountingTool::new("order_lookup", ToolResult::text("ok"));
        let model = ScriptedModel::boxed(vec![
            ChatResponse {
                content: String::new(),
                tool_calls: vec![call("order_lookup", serde_json::json!({"order_id": 12345}))],
            },
            ChatResponse::text("done"),
        ]);
        let node = AgentNode::new("support", "You are support.", vec![tool], model);

        let step = node.run(&state_with("check order", 10)).await.unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 0);
        let tool_message = step.delta.messages.iter().find(|m| m.is_tool()).unwrap();
        assert!(tool_message.content().contains("validation failed"));
    }

    #[tokio::test]
    async fn test_budget_of_one_still_terminates() {
        // The model would loop on tool calls forever; the budget forces
        // a best-effort stop after a single reasoning step.
        let (tool, _calls) = CountingTool::new("order_lookup", ToolResult::text("ok"));
        let endless: Vec<ChatResponse> = (0..10)
            .map(|_| ChatResponse {
                content: String::new(),
                tool_calls: vec![call("order_lookup", serde_json::json!({}))],
            })
            .collect();
        let model = ScriptedModel::boxed(endless);
        let node = AgentNode::new("support", "You are support.", vec![tool], model);

        let step = node.run(&state_with("check order", 1)).await.unwrap();
        assert!(matches!(step.exit, NodeExit::End));
        let last = step.delta.messages.last().unwrap();
        assert_eq!(last.content(), BUDGET_EXHAUSTED_ANSWER);
    }

    #[tokio::test]
    async fn test_single_transfer_per_step() {
        let model = ScriptedModel::boxed(vec![ChatResponse {
            content: String::new(),
            tool_calls: vec![
                call("transfer_to_billing", serde_json::json!({"message_for_subagent": "go"})),
                call("transfer_to_shipping", serde_json::json!({"message_for_subagent": "also go"})),
            ],
        }]);
        let node = AgentNode::new(
            "supervisor",
            "You route conversations.",
            vec![
                Arc::new(HandoffTool::to_agent("billing", "Billing agent.")),
                Arc::new(HandoffTool::to_agent("shipping", "Shipping agent.")),
            ],
            model,
        )
        .without_parallel_calls();

        let step = node.run(&state_with("refund and reroute please", 10)).await.unwrap();
        match step.exit {
            NodeExit::Transfer(t) => assert_eq!(t.target, "billing"),
            other => panic!("expected transfer, got {:?}", other),
        }
        let skipped = step
            .delta
            .messages
            .iter()
            .filter(|m| m.content().contains("Skipped: control already transferred"))
            .count();
        assert_eq!(skipped, 1);
    }

    #[tokio::test]
    async fn test_suspension_sets_bookkeeping() {
        let model = ScriptedModel::boxed(vec![ChatResponse {
            content: String::new(),
            tool_calls: vec![call(
                "confirm_action_with_real_agent",
                serde_json::json!({"query": "Approve refund for order 12345?"}),
            )],
        }]);
        let node = AgentNode::new(
            "refunds_and_cancellations",
            "You handle refunds.",
            vec![Arc::new(HumanInputTool::confirm_with_operator())],
            model,
        );

        let step = node.run(&state_with("refund order 12345", 10)).await.unwrap();
        let pending = match step.exit {
            NodeExit::Suspend(pending) => pending,
            other => panic!("expected suspension, got {:?}", other),
        };
        assert_eq!(pending.node, "refunds_and_cancellations");
        assert_eq!(pending.payload.user_message, "Approve refund for order 12345?");
        assert_eq!(
            step.delta.metadata.get(keys::NEXT_NODE),
            Some(&serde_json::json!("refunds_and_cancellations"))
        );
        assert_eq!(
            step.delta.metadata.get(keys::AGENT_MESSAGE_MODE),
            Some(&serde_json::json!("confirmation"))
        );
        // Suspending does not consume a reasoning step.
        assert_eq!(step.delta.steps_used, 0);
    }

    #[tokio::test]
    async fn test_supervisor_note_is_delivered_once() {
        let model = ScriptedModel::boxed(vec![ChatResponse::text("handled")]);
        let model_ref = model.clone();
        let node = AgentNode::new("billing", "You are billing.", vec![], model);

        let mut state = state_with("refund please", 10);
        let mut delta = StateDelta::default();
        delta.supervisor_notes.push(Some("customer already verified".into()));
        state.apply(&delta);

        let step = node.run(&state).await.unwrap();
        // Delivered through the system prompt...
        let request = model_ref.requests.lock()[0].clone();
        assert!(request.system_prompt.contains("customer already verified"));
        // ...and consumed exactly once.
        assert_eq!(step.delta.supervisor_notes, vec![None]);
    }
}
