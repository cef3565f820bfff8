//! The case/router graph builder: descriptors in, executable graph out.
//!
//! All configuration errors (duplicate or reserved names, missing
//! fields, dangling targets) surface here, before any run starts.

use std::sync::Arc;

use relay_core::{
    BoxedNode, BuildError, Graph, GraphBuilder, ROUTER_NODE_NAME, ReturnToParent, RouterNode,
    SubgraphNode, TransferScope, normalize_name,
};

use crate::agent::AgentNode;
use crate::handoff::HandoffTool;
use crate::model::BoxedModel;
use crate::supervisor::{build_supervisor, prompt_with_agents};
use crate::tool::BoxedTool;

/// Descriptor for one agent node. A spec with children compiles into a
/// nested sub-graph: the agent becomes that sub-graph's supervisor and
/// each child a narrower tool-agent under it.
#[derive(Clone)]
pub struct AgentSpec {
    /// Node name, unique among siblings after normalization.
    pub name: String,
    /// Shown to the parent's model when choosing a handoff target.
    pub description: String,
    /// System prompt for the agent itself.
    pub prompt: String,
    pub tools: Vec<BoxedTool>,
    pub children: Vec<AgentSpec>,
}

impl std::fmt::Debug for AgentSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("prompt", &self.prompt)
            .field("tools", &self.tools.len())
            .field("children", &self.children)
            .finish()
    }
}

impl AgentSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            prompt: prompt.into(),
            tools: vec![],
            children: vec![],
        }
    }

    pub fn with_tool(mut self, tool: BoxedTool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_child(mut self, child: AgentSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Descriptor for a complete conversation graph.
pub struct ConversationGraphSpec {
    pub supervisor_name: String,
    pub supervisor_prompt: String,
    pub cases: Vec<AgentSpec>,
    /// Utility tools (e.g. the human-input tools) given to the
    /// supervisor and to every case agent.
    pub shared_tools: Vec<BoxedTool>,
}

/// Validate and compile the fixed entry → router → {supervisor | case}
/// shape. The router indirection is what makes a resumed run land on
/// the suspended node instead of restarting at the top.
pub fn build_conversation_graph(
    spec: ConversationGraphSpec,
    model: BoxedModel,
) -> Result<Graph, BuildError> {
    if spec.supervisor_name.trim().is_empty() {
        return Err(BuildError::EmptyNodeName);
    }
    let supervisor_name = normalize_name(&spec.supervisor_name);
    if supervisor_name == ROUTER_NODE_NAME {
        return Err(BuildError::ReservedNodeName(supervisor_name));
    }
    if spec.supervisor_prompt.trim().is_empty() {
        return Err(BuildError::MissingField {
            node: supervisor_name,
            field: "prompt",
        });
    }
    for case in &spec.cases {
        validate_spec(case)?;
    }

    let children: Vec<(String, String)> = spec
        .cases
        .iter()
        .map(|case| (normalize_name(&case.name), case.description.clone()))
        .collect();
    let child_names: Vec<&str> = children.iter().map(|(name, _)| name.as_str()).collect();

    let supervisor = build_supervisor(
        &supervisor_name,
        &spec.supervisor_prompt,
        &children,
        spec.shared_tools.clone(),
        model.clone(),
    );

    let mut builder = GraphBuilder::new("conversation")
        .add_node(
            Arc::new(RouterNode::new(supervisor_name.clone())),
            &[supervisor_name.as_str()],
        )
        .add_node(Arc::new(supervisor), &child_names);

    for case in &spec.cases {
        let node = compile_agent(case, &supervisor_name, &model, &spec.shared_tools)?;
        builder = builder.add_node(
            Arc::new(ReturnToParent::new(node, supervisor_name.clone())),
            &[supervisor_name.as_str()],
        );
    }

    builder.build()
}

fn validate_spec(spec: &AgentSpec) -> Result<(), BuildError> {
    if spec.name.trim().is_empty() {
        return Err(BuildError::EmptyNodeName);
    }
    let normalized = normalize_name(&spec.name);
    if normalized == ROUTER_NODE_NAME {
        return Err(BuildError::ReservedNodeName(normalized));
    }
    if spec.description.trim().is_empty() {
        return Err(BuildError::MissingField {
            node: normalized,
            field: "description",
        });
    }
    if spec.prompt.trim().is_empty() {
        return Err(BuildError::MissingField {
            node: normalized,
            field: "prompt",
        });
    }
    for child in &spec.children {
        validate_spec(child)?;
    }
    Ok(())
}

/// Compile one agent spec into a node. `parent` is the node the agent
/// hands control back to; for a nested sub-graph the parent lives one
/// level up, so the back tool carries parent scope.
fn compile_agent(
    spec: &AgentSpec,
    parent: &str,
    model: &BoxedModel,
    shared_tools: &[BoxedTool],
) -> Result<BoxedNode, BuildError> {
    let name = normalize_name(&spec.name);

    if spec.children.is_empty() {
        let mut tools = spec.tools.clone();
        tools.extend(shared_tools.iter().cloned());
        tools.push(Arc::new(HandoffTool::back_to(parent, TransferScope::Sibling)));
        let node = AgentNode::new(&name, &spec.prompt, tools, model.clone()).without_parallel_calls();
        return Ok(Arc::new(node));
    }

    let children: Vec<(String, String)> = spec
        .children
        .iter()
        .map(|child| (normalize_name(&child.name), child.description.clone()))
        .collect();
    let child_names: Vec<&str> = children.iter().map(|(name, _)| name.as_str()).collect();

    let mut tools: Vec<BoxedTool> = children
        .iter()
        .map(|(child, description)| {
            Arc::new(HandoffTool::to_agent(child, description.clone())) as BoxedTool
        })
        .collect();
    tools.extend(spec.tools.iter().cloned());
    tools.extend(shared_tools.iter().cloned());
    tools.push(Arc::new(HandoffTool::back_to(parent, TransferScope::Parent)));

    let agent = AgentNode::new(
        &name,
        prompt_with_agents(&spec.prompt, &children),
        tools,
        model.clone(),
    )
    .without_parallel_calls();

    let mut inner = GraphBuilder::new(name.clone())
        .add_node(Arc::new(RouterNode::new(name.clone())), &[name.as_str()])
        .add_node(Arc::new(agent), &child_names);

    for child in &spec.children {
        let compiled = compile_agent(child, &name, model, shared_tools)?;
        inner = inner.add_node(
            Arc::new(ReturnToParent::new(compiled, name.clone())),
            &[name.as_str()],
        );
    }

    Ok(Arc::new(SubgraphNode::new(name, inner.build()?)))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::model::{ChatModel, ChatRequest, ChatResponse, ModelError};

    struct SilentModel;

    #[async_trait]
    impl ChatModel for SilentModel {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, ModelError> {
            Ok(ChatResponse::text("ok"))
        }
    }

    fn model() -> BoxedModel {
        Arc::new(SilentModel)
    }

    fn base_spec() -> ConversationGraphSpec {
        ConversationGraphSpec {
            supervisor_name: "Conversation Supervisor".into(),
            supervisor_prompt: "You route customer conversations.".into(),
            cases: vec![
                AgentSpec::new(
                    "Refunds and Cancellations",
                    "Handles refunds and cancellations.",
                    "You handle refunds.",
                ),
                AgentSpec::new(
                    "Account Address Update",
                    "Updates shipping addresses.",
                    "You update addresses.",
                ),
            ],
            shared_tools: vec![],
        }
    }

    #[test]
    fn test_builds_router_supervisor_cases() {
        let graph = build_conversation_graph(base_spec(), model()).unwrap();
        let mut names: Vec<&str> = graph.node_names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "account_address_update",
                "conversation_supervisor",
                "refunds_and_cancellations",
                ROUTER_NODE_NAME,
            ]
        );
        assert_eq!(graph.entry(), ROUTER_NODE_NAME);
    }

    #[test]
    fn test_nested_case_compiles_to_subgraph() {
        let mut spec = base_spec();
        spec.cases[0] = AgentSpec::new(
            "Refunds and Cancellations",
            "Handles refunds.",
            "You handle refunds with specialist help.",
        )
        .with_child(AgentSpec::new(
            "Order Lookup",
            "Reads order details.",
            "You look up orders.",
        ));

        let graph = build_conversation_graph(spec, model()).unwrap();
        assert!(graph.node("refunds_and_cancellations").is_some());
    }

    #[test]
    fn test_sibling_name_collision_fails() {
        let mut spec = base_spec();
        spec.cases[1].name = "refunds  AND cancellations".into();
        let err = build_conversation_graph(spec, model()).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateNode(name) if name == "refunds_and_cancellations"));
    }

    #[test]
    fn test_reserved_name_fails() {
        let mut spec = base_spec();
        spec.cases[0].name = "Router".into();
        let err = build_conversation_graph(spec, model()).unwrap_err();
        assert!(matches!(err, BuildError::ReservedNodeName(_)));
    }

    #[test]
    fn test_missing_description_fails() {
        let mut spec = base_spec();
        spec.cases[0].description = "  ".into();
        let err = build_conversation_graph(spec, model()).unwrap_err();
        assert!(matches!(
            err,
            BuildError::MissingField { field: "description", .. }
        ));
    }

    #[test]
    fn test_missing_prompt_fails() {
        let mut spec = base_spec();
        spec.supervisor_prompt = String::new();
        let err = build_conversation_graph(spec, model()).unwrap_err();
        assert!(matches!(err, BuildError::MissingField { field: "prompt", .. }));
    }

    #[test]
    fn test_empty_supervisor_name_fails() {
        let mut spec = base_spec();
        spec.supervisor_name = "   ".into();
        let err = build_conversation_graph(spec, model()).unwrap_err();
        assert!(matches!(err, BuildError::EmptyNodeName));
    }
}
