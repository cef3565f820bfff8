//! Graph assembly and build-time validation.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::{BuildError, Result};
use crate::node::{BoxedNode, ControlTransfer, Node, NodeStep};
use crate::state::{ConversationState, StateDelta, keys};

/// Name of the dispatch node every graph enters through.
pub const ROUTER_NODE_NAME: &str = "router";

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Normalize an agent name for use as a node and tool-name segment:
/// trim, collapse whitespace runs to single underscores, lowercase.
pub fn normalize_name(name: &str) -> String {
    WHITESPACE_RE.replace_all(name.trim(), "_").to_lowercase()
}

/// The no-op pass-through entry node.
///
/// Reads `metadata.next_node` (defaulting to the top-level supervisor)
/// and dispatches there. When the directive is a `/`-separated path into
/// a nested sub-graph, one segment is consumed per router level, which
/// is what makes a resumed run land back on the suspended node.
pub struct RouterNode {
    default_target: String,
}

impl RouterNode {
    pub fn new(default_target: impl Into<String>) -> Self {
        Self {
            default_target: default_target.into(),
        }
    }
}

#[async_trait]
impl Node for RouterNode {
    fn name(&self) -> &str {
        ROUTER_NODE_NAME
    }

    async fn run(&self, state: &ConversationState) -> Result<NodeStep> {
        let mut delta = StateDelta::default();
        let target = match state.next_node() {
            Some(path) => match path.split_once('/') {
                Some((head, rest)) => {
                    delta.set_metadata(keys::NEXT_NODE, serde_json::json!(rest));
                    head.to_string()
                }
                None => {
                    delta.set_metadata(keys::NEXT_NODE, serde_json::Value::Null);
                    path.to_string()
                }
            },
            None => self.default_target.clone(),
        };
        Ok(NodeStep::transfer(delta, ControlTransfer::sibling(target)))
    }
}

/// A compiled, executable conversation graph.
pub struct Graph {
    name: String,
    entry: String,
    nodes: HashMap<String, BoxedNode>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("entry", &self.entry)
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Graph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn node(&self, name: &str) -> Option<&BoxedNode> {
        self.nodes.get(name)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }
}

/// Validating builder for [`Graph`].
///
/// Declared destinations are used for validation only; the actual next
/// hop at run time is whatever `ControlTransfer` a node returns.
pub struct GraphBuilder {
    name: String,
    entry: String,
    nodes: Vec<(BoxedNode, Vec<String>)>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: ROUTER_NODE_NAME.to_string(),
            nodes: Vec::new(),
        }
    }

    /// Register a node along with the targets it may transfer to.
    pub fn add_node(mut self, node: BoxedNode, destinations: &[&str]) -> Self {
        self.nodes
            .push((node, destinations.iter().map(|d| d.to_string()).collect()));
        self
    }

    /// Override the entry node (defaults to the router).
    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = name.into();
        self
    }

    /// Validate and assemble. All configuration errors surface here,
    /// before any run starts.
    pub fn build(self) -> std::result::Result<Graph, BuildError> {
        let mut nodes: HashMap<String, BoxedNode> = HashMap::new();

        for (node, _) in &self.nodes {
            let name = node.name();
            if name.is_empty() {
                return Err(BuildError::EmptyNodeName);
            }
            let normalized = normalize_name(name);
            if nodes.contains_key(&normalized) {
                return Err(BuildError::DuplicateNode(normalized));
            }
            nodes.insert(normalized, node.clone());
        }

        for (node, destinations) in &self.nodes {
            for target in destinations {
                if !nodes.contains_key(&normalize_name(target)) {
                    return Err(BuildError::UnknownTarget {
                        node: node.name().to_string(),
                        target: target.clone(),
                    });
                }
            }
        }

        if !nodes.contains_key(&self.entry) {
            return Err(BuildError::MissingEntry(self.entry));
        }

        Ok(Graph {
            name: self.name,
            entry: self.entry,
            nodes,
        })
    }
}
