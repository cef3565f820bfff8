//! The graph runner: drives steps until a stable message is produced.

use crate::error::{EngineError, Result};
use crate::graph::Graph;
use crate::interrupt::PendingInterrupt;
use crate::message::Message;
use crate::node::{BoxedNode, ControlTransfer, Node, NodeExit, NodeStep, TransferScope};
use crate::state::{ConversationState, StateDelta, keys};

use async_trait::async_trait;

/// Aggregated result of one run: every delta the runner applied, merged
/// through the reducers (messages in order, tool records deduped,
/// metadata last-write-wins).
#[derive(Debug, Default)]
pub struct RunReport {
    pub delta: StateDelta,
}

impl RunReport {
    /// The last user-facing agent message produced by the run.
    pub fn final_message(&self) -> Option<&Message> {
        self.delta
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m, Message::Ai { tool_calls, .. } if tool_calls.is_empty()))
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// A stable, user-facing message was produced.
    Completed(RunReport),
    /// A tool requested human input; the payload must be surfaced to
    /// the caller and the pending marker checkpointed.
    Suspended {
        pending: PendingInterrupt,
        report: RunReport,
    },
    /// A parent-scope transfer left this graph; the enclosing sub-graph
    /// node resolves the target one level up.
    Escalated {
        transfer: ControlTransfer,
        report: RunReport,
    },
}

/// Executes a graph against a conversation state.
///
/// Keeps re-driving the graph from its entry while the most recent
/// message is a transient tool artifact, up to a small fixed ceiling;
/// stops immediately on suspension.
pub struct GraphRunner {
    max_redrives: usize,
    max_node_visits: usize,
}

impl Default for GraphRunner {
    fn default() -> Self {
        Self {
            max_redrives: 5,
            max_node_visits: 64,
        }
    }
}

impl GraphRunner {
    pub fn new(max_redrives: usize, max_node_visits: usize) -> Self {
        Self {
            max_redrives,
            max_node_visits,
        }
    }

    /// Execute one inbound message (or resume value) against the graph.
    pub async fn run(&self, graph: &Graph, state: &mut ConversationState) -> Result<RunOutcome> {
        let mut report = StateDelta::default();
        let mut redrives = 0usize;
        let mut visits = 0usize;
        let mut current = graph.entry().to_string();

        loop {
            visits += 1;
            if visits > self.max_node_visits {
                return Err(EngineError::TransferLimit(visits));
            }

            let node = graph
                .node(&current)
                .cloned()
                .ok_or_else(|| EngineError::UnknownNode(current.clone()))?;

            tracing::debug!(graph = graph.name(), node = current.as_str(), "running node");
            let step = node.run(state).await?;
            state.apply(&step.delta);
            report.merge(step.delta);

            match step.exit {
                NodeExit::Transfer(transfer) => match transfer.scope {
                    TransferScope::Sibling => {
                        tracing::debug!(to = transfer.target.as_str(), "following transfer");
                        current = transfer.target;
                    }
                    TransferScope::Parent => {
                        return Ok(RunOutcome::Escalated {
                            transfer: ControlTransfer {
                                target: transfer.target,
                                scope: TransferScope::Sibling,
                                note: transfer.note,
                            },
                            report: RunReport { delta: report },
                        });
                    }
                },
                NodeExit::Suspend(pending) => {
                    return Ok(RunOutcome::Suspended {
                        pending,
                        report: RunReport { delta: report },
                    });
                }
                NodeExit::End => {
                    let transient = state.messages.last().map(Message::is_tool).unwrap_or(false);
                    if transient && redrives < self.max_redrives {
                        redrives += 1;
                        current = graph.entry().to_string();
                        continue;
                    }
                    // Stable result: clear the routing directive so the
                    // next inbound message starts at the supervisor.
                    let mut clear = StateDelta::default();
                    clear.set_metadata(keys::NEXT_NODE, serde_json::Value::Null);
                    state.apply(&clear);
                    report.merge(clear);
                    return Ok(RunOutcome::Completed(RunReport { delta: report }));
                }
            }
        }
    }
}

/// A compiled sub-graph exposed as an opaque node with the same handoff
/// contract as any other node.
pub struct SubgraphNode {
    name: String,
    graph: Graph,
    runner: GraphRunner,
}

impl SubgraphNode {
    pub fn new(name: impl Into<String>, graph: Graph) -> Self {
        Self {
            name: name.into(),
            graph,
            runner: GraphRunner::default(),
        }
    }
}

#[async_trait]
impl Node for SubgraphNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: &ConversationState) -> Result<NodeStep> {
        // The inner runner works on a scratch copy; the merged delta is
        // returned to the parent runner, and the reducers make applying
        // it to the real state equivalent.
        let mut scratch = state.clone();
        match self.runner.run(&self.graph, &mut scratch).await? {
            RunOutcome::Completed(report) => Ok(NodeStep::end(report.delta)),
            RunOutcome::Suspended { pending, report } => {
                let mut delta = report.delta;
                // Prefix the resume path with this node's name so the
                // outer router dispatches back through this sub-graph.
                let inner = delta
                    .metadata
                    .get(keys::NEXT_NODE)
                    .and_then(|v| v.as_str())
                    .unwrap_or(&pending.node)
                    .to_string();
                delta.set_metadata(
                    keys::NEXT_NODE,
                    serde_json::json!(format!("{}/{}", self.name, inner)),
                );
                Ok(NodeStep::suspend(delta, pending))
            }
            RunOutcome::Escalated { transfer, report } => {
                Ok(NodeStep::transfer(report.delta, transfer))
            }
        }
    }
}

/// Wrapper enforcing the "children always return control to their
/// parent" contract: when the inner node ends, control transfers to the
/// parent with a single synthetic handoff-back message.
pub struct ReturnToParent {
    inner: BoxedNode,
    target: String,
}

impl ReturnToParent {
    pub fn new(inner: BoxedNode, target: impl Into<String>) -> Self {
        Self {
            inner,
            target: target.into(),
        }
    }
}

#[async_trait]
impl Node for ReturnToParent {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(&self, state: &ConversationState) -> Result<NodeStep> {
        let step = self.inner.run(state).await?;
        match step.exit {
            NodeExit::End => {
                let mut delta = step.delta;
                delta.push_message(Message::ai_named(
                    self.inner.name(),
                    format!("Transferring back to {}", self.target),
                ));
                Ok(NodeStep::transfer(
                    delta,
                    ControlTransfer::sibling(self.target.clone()),
                ))
            }
            exit => Ok(NodeStep {
                delta: step.delta,
                exit,
            }),
        }
    }
}
