//! The node trait and the control-transfer instructions nodes emit.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::interrupt::PendingInterrupt;
use crate::state::{ConversationState, StateDelta};

/// How far up the compiled-graph stack a transfer target resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferScope {
    /// The target is a node of the current graph.
    Sibling,
    /// The target lives in the parent graph; the runner unwinds one
    /// level of compiled sub-graphs before resolving it.
    Parent,
}

/// A control-transfer instruction: routing expressed as data.
///
/// Produced by handoff tools and interpreted by the runner as an edge
/// traversal; never executed inline by the node that emitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlTransfer {
    /// Registered (normalized) name of the target node.
    pub target: String,
    pub scope: TransferScope,
    /// Optional short directive for the target agent.
    pub note: Option<String>,
}

impl ControlTransfer {
    pub fn sibling(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            scope: TransferScope::Sibling,
            note: None,
        }
    }

    pub fn parent(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            scope: TransferScope::Parent,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// How a node step ended.
#[derive(Debug)]
pub enum NodeExit {
    /// Hand control to another node.
    Transfer(ControlTransfer),
    /// Pause the run and wait for an externally supplied value.
    Suspend(PendingInterrupt),
    /// The node produced a stable result; no further hop requested.
    End,
}

/// The outcome of running one node: a mergeable state update plus the
/// exit the runner should follow.
#[derive(Debug)]
pub struct NodeStep {
    pub delta: StateDelta,
    pub exit: NodeExit,
}

impl NodeStep {
    pub fn end(delta: StateDelta) -> Self {
        Self {
            delta,
            exit: NodeExit::End,
        }
    }

    pub fn transfer(delta: StateDelta, transfer: ControlTransfer) -> Self {
        Self {
            delta,
            exit: NodeExit::Transfer(transfer),
        }
    }

    pub fn suspend(delta: StateDelta, pending: PendingInterrupt) -> Self {
        Self {
            delta,
            exit: NodeExit::Suspend(pending),
        }
    }
}

/// An executable node of a conversation graph.
///
/// Nodes never mutate the state directly; they read it and return a
/// delta the runner merges through the reducers.
#[async_trait]
pub trait Node: Send + Sync {
    /// Globally unique (normalized) node name within its graph.
    fn name(&self) -> &str;

    /// Run one step of this node against the current state.
    async fn run(&self, state: &ConversationState) -> Result<NodeStep>;
}

/// Type alias for a shared node.
pub type BoxedNode = Arc<dyn Node>;
