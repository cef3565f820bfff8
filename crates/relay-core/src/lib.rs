//! relay-core: the multi-agent conversation graph engine
//!
//! This crate provides the execution substrate for conversation graphs:
//! typed state with per-field reducers, node and control-transfer
//! semantics, interrupt/resume bookkeeping, the graph builder with its
//! build-time validation, the step-driving runner, and the checkpoint
//! store that makes a conversation resumable across processes.

pub mod checkpoint;
pub mod error;
pub mod graph;
pub mod interrupt;
pub mod message;
pub mod node;
pub mod runner;
pub mod state;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use error::{BuildError, EngineError, Result};
pub use graph::{Graph, GraphBuilder, ROUTER_NODE_NAME, RouterNode, normalize_name};
pub use interrupt::{AgentMessageMode, Destination, InterruptPayload, PendingInterrupt, COMPLETE_HANDOFF_TEXT};
pub use message::{Message, ToolCall};
pub use node::{BoxedNode, ControlTransfer, Node, NodeExit, NodeStep, TransferScope};
pub use runner::{GraphRunner, ReturnToParent, RunOutcome, RunReport, SubgraphNode};
pub use state::{ConversationState, StateDelta, ToolCallRecord, keys};
