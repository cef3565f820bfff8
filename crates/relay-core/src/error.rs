//! Error types for relay-core.

use thiserror::Error;

/// Result type alias using the engine error.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while executing a compiled graph.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A transfer targeted a node that is not registered in the graph.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// The runner visited more nodes than the safety bound allows.
    #[error("transfer limit exceeded after {0} node visits")]
    TransferLimit(usize),

    /// A parent-scope transfer reached the top-level graph.
    #[error("parent-scope transfer to '{0}' escaped the top-level graph")]
    ParentTransferAtRoot(String),

    /// The model call failed after retries.
    #[error("model: {0}")]
    Model(String),

    #[error(transparent)]
    Checkpoint(#[from] crate::checkpoint::CheckpointError),

    #[error("{0}")]
    Other(String),
}

/// Configuration errors raised while assembling a graph. These are
/// build-time failures: a misconfigured flow never reaches a live run.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("node name must not be empty")]
    EmptyNodeName,

    #[error("node name '{0}' is reserved")]
    ReservedNodeName(String),

    #[error("duplicate node name '{0}' (after normalization)")]
    DuplicateNode(String),

    #[error("node '{node}' declares unknown handoff target '{target}'")]
    UnknownTarget { node: String, target: String },

    #[error("entry node '{0}' is not registered")]
    MissingEntry(String),

    #[error("agent '{node}' is missing a {field}")]
    MissingField { node: String, field: &'static str },
}
