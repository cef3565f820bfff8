//! relay-agent: the agent runtime on top of the relay-core engine
//!
//! This crate turns an LLM behind the [`ChatModel`] seam into graph
//! nodes: the bounded tool-calling loop, the handoff tool factory, the
//! human-input tools that suspend a run, supervisor assembly, and the
//! case/router graph builder that compiles agent descriptors into an
//! executable conversation graph.

pub mod agent;
pub mod builder;
pub mod handoff;
pub mod human;
pub mod model;
pub mod openai;
pub mod runtime;
pub mod supervisor;
pub mod tool;

pub use agent::AgentNode;
pub use builder::{AgentSpec, ConversationGraphSpec, build_conversation_graph};
pub use handoff::{HandoffTool, TRANSFER_BACK_TOOL_PREFIX, TRANSFER_TOOL_PREFIX, is_transfer_tool};
pub use human::HumanInputTool;
pub use model::{ChatModel, ChatRequest, ChatResponse, ModelError, RetryConfig, RetryingModel, TimeoutModel, ToolSchema};
pub use openai::OpenAiCompatModel;
pub use runtime::Runtime;
pub use tool::{BoxedTool, InterruptRequest, Tool, ToolOutcome, ToolResult, to_schema};
