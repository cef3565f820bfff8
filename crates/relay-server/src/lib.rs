//! relay-server: HTTP surface for the conversation engine
//!
//! Wires configuration, the action catalogue, and the per-discussion
//! conversation service into an axum application.

pub mod app;
pub mod catalog;
pub mod config;
pub mod service;

pub use app::{AppState, build_router};
pub use config::ServerConfig;
pub use service::{ConversationService, InboundKind, InboundMessage, ServiceError};
