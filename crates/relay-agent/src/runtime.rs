//! Process-wide dependency context.

use std::sync::Arc;

use relay_core::CheckpointStore;

use crate::model::BoxedModel;

/// Explicit dependency injection for graph building and runs: one
/// `Runtime` is constructed per process and passed where needed, instead
/// of module-level singletons.
#[derive(Clone)]
pub struct Runtime {
    pub model: BoxedModel,
    pub store: Arc<dyn CheckpointStore>,
}

impl Runtime {
    pub fn new(model: BoxedModel, store: Arc<dyn CheckpointStore>) -> Self {
        Self { model, store }
    }
}
