use std::sync::Arc;

use crate::catalog::store::PromptStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Catalog backend. PostgreSQL in production, in-memory for local runs and tests.
    pub store: Arc<dyn PromptStore>,
}
