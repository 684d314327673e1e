//! Application state.

use std::sync::Arc;

use outreach_core::NodeConfig;
use outreach_state::InMemoryDraftStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The message store behind every endpoint.
    pub store: Arc<InMemoryDraftStore>,
}

impl AppState {
    /// Create a new application state with outbound mail configured.
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryDraftStore::new()),
        }
    }

    /// Create application state from node configuration.
    pub fn from_config(config: &NodeConfig) -> Self {
        let state = Self::new();
        state.store.set_outbound_configured(config.outbound_configured);
        state
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
