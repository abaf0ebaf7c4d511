use quill::gateway::Gateway;
use std::sync::Arc;

/// Shared application state, read only once the server is running
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    /// Round trips allowed for the tool calling routes
    pub max_steps: usize,
}

impl AppState {
    pub fn new(gateway: Gateway, max_steps: usize) -> Self {
        Self {
            gateway: Arc::new(gateway),
            max_steps,
        }
    }
}
