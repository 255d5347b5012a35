use crate::coordinator::SwapCoordinator;
use std::sync::Arc;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SwapCoordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<SwapCoordinator>) -> Self {
        AppState { coordinator }
    }
}
