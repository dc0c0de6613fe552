use std::sync::Arc;
use std::time::Duration;

use streamrelay_ai::Relay;

/// Shared state for relay handlers, built once at startup
pub struct RelayState {
    pub relay: Relay,
    /// Idle interval between SSE keep-alive comments
    pub keep_alive: Duration,
}

impl RelayState {
    pub fn new(relay: Relay, keep_alive: Duration) -> Self {
        Self { relay, keep_alive }
    }
}

pub type AppState = Arc<RelayState>;
