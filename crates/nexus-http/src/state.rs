//! Shared state for the HTTP server.

use nexus_core::EngineContext;

/// Shared state available to all HTTP handlers.
#[derive(Clone)]
pub struct SharedState {
    pub context: EngineContext,
}

impl SharedState {
    pub fn new(context: EngineContext) -> Self {
        Self { context }
    }

    /// Each open WebSocket holds exactly one bus subscription.
    pub fn websocket_connections(&self) -> usize {
        self.context.event_bus.subscriber_count()
    }
}
