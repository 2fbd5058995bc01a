//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::session::SessionRegistry;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Registry of live rooms
    pub registry: Arc<SessionRegistry>,
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    /// Cancelled when the server begins shutting down
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        registry: Arc<SessionRegistry>,
        config: ServerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            config: Arc::new(config),
            start_time: Instant::now(),
            shutdown,
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
