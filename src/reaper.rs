//! Idle room reaper
//!
//! Periodically deletes rooms whose last activity is older than the configured
//! maximum age. Connected participants do not protect a room; only activity
//! does.
//!
//! # Graceful Shutdown
//!
//! The task exits when its cancellation token is cancelled.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::session::SessionRegistry;

/// Default sweep interval (1 hour)
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Default maximum idle age (24 hours)
const DEFAULT_MAX_IDLE_SECS: u64 = 24 * 3600;

/// Configuration for the reaper task
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Time between sweeps
    pub interval: Duration,
    /// Rooms idle for longer than this are deleted
    pub max_idle_age: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            max_idle_age: Duration::from_secs(DEFAULT_MAX_IDLE_SECS),
        }
    }
}

/// Spawn the reaper on the current runtime
pub fn spawn_idle_reaper(
    registry: Arc<SessionRegistry>,
    config: ReaperConfig,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_idle_reaper(registry, config, cancel_token))
}

/// Run sweeps on a fixed interval until cancelled
pub async fn run_idle_reaper(
    registry: Arc<SessionRegistry>,
    config: ReaperConfig,
    cancel_token: CancellationToken,
) {
    info!(
        interval_secs = config.interval.as_secs(),
        max_idle_secs = config.max_idle_age.as_secs(),
        "Starting idle room reaper"
    );

    let mut ticker = tokio::time::interval(config.interval);

    // Skip the first immediate tick
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_sweep(&registry, config.max_idle_age).await;
            }
            _ = cancel_token.cancelled() => {
                info!("Idle room reaper received shutdown signal, exiting");
                break;
            }
        }
    }
}

/// Run a single sweep. Returns the number of rooms deleted.
pub(crate) async fn run_sweep(registry: &SessionRegistry, max_idle_age: Duration) -> usize {
    let reaped = registry.sweep_idle(max_idle_age).await;

    if reaped.is_empty() {
        debug!("Idle sweep found nothing to reap");
    } else {
        let remaining = registry.session_count().await;
        info!(reaped = reaped.len(), remaining, "Idle sweep completed");
    }

    reaped.len()
}
