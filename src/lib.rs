//! # Pairhub
//!
//! Real-time room server for live pair-coding. Clients join a named room over
//! WebSocket and share a code buffer, a language tag, cursor positions and a
//! presence roster.
//!
//! ## Features
//!
//! - **Room registry**: Single serialization point per process; last write wins
//! - **Fan-out**: Per-room broadcast with sender exclusion and isolated failures
//! - **Presence**: Rosters derived from membership, embedded in join/leave events
//! - **Lifecycle**: Empty rooms expire after a grace period; idle rooms are reaped
//!
//! ## Modules
//!
//! - [`session`]: Room registry, presence and send capability
//! - [`websocket`]: Wire protocol, connection handling and broadcast
//! - [`reaper`]: Background idle sweep
//! - [`api`]: HTTP server with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pairhub::session::*;
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(SessionRegistry::new(RegistryConfig::default()));
//!
//!     registry.create_session("r1").await?;
//!
//!     let (tx, _rx) = mpsc::unbounded_channel::<Frame>();
//!     let room = registry.add_participant("r1", "u1", Arc::new(tx), "Alice").await?;
//!     println!("{} is in {}", room.users[0].username, room.id);
//!
//!     registry.update_text("r1", "print('hi')").await;
//!     registry.remove_participant("r1", "u1").await;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod reaper;
pub mod session;
pub mod websocket;

// Re-export top-level types for convenience
pub use session::{
    MessageSink, ParticipantInfo, RegistryConfig, RegistryError, RegistryResult, SessionRegistry,
    SessionSnapshot,
};

pub use websocket::{
    websocket_handler, BroadcastRouter, ClientMessage, Connection, ConnectionState,
    DeliveryReport, ServerMessage,
};

pub use reaper::{run_idle_reaper, spawn_idle_reaper, ReaperConfig};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{
    generate_default_config, Config, ConfigError, LoggingConfig, RoomsConfig, ServerConfig,
};
