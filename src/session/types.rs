//! Core data types for the session registry
//!
//! This module defines the state the registry owns for each room:
//! - `Session`: One collaborative room (buffer, language, participants)
//! - `Participant`: One joined connection inside a room
//! - `SessionSnapshot`: A detached, serializable copy of a room
//! - `RegistryConfig`: Defaults and timings for room lifecycle

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::presence::{self, ParticipantInfo};
use super::sink::MessageSink;

/// Unique identifier for a room
pub type SessionId = String;

/// Unique identifier for a participant within a room
pub type ParticipantId = String;

/// Length of generated room ids
pub const ROOM_ID_LEN: usize = 10;

/// Length of generated participant ids
pub const PARTICIPANT_ID_LEN: usize = 8;

/// Display name used when a client joins without one
pub const ANONYMOUS: &str = "Anonymous";

/// Current wall-clock time as Unix milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generate a short random alphanumeric id
pub fn short_id(len: usize) -> String {
    Uuid::new_v4().simple().to_string().chars().take(len).collect()
}

/// Generate a fresh room id
pub fn generate_room_id() -> SessionId {
    short_id(ROOM_ID_LEN)
}

/// Generate a fresh participant id
pub fn generate_participant_id() -> ParticipantId {
    short_id(PARTICIPANT_ID_LEN)
}

/// Registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long an empty room survives before it is deleted
    pub grace_period: Duration,
    /// Buffer contents of a freshly created room
    pub default_code: String,
    /// Language tag of a freshly created room
    pub default_language: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(5 * 60),
            default_code: "// Welcome to the coding interview!\n// Start typing...\n".to_string(),
            default_language: "javascript".to_string(),
        }
    }
}

/// A participant joined to a room
///
/// The sink is a non-owning send capability: dropping the participant never
/// closes the underlying connection.
pub struct Participant {
    pub id: ParticipantId,
    pub username: String,
    pub sink: Arc<dyn MessageSink>,
    /// Unix timestamp in milliseconds
    pub joined_at: i64,
    /// Registry-wide join order, used to keep rosters stable
    pub(crate) join_seq: u64,
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("joined_at", &self.joined_at)
            .field("open", &self.sink.is_open())
            .finish_non_exhaustive()
    }
}

/// A scheduled deletion of an empty room
#[derive(Debug)]
pub(crate) struct PendingRemoval {
    /// Identifies which emptying scheduled this timer
    pub ticket: u64,
    pub token: CancellationToken,
}

impl PendingRemoval {
    pub fn cancel(self) {
        self.token.cancel();
    }
}

/// A live room
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub code: String,
    pub language: String,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
    /// Unix timestamp in milliseconds of the last accepted mutation
    pub last_activity: i64,
    pub participants: HashMap<ParticipantId, Participant>,
    pub(crate) pending_removal: Option<PendingRemoval>,
}

impl Session {
    pub fn new(id: impl Into<SessionId>, config: &RegistryConfig) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            code: config.default_code.clone(),
            language: config.default_language.clone(),
            created_at: now,
            last_activity: now,
            participants: HashMap::new(),
            pending_removal: None,
        }
    }

    /// Mark the room as active now
    pub fn touch(&mut self) {
        self.last_activity = now_millis();
    }

    /// Milliseconds since the last accepted mutation
    pub fn idle_millis(&self, now: i64) -> i64 {
        now - self.last_activity
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Cancel a scheduled empty-room deletion, if any
    pub(crate) fn cancel_pending_removal(&mut self) {
        if let Some(pending) = self.pending_removal.take() {
            pending.cancel();
        }
    }

    /// Detached copy of the room, safe to hand out after the lock is released
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            code: self.code.clone(),
            language: self.language.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            users: presence::roster(self),
        }
    }
}

/// Serializable copy of a room's state at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub code: String,
    pub language: String,
    pub created_at: i64,
    pub last_activity: i64,
    pub users: Vec<ParticipantInfo>,
}
