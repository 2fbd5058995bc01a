//! Session Registry
//!
//! Owns every live room. All mutations go through a single `RwLock` over the
//! room map, which makes the registry the serialization point for concurrent
//! frames: two updates to the same room never interleave, and the stored
//! buffer is always the last update to arrive.
//!
//! The lock is only held for in-memory work. Delivery to participants happens
//! elsewhere, after a snapshot of the recipients has been taken and the lock
//! released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::error::{RegistryError, RegistryResult};
use super::presence::{self, ParticipantInfo};
use super::sink::MessageSink;
use super::types::{
    now_millis, Participant, ParticipantId, PendingRemoval, RegistryConfig, Session, SessionId,
    SessionSnapshot,
};

/// Registry of live rooms
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
    config: RegistryConfig,
    join_seq: AtomicU64,
    removal_seq: AtomicU64,
    /// Parent of every grace-period timer
    shutdown: CancellationToken,
}

impl SessionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            join_seq: AtomicU64::new(0),
            removal_seq: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    /// Create an empty room
    pub async fn create_session(&self, id: &str) -> RegistryResult<SessionSnapshot> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
            return Err(RegistryError::DuplicateSession(id.to_string()));
        }

        let session = Session::new(id, &self.config);
        let snapshot = session.snapshot();
        sessions.insert(id.to_string(), session);

        tracing::info!(room_id = %id, "Created room");
        Ok(snapshot)
    }

    /// Look up a room
    pub async fn get_session(&self, id: &str) -> Option<SessionSnapshot> {
        self.sessions.read().await.get(id).map(Session::snapshot)
    }

    /// Replace a room's buffer
    ///
    /// Does nothing when the room is gone, so late frames for a reaped room are
    /// dropped quietly. Returns whether the update was applied.
    pub async fn update_text(&self, id: &str, text: impl Into<String>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) => {
                session.code = text.into();
                session.touch();
                true
            }
            None => {
                tracing::trace!(room_id = %id, "Dropped buffer update for missing room");
                false
            }
        }
    }

    /// Replace a room's language tag. Same absent-room policy as `update_text`.
    pub async fn update_language(&self, id: &str, language: impl Into<String>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) => {
                session.language = language.into();
                session.touch();
                true
            }
            None => {
                tracing::trace!(room_id = %id, "Dropped language update for missing room");
                false
            }
        }
    }

    /// Join a participant to an existing room
    ///
    /// Cancels a pending empty-room deletion. Returns the room as it stands
    /// right after the join.
    pub async fn add_participant(
        &self,
        id: &str,
        participant_id: &str,
        sink: Arc<dyn MessageSink>,
        username: &str,
    ) -> RegistryResult<SessionSnapshot> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| RegistryError::RoomNotFound(id.to_string()))?;

        Ok(self.insert_participant(session, participant_id, sink, username))
    }

    /// Add a participant, creating the room first if it does not exist
    ///
    /// Lookup, creation and insertion happen under one write lock, so a grace
    /// timer or sweep deleting the room concurrently cannot make the join fail.
    pub async fn join_session(
        &self,
        id: &str,
        participant_id: &str,
        sink: Arc<dyn MessageSink>,
        username: &str,
    ) -> SessionSnapshot {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id.to_string()).or_insert_with(|| {
            tracing::info!(room_id = %id, "Room created on join");
            Session::new(id, &self.config)
        });

        self.insert_participant(session, participant_id, sink, username)
    }

    fn insert_participant(
        &self,
        session: &mut Session,
        participant_id: &str,
        sink: Arc<dyn MessageSink>,
        username: &str,
    ) -> SessionSnapshot {
        session.cancel_pending_removal();
        session.participants.insert(
            participant_id.to_string(),
            Participant {
                id: participant_id.to_string(),
                username: username.to_string(),
                sink,
                joined_at: now_millis(),
                join_seq: self.join_seq.fetch_add(1, Ordering::Relaxed),
            },
        );
        session.touch();

        tracing::info!(
            room_id = %session.id,
            participant_id = %participant_id,
            username = %username,
            participants = session.participants.len(),
            "Participant joined"
        );
        session.snapshot()
    }

    /// Remove a participant from a room
    ///
    /// Idempotent: removing an unknown participant, or from an unknown room,
    /// returns `None`. When the room ends up empty, its deletion is scheduled
    /// after the grace period.
    pub async fn remove_participant(
        self: &Arc<Self>,
        id: &str,
        participant_id: &str,
    ) -> Option<ParticipantInfo> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id)?;
        let removed = session.participants.remove(participant_id)?;

        tracing::info!(
            room_id = %id,
            participant_id = %participant_id,
            participants = session.participants.len(),
            "Participant left"
        );

        if session.is_empty() {
            self.schedule_removal(session);
        }

        Some(ParticipantInfo {
            id: removed.id,
            username: removed.username,
            joined_at: removed.joined_at,
        })
    }

    /// Current roster of a room, empty when the room does not exist
    pub async fn list_participants(&self, id: &str) -> Vec<ParticipantInfo> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(presence::roster)
            .unwrap_or_default()
    }

    /// Delivery targets of a room, in join order
    pub async fn recipients(&self, id: &str) -> Vec<(ParticipantId, Arc<dyn MessageSink>)> {
        let sessions = self.sessions.read().await;
        let Some(session) = sessions.get(id) else {
            return Vec::new();
        };

        let mut participants: Vec<_> = session.participants.values().collect();
        participants.sort_by_key(|p| p.join_seq);
        participants
            .into_iter()
            .map(|p| (p.id.clone(), Arc::clone(&p.sink)))
            .collect()
    }

    /// Remove a room unconditionally. Returns whether it existed.
    pub async fn delete_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(mut session) => {
                session.cancel_pending_removal();
                tracing::info!(room_id = %id, "Deleted room");
                true
            }
            None => false,
        }
    }

    /// Delete every room idle for longer than `max_age`
    ///
    /// Connected participants do not keep a room alive: only the time since
    /// the last accepted mutation counts.
    pub async fn sweep_idle(&self, max_age: Duration) -> Vec<SessionId> {
        self.sweep_idle_at(now_millis(), max_age).await
    }

    pub(crate) async fn sweep_idle_at(&self, now: i64, max_age: Duration) -> Vec<SessionId> {
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        let mut sessions = self.sessions.write().await;

        let stale: Vec<SessionId> = sessions
            .values()
            .filter(|s| s.idle_millis(now) > max_age_ms)
            .map(|s| s.id.clone())
            .collect();

        for id in &stale {
            if let Some(mut session) = sessions.remove(id) {
                session.cancel_pending_removal();
                tracing::info!(
                    room_id = %id,
                    idle_ms = session.idle_millis(now),
                    participants = session.participants.len(),
                    "Reaped idle room"
                );
            }
        }

        stale
    }

    /// Number of live rooms
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Cancel all pending grace-period timers
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn schedule_removal(self: &Arc<Self>, session: &mut Session) {
        session.cancel_pending_removal();

        let ticket = self.removal_seq.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown.child_token();
        session.pending_removal = Some(PendingRemoval {
            ticket,
            token: token.clone(),
        });

        let registry: Weak<Self> = Arc::downgrade(self);
        let room_id = session.id.clone();
        let grace = self.config.grace_period;

        tracing::debug!(
            room_id = %room_id,
            grace_secs = grace.as_secs(),
            "Room empty, scheduling deletion"
        );

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(grace) => {
                    if let Some(registry) = registry.upgrade() {
                        registry.expire_if_empty(&room_id, ticket).await;
                    }
                }
            }
        });
    }

    /// Grace expiry: delete only if still empty and nothing rescheduled since
    async fn expire_if_empty(&self, id: &str, ticket: u64) {
        let mut sessions = self.sessions.write().await;
        let still_pending = sessions.get(id).is_some_and(|s| {
            s.is_empty() && s.pending_removal.as_ref().is_some_and(|p| p.ticket == ticket)
        });

        if still_pending {
            sessions.remove(id);
            tracing::info!(room_id = %id, "Deleted empty room after grace period");
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
