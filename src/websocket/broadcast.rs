//! Broadcast Router
//!
//! Fans a message out to the connections of one room. The recipient list is
//! snapshotted from the registry first, so no registry lock is held while
//! frames are handed to connections.

use std::sync::Arc;

use super::messages::ServerMessage;
use crate::session::{Frame, SessionRegistry};

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Frames queued to an open connection
    pub delivered: usize,
    /// Recipients whose connection was no longer open
    pub skipped: usize,
    /// Recipients whose send failed
    pub failed: usize,
}

/// Routes room events to participants
#[derive(Clone)]
pub struct BroadcastRouter {
    registry: Arc<SessionRegistry>,
}

impl BroadcastRouter {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Send `message` to everyone in `room_id` except `exclude`
    pub async fn broadcast(
        &self,
        room_id: &str,
        message: &ServerMessage,
        exclude: Option<&str>,
    ) -> DeliveryReport {
        match message.to_frame() {
            Ok(frame) => self.deliver(room_id, frame, exclude).await,
            Err(e) => {
                tracing::error!(room_id = %room_id, error = %e, "Failed to serialize broadcast");
                DeliveryReport::default()
            }
        }
    }

    /// Deliver an already-serialized frame
    ///
    /// A failing recipient is counted and skipped; it never stops delivery to
    /// the others.
    pub async fn deliver(
        &self,
        room_id: &str,
        frame: Frame,
        exclude: Option<&str>,
    ) -> DeliveryReport {
        let recipients = self.registry.recipients(room_id).await;
        let mut report = DeliveryReport::default();

        for (participant_id, sink) in recipients {
            if exclude == Some(participant_id.as_str()) {
                continue;
            }
            if !sink.is_open() {
                report.skipped += 1;
                continue;
            }

            match sink.send_frame(Arc::clone(&frame)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::debug!(
                        room_id = %room_id,
                        participant_id = %participant_id,
                        error = %e,
                        "Failed to deliver frame"
                    );
                }
            }
        }

        if report.failed > 0 {
            tracing::warn!(
                room_id = %room_id,
                delivered = report.delivered,
                failed = report.failed,
                "Broadcast partially failed"
            );
        } else {
            tracing::trace!(
                room_id = %room_id,
                delivered = report.delivered,
                skipped = report.skipped,
                "Broadcast event"
            );
        }

        report
    }
}
