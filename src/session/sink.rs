//! Send capability handed to the registry for each participant
//!
//! The registry never owns a connection. It only keeps a `MessageSink`, which
//! can push an already-serialized frame towards the connection's writer and
//! report whether that writer is still there.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// A serialized outbound frame, shared between all recipients of a broadcast
pub type Frame = Arc<str>;

/// Errors from delivering a frame to a single connection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Connection closed")]
    Closed,
}

/// Narrow delivery handle for one connection
pub trait MessageSink: Send + Sync {
    /// Queue a frame for the connection. Must not block.
    fn send_frame(&self, frame: Frame) -> Result<(), SinkError>;

    /// Whether the connection can currently accept frames
    fn is_open(&self) -> bool;
}

/// The connection writer task owns the receiving half
impl MessageSink for mpsc::UnboundedSender<Frame> {
    fn send_frame(&self, frame: Frame) -> Result<(), SinkError> {
        mpsc::UnboundedSender::send(self, frame).map_err(|_| SinkError::Closed)
    }

    fn is_open(&self) -> bool {
        !self.is_closed()
    }
}
