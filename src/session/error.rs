//! Session registry error types

use thiserror::Error;

/// Errors returned by registry operations that reject their input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A live room already uses this id
    #[error("Room already exists: {0}")]
    DuplicateSession(String),

    /// No live room has this id
    #[error("Room not found: {0}")]
    RoomNotFound(String),
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
