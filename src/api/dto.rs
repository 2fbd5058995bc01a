//! Data Transfer Objects
//!
//! Response types for the HTTP endpoints, serialized to JSON.

use serde::Serialize;

use crate::session::{ParticipantInfo, SessionSnapshot};

/// Response to room creation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: String,
    /// Client-side path of the room page
    pub url: String,
}

impl CreateRoomResponse {
    pub fn new(room_id: String) -> Self {
        Self {
            url: format!("/room/{}", room_id),
            room_id,
        }
    }
}

/// Public room information
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfoResponse {
    pub id: String,
    pub code: String,
    pub language: String,
    pub users: Vec<ParticipantInfo>,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
}

impl From<SessionSnapshot> for RoomInfoResponse {
    fn from(room: SessionSnapshot) -> Self {
        Self {
            id: room.id,
            code: room.code,
            language: room.language,
            users: room.users,
            created_at: room.created_at,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process is serving
    pub status: String,
    /// Number of live rooms
    pub rooms: usize,
    /// Server time, Unix milliseconds
    pub timestamp: i64,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
