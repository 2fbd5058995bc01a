//! WebSocket Message Types
//!
//! Every frame in either direction is a JSON envelope `{"type": ..., "data": {...}}`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::session::{Frame, ParticipantInfo};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Join (creating if needed) a room
    #[serde(rename_all = "camelCase")]
    Join {
        room_id: String,
        #[serde(default)]
        username: Option<String>,
    },
    /// Replace the shared buffer
    CodeChange { code: String },
    /// Switch the room's language
    LanguageChange { language: String },
    /// Caret position, relayed but never stored
    CursorPosition { line: u32, ch: u32 },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Reply to a successful join, sent to the joiner only
    #[serde(rename_all = "camelCase")]
    Joined {
        user_id: String,
        room_id: String,
        code: String,
        language: String,
        users: Vec<ParticipantInfo>,
    },
    /// Someone else joined
    #[serde(rename_all = "camelCase")]
    UserJoined {
        user_id: String,
        username: String,
        users: Vec<ParticipantInfo>,
    },
    /// Someone left
    #[serde(rename_all = "camelCase")]
    UserLeft {
        user_id: String,
        username: String,
        users: Vec<ParticipantInfo>,
    },
    #[serde(rename_all = "camelCase")]
    CodeChange { code: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    LanguageChange { language: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    CursorPosition {
        user_id: String,
        username: String,
        line: u32,
        ch: u32,
    },
    /// Protocol error, sent to the offending connection only
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Serialize once into a frame that can be shared across recipients
    pub fn to_frame(&self) -> serde_json::Result<Frame> {
        serde_json::to_string(self).map(Arc::from)
    }
}
