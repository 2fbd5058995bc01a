//! Room Routes
//!
//! - POST /api/rooms - Create a room with a fresh id
//! - GET /api/rooms/:room_id - Current room state and roster

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CreateRoomResponse, RoomInfoResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::session::{generate_room_id, RegistryError};

/// Attempts at finding an unused id before giving up
const CREATE_ATTEMPTS: usize = 3;

/// POST /api/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
) -> ApiResult<(StatusCode, Json<CreateRoomResponse>)> {
    for _ in 0..CREATE_ATTEMPTS {
        match state.registry.create_session(&generate_room_id()).await {
            Ok(room) => {
                return Ok((StatusCode::CREATED, Json(CreateRoomResponse::new(room.id))));
            }
            Err(RegistryError::DuplicateSession(id)) => {
                tracing::warn!(room_id = %id, "Generated room id collided, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ApiError::Internal("Failed to create room".to_string()))
}

/// GET /api/rooms/:room_id
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> ApiResult<Json<RoomInfoResponse>> {
    state
        .registry
        .get_session(&room_id)
        .await
        .map(|room| Json(room.into()))
        .ok_or(ApiError::Registry(RegistryError::RoomNotFound(room_id)))
}
