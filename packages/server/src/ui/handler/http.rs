//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use hiroba_shared::time::timestamp_to_jst_rfc3339;

use crate::{
    domain::RoomId,
    infrastructure::dto::http::{MemberDetailDto, RoomDetailDto},
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get this process's view of a room
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetailDto>, StatusCode> {
    let room_id = match RoomId::new(room_id) {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!("Rejecting room detail request: {}", e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    let mut members = state.registry.members_detail(&room_id);
    if members.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }
    members.sort_by(|a, b| {
        a.connected_at
            .cmp(&b.connected_at)
            .then_with(|| a.display_name.as_str().cmp(b.display_name.as_str()))
    });

    let room_detail = RoomDetailDto {
        id: room_id.as_str().to_string(),
        channel: state.broadcaster.channel_for(&room_id).to_string(),
        subscribed: state.broadcaster.is_subscribed(&room_id).await,
        members: members
            .iter()
            .map(|m| MemberDetailDto {
                connection_id: m.connection_id.to_string(),
                username: m.display_name.as_str().to_string(),
                connected_at: timestamp_to_jst_rfc3339(m.connected_at.value()),
            })
            .collect(),
    };

    Ok(Json(room_detail))
}
