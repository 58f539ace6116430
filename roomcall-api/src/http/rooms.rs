use axum::{
    extract::{Path, State},
    Json,
};
use roomcall_core::models::RoomId;
use roomcall_proto::validation::{check_text, MAX_ROOM_ID_CHARS};
use serde::{Deserialize, Serialize};

use super::{AppResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomLookup {
    pub room_id: String,
    pub exists: bool,
    pub member_count: usize,
    pub active_screen_sharer: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStats {
    pub rooms: usize,
    pub participants: usize,
    pub connections: usize,
    pub delivered_events: u64,
    pub dropped_events: u64,
}

/// GET /api/rooms/{room_id}
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> AppResult<Json<RoomLookup>> {
    check_text("Room", &room_id, MAX_ROOM_ID_CHARS).map_err(roomcall_core::Error::from)?;

    let lookup = match state.services.registry.stats(&RoomId::from(room_id.trim())) {
        Some(stats) => RoomLookup {
            room_id,
            exists: true,
            member_count: stats.member_count,
            active_screen_sharer: stats.active_screen_sharer,
        },
        None => RoomLookup {
            room_id,
            exists: false,
            member_count: 0,
            active_screen_sharer: None,
        },
    };
    Ok(Json(lookup))
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<ServiceStats> {
    let services = &state.services;
    Json(ServiceStats {
        rooms: services.registry.room_count(),
        participants: services.registry.participant_count(),
        connections: services.hub.connection_count(),
        delivered_events: services.hub.delivered_count(),
        dropped_events: services.hub.dropped_count(),
    })
}
