use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
    pub rooms: RoomInfo,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub websocket: usize,
    pub registered: usize,
}

#[derive(Serialize)]
pub struct RoomInfo {
    pub active: usize,
    pub playing: usize,
    pub players: usize,
}

/// Server status plus connection and room counts.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let websocket = state.ws_connection_count.load(Ordering::Relaxed);

    let (registered, rooms) = {
        let lobby = state.lobby.read().await;
        (lobby.presence.registered_count(), lobby.rooms.stats())
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo {
            websocket,
            registered,
        },
        rooms: RoomInfo {
            active: rooms.active,
            playing: rooms.playing,
            players: rooms.players,
        },
    })
}
