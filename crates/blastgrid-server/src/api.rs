use axum::extract::{Path, State};
use axum::response::Json;

use blastgrid_core::room::RoomView;

use crate::error::AppError;
use crate::lobby::validate_username;
use crate::persistence::PlayerStats;
use crate::state::AppState;

const LEADERBOARD_SIZE: usize = 10;

/// GET /api/v1/rooms: the same snapshot the lobby broadcasts.
pub async fn get_rooms(State(state): State<AppState>) -> Json<Vec<RoomView>> {
    let lobby = state.lobby.read().await;
    Json(lobby.rooms.rooms_view())
}

/// GET /api/v1/leaderboard
pub async fn get_leaderboard(State(state): State<AppState>) -> Json<Vec<PlayerStats>> {
    Json(state.stats.leaderboard(LEADERBOARD_SIZE))
}

/// GET /api/v1/players/{username}/stats
pub async fn get_player_stats(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<PlayerStats>, AppError> {
    let username = validate_username(&username, state.config.limits.max_username_len)
        .ok_or_else(|| AppError::BadRequest("invalid username".to_string()))?;
    state
        .stats
        .stats(&username)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no stats for {username}")))
}
