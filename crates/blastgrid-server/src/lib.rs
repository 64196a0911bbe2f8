pub mod api;
pub mod config;
pub mod error;
pub mod game_loop;
pub mod health;
pub mod lobby;
pub mod persistence;
pub mod presence;
pub mod room_manager;
pub mod state;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use blastgrid_arena::config::ArenaConfig;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig, arena: ArenaConfig) -> (Router<()>, AppState) {
    let cors = cors_layer(&config.cors_origin);
    let state = AppState::new(config, arena);

    let api_routes = Router::new()
        .route("/rooms", get(api::get_rooms))
        .route("/leaderboard", get(api::get_leaderboard))
        .route("/players/{username}/stats", get(api::get_player_stats));

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/ws", get(ws::ws_handler))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state.clone());

    (app, state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            tracing::warn!(origin, error = %e, "Invalid CORS origin, allowing none");
            layer
        },
    }
}

/// Periodically drop waiting rooms nobody has touched for a while.
pub fn spawn_idle_sweeper(state: AppState) {
    let every = Duration::from_secs(state.config.rooms.idle_check_interval_secs);
    let max_idle = Duration::from_secs(state.config.rooms.idle_timeout_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let mut lobby = state.lobby.write().await;
            let removed = lobby.rooms.cleanup_idle_rooms(max_idle);
            if removed > 0 {
                tracing::info!(removed, "Removed idle rooms");
                lobby.broadcast_rooms();
            }
        }
    });
}
