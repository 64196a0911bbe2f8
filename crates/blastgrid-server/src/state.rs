use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use blastgrid_arena::config::ArenaConfig;

use crate::config::ServerConfig;
use crate::lobby::Lobby;
use crate::persistence::{InMemoryStats, MatchRecorder};
use crate::room_manager::{RoomManager, SessionSettings};

pub type SharedLobby = Arc<RwLock<Lobby>>;

#[derive(Clone)]
pub struct AppState {
    pub lobby: SharedLobby,
    pub stats: Arc<InMemoryStats>,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: ServerConfig, arena: ArenaConfig) -> Self {
        let stats = Arc::new(InMemoryStats::new());
        let session = SessionSettings {
            tick_rate_hz: config.game.tick_rate_hz,
            match_duration: config.game.match_duration(),
            arena: Arc::new(arena),
            recorder: Arc::clone(&stats) as Arc<dyn MatchRecorder>,
        };
        let rooms = RoomManager::new(&config.rooms, session);
        Self {
            lobby: Arc::new(RwLock::new(Lobby::new(
                rooms,
                config.limits.max_username_len,
            ))),
            stats,
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Counts a live WebSocket for as long as it is held.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}
