use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use blastgrid_arena::config::ArenaConfig;
use blastgrid_core::player::ConnectionId;
use blastgrid_core::room::{
    MIN_PLAYERS_TO_START, MatchPhase, Room, RoomId, RoomView, generate_room_code,
};

use crate::config::RoomsConfig;
use crate::game_loop::{GameBroadcast, GameCommand, GameSessionConfig, spawn_game_session};
use crate::persistence::MatchRecorder;
use crate::presence::{PlayerSender, PresenceRegistry};
use crate::state::SharedLobby;

/// Longest room name kept; longer names are truncated.
const MAX_ROOM_NAME_CHARS: usize = 48;

/// Why a lobby operation was ignored. Never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyError {
    NotRegistered,
    AlreadyRegistered,
    InvalidUsername,
    AlreadyInRoom,
    RoomNotFound,
    RoomStarted,
    RoomFull,
    DuplicateUsername,
    NotInRoom,
    NotHost,
    NotEnoughPlayers,
    NotReady,
    NoActiveGame,
}

impl fmt::Display for LobbyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NotRegistered => "connection is not registered",
            Self::AlreadyRegistered => "connection is already registered",
            Self::InvalidUsername => "invalid username",
            Self::AlreadyInRoom => "already in a room",
            Self::RoomNotFound => "room not found",
            Self::RoomStarted => "room has already started",
            Self::RoomFull => "room is full",
            Self::DuplicateUsername => "username already in room",
            Self::NotInRoom => "not a member of that room",
            Self::NotHost => "only the host can start the game",
            Self::NotEnoughPlayers => "not enough players",
            Self::NotReady => "not every player is ready",
            Self::NoActiveGame => "no match running in that room",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for LobbyError {}

/// Match parameters applied to every room this manager starts.
#[derive(Clone)]
pub struct SessionSettings {
    pub tick_rate_hz: u32,
    pub match_duration: Option<Duration>,
    pub arena: Arc<ArenaConfig>,
    pub recorder: Arc<dyn MatchRecorder>,
}

/// Aggregate counts for the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomStats {
    pub active: usize,
    pub playing: usize,
    pub players: usize,
}

/// How a member leaves a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    Leave,
    Exit,
    Disconnect,
}

/// Handles for a running match.
struct GameHandle {
    cmd_tx: mpsc::UnboundedSender<GameCommand>,
    cancel: CancellationToken,
    /// Shared with the forwarder; members are dropped from it as they leave.
    senders: Arc<Mutex<HashMap<String, PlayerSender>>>,
    #[allow(dead_code)]
    game_task: JoinHandle<()>,
    #[allow(dead_code)]
    broadcast_task: JoinHandle<()>,
}

struct RoomEntry {
    room: Room,
    /// Username → connection for members still attached to the room.
    members: HashMap<String, ConnectionId>,
    last_activity: Instant,
    game: Option<GameHandle>,
}

impl RoomEntry {
    fn username_of(&self, conn: ConnectionId) -> Option<&str> {
        self.members
            .iter()
            .find(|&(_, &c)| c == conn)
            .map(|(name, _)| name.as_str())
    }
}

/// All rooms and which connection sits in which. A connection belongs to
/// at most one room.
pub struct RoomManager {
    rooms: HashMap<RoomId, RoomEntry>,
    member_of: HashMap<ConnectionId, RoomId>,
    default_max_players: u8,
    max_players_cap: u8,
    session: SessionSettings,
}

impl RoomManager {
    pub fn new(config: &RoomsConfig, session: SessionSettings) -> Self {
        Self {
            rooms: HashMap::new(),
            member_of: HashMap::new(),
            default_max_players: config.default_max_players,
            max_players_cap: config.max_players_cap,
            session,
        }
    }

    /// Open a room hosted by `conn`. `max_players` of 0 picks the default;
    /// other values are clamped to what the server allows.
    pub fn create_room(
        &mut self,
        presence: &PresenceRegistry,
        conn: ConnectionId,
        name: &str,
        max_players: u8,
    ) -> Result<RoomView, LobbyError> {
        let player = presence.player(conn).ok_or(LobbyError::NotRegistered)?;
        if self.member_of.contains_key(&conn) {
            return Err(LobbyError::AlreadyInRoom);
        }

        let cap = self.max_players_cap.max(MIN_PLAYERS_TO_START as u8);
        let max_players = match max_players {
            0 => self.default_max_players,
            n => n,
        }
        .clamp(MIN_PLAYERS_TO_START as u8, cap);
        let name: String = match name.trim() {
            "" => format!("{}'s room", player.username),
            trimmed => trimmed.chars().take(MAX_ROOM_NAME_CHARS).collect(),
        };

        let code = generate_unique_room_code(&self.rooms);
        let room = Room::new(
            code.clone(),
            name,
            max_players,
            &player.username,
            &player.avatar,
        );
        let view = room.view();
        let mut members = HashMap::new();
        members.insert(player.username.clone(), conn);
        self.rooms.insert(
            code.clone(),
            RoomEntry {
                room,
                members,
                last_activity: Instant::now(),
                game: None,
            },
        );
        self.member_of.insert(conn, code.clone());

        tracing::info!(room = %code, username = %player.username, max_players, "Room created");
        Ok(view)
    }

    pub fn join_room(
        &mut self,
        presence: &PresenceRegistry,
        conn: ConnectionId,
        room_id: &str,
    ) -> Result<(), LobbyError> {
        let player = presence.player(conn).ok_or(LobbyError::NotRegistered)?;
        if self.member_of.contains_key(&conn) {
            return Err(LobbyError::AlreadyInRoom);
        }
        let entry = self
            .rooms
            .get_mut(room_id)
            .ok_or(LobbyError::RoomNotFound)?;
        if entry.room.is_started() {
            return Err(LobbyError::RoomStarted);
        }
        if entry.room.is_full() {
            return Err(LobbyError::RoomFull);
        }
        if entry.room.contains(&player.username) {
            return Err(LobbyError::DuplicateUsername);
        }

        entry.room.push_player(&player.username, &player.avatar);
        entry.members.insert(player.username.clone(), conn);
        entry.last_activity = Instant::now();
        self.member_of.insert(conn, entry.room.id.clone());

        tracing::info!(room = room_id, username = %player.username, "Player joined room");
        Ok(())
    }

    pub fn toggle_ready(
        &mut self,
        conn: ConnectionId,
        room_id: &str,
        is_ready: bool,
    ) -> Result<(), LobbyError> {
        self.check_membership(conn, room_id)?;
        let entry = self
            .rooms
            .get_mut(room_id)
            .ok_or(LobbyError::RoomNotFound)?;
        if entry.room.is_started() {
            return Err(LobbyError::RoomStarted);
        }
        let username = entry
            .username_of(conn)
            .ok_or(LobbyError::NotInRoom)?
            .to_string();
        if !entry.room.set_ready(&username, is_ready) {
            return Err(LobbyError::NotInRoom);
        }
        entry.last_activity = Instant::now();
        tracing::debug!(room = room_id, username = %username, is_ready, "Ready toggled");
        Ok(())
    }

    /// Leave whatever room `conn` is in. During a match this is an exit.
    pub fn leave_room(&mut self, conn: ConnectionId) -> Result<RoomId, LobbyError> {
        let room_id = self.member_of.remove(&conn).ok_or(LobbyError::NotInRoom)?;
        self.depart(&room_id, conn, Departure::Leave);
        Ok(room_id)
    }

    /// Leave a running match. The roster entry goes with it.
    pub fn exit_game(&mut self, conn: ConnectionId, room_id: &str) -> Result<(), LobbyError> {
        self.check_membership(conn, room_id)?;
        let has_game = self
            .rooms
            .get(room_id)
            .is_some_and(|entry| entry.game.is_some());
        if !has_game {
            return Err(LobbyError::NoActiveGame);
        }
        self.member_of.remove(&conn);
        self.depart(room_id, conn, Departure::Exit);
        Ok(())
    }

    /// The connection dropped. Returns the room it was in, if any.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Option<RoomId> {
        let room_id = self.member_of.remove(&conn)?;
        self.depart(&room_id, conn, Departure::Disconnect);
        Some(room_id)
    }

    /// Detach `conn` from a room it was a member of. `member_of` must already
    /// be cleared by the caller.
    fn depart(&mut self, room_id: &str, conn: ConnectionId, how: Departure) {
        let Some(entry) = self.rooms.get_mut(room_id) else {
            return;
        };
        let Some(username) = entry.username_of(conn).map(str::to_string) else {
            return;
        };
        entry.members.remove(&username);
        entry.last_activity = Instant::now();

        if let Some(game) = &entry.game {
            game.senders
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&username);
            let cmd = match how {
                Departure::Disconnect => GameCommand::Disconnect {
                    username: username.clone(),
                },
                Departure::Leave | Departure::Exit => GameCommand::Exit {
                    username: username.clone(),
                },
            };
            if let Err(e) = game.cmd_tx.send(cmd) {
                tracing::debug!(room = room_id, username = %username, error = %e, "Game session gone");
            }
            // A dropped connection keeps its seat so final stats list it.
            if how != Departure::Disconnect {
                entry.room.remove_player(&username);
            }
            tracing::info!(room = room_id, username = %username, ?how, "Player left running match");
            return;
        }

        entry.room.remove_player(&username);
        tracing::info!(room = room_id, username = %username, ?how, "Player left room");
        if entry.room.is_empty() {
            self.rooms.remove(room_id);
            tracing::info!(room = room_id, "Empty room removed");
        }
    }

    /// Start the match in `room_id`. The caller must be the host, every seat
    /// must be ready and at least two players seated.
    pub fn start_game(
        &mut self,
        presence: &PresenceRegistry,
        conn: ConnectionId,
        room_id: &str,
        lobby: SharedLobby,
    ) -> Result<(), LobbyError> {
        self.check_membership(conn, room_id)?;
        let entry = self
            .rooms
            .get_mut(room_id)
            .ok_or(LobbyError::RoomNotFound)?;
        let username = entry.username_of(conn).ok_or(LobbyError::NotInRoom)?;
        if entry.room.host != username {
            return Err(LobbyError::NotHost);
        }
        if entry.room.is_started() {
            return Err(LobbyError::RoomStarted);
        }
        if entry.room.roster.len() < MIN_PLAYERS_TO_START {
            return Err(LobbyError::NotEnoughPlayers);
        }
        if !entry.room.can_start() {
            return Err(LobbyError::NotReady);
        }

        transition(&mut entry.room, MatchPhase::Starting);

        let config = GameSessionConfig {
            room_id: entry.room.id.clone(),
            roster: entry.room.roster.clone(),
            tick_rate_hz: self.session.tick_rate_hz,
            match_duration: self.session.match_duration,
            arena: self.session.arena.as_ref().clone(),
            recorder: Arc::clone(&self.session.recorder),
            seed: None,
        };
        let cancel = CancellationToken::new();
        let (cmd_tx, broadcast_rx, game_task) = spawn_game_session(config, cancel.clone());

        let senders: HashMap<String, PlayerSender> = entry
            .members
            .iter()
            .filter_map(|(name, &c)| presence.sender(c).map(|tx| (name.clone(), tx.clone())))
            .collect();
        let senders = Arc::new(Mutex::new(senders));
        let shared_senders = Arc::clone(&senders);
        let room_id_owned = entry.room.id.clone();
        let broadcast_task = tokio::spawn(async move {
            forward_broadcasts(broadcast_rx, shared_senders, &room_id_owned).await;
            // Match over: drop the room and tell the lobby.
            let mut lobby = lobby.write().await;
            lobby.rooms.end_game_session(&room_id_owned);
            lobby.broadcast_rooms();
        });

        entry.game = Some(GameHandle {
            cmd_tx,
            cancel,
            senders,
            game_task,
            broadcast_task,
        });
        entry.last_activity = Instant::now();
        transition(&mut entry.room, MatchPhase::Running);

        tracing::info!(room = room_id, players = entry.room.roster.len(), "Game started");
        Ok(())
    }

    /// Send a command to the match `conn` is playing in.
    pub fn route_command(
        &self,
        conn: ConnectionId,
        room_id: &str,
        make: impl FnOnce(String) -> GameCommand,
    ) -> Result<(), LobbyError> {
        self.check_membership(conn, room_id)?;
        let entry = self.rooms.get(room_id).ok_or(LobbyError::RoomNotFound)?;
        let game = entry.game.as_ref().ok_or(LobbyError::NoActiveGame)?;
        let username = entry.username_of(conn).ok_or(LobbyError::NotInRoom)?;
        if let Err(e) = game.cmd_tx.send(make(username.to_string())) {
            tracing::debug!(room = room_id, error = %e, "Game session gone");
        }
        Ok(())
    }

    /// Tear down a finished match and the room that hosted it.
    pub fn end_game_session(&mut self, room_id: &str) {
        let Some(mut entry) = self.rooms.remove(room_id) else {
            return;
        };
        if let Some(game) = entry.game.take() {
            game.cancel.cancel();
        }
        transition(&mut entry.room, MatchPhase::Ended);
        for conn in entry.members.values() {
            if self.member_of.get(conn).is_some_and(|r| r == room_id) {
                self.member_of.remove(conn);
            }
        }
        tracing::info!(room = room_id, "Room closed after match");
    }

    /// Remove waiting rooms idle longer than `max_idle`. Rooms with a match
    /// running are left alone. Returns the number removed.
    pub fn cleanup_idle_rooms(&mut self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.rooms.len();
        self.rooms.retain(|_, entry| {
            entry.game.is_some() || now.duration_since(entry.last_activity) < max_idle
        });
        let rooms = &self.rooms;
        self.member_of.retain(|_, room_id| rooms.contains_key(room_id));
        before - self.rooms.len()
    }

    /// Lobby snapshot ordered by room id.
    pub fn rooms_view(&self) -> Vec<RoomView> {
        let mut rooms: Vec<RoomView> = self.rooms.values().map(|e| e.room.view()).collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }

    pub fn room_of(&self, conn: ConnectionId) -> Option<&RoomId> {
        self.member_of.get(&conn)
    }

    pub fn stats(&self) -> RoomStats {
        RoomStats {
            active: self.rooms.len(),
            playing: self.rooms.values().filter(|e| e.game.is_some()).count(),
            players: self.rooms.values().map(|e| e.room.roster.len()).sum(),
        }
    }

    fn check_membership(&self, conn: ConnectionId, room_id: &str) -> Result<(), LobbyError> {
        match self.member_of.get(&conn) {
            Some(current) if current == room_id => Ok(()),
            _ => Err(LobbyError::NotInRoom),
        }
    }

    #[cfg(test)]
    pub(crate) fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id).map(|e| &e.room)
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(
            &RoomsConfig::default(),
            SessionSettings {
                tick_rate_hz: 60,
                match_duration: None,
                arena: Arc::new(ArenaConfig::default()),
                recorder: Arc::new(crate::persistence::InMemoryStats::new()),
            },
        )
    }
}

fn transition(room: &mut Room, next: MatchPhase) {
    if room.phase.can_transition_to(next) {
        room.phase = next;
    } else {
        tracing::warn!(room = %room.id, from = ?room.phase, to = ?next, "Invalid phase transition");
    }
}

/// Fan a match's broadcasts out to the room's connections until it ends.
async fn forward_broadcasts(
    mut broadcast_rx: mpsc::UnboundedReceiver<GameBroadcast>,
    senders: Arc<Mutex<HashMap<String, PlayerSender>>>,
    room_id: &str,
) {
    while let Some(broadcast) = broadcast_rx.recv().await {
        match broadcast {
            GameBroadcast::Room(data) => {
                let snapshot = senders
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                for (username, sender) in &snapshot {
                    if sender.try_send(data.clone()).is_err() {
                        tracing::debug!(
                            username = %username,
                            room = room_id,
                            "Skipping broadcast to slow client (channel full or closed)"
                        );
                    }
                }
            },
            GameBroadcast::Player { username, data } => {
                let sender = senders
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&username)
                    .cloned();
                if let Some(sender) = sender
                    && sender.try_send(data).is_err()
                {
                    tracing::debug!(username = %username, room = room_id, "Skipping player message");
                }
            },
            GameBroadcast::GameEnded => {
                tracing::info!(room = room_id, "Game session ended");
                break;
            },
        }
    }
}

/// Generate a unique room code, retrying on collision with existing rooms.
fn generate_unique_room_code(existing: &HashMap<RoomId, RoomEntry>) -> RoomId {
    loop {
        let code = generate_room_code();
        if !existing.contains_key(&code) {
            return code;
        }
    }
}
