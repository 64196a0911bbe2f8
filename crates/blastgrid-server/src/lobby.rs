use blastgrid_core::net::messages::{OnlinePlayersMsg, RoomCreatedMsg, RoomsMsg, ServerMessage};
use blastgrid_core::player::{ConnectionId, DEFAULT_AVATAR};
use blastgrid_core::room::RoomId;

use crate::game_loop::GameCommand;
use crate::presence::{PlayerSender, PresenceRegistry};
use crate::room_manager::{LobbyError, RoomManager};
use crate::state::SharedLobby;

/// Avatars are a short emoji or glyph string.
const MAX_AVATAR_CHARS: usize = 16;

/// Presence and rooms behind one lock. Every successful mutation ends by
/// broadcasting the lobby views it changed.
pub struct Lobby {
    pub presence: PresenceRegistry,
    pub rooms: RoomManager,
    max_username_len: usize,
}

impl Lobby {
    pub fn new(rooms: RoomManager, max_username_len: usize) -> Self {
        Self {
            presence: PresenceRegistry::new(),
            rooms,
            max_username_len,
        }
    }

    pub fn connect(&mut self, sender: PlayerSender) -> ConnectionId {
        let conn = self.presence.connect(sender);
        tracing::debug!(connection = conn, "Connection opened");
        conn
    }

    /// Give a connection its identity. A second call is ignored.
    pub fn register(
        &mut self,
        conn: ConnectionId,
        username: &str,
        avatar: &str,
    ) -> Result<(), LobbyError> {
        let username =
            validate_username(username, self.max_username_len).ok_or(LobbyError::InvalidUsername)?;
        let avatar = normalize_avatar(avatar);
        if !self.presence.register(conn, username.clone(), avatar) {
            return Err(LobbyError::AlreadyRegistered);
        }
        tracing::info!(connection = conn, username = %username, "Player registered");
        self.broadcast_online_players();
        self.broadcast_rooms();
        Ok(())
    }

    pub fn create_room(
        &mut self,
        conn: ConnectionId,
        name: &str,
        max_players: u8,
    ) -> Result<(), LobbyError> {
        let room = self
            .rooms
            .create_room(&self.presence, conn, name, max_players)?;
        self.presence
            .send_message(conn, &ServerMessage::RoomCreated(RoomCreatedMsg { room }));
        self.broadcast_rooms();
        Ok(())
    }

    pub fn join_room(&mut self, conn: ConnectionId, room_id: &str) -> Result<(), LobbyError> {
        self.rooms.join_room(&self.presence, conn, room_id)?;
        self.broadcast_rooms();
        Ok(())
    }

    pub fn leave_room(&mut self, conn: ConnectionId) -> Result<RoomId, LobbyError> {
        let room_id = self.rooms.leave_room(conn)?;
        self.broadcast_rooms();
        Ok(room_id)
    }

    pub fn toggle_ready(
        &mut self,
        conn: ConnectionId,
        room_id: &str,
        is_ready: bool,
    ) -> Result<(), LobbyError> {
        self.rooms.toggle_ready(conn, room_id, is_ready)?;
        self.broadcast_rooms();
        Ok(())
    }

    /// `lobby` is the handle this `Lobby` lives behind; the match forwarder
    /// uses it to tear the room down when play ends.
    pub fn start_game(
        &mut self,
        conn: ConnectionId,
        room_id: &str,
        lobby: SharedLobby,
    ) -> Result<(), LobbyError> {
        self.rooms.start_game(&self.presence, conn, room_id, lobby)?;
        self.broadcast_rooms();
        Ok(())
    }

    pub fn exit_game(&mut self, conn: ConnectionId, room_id: &str) -> Result<(), LobbyError> {
        self.rooms.exit_game(conn, room_id)?;
        self.broadcast_rooms();
        Ok(())
    }

    pub fn route_command(
        &self,
        conn: ConnectionId,
        room_id: &str,
        make: impl FnOnce(String) -> GameCommand,
    ) -> Result<(), LobbyError> {
        self.rooms.route_command(conn, room_id, make)
    }

    /// Drop a connection from its room and from presence.
    pub fn disconnect(&mut self, conn: ConnectionId) {
        let left_room = self.rooms.disconnect(conn);
        let player = self.presence.disconnect(conn);
        if let Some(player) = &player {
            tracing::info!(connection = conn, username = %player.username, "Player disconnected");
            self.broadcast_online_players();
        }
        if left_room.is_some() {
            self.broadcast_rooms();
        }
    }

    pub fn broadcast_rooms(&self) {
        self.presence.broadcast(&ServerMessage::Rooms(RoomsMsg {
            rooms: self.rooms.rooms_view(),
        }));
    }

    pub fn broadcast_online_players(&self) {
        self.presence
            .broadcast(&ServerMessage::OnlinePlayers(OnlinePlayersMsg {
                players: self.presence.online_players(),
            }));
    }
}

/// Trimmed username, or `None` when empty, too long or containing control
/// characters.
pub fn validate_username(raw: &str, max_len: usize) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > max_len || name.chars().any(char::is_control) {
        return None;
    }
    Some(name.to_string())
}

fn normalize_avatar(raw: &str) -> String {
    let avatar = raw.trim();
    if avatar.is_empty() || avatar.chars().any(char::is_control) {
        return DEFAULT_AVATAR.to_string();
    }
    avatar.chars().take(MAX_AVATAR_CHARS).collect()
}
