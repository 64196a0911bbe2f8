use serde::{Deserialize, Serialize};

use crate::player::RegisteredPlayer;
use crate::room::{RoomId, RoomView};

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    Register = 0x01,
    CreateRoom = 0x02,
    JoinRoom = 0x03,
    LeaveRoom = 0x04,
    ToggleReady = 0x05,
    HostStartGame = 0x06,
    PlayerInput = 0x07,
    PlaceBomb = 0x08,
    CheatMode = 0x09,
    ExitGame = 0x0A,
    Overtime = 0x0B,

    // Server -> Client
    OnlinePlayers = 0x10,
    Rooms = 0x11,
    RoomCreated = 0x12,
    StartGame = 0x13,
    GameStateUpdate = 0x14,
    PlayPowerUpSound = 0x15,
    GameOver = 0x16,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Register),
            0x02 => Some(Self::CreateRoom),
            0x03 => Some(Self::JoinRoom),
            0x04 => Some(Self::LeaveRoom),
            0x05 => Some(Self::ToggleReady),
            0x06 => Some(Self::HostStartGame),
            0x07 => Some(Self::PlayerInput),
            0x08 => Some(Self::PlaceBomb),
            0x09 => Some(Self::CheatMode),
            0x0A => Some(Self::ExitGame),
            0x0B => Some(Self::Overtime),
            0x10 => Some(Self::OnlinePlayers),
            0x11 => Some(Self::Rooms),
            0x12 => Some(Self::RoomCreated),
            0x13 => Some(Self::StartGame),
            0x14 => Some(Self::GameStateUpdate),
            0x15 => Some(Self::PlayPowerUpSound),
            0x16 => Some(Self::GameOver),
            _ => None,
        }
    }

    /// Types only the server may emit.
    pub fn is_server_only(self) -> bool {
        (self as u8) >= 0x10
    }
}

/// Direction flags held by a player this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputVector {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl InputVector {
    pub fn is_idle(&self) -> bool {
        !(self.up || self.down || self.left || self.right)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheatInput {
    pub cheat: bool,
}

// ---- Client -> Server payloads ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterMsg {
    pub username: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomMsg {
    pub name: String,
    pub max_players: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomMsg {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRoomMsg {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleReadyMsg {
    pub room_id: RoomId,
    pub is_ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStartGameMsg {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInputMsg {
    pub room_id: RoomId,
    pub input: InputVector,
}

/// Bomb request at the player's declared position. Rounded server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceBombMsg {
    pub room_id: RoomId,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheatModeMsg {
    pub room_id: RoomId,
    pub input: CheatInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitGameMsg {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertimeMsg {
    pub room_id: RoomId,
}

// ---- Server -> Client payloads ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlinePlayersMsg {
    pub players: Vec<RegisteredPlayer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomsMsg {
    pub rooms: Vec<RoomView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCreatedMsg {
    pub room: RoomView,
}

/// Initial match snapshot. `state_data` is a MessagePack-encoded game view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartGameMsg {
    pub room_id: RoomId,
    pub state_data: Vec<u8>,
}

/// Per-tick match snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateUpdateMsg {
    pub tick: u32,
    pub state_data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayPowerUpSoundMsg {}

/// Final per-player line of a finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatsEntry {
    pub username: String,
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,
    pub bombs_placed: u32,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverMsg {
    pub room_id: RoomId,
    pub winner: Option<String>,
    pub player_stats: Vec<PlayerStatsEntry>,
}

/// Messages sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    Register(RegisterMsg),
    CreateRoom(CreateRoomMsg),
    JoinRoom(JoinRoomMsg),
    LeaveRoom(LeaveRoomMsg),
    ToggleReady(ToggleReadyMsg),
    HostStartGame(HostStartGameMsg),
    PlayerInput(PlayerInputMsg),
    PlaceBomb(PlaceBombMsg),
    CheatMode(CheatModeMsg),
    ExitGame(ExitGameMsg),
    Overtime(OvertimeMsg),
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    OnlinePlayers(OnlinePlayersMsg),
    Rooms(RoomsMsg),
    RoomCreated(RoomCreatedMsg),
    StartGame(StartGameMsg),
    GameStateUpdate(GameStateUpdateMsg),
    PlayPowerUpSound(PlayPowerUpSoundMsg),
    GameOver(GameOverMsg),
}
