use serde::{Deserialize, Serialize};

use super::messages::{
    CheatModeMsg, ClientMessage, CreateRoomMsg, ExitGameMsg, GameOverMsg, GameStateUpdateMsg,
    HostStartGameMsg, JoinRoomMsg, LeaveRoomMsg, MessageType, OnlinePlayersMsg, OvertimeMsg,
    PlaceBombMsg, PlayPowerUpSoundMsg, PlayerInputMsg, RegisterMsg, RoomCreatedMsg, RoomsMsg,
    ServerMessage, StartGameMsg, ToggleReadyMsg,
};

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::Register(m) => encode_message(MessageType::Register, m),
        ClientMessage::CreateRoom(m) => encode_message(MessageType::CreateRoom, m),
        ClientMessage::JoinRoom(m) => encode_message(MessageType::JoinRoom, m),
        ClientMessage::LeaveRoom(m) => encode_message(MessageType::LeaveRoom, m),
        ClientMessage::ToggleReady(m) => encode_message(MessageType::ToggleReady, m),
        ClientMessage::HostStartGame(m) => encode_message(MessageType::HostStartGame, m),
        ClientMessage::PlayerInput(m) => encode_message(MessageType::PlayerInput, m),
        ClientMessage::PlaceBomb(m) => encode_message(MessageType::PlaceBomb, m),
        ClientMessage::CheatMode(m) => encode_message(MessageType::CheatMode, m),
        ClientMessage::ExitGame(m) => encode_message(MessageType::ExitGame, m),
        ClientMessage::Overtime(m) => encode_message(MessageType::Overtime, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::OnlinePlayers(m) => encode_message(MessageType::OnlinePlayers, m),
        ServerMessage::Rooms(m) => encode_message(MessageType::Rooms, m),
        ServerMessage::RoomCreated(m) => encode_message(MessageType::RoomCreated, m),
        ServerMessage::StartGame(m) => encode_message(MessageType::StartGame, m),
        ServerMessage::GameStateUpdate(m) => encode_message(MessageType::GameStateUpdate, m),
        ServerMessage::PlayPowerUpSound(m) => encode_message(MessageType::PlayPowerUpSound, m),
        ServerMessage::GameOver(m) => encode_message(MessageType::GameOver, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::Register => Ok(ClientMessage::Register(decode_payload::<RegisterMsg>(
            data,
        )?)),
        MessageType::CreateRoom => Ok(ClientMessage::CreateRoom(
            decode_payload::<CreateRoomMsg>(data)?,
        )),
        MessageType::JoinRoom => Ok(ClientMessage::JoinRoom(decode_payload::<JoinRoomMsg>(
            data,
        )?)),
        MessageType::LeaveRoom => Ok(ClientMessage::LeaveRoom(decode_payload::<LeaveRoomMsg>(
            data,
        )?)),
        MessageType::ToggleReady => Ok(ClientMessage::ToggleReady(decode_payload::<
            ToggleReadyMsg,
        >(data)?)),
        MessageType::HostStartGame => Ok(ClientMessage::HostStartGame(decode_payload::<
            HostStartGameMsg,
        >(data)?)),
        MessageType::PlayerInput => Ok(ClientMessage::PlayerInput(
            decode_payload::<PlayerInputMsg>(data)?,
        )),
        MessageType::PlaceBomb => Ok(ClientMessage::PlaceBomb(decode_payload::<PlaceBombMsg>(
            data,
        )?)),
        MessageType::CheatMode => Ok(ClientMessage::CheatMode(decode_payload::<CheatModeMsg>(
            data,
        )?)),
        MessageType::ExitGame => Ok(ClientMessage::ExitGame(decode_payload::<ExitGameMsg>(
            data,
        )?)),
        MessageType::Overtime => Ok(ClientMessage::Overtime(decode_payload::<OvertimeMsg>(
            data,
        )?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::OnlinePlayers => Ok(ServerMessage::OnlinePlayers(decode_payload::<
            OnlinePlayersMsg,
        >(data)?)),
        MessageType::Rooms => Ok(ServerMessage::Rooms(decode_payload::<RoomsMsg>(data)?)),
        MessageType::RoomCreated => Ok(ServerMessage::RoomCreated(decode_payload::<
            RoomCreatedMsg,
        >(data)?)),
        MessageType::StartGame => Ok(ServerMessage::StartGame(decode_payload::<StartGameMsg>(
            data,
        )?)),
        MessageType::GameStateUpdate => Ok(ServerMessage::GameStateUpdate(decode_payload::<
            GameStateUpdateMsg,
        >(data)?)),
        MessageType::PlayPowerUpSound => Ok(ServerMessage::PlayPowerUpSound(decode_payload::<
            PlayPowerUpSoundMsg,
        >(data)?)),
        MessageType::GameOver => Ok(ServerMessage::GameOver(decode_payload::<GameOverMsg>(
            data,
        )?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::messages::{CheatInput, InputVector, PlayerStatsEntry};
    use crate::player::RegisteredPlayer;
    use crate::room::{RosterEntry, RoomView};

    fn sample_room() -> RoomView {
        RoomView {
            id: "ABCD-1234".to_string(),
            name: "Friday night".to_string(),
            host: "alice".to_string(),
            players: vec![RosterEntry {
                username: "alice".to_string(),
                avatar: "🦸".to_string(),
                is_ready: true,
                is_host: true,
            }],
            max_players: 4,
            started: false,
        }
    }

    #[test]
    fn player_input_keeps_direction_flags() {
        let msg = ClientMessage::PlayerInput(PlayerInputMsg {
            room_id: "ABCD-1234".to_string(),
            input: InputVector {
                up: true,
                down: false,
                left: true,
                right: false,
            },
        });
        let encoded = encode_client_message(&msg).unwrap();
        assert_eq!(encoded[0], MessageType::PlayerInput as u8);
        assert_eq!(decode_client_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn place_bomb_keeps_fractional_position() {
        let msg = ClientMessage::PlaceBomb(PlaceBombMsg {
            room_id: "ABCD-1234".to_string(),
            x: 3.4,
            y: 2.6,
        });
        let encoded = encode_client_message(&msg).unwrap();
        assert_eq!(decode_client_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn empty_payloads_decode() {
        let msg = ClientMessage::LeaveRoom(LeaveRoomMsg {});
        let encoded = encode_client_message(&msg).unwrap();
        assert_eq!(decode_client_message(&encoded).unwrap(), msg);

        let msg = ServerMessage::PlayPowerUpSound(PlayPowerUpSoundMsg {});
        let encoded = encode_server_message(&msg).unwrap();
        assert_eq!(decode_server_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn cheat_mode_payload() {
        let msg = ClientMessage::CheatMode(CheatModeMsg {
            room_id: "ABCD-1234".to_string(),
            input: CheatInput { cheat: true },
        });
        let encoded = encode_client_message(&msg).unwrap();
        assert_eq!(decode_client_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn lobby_broadcasts_decode() {
        let online = ServerMessage::OnlinePlayers(OnlinePlayersMsg {
            players: vec![RegisteredPlayer {
                connection_id: 7,
                username: "alice".to_string(),
                avatar: "🦸".to_string(),
            }],
        });
        let encoded = encode_server_message(&online).unwrap();
        assert_eq!(decode_server_message(&encoded).unwrap(), online);

        let rooms = ServerMessage::Rooms(RoomsMsg {
            rooms: vec![sample_room()],
        });
        let encoded = encode_server_message(&rooms).unwrap();
        assert_eq!(decode_server_message(&encoded).unwrap(), rooms);
    }

    #[test]
    fn game_over_without_winner() {
        let msg = ServerMessage::GameOver(GameOverMsg {
            room_id: "ABCD-1234".to_string(),
            winner: None,
            player_stats: vec![PlayerStatsEntry {
                username: "alice".to_string(),
                score: 150,
                kills: 1,
                deaths: 1,
                bombs_placed: 4,
                alive: false,
            }],
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert_eq!(decode_server_message(&encoded).unwrap(), msg);
    }

    #[test]
    fn server_message_is_not_a_client_message() {
        let encoded = encode_server_message(&ServerMessage::RoomCreated(RoomCreatedMsg {
            room: sample_room(),
        }))
        .unwrap();
        assert!(matches!(
            decode_client_message(&encoded),
            Err(ProtocolError::UnknownMessageType(0x12))
        ));
        assert!(MessageType::RoomCreated.is_server_only());
        assert!(!MessageType::PlaceBomb.is_server_only());
    }

    #[test]
    fn empty_and_unknown_input() {
        assert!(matches!(
            decode_message_type(&[]),
            Err(ProtocolError::EmptyMessage)
        ));
        assert!(matches!(
            decode_message_type(&[0xFF]),
            Err(ProtocolError::UnknownMessageType(0xFF))
        ));
    }

    #[test]
    fn truncated_payload_is_deserialize_error() {
        let msg = ClientMessage::Register(RegisterMsg {
            username: "alice".to_string(),
            avatar: "🦸".to_string(),
        });
        let encoded = encode_client_message(&msg).unwrap();
        let truncated = &encoded[..encoded.len() - 3];
        assert!(matches!(
            decode_client_message(truncated),
            Err(ProtocolError::DeserializeError(_))
        ));
    }

    #[test]
    fn oversized_payload_rejected() {
        let msg = ServerMessage::GameStateUpdate(GameStateUpdateMsg {
            tick: 1,
            state_data: vec![0u8; MAX_MESSAGE_SIZE],
        });
        assert!(matches!(
            encode_server_message(&msg),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }
}
