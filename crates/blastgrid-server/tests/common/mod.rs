use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use blastgrid_arena::config::ArenaConfig;
use blastgrid_core::net::messages::{
    ClientMessage, CreateRoomMsg, HostStartGameMsg, JoinRoomMsg, RegisterMsg, ServerMessage,
    ToggleReadyMsg,
};
use blastgrid_core::net::protocol::{decode_server_message, encode_client_message};
use blastgrid_core::room::{RoomId, RoomView};

use blastgrid_server::build_app;
use blastgrid_server::config::ServerConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config, ArenaConfig::default());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a ClientMessage from a WS stream.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read raw binary data, returning None on timeout.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<Vec<u8>> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Skip messages until one matches `pred`. Lobby broadcasts interleave
/// freely, so most assertions go through here.
pub async fn ws_read_until(
    stream: &mut WsStream,
    mut pred: impl FnMut(&ServerMessage) -> bool,
) -> ServerMessage {
    for _ in 0..2000 {
        let msg = ws_read_server_msg(stream).await;
        if pred(&msg) {
            return msg;
        }
    }
    panic!("Expected message never arrived");
}

/// Register and consume the `onlinePlayers` + `rooms` pair it triggers.
/// Returns the room list from that pair.
pub async fn ws_register(stream: &mut WsStream, username: &str) -> Vec<RoomView> {
    let msg = ClientMessage::Register(RegisterMsg {
        username: username.to_string(),
        avatar: "🦸".to_string(),
    });
    ws_send_client_msg(stream, &msg).await;
    ws_read_until(stream, |m| {
        matches!(m, ServerMessage::OnlinePlayers(p)
            if p.players.iter().any(|p| p.username == username))
    })
    .await;
    match ws_read_until(stream, |m| matches!(m, ServerMessage::Rooms(_))).await {
        ServerMessage::Rooms(r) => r.rooms,
        _ => unreachable!(),
    }
}

/// Connect and register in one step.
pub async fn ws_player(server: &TestServer, username: &str) -> WsStream {
    let mut stream = ws_connect(&server.ws_url()).await;
    ws_register(&mut stream, username).await;
    stream
}

/// Create a room and return its view from `roomCreated`.
pub async fn ws_create_room(stream: &mut WsStream, name: &str, max_players: u8) -> RoomView {
    let msg = ClientMessage::CreateRoom(CreateRoomMsg {
        name: name.to_string(),
        max_players,
    });
    ws_send_client_msg(stream, &msg).await;
    match ws_read_until(stream, |m| matches!(m, ServerMessage::RoomCreated(_))).await {
        ServerMessage::RoomCreated(created) => created.room,
        _ => unreachable!(),
    }
}

pub async fn ws_join_room(stream: &mut WsStream, room_id: &str) {
    let msg = ClientMessage::JoinRoom(JoinRoomMsg {
        room_id: room_id.to_string(),
    });
    ws_send_client_msg(stream, &msg).await;
}

pub async fn ws_toggle_ready(stream: &mut WsStream, room_id: &str, is_ready: bool) {
    let msg = ClientMessage::ToggleReady(ToggleReadyMsg {
        room_id: room_id.to_string(),
        is_ready,
    });
    ws_send_client_msg(stream, &msg).await;
}

pub async fn ws_start_game(stream: &mut WsStream, room_id: &str) {
    let msg = ClientMessage::HostStartGame(HostStartGameMsg {
        room_id: room_id.to_string(),
    });
    ws_send_client_msg(stream, &msg).await;
}

/// Wait for a `rooms` broadcast whose entry for `room_id` satisfies `pred`.
pub async fn ws_wait_for_room(
    stream: &mut WsStream,
    room_id: &str,
    mut pred: impl FnMut(&RoomView) -> bool,
) -> RoomView {
    match ws_read_until(stream, |m| {
        matches!(m, ServerMessage::Rooms(r)
            if r.rooms.iter().any(|room| room.id == room_id && pred(room)))
    })
    .await
    {
        ServerMessage::Rooms(r) => r.rooms.into_iter().find(|room| room.id == room_id).unwrap(),
        _ => unreachable!(),
    }
}

/// Two registered players, seated and ready, match started.
/// Returns (host, guest, room_id) after both have seen `startGame`.
pub async fn start_two_player_match(server: &TestServer) -> (WsStream, WsStream, RoomId) {
    let mut host = ws_player(server, "alice").await;
    let mut guest = ws_player(server, "bob").await;
    let room = ws_create_room(&mut host, "Arena", 2).await;

    ws_join_room(&mut guest, &room.id).await;
    ws_wait_for_room(&mut guest, &room.id, |r| r.players.len() == 2).await;
    ws_toggle_ready(&mut guest, &room.id, true).await;
    ws_wait_for_room(&mut host, &room.id, |r| r.players.iter().all(|p| p.is_ready)).await;

    ws_start_game(&mut host, &room.id).await;
    for stream in [&mut host, &mut guest] {
        ws_read_until(stream, |m| matches!(m, ServerMessage::StartGame(_))).await;
    }
    (host, guest, room.id)
}
