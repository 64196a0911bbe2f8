use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use blastgrid_core::net::messages::ClientMessage;
use blastgrid_core::net::protocol::{MAX_MESSAGE_SIZE, decode_client_message, decode_message_type};
use blastgrid_core::player::ConnectionId;

use crate::game_loop::GameCommand;
use crate::room_manager::LobbyError;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (ws_sender, mut ws_receiver) = socket.split();

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    let conn = state.lobby.write().await.connect(tx);
    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, conn).await;

    state.lobby.write().await.disconnect(conn);
    tracing::debug!(connection = conn, "Connection closed");
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    conn: ConnectionId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(connection = conn, "Rate limited");
            continue;
        }
        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let msg_type = match decode_message_type(&data) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(connection = conn, error = %e, "Dropping undecodable frame");
                continue;
            },
        };
        if msg_type.is_server_only() {
            tracing::warn!(connection = conn, ?msg_type, "Rejected server-only message from client");
            continue;
        }

        match decode_client_message(&data) {
            Ok(msg) => dispatch(state, conn, msg).await,
            Err(e) => {
                tracing::debug!(connection = conn, ?msg_type, error = %e, "Malformed payload");
            },
        }
    }
}

/// Apply one client event. Rejections are logged and never answered.
async fn dispatch(state: &AppState, conn: ConnectionId, msg: ClientMessage) {
    let (event, result) = match msg {
        ClientMessage::Register(m) => (
            "register",
            state
                .lobby
                .write()
                .await
                .register(conn, &m.username, &m.avatar),
        ),
        ClientMessage::CreateRoom(m) => (
            "createRoom",
            state
                .lobby
                .write()
                .await
                .create_room(conn, &m.name, m.max_players),
        ),
        ClientMessage::JoinRoom(m) => (
            "joinRoom",
            state.lobby.write().await.join_room(conn, &m.room_id),
        ),
        ClientMessage::LeaveRoom(_) => (
            "leaveRoom",
            state.lobby.write().await.leave_room(conn).map(|_| ()),
        ),
        ClientMessage::ToggleReady(m) => (
            "toggleReady",
            state
                .lobby
                .write()
                .await
                .toggle_ready(conn, &m.room_id, m.is_ready),
        ),
        ClientMessage::HostStartGame(m) => (
            "hostStartGame",
            state
                .lobby
                .write()
                .await
                .start_game(conn, &m.room_id, Arc::clone(&state.lobby)),
        ),
        ClientMessage::ExitGame(m) => (
            "exitGame",
            state.lobby.write().await.exit_game(conn, &m.room_id),
        ),
        ClientMessage::PlayerInput(m) => (
            "playerInput",
            route(state, conn, &m.room_id, |username| GameCommand::Input {
                username,
                input: m.input,
            })
            .await,
        ),
        ClientMessage::PlaceBomb(m) => (
            "placeBomb",
            route(state, conn, &m.room_id, |username| GameCommand::PlaceBomb {
                username,
                x: m.x,
                y: m.y,
            })
            .await,
        ),
        ClientMessage::CheatMode(m) => (
            "cheatMode",
            route(state, conn, &m.room_id, |username| GameCommand::Cheat {
                username,
                cheat: m.input.cheat,
            })
            .await,
        ),
        ClientMessage::Overtime(m) => (
            "overtime",
            route(state, conn, &m.room_id, |username| GameCommand::Overtime { username }).await,
        ),
    };

    if let Err(e) = result {
        tracing::debug!(connection = conn, event, reason = %e, "Ignored client event");
    }
}

async fn route(
    state: &AppState,
    conn: ConnectionId,
    room_id: &str,
    make: impl FnOnce(String) -> GameCommand,
) -> Result<(), LobbyError> {
    state.lobby.read().await.route_command(conn, room_id, make)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_allows_burst_then_blocks() {
        let mut limiter = RateLimiter::new(3.0, 3.0);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_refills_over_time() {
        let mut limiter = RateLimiter::new(2.0, 2.0);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
        tokio::time::advance(std::time::Duration::from_millis(600)).await;
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }
}
