use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc;

use blastgrid_core::net::messages::ServerMessage;
use blastgrid_core::net::protocol::encode_server_message;
use blastgrid_core::player::{ConnectionId, RegisteredPlayer};

/// Per-connection sender for outbound WebSocket binary messages.
/// Bounded so a slow client cannot exhaust memory; sends use `try_send`.
pub type PlayerSender = mpsc::Sender<Bytes>;

struct Connection {
    sender: PlayerSender,
    player: Option<RegisteredPlayer>,
}

/// Every live connection and, once registered, who is behind it.
pub struct PresenceRegistry {
    connections: HashMap<ConnectionId, Connection>,
    next_id: ConnectionId,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            next_id: 1,
        }
    }

    /// Track a new connection. It stays anonymous until it registers.
    pub fn connect(&mut self, sender: PlayerSender) -> ConnectionId {
        let id = self.next_id;
        self.next_id += 1;
        self.connections.insert(
            id,
            Connection {
                sender,
                player: None,
            },
        );
        id
    }

    /// Attach an identity to a connection. Returns `false` when the
    /// connection is unknown or already registered; the first registration
    /// wins.
    pub fn register(&mut self, conn: ConnectionId, username: String, avatar: String) -> bool {
        let Some(entry) = self.connections.get_mut(&conn) else {
            return false;
        };
        if entry.player.is_some() {
            return false;
        }
        entry.player = Some(RegisteredPlayer {
            connection_id: conn,
            username,
            avatar,
        });
        true
    }

    /// Forget a connection, returning its identity if it had one.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Option<RegisteredPlayer> {
        self.connections.remove(&conn).and_then(|c| c.player)
    }

    pub fn player(&self, conn: ConnectionId) -> Option<&RegisteredPlayer> {
        self.connections.get(&conn).and_then(|c| c.player.as_ref())
    }

    pub fn sender(&self, conn: ConnectionId) -> Option<&PlayerSender> {
        self.connections.get(&conn).map(|c| &c.sender)
    }

    /// Registered players ordered by connection id.
    pub fn online_players(&self) -> Vec<RegisteredPlayer> {
        let mut players: Vec<RegisteredPlayer> = self
            .connections
            .values()
            .filter_map(|c| c.player.clone())
            .collect();
        players.sort_by_key(|p| p.connection_id);
        players
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn registered_count(&self) -> usize {
        self.connections
            .values()
            .filter(|c| c.player.is_some())
            .count()
    }

    /// Send pre-encoded bytes to one connection.
    pub fn send_to(&self, conn: ConnectionId, data: Bytes) {
        if let Some(c) = self.connections.get(&conn)
            && let Err(e) = c.sender.try_send(data)
        {
            tracing::debug!(
                connection = conn, error = %e,
                "Failed to send to connection (slow or disconnected)"
            );
        }
    }

    /// Encode and send a message to one connection.
    pub fn send_message(&self, conn: ConnectionId, msg: &ServerMessage) {
        match encode_server_message(msg) {
            Ok(data) => self.send_to(conn, Bytes::from(data)),
            Err(e) => tracing::error!(connection = conn, error = %e, "Failed to encode message"),
        }
    }

    /// Encode once and send to every live connection.
    pub fn broadcast(&self, msg: &ServerMessage) {
        let data = match encode_server_message(msg) {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode broadcast");
                return;
            },
        };
        for (&conn, c) in &self.connections {
            if let Err(e) = c.sender.try_send(data.clone()) {
                tracing::debug!(
                    connection = conn, error = %e,
                    "Skipping broadcast to slow client"
                );
            }
        }
    }
}
