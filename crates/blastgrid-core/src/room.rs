use rand::Rng;
use serde::{Deserialize, Serialize};

/// Room identifier, formatted `ABCD-1234`.
pub type RoomId = String;

/// Default roster capacity when a client does not ask for one.
pub const DEFAULT_MAX_PLAYERS: u8 = 4;

/// Minimum roster size for a match to start.
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Lifecycle of the match attached to a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    Waiting,
    Starting,
    Running,
    Ended,
}

impl MatchPhase {
    pub fn can_transition_to(self, next: MatchPhase) -> bool {
        matches!(
            (self, next),
            (MatchPhase::Waiting, MatchPhase::Starting)
                | (MatchPhase::Starting, MatchPhase::Running)
                | (MatchPhase::Starting, MatchPhase::Waiting)
                | (MatchPhase::Running, MatchPhase::Ended)
        )
    }

    /// Whether the room has left the lobby.
    pub fn is_started(self) -> bool {
        self != MatchPhase::Waiting
    }
}

/// One seat in a room's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub username: String,
    pub avatar: String,
    pub is_ready: bool,
    pub is_host: bool,
}

/// Lobby-facing snapshot of a room. Connection ids are not included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    pub id: RoomId,
    pub name: String,
    pub host: String,
    pub players: Vec<RosterEntry>,
    pub max_players: u8,
    pub started: bool,
}

/// A pre-match room: roster plus host/ready bookkeeping.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub host: String,
    pub max_players: u8,
    pub roster: Vec<RosterEntry>,
    pub phase: MatchPhase,
}

impl Room {
    /// Create a room whose only entry is the host, already ready.
    pub fn new(id: RoomId, name: String, max_players: u8, host: &str, avatar: &str) -> Self {
        Self {
            id,
            name,
            host: host.to_string(),
            max_players,
            roster: vec![RosterEntry {
                username: host.to_string(),
                avatar: avatar.to_string(),
                is_ready: true,
                is_host: true,
            }],
            phase: MatchPhase::Waiting,
        }
    }

    pub fn contains(&self, username: &str) -> bool {
        self.roster.iter().any(|e| e.username == username)
    }

    pub fn is_full(&self) -> bool {
        self.roster.len() >= self.max_players as usize
    }

    pub fn is_started(&self) -> bool {
        self.phase.is_started()
    }

    /// Every seat is ready and there are enough of them to play.
    pub fn can_start(&self) -> bool {
        self.roster.len() >= MIN_PLAYERS_TO_START && self.roster.iter().all(|e| e.is_ready)
    }

    pub fn push_player(&mut self, username: &str, avatar: &str) {
        self.roster.push(RosterEntry {
            username: username.to_string(),
            avatar: avatar.to_string(),
            is_ready: false,
            is_host: false,
        });
    }

    /// Set a player's ready flag. Returns false if the player is not seated.
    pub fn set_ready(&mut self, username: &str, ready: bool) -> bool {
        match self.roster.iter_mut().find(|e| e.username == username) {
            Some(entry) => {
                entry.is_ready = ready;
                true
            },
            None => false,
        }
    }

    /// Remove a player from the roster. If they were host, the first
    /// remaining entry takes over and is forced ready.
    pub fn remove_player(&mut self, username: &str) -> Option<RosterEntry> {
        let idx = self.roster.iter().position(|e| e.username == username)?;
        let removed = self.roster.remove(idx);
        if removed.is_host
            && let Some(next) = self.roster.first_mut()
        {
            next.is_host = true;
            next.is_ready = true;
            self.host = next.username.clone();
        }
        Some(removed)
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    pub fn view(&self) -> RoomView {
        RoomView {
            id: self.id.clone(),
            name: self.name.clone(),
            host: self.host.clone(),
            players: self.roster.clone(),
            max_players: self.max_players,
            started: self.is_started(),
        }
    }
}

/// Generate a random room code like `ABCD-1234`.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    let letters: String = (0..4)
        .map(|_| char::from(b'A' + rng.random_range(0..26u8)))
        .collect();
    let digits: u16 = rng.random_range(0..10_000);
    format!("{letters}-{digits:04}")
}

/// Check that a string has the `ABCD-1234` room code shape.
pub fn is_valid_room_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 9
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4] == b'-'
        && bytes[5..].iter().all(u8::is_ascii_digit)
}
