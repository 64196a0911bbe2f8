use serde::{Deserialize, Serialize};

/// Ephemeral identity of a live connection. Never persisted.
pub type ConnectionId = u64;

/// Avatar assigned when a client registers without one.
pub const DEFAULT_AVATAR: &str = "🦸";

/// A connection that has announced a username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredPlayer {
    pub connection_id: ConnectionId,
    pub username: String,
    pub avatar: String,
}

/// Player tint used by clients to render avatars, bombs, and trails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for PlayerColor {
    fn default() -> Self {
        Self::PALETTE[0]
    }
}

impl PlayerColor {
    /// Colors handed out by roster order.
    pub const PALETTE: &[PlayerColor] = &[
        PlayerColor {
            r: 0xe8,
            g: 0x3b,
            b: 0x3b,
        }, // Red
        PlayerColor {
            r: 0x3b,
            g: 0x82,
            b: 0xe8,
        }, // Blue
        PlayerColor {
            r: 0x50,
            g: 0xc8,
            b: 0x78,
        }, // Green
        PlayerColor {
            r: 0xff,
            g: 0xcc,
            b: 0x00,
        }, // Yellow
    ];

    /// Palette color for the given roster position, wrapping around.
    pub fn for_slot(slot: usize) -> Self {
        Self::PALETTE[slot % Self::PALETTE.len()]
    }

    /// CSS-style `#rrggbb` string.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
