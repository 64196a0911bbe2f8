//! Match result recording.
//!
//! The tick loop hands finished matches to a [`MatchRecorder`] on the
//! blocking pool and never waits for it. [`InMemoryStats`] is the recorder
//! the server ships with; it also backs the leaderboard endpoints.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Stat change for one participant of a finished match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    /// 1 for the winner, 0 for everyone else.
    pub won_delta: u32,
}

impl MatchResult {
    pub fn new(won: bool) -> Self {
        Self {
            won_delta: u32::from(won),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    InvalidUsername,
    Storage(String),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUsername => write!(f, "username is empty"),
            Self::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for RecordError {}

/// Sink for finished-match results. Called once per participant with
/// `games_played += 1` and `wins += won_delta` semantics. Implementations
/// may block.
pub trait MatchRecorder: Send + Sync {
    fn record_match_result(&self, username: &str, result: MatchResult) -> Result<(), RecordError>;
}

/// Lifetime stats for one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStats {
    pub username: String,
    pub games_played: u32,
    pub wins: u32,
    /// Percentage of games won.
    pub win_rate: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    games_played: u32,
    wins: u32,
}

impl Tally {
    fn to_stats(self, username: &str) -> PlayerStats {
        let win_rate = if self.games_played == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.games_played) * 100.0
        };
        PlayerStats {
            username: username.to_string(),
            games_played: self.games_played,
            wins: self.wins,
            win_rate,
        }
    }
}

/// Process-local stats store.
#[derive(Debug, Default)]
pub struct InMemoryStats {
    players: Mutex<HashMap<String, Tally>>,
}

impl InMemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self, username: &str) -> Option<PlayerStats> {
        let players = self.players.lock().unwrap_or_else(PoisonError::into_inner);
        players.get(username).map(|t| t.to_stats(username))
    }

    /// Best players by wins, then win rate, then games played.
    pub fn leaderboard(&self, limit: usize) -> Vec<PlayerStats> {
        let mut all: Vec<PlayerStats> = {
            let players = self.players.lock().unwrap_or_else(PoisonError::into_inner);
            players.iter().map(|(name, t)| t.to_stats(name)).collect()
        };
        all.sort_by(|a, b| {
            b.wins
                .cmp(&a.wins)
                .then(b.win_rate.total_cmp(&a.win_rate))
                .then(b.games_played.cmp(&a.games_played))
                .then_with(|| a.username.cmp(&b.username))
        });
        all.truncate(limit);
        all
    }
}

impl MatchRecorder for InMemoryStats {
    fn record_match_result(&self, username: &str, result: MatchResult) -> Result<(), RecordError> {
        if username.is_empty() {
            return Err(RecordError::InvalidUsername);
        }
        let mut players = self.players.lock().unwrap_or_else(PoisonError::into_inner);
        let tally = players.entry(username.to_string()).or_default();
        tally.games_played += 1;
        tally.wins += result.won_delta;
        Ok(())
    }
}
