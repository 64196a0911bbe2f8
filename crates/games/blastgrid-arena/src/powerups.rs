use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::PlayerRuntime;
use crate::config::ArenaConfig;
use crate::grid::{Grid, Tile, is_spawn_zone};

/// Power-up kinds, serialized with the client's short names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerUpKind {
    Speed,
    Range,
    Bombs,
    Inv,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 4] = [Self::Speed, Self::Range, Self::Bombs, Self::Inv];

    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

/// A power-up lying on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerUp {
    pub x: i32,
    pub y: i32,
    pub kind: PowerUpKind,
    pub collected: bool,
}

/// Scatter up to `count` power-ups over distinct empty cells outside the
/// spawn corners.
pub fn seed_power_ups(grid: &Grid, rng: &mut impl Rng, count: usize) -> Vec<PowerUp> {
    let mut cells: Vec<(i32, i32)> = grid
        .cells_of(Tile::Empty)
        .filter(|&(x, y)| !is_spawn_zone(x, y))
        .collect();
    cells.shuffle(rng);
    cells
        .into_iter()
        .take(count)
        .map(|(x, y)| PowerUp {
            x,
            y,
            kind: PowerUpKind::random(rng),
            collected: false,
        })
        .collect()
}

/// Roll the drop chance for a freshly destroyed wall.
pub fn roll_drop(rng: &mut impl Rng, x: i32, y: i32, chance: f64) -> Option<PowerUp> {
    rng.random_bool(chance).then(|| PowerUp {
        x,
        y,
        kind: PowerUpKind::random(rng),
        collected: false,
    })
}

/// Apply a collected power-up to a player.
pub fn apply_power_up(player: &mut PlayerRuntime, kind: PowerUpKind, config: &ArenaConfig) {
    let cap = config.stat_cap;
    match kind {
        PowerUpKind::Speed => player.speed = (player.speed + 1).min(cap),
        PowerUpKind::Range => player.blast_range = (player.blast_range + 1).min(cap),
        PowerUpKind::Bombs => player.max_bombs = (player.max_bombs + 1).min(cap),
        PowerUpKind::Inv => {
            player.invincible = true;
            player.invincible_remaining = config.invincibility_secs;
        },
    }
}

/// Count down invincibility and clear it when it runs out.
pub fn tick_invincibility(player: &mut PlayerRuntime, dt: f32) {
    if player.invincible {
        player.invincible_remaining -= dt;
        if player.invincible_remaining <= 0.0 {
            player.invincible = false;
            player.invincible_remaining = 0.0;
        }
    }
}
