use rand::Rng;
use serde::{Deserialize, Serialize};

/// Board width in tiles.
pub const GRID_WIDTH: i32 = 15;
/// Board height in tiles.
pub const GRID_HEIGHT: i32 = 13;

/// Fixed corner spawns, assigned by roster order modulo 4.
pub const SPAWN_POINTS: [(i32, i32); 4] = [(1, 1), (13, 1), (1, 11), (13, 11)];

/// Tile codes as sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tile {
    Empty = 0,
    Indestructible = 1,
    Destructible = 2,
}

/// The 15x13 board, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    tiles: Vec<Tile>,
}

impl Grid {
    /// A board with only the fixed walls: border and even/even pillars.
    pub fn walls_only() -> Self {
        let mut tiles = Vec::with_capacity((GRID_WIDTH * GRID_HEIGHT) as usize);
        for y in 0..GRID_HEIGHT {
            for x in 0..GRID_WIDTH {
                tiles.push(if is_fixed_wall(x, y) {
                    Tile::Indestructible
                } else {
                    Tile::Empty
                });
            }
        }
        Self { tiles }
    }

    /// Generate a fresh board. Each free interior cell becomes destructible
    /// with `destructible_chance`, except the spawn corners which stay clear.
    pub fn generate(rng: &mut impl Rng, destructible_chance: f64) -> Self {
        let mut grid = Self::walls_only();
        for y in 1..GRID_HEIGHT - 1 {
            for x in 1..GRID_WIDTH - 1 {
                if is_fixed_wall(x, y) || is_spawn_zone(x, y) {
                    continue;
                }
                if rng.random_bool(destructible_chance) {
                    grid.set(x, y, Tile::Destructible);
                }
            }
        }
        grid
    }

    fn index(x: i32, y: i32) -> Option<usize> {
        if (0..GRID_WIDTH).contains(&x) && (0..GRID_HEIGHT).contains(&y) {
            Some((y * GRID_WIDTH + x) as usize)
        } else {
            None
        }
    }

    /// Tile at a cell, or `None` off the board.
    pub fn get(&self, x: i32, y: i32) -> Option<Tile> {
        Self::index(x, y).map(|i| self.tiles[i])
    }

    pub fn set(&mut self, x: i32, y: i32, tile: Tile) {
        if let Some(i) = Self::index(x, y) {
            self.tiles[i] = tile;
        }
    }

    pub fn is_empty(&self, x: i32, y: i32) -> bool {
        self.get(x, y) == Some(Tile::Empty)
    }

    /// All cells currently holding `tile`.
    pub fn cells_of(&self, tile: Tile) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .filter(move |(_, t)| **t == tile)
            .map(|(i, _)| (i as i32 % GRID_WIDTH, i as i32 / GRID_WIDTH))
    }

    /// Rows of tile codes, `rows[y][x]`.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.tiles
            .chunks(GRID_WIDTH as usize)
            .map(|row| row.iter().map(|t| *t as u8).collect())
            .collect()
    }
}

/// Border cells and cells with both coordinates even.
pub fn is_fixed_wall(x: i32, y: i32) -> bool {
    x == 0 || y == 0 || x == GRID_WIDTH - 1 || y == GRID_HEIGHT - 1 || (x % 2 == 0 && y % 2 == 0)
}

/// A spawn corner or one of its 8 neighbours.
pub fn is_spawn_zone(x: i32, y: i32) -> bool {
    SPAWN_POINTS
        .iter()
        .any(|&(sx, sy)| (x - sx).abs() <= 1 && (y - sy).abs() <= 1)
}

/// Spawn coordinates for a roster position.
pub fn spawn_point(slot: usize) -> (i32, i32) {
    SPAWN_POINTS[slot % SPAWN_POINTS.len()]
}
