use crate::collision::cell_of;
use crate::grid::{Grid, Tile};
use crate::{Bomb, Explosion, PlayerRuntime, SlotId};

const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Cells reached by one detonation.
#[derive(Debug, Default)]
pub struct Blast {
    /// Every cell that becomes an explosion, centre first.
    pub cells: Vec<(i32, i32)>,
    /// Destructible walls turned to empty by this blast.
    pub destroyed: Vec<(i32, i32)>,
}

/// Burn down every bomb fuse by `dt` and remove the ones that ran out.
pub fn tick_fuses(bombs: &mut Vec<Bomb>, dt: f32) -> Vec<Bomb> {
    for bomb in bombs.iter_mut() {
        bomb.timer -= dt;
    }
    let (expired, live): (Vec<Bomb>, Vec<Bomb>) =
        std::mem::take(bombs).into_iter().partition(|b| b.timer <= 0.0);
    *bombs = live;
    expired
}

/// Age explosion cells and drop the ones that burned out.
pub fn tick_explosions(explosions: &mut Vec<Explosion>, dt: f32) {
    for explosion in explosions.iter_mut() {
        explosion.timer -= dt;
    }
    explosions.retain(|e| e.timer > 0.0);
}

/// Propagate a detonation from `(x, y)`.
///
/// Each of the four rays walks up to `range` cells. A ray stops before an
/// indestructible wall and right after the first destructible wall, which is
/// cleared. Bombs on the path get their fuse cut to `chain_fuse` so they go
/// off on a later tick instead of recursing here.
pub fn propagate(
    grid: &mut Grid,
    bombs: &mut [Bomb],
    x: i32,
    y: i32,
    range: u8,
    chain_fuse: f32,
) -> Blast {
    let mut blast = Blast {
        cells: vec![(x, y)],
        destroyed: Vec::new(),
    };
    shorten_fuses_at(bombs, x, y, chain_fuse);

    for (dx, dy) in DIRECTIONS {
        for step in 1..=i32::from(range) {
            let (cx, cy) = (x + dx * step, y + dy * step);
            match grid.get(cx, cy) {
                None | Some(Tile::Indestructible) => break,
                Some(Tile::Destructible) => {
                    grid.set(cx, cy, Tile::Empty);
                    blast.cells.push((cx, cy));
                    blast.destroyed.push((cx, cy));
                    shorten_fuses_at(bombs, cx, cy, chain_fuse);
                    break;
                },
                Some(Tile::Empty) => {
                    blast.cells.push((cx, cy));
                    shorten_fuses_at(bombs, cx, cy, chain_fuse);
                },
            }
        }
    }
    blast
}

fn shorten_fuses_at(bombs: &mut [Bomb], x: i32, y: i32, fuse: f32) {
    for bomb in bombs.iter_mut().filter(|b| b.x == x && b.y == y) {
        bomb.timer = bomb.timer.min(fuse);
    }
}

/// Players standing in a live explosion: `(victim, bomb owner)`.
/// Invincible and cheating players are skipped.
pub fn find_victims(players: &[PlayerRuntime], explosions: &[Explosion]) -> Vec<(SlotId, SlotId)> {
    players
        .iter()
        .filter(|p| p.alive && !p.invincible && !p.cheated)
        .filter_map(|p| {
            let cell = cell_of(p.x, p.y);
            explosions
                .iter()
                .find(|e| (e.x, e.y) == cell)
                .map(|e| (p.slot, e.owner))
        })
        .collect()
}
