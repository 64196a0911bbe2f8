use blastgrid_core::net::messages::InputVector;

use crate::config::ArenaConfig;
use crate::grid::Grid;
use crate::{Bomb, PlayerRuntime, SlotId};

/// Grid cell a continuous position rounds to.
pub fn cell_of(x: f32, y: f32) -> (i32, i32) {
    (x.round() as i32, y.round() as i32)
}

/// Cells under the four corners of a player's collision box.
pub fn corner_cells(x: f32, y: f32, half_extent: f32) -> [(i32, i32); 4] {
    [
        cell_of(x - half_extent, y - half_extent),
        cell_of(x + half_extent, y - half_extent),
        cell_of(x - half_extent, y + half_extent),
        cell_of(x + half_extent, y + half_extent),
    ]
}

/// Whether any corner of the box centred on `(x, y)` lies in `cell`.
pub fn overlaps_cell(x: f32, y: f32, half_extent: f32, cell: (i32, i32)) -> bool {
    corner_cells(x, y, half_extent).contains(&cell)
}

/// Two positions closer than one tile on both axes.
fn bodies_overlap(ax: f32, ay: f32, bx: f32, by: f32) -> bool {
    (ax - bx).abs() < 1.0 && (ay - by).abs() < 1.0
}

/// Check whether `mover` may stand at `(x, y)`.
///
/// Rejected when the box would overlap another living player, when any
/// corner rounds to a non-empty (or off-board) tile, or when a corner cell
/// holds a bomb the mover is not allowed to pass through. Players already
/// stacked on the mover (shared spawn corners) do not block it, so they can
/// separate.
pub fn can_move_to(
    grid: &Grid,
    players: &[PlayerRuntime],
    bombs: &[Bomb],
    mover: SlotId,
    x: f32,
    y: f32,
    half_extent: f32,
) -> bool {
    let Some(me) = players.get(mover) else {
        return false;
    };

    let blocked_by_player = players.iter().any(|p| {
        p.slot != mover
            && p.alive
            && bodies_overlap(p.x, p.y, x, y)
            && !bodies_overlap(p.x, p.y, me.x, me.y)
    });
    if blocked_by_player {
        return false;
    }

    corner_cells(x, y, half_extent).iter().all(|&(cx, cy)| {
        grid.is_empty(cx, cy)
            && bombs
                .iter()
                .filter(|b| b.x == cx && b.y == cy)
                .all(|b| b.pass_through.contains(&mover))
    })
}

/// Drop `mover` from the pass-through set of every bomb it no longer overlaps.
pub fn release_pass_through(bombs: &mut [Bomb], mover: SlotId, x: f32, y: f32, half_extent: f32) {
    for bomb in bombs.iter_mut() {
        if bomb.pass_through.contains(&mover) && !overlaps_cell(x, y, half_extent, (bomb.x, bomb.y))
        {
            bomb.pass_through.remove(&mover);
        }
    }
}

/// Advance one player by one tick of held input. Axes are resolved
/// independently (x first) so sliding along a wall still works; diagonal
/// input moves at full speed on both axes. Returns whether the player moved.
pub fn step_player(
    grid: &Grid,
    players: &mut [PlayerRuntime],
    bombs: &mut [Bomb],
    mover: SlotId,
    input: &InputVector,
    dt: f32,
    config: &ArenaConfig,
) -> bool {
    let Some(player) = players.get(mover) else {
        return false;
    };
    if !player.alive {
        return false;
    }

    let step = config.move_speed(player.speed) * dt;
    let mut dx = 0.0;
    let mut dy = 0.0;
    if input.left {
        dx -= step;
    }
    if input.right {
        dx += step;
    }
    if input.up {
        dy -= step;
    }
    if input.down {
        dy += step;
    }

    let he = config.half_extent;
    let (mut x, mut y) = (player.x, player.y);
    let mut moved = false;
    if dx != 0.0 && can_move_to(grid, players, bombs, mover, x + dx, y, he) {
        x += dx;
        moved = true;
    }
    if dy != 0.0 && can_move_to(grid, players, bombs, mover, x, y + dy, he) {
        y += dy;
        moved = true;
    }

    if moved {
        let player = &mut players[mover];
        player.x = x;
        player.y = y;
        release_pass_through(bombs, mover, x, y, he);
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Tile;
    use crate::test_support::{bomb_at, runtime_at};
    use std::collections::HashSet;

    const HE: f32 = 0.47;

    #[test]
    fn corners_round_to_own_cell_when_centred() {
        assert_eq!(corner_cells(3.0, 3.0, HE), [(3, 3); 4]);
    }

    #[test]
    fn corners_straddle_when_between_cells() {
        let cells = corner_cells(3.5, 3.0, HE);
        assert!(cells.contains(&(3, 3)));
        assert!(cells.contains(&(4, 3)));
    }

    #[test]
    fn walls_block_movement() {
        let grid = Grid::walls_only();
        let players = vec![runtime_at(0, 1.0, 1.0)];
        // (0, 1) is the border
        assert!(!can_move_to(&grid, &players, &[], 0, 0.9, 1.0, HE));
        // (2, 2) is a pillar
        assert!(!can_move_to(&grid, &players, &[], 0, 1.6, 1.6, HE));
        assert!(can_move_to(&grid, &players, &[], 0, 1.2, 1.0, HE));
    }

    #[test]
    fn destructible_walls_block_movement() {
        let mut grid = Grid::walls_only();
        grid.set(3, 1, Tile::Destructible);
        let players = vec![runtime_at(0, 2.0, 1.0)];
        assert!(!can_move_to(&grid, &players, &[], 0, 2.6, 1.0, HE));
    }

    #[test]
    fn living_players_block_each_other() {
        let grid = Grid::walls_only();
        let mut players = vec![runtime_at(0, 1.0, 1.0), runtime_at(1, 3.0, 1.0)];
        assert!(!can_move_to(&grid, &players, &[], 0, 2.1, 1.0, HE));
        players[1].alive = false;
        assert!(can_move_to(&grid, &players, &[], 0, 2.1, 1.0, HE));
    }

    #[test]
    fn stacked_players_can_separate() {
        let grid = Grid::walls_only();
        let players = vec![runtime_at(0, 1.0, 1.0), runtime_at(1, 1.0, 1.0)];
        assert!(can_move_to(&grid, &players, &[], 0, 1.05, 1.0, HE));
    }

    #[test]
    fn bomb_blocks_unless_in_pass_through() {
        let grid = Grid::walls_only();
        let players = vec![runtime_at(0, 1.0, 1.0), runtime_at(1, 5.0, 1.0)];
        let mut bomb = bomb_at(3, 1, 1);
        bomb.pass_through = HashSet::from([1]);
        let bombs = vec![bomb];
        assert!(!can_move_to(&grid, &players, &bombs, 0, 2.6, 1.0, HE));
        assert!(can_move_to(&grid, &players, &bombs, 1, 3.4, 1.0, HE));
    }

    #[test]
    fn horizontal_blocked_does_not_stop_vertical() {
        let grid = Grid::walls_only();
        let cfg = ArenaConfig::default();
        // Against the left border, pressing left+down: only y changes.
        let mut players = vec![runtime_at(0, 1.0, 1.0)];
        let input = InputVector {
            left: true,
            down: true,
            ..InputVector::default()
        };
        let moved = step_player(&grid, &mut players, &mut [], 0, &input, 0.05, &cfg);
        assert!(moved);
        assert_eq!(players[0].x, 1.0);
        assert!(players[0].y > 1.0);
    }

    #[test]
    fn diagonal_input_is_not_normalized() {
        let grid = Grid::walls_only();
        let cfg = ArenaConfig::default();
        let mut players = vec![runtime_at(0, 3.0, 3.0)];
        let input = InputVector {
            right: true,
            down: true,
            ..InputVector::default()
        };
        // Small enough that no corner reaches the (4, 4) pillar.
        step_player(&grid, &mut players, &mut [], 0, &input, 0.005, &cfg);
        let per_axis = cfg.move_speed(1) * 0.005;
        assert!((players[0].x - (3.0 + per_axis)).abs() < 1e-5);
        assert!((players[0].y - (3.0 + per_axis)).abs() < 1e-5);
    }

    #[test]
    fn leaving_bomb_cell_revokes_pass_through() {
        let grid = Grid::walls_only();
        let cfg = ArenaConfig::default();
        let mut players = vec![runtime_at(0, 3.0, 1.0)];
        let mut bomb = bomb_at(3, 1, 0);
        bomb.pass_through = HashSet::from([0]);
        let mut bombs = vec![bomb];
        let input = InputVector {
            right: true,
            ..InputVector::default()
        };

        // Walk right until no corner touches (3, 1).
        for _ in 0..40 {
            step_player(&grid, &mut players, &mut bombs, 0, &input, 0.02, &cfg);
        }
        assert!(players[0].x > 3.6);
        assert!(bombs[0].pass_through.is_empty());

        // Walking back is now blocked at the bomb's edge.
        let back = InputVector {
            left: true,
            ..InputVector::default()
        };
        for _ in 0..40 {
            step_player(&grid, &mut players, &mut bombs, 0, &back, 0.02, &cfg);
        }
        assert!(players[0].x >= 3.5, "re-entered bomb cell at x={}", players[0].x);
    }

    #[test]
    fn dead_players_do_not_move() {
        let grid = Grid::walls_only();
        let cfg = ArenaConfig::default();
        let mut players = vec![runtime_at(0, 1.0, 1.0)];
        players[0].alive = false;
        let input = InputVector {
            right: true,
            ..InputVector::default()
        };
        assert!(!step_player(&grid, &mut players, &mut [], 0, &input, 0.1, &cfg));
        assert_eq!(players[0].x, 1.0);
    }
}
