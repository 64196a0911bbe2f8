use crate::{PlayerRuntime, SlotId};

/// Points for killing another player with your bomb.
pub const KILL_POINTS: u32 = 100;
/// Points for picking up a power-up.
pub const POWER_UP_POINTS: u32 = 50;
/// Bonus for the match winner.
pub const WIN_BONUS: u32 = 500;

/// Choose the winner among living players.
///
/// A sole survivor wins outright. Otherwise the highest score among the
/// living wins, ties going to the earliest roster slot. No living players
/// means no winner.
pub fn pick_winner(players: &[PlayerRuntime]) -> Option<SlotId> {
    players
        .iter()
        .filter(|p| p.alive)
        .fold(None::<&PlayerRuntime>, |best, p| match best {
            Some(b) if b.score >= p.score => Some(b),
            _ => Some(p),
        })
        .map(|p| p.slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::runtime_at;

    #[test]
    fn sole_survivor_wins_regardless_of_score() {
        let mut players = vec![runtime_at(0, 1.0, 1.0), runtime_at(1, 13.0, 1.0)];
        players[0].score = 900;
        players[0].alive = false;
        assert_eq!(pick_winner(&players), Some(1));
    }

    #[test]
    fn highest_living_score_wins() {
        let mut players = vec![
            runtime_at(0, 1.0, 1.0),
            runtime_at(1, 13.0, 1.0),
            runtime_at(2, 1.0, 11.0),
        ];
        players[0].score = 50;
        players[1].score = 150;
        players[2].score = 400;
        players[2].alive = false;
        assert_eq!(pick_winner(&players), Some(1));
    }

    #[test]
    fn ties_go_to_earliest_slot() {
        let mut players = vec![runtime_at(0, 1.0, 1.0), runtime_at(1, 13.0, 1.0)];
        players[0].score = 100;
        players[1].score = 100;
        assert_eq!(pick_winner(&players), Some(0));
    }

    #[test]
    fn nobody_alive_means_no_winner() {
        let mut players = vec![runtime_at(0, 1.0, 1.0), runtime_at(1, 13.0, 1.0)];
        players.iter_mut().for_each(|p| p.alive = false);
        assert_eq!(pick_winner(&players), None);
    }
}
