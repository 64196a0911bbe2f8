pub mod net;
pub mod player;
pub mod room;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::{ConnectionId, DEFAULT_AVATAR, RegisteredPlayer};
    use crate::room::Room;

    /// Create `n` registered players with connection ids starting at 1.
    pub fn make_players(n: usize) -> Vec<RegisteredPlayer> {
        (0..n)
            .map(|i| RegisteredPlayer {
                connection_id: i as ConnectionId + 1,
                username: format!("player{}", i + 1),
                avatar: DEFAULT_AVATAR.to_string(),
            })
            .collect()
    }

    /// A waiting room hosted by `player1` with `n` seated players, all ready.
    pub fn ready_room(n: usize) -> Room {
        let players = make_players(n.max(1));
        let host = &players[0];
        let mut room = Room::new(
            "TEST-0001".to_string(),
            "Test room".to_string(),
            n.max(1) as u8,
            &host.username,
            &host.avatar,
        );
        for p in &players[1..] {
            room.push_player(&p.username, &p.avatar);
            room.set_ready(&p.username, true);
        }
        room
    }
}
