#[allow(dead_code)]
mod common;

use std::time::Duration;

use blastgrid_arena::GameStateView;
use blastgrid_core::net::messages::{
    ClientMessage, ExitGameMsg, InputVector, OvertimeMsg, PlaceBombMsg, PlayerInputMsg,
    ServerMessage,
};
use common::{
    TestServer, start_two_player_match, ws_connect, ws_join_room, ws_read_until, ws_register,
    ws_send_client_msg, ws_try_read_raw,
};

fn decode_state(data: &[u8]) -> GameStateView {
    rmp_serde::from_slice(data).unwrap()
}

#[tokio::test]
async fn started_match_streams_state() {
    let server = TestServer::new().await;
    let (mut host, _guest, room_id) = start_two_player_match(&server).await;

    let msg = ws_read_until(&mut host, |m| matches!(m, ServerMessage::GameStateUpdate(_))).await;
    let ServerMessage::GameStateUpdate(update) = msg else {
        unreachable!()
    };
    let view = decode_state(&update.state_data);
    assert_eq!(view.players.len(), 2);
    assert_eq!(view.map.len(), 13);
    assert_eq!(view.map[0].len(), 15);
    assert_eq!(view.players[0].color, "#e83b3b");
    assert!(!view.ended);

    // A started room no longer accepts joins.
    let mut late = ws_connect(&server.ws_url()).await;
    let rooms = ws_register(&mut late, "carol").await;
    let room = rooms.iter().find(|r| r.id == room_id).unwrap();
    assert!(room.started);
    ws_join_room(&mut late, &room_id).await;
    assert!(ws_try_read_raw(&mut late, 200).await.is_none());
}

#[tokio::test]
async fn input_moves_player() {
    let server = TestServer::new().await;
    let (mut host, _guest, room_id) = start_two_player_match(&server).await;

    // Slot 0 spawns at (1,1) with an open corridor to the right.
    let input = ClientMessage::PlayerInput(PlayerInputMsg {
        room_id: room_id.clone(),
        input: InputVector {
            right: true,
            ..InputVector::default()
        },
    });
    let mut moved = false;
    for _ in 0..60 {
        ws_send_client_msg(&mut host, &input).await;
        let msg =
            ws_read_until(&mut host, |m| matches!(m, ServerMessage::GameStateUpdate(_))).await;
        if let ServerMessage::GameStateUpdate(update) = msg
            && decode_state(&update.state_data).players[0].x > 1.0
        {
            moved = true;
            break;
        }
    }
    assert!(moved, "player never moved right");
}

#[tokio::test]
async fn bomb_appears_in_state() {
    let server = TestServer::new().await;
    let (mut host, _guest, room_id) = start_two_player_match(&server).await;

    let msg = ClientMessage::PlaceBomb(PlaceBombMsg {
        room_id,
        x: 1.0,
        y: 1.0,
    });
    ws_send_client_msg(&mut host, &msg).await;

    let msg = ws_read_until(&mut host, |m| {
        matches!(m, ServerMessage::GameStateUpdate(u) if !decode_state(&u.state_data).bombs.is_empty())
    })
    .await;
    if let ServerMessage::GameStateUpdate(update) = msg {
        let view = decode_state(&update.state_data);
        assert_eq!(view.bombs[0].owner, "alice");
        assert_eq!((view.bombs[0].x, view.bombs[0].y), (1, 1));
        assert_eq!(view.players[0].bombs_placed, 1);
    }
}

#[tokio::test]
async fn overtime_ends_match_and_closes_room() {
    let server = TestServer::new().await;
    let (mut host, mut guest, room_id) = start_two_player_match(&server).await;

    ws_send_client_msg(
        &mut guest,
        &ClientMessage::Overtime(OvertimeMsg {
            room_id: room_id.clone(),
        }),
    )
    .await;

    let final_state = ws_read_until(&mut host, |m| {
        matches!(m, ServerMessage::GameStateUpdate(u) if decode_state(&u.state_data).ended)
    })
    .await;
    assert!(matches!(final_state, ServerMessage::GameStateUpdate(_)));

    let over = ws_read_server_msg_game_over(&mut host).await;
    assert_eq!(over.room_id, room_id);
    assert_eq!(over.winner.as_deref(), Some("alice"));
    assert_eq!(over.player_stats.len(), 2);
    let winner = over
        .player_stats
        .iter()
        .find(|s| s.username == "alice")
        .unwrap();
    assert_eq!(winner.score, 500);

    ws_read_until(&mut guest, |m| {
        matches!(m, ServerMessage::Rooms(r) if r.rooms.iter().all(|r| r.id != room_id))
    })
    .await;
}

#[tokio::test]
async fn exit_hands_win_to_opponent_and_records_stats() {
    let server = TestServer::new().await;
    let (mut host, mut guest, room_id) = start_two_player_match(&server).await;

    ws_send_client_msg(
        &mut host,
        &ClientMessage::ExitGame(ExitGameMsg {
            room_id: room_id.clone(),
        }),
    )
    .await;

    let over = ws_read_server_msg_game_over(&mut guest).await;
    assert_eq!(over.winner.as_deref(), Some("bob"));

    // The exiting player is no longer in the room's fan-out.
    loop {
        match ws_try_read_raw(&mut host, 300).await {
            Some(data) => {
                let msg = blastgrid_core::net::protocol::decode_server_message(&data).unwrap();
                assert!(!matches!(msg, ServerMessage::GameOver(_)));
            },
            None => break,
        }
    }

    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/players/bob/stats", server.base_url());
    let mut stats = None;
    for _ in 0..50 {
        let resp = client.get(&url).send().await.unwrap();
        if resp.status() == 200 {
            stats = Some(resp.json::<serde_json::Value>().await.unwrap());
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let stats = stats.expect("bob's result was never recorded");
    assert_eq!(stats["games_played"], 1);
    assert_eq!(stats["wins"], 1);
}

#[tokio::test]
async fn disconnect_mid_match_ends_it() {
    let server = TestServer::new().await;
    let (host, mut guest, _room_id) = start_two_player_match(&server).await;

    drop(host);

    let over = ws_read_server_msg_game_over(&mut guest).await;
    assert_eq!(over.winner.as_deref(), Some("bob"));
    let leaver = over
        .player_stats
        .iter()
        .find(|s| s.username == "alice")
        .unwrap();
    assert!(!leaver.alive);
    assert_eq!(leaver.deaths, 0);
}

async fn ws_read_server_msg_game_over(
    stream: &mut common::WsStream,
) -> blastgrid_core::net::messages::GameOverMsg {
    match ws_read_until(stream, |m| matches!(m, ServerMessage::GameOver(_))).await {
        ServerMessage::GameOver(over) => over,
        _ => unreachable!(),
    }
}
