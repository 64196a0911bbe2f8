use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use blastgrid_arena::config::ArenaConfig;
use blastgrid_arena::{ArenaMatch, MatchOutcome};
use blastgrid_core::net::messages::{
    GameOverMsg, GameStateUpdateMsg, InputVector, PlayPowerUpSoundMsg, ServerMessage,
    StartGameMsg,
};
use blastgrid_core::net::protocol::encode_server_message;
use blastgrid_core::room::{RoomId, RosterEntry};

use crate::persistence::{MatchRecorder, MatchResult};

/// Upper bound on the simulated step after a stalled tick.
const MAX_TICK_DT: f32 = 0.1;

/// Commands sent from the WebSocket handlers to a room's tick loop.
#[derive(Debug)]
pub enum GameCommand {
    Input { username: String, input: InputVector },
    PlaceBomb { username: String, x: f32, y: f32 },
    Cheat { username: String, cheat: bool },
    Exit { username: String },
    Disconnect { username: String },
    Overtime { username: String },
}

/// Output of the tick loop, fanned out by the room's forwarder.
#[derive(Debug, Clone)]
pub enum GameBroadcast {
    /// Encoded `ServerMessage` for everyone in the room.
    Room(Bytes),
    /// Encoded `ServerMessage` for one player only.
    Player { username: String, data: Bytes },
    /// The loop has exited.
    GameEnded,
}

/// Configuration for a match spawned by the server.
pub struct GameSessionConfig {
    pub room_id: RoomId,
    pub roster: Vec<RosterEntry>,
    pub tick_rate_hz: u32,
    pub match_duration: Option<Duration>,
    pub arena: ArenaConfig,
    pub recorder: Arc<dyn MatchRecorder>,
    /// Fixed board seed; random when `None`.
    pub seed: Option<u64>,
}

/// Spawn a match tick loop as a tokio task.
/// Returns the command sender, broadcast receiver and task handle.
pub fn spawn_game_session(
    config: GameSessionConfig,
    cancel: CancellationToken,
) -> (
    mpsc::UnboundedSender<GameCommand>,
    mpsc::UnboundedReceiver<GameBroadcast>,
    JoinHandle<()>,
) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        run_game_tick_loop(config, cancel, cmd_rx, broadcast_tx).await;
    });

    (cmd_tx, broadcast_rx, handle)
}

/// The server-authoritative tick loop for one room.
async fn run_game_tick_loop(
    config: GameSessionConfig,
    cancel: CancellationToken,
    mut cmd_rx: mpsc::UnboundedReceiver<GameCommand>,
    broadcast_tx: mpsc::UnboundedSender<GameBroadcast>,
) {
    let room_id = config.room_id.as_str();
    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let mut game = ArenaMatch::new(&config.roster, config.arena.clone(), rng);

    match game.encode_view() {
        Ok(state_data) => send_room(
            &broadcast_tx,
            &ServerMessage::StartGame(StartGameMsg {
                room_id: config.room_id.clone(),
                state_data,
            }),
        ),
        Err(e) => tracing::error!(room = room_id, error = %e, "Failed to encode initial state"),
    }
    tracing::info!(room = room_id, players = config.roster.len(), "Match started");

    let tick_interval = Duration::from_secs_f64(1.0 / f64::from(config.tick_rate_hz.max(1)));
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let started_at = Instant::now();
    let mut last_tick = started_at;
    let mut tick: u32 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(room = room_id, "Match cancelled");
                break;
            }
            _ = interval.tick() => {
                let now = Instant::now();
                let dt = if tick == 0 {
                    tick_interval.as_secs_f32()
                } else {
                    now.duration_since(last_tick).as_secs_f32().min(MAX_TICK_DT)
                };
                last_tick = now;
                tick = tick.wrapping_add(1);

                let report = game.tick(dt);
                for slot in report.power_up_collectors {
                    if let Some(player) = game.players().get(slot) {
                        send_player(
                            &broadcast_tx,
                            &player.username,
                            &ServerMessage::PlayPowerUpSound(PlayPowerUpSoundMsg {}),
                        );
                    }
                }
                if report.ended {
                    break;
                }
                if let Some(limit) = config.match_duration
                    && now.duration_since(started_at) >= limit
                {
                    tracing::info!(room = room_id, "Match clock expired");
                    game.force_end();
                    break;
                }
                broadcast_state(&broadcast_tx, &game, tick);
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(GameCommand::Input { username, input }) => {
                        game.set_input(&username, input);
                    },
                    Some(GameCommand::PlaceBomb { username, x, y }) => {
                        if let Err(reason) = game.place_bomb(&username, x, y) {
                            tracing::debug!(
                                room = room_id, username = %username, %reason,
                                "Bomb placement rejected"
                            );
                        }
                    },
                    Some(GameCommand::Cheat { username, cheat }) => {
                        tracing::info!(room = room_id, username = %username, cheat, "Cheat mode toggled");
                        game.set_cheat(&username, cheat);
                    },
                    Some(GameCommand::Exit { username }) => {
                        tracing::info!(room = room_id, username = %username, "Player exited match");
                        game.exit_player(&username);
                        if game.everyone_left() {
                            game.force_end();
                            break;
                        }
                    },
                    Some(GameCommand::Disconnect { username }) => {
                        tracing::info!(room = room_id, username = %username, "Player dropped from match");
                        game.disconnect_player(&username);
                        if game.everyone_left() {
                            game.force_end();
                            break;
                        }
                    },
                    Some(GameCommand::Overtime { username }) => {
                        tracing::info!(room = room_id, username = %username, "Overtime requested");
                        game.force_end();
                        break;
                    },
                    None => break,
                }
            }
        }
    }

    if let Some(outcome) = game.outcome() {
        broadcast_state(&broadcast_tx, &game, tick.wrapping_add(1));
        send_room(
            &broadcast_tx,
            &ServerMessage::GameOver(GameOverMsg {
                room_id: config.room_id.clone(),
                winner: outcome.winner.clone(),
                player_stats: outcome.stats.clone(),
            }),
        );
        persist_outcome(Arc::clone(&config.recorder), room_id, outcome);
        tracing::info!(room = room_id, winner = ?outcome.winner, "Match ended");
    }

    let _ = broadcast_tx.send(GameBroadcast::GameEnded);
}

fn broadcast_state(tx: &mpsc::UnboundedSender<GameBroadcast>, game: &ArenaMatch, tick: u32) {
    match game.encode_view() {
        Ok(state_data) => send_room(
            tx,
            &ServerMessage::GameStateUpdate(GameStateUpdateMsg { tick, state_data }),
        ),
        Err(e) => tracing::error!(tick, error = %e, "Failed to encode game state"),
    }
}

fn send_room(tx: &mpsc::UnboundedSender<GameBroadcast>, msg: &ServerMessage) {
    match encode_server_message(msg) {
        Ok(data) => {
            let _ = tx.send(GameBroadcast::Room(Bytes::from(data)));
        },
        Err(e) => tracing::error!(error = %e, "Failed to encode room broadcast"),
    }
}

fn send_player(tx: &mpsc::UnboundedSender<GameBroadcast>, username: &str, msg: &ServerMessage) {
    match encode_server_message(msg) {
        Ok(data) => {
            let _ = tx.send(GameBroadcast::Player {
                username: username.to_string(),
                data: Bytes::from(data),
            });
        },
        Err(e) => tracing::error!(username, error = %e, "Failed to encode player message"),
    }
}

/// Hand results to the recorder on the blocking pool without waiting.
fn persist_outcome(recorder: Arc<dyn MatchRecorder>, room_id: &str, outcome: &MatchOutcome) {
    let room_id = room_id.to_string();
    let results: Vec<(String, MatchResult)> = outcome
        .participants
        .iter()
        .map(|username| {
            (
                username.clone(),
                MatchResult::new(outcome.is_winner(username)),
            )
        })
        .collect();

    tokio::task::spawn_blocking(move || {
        for (username, result) in results {
            if let Err(e) = recorder.record_match_result(&username, result) {
                tracing::warn!(
                    room = %room_id, username = %username, error = %e,
                    "Failed to record match result"
                );
            }
        }
    });
}
