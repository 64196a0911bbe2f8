pub mod collision;
pub mod config;
pub mod explosion;
pub mod grid;
pub mod powerups;
pub mod scoring;

use std::collections::{HashMap, HashSet};
use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use blastgrid_core::net::messages::{InputVector, PlayerStatsEntry};
use blastgrid_core::player::PlayerColor;
use blastgrid_core::room::RosterEntry;

use collision::{cell_of, corner_cells};
use config::ArenaConfig;
use grid::{Grid, spawn_point};
use powerups::PowerUp;

/// Index of a player in the match, fixed at spawn (roster order).
pub type SlotId = usize;

/// Per-match state of one participant.
#[derive(Debug, Clone)]
pub struct PlayerRuntime {
    pub slot: SlotId,
    pub username: String,
    pub avatar: String,
    pub color: PlayerColor,
    pub x: f32,
    pub y: f32,
    pub alive: bool,
    pub disconnected: bool,
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,
    pub max_bombs: u8,
    pub blast_range: u8,
    pub speed: u8,
    pub invincible: bool,
    pub invincible_remaining: f32,
    pub cheated: bool,
    pub bombs_placed: u32,
}

impl PlayerRuntime {
    fn spawn(slot: SlotId, entry: &RosterEntry) -> Self {
        let (x, y) = spawn_point(slot);
        Self {
            slot,
            username: entry.username.clone(),
            avatar: entry.avatar.clone(),
            color: PlayerColor::for_slot(slot),
            x: x as f32,
            y: y as f32,
            alive: true,
            disconnected: false,
            score: 0,
            kills: 0,
            deaths: 0,
            max_bombs: 1,
            blast_range: 1,
            speed: 1,
            invincible: false,
            invincible_remaining: 0.0,
            cheated: false,
            bombs_placed: 0,
        }
    }

    fn stats(&self) -> PlayerStatsEntry {
        PlayerStatsEntry {
            username: self.username.clone(),
            score: self.score,
            kills: self.kills,
            deaths: self.deaths,
            bombs_placed: self.bombs_placed,
            alive: self.alive,
        }
    }
}

/// A ticking bomb on the board.
#[derive(Debug, Clone)]
pub struct Bomb {
    pub x: i32,
    pub y: i32,
    pub owner: SlotId,
    pub timer: f32,
    pub range: u8,
    /// Players allowed to overlap this bomb until they step off it.
    pub pass_through: HashSet<SlotId>,
}

/// One burning explosion cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explosion {
    pub x: i32,
    pub y: i32,
    pub timer: f32,
    pub owner: SlotId,
}

/// Why a bomb placement was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BombRejection {
    UnknownPlayer,
    Dead,
    BombLimit,
    Occupied,
    Blocked,
}

impl fmt::Display for BombRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPlayer => write!(f, "player is not in this match"),
            Self::Dead => write!(f, "player is dead"),
            Self::BombLimit => write!(f, "player has no bombs left"),
            Self::Occupied => write!(f, "a bomb already occupies that cell"),
            Self::Blocked => write!(f, "cell is not walkable"),
        }
    }
}

impl std::error::Error for BombRejection {}

/// Events produced by one simulation step.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Players that picked up a power-up this tick.
    pub power_up_collectors: Vec<SlotId>,
    pub detonations: usize,
    /// `(victim, killer)` pairs.
    pub kills: Vec<(SlotId, SlotId)>,
    /// The match ended during this tick.
    pub ended: bool,
}

/// Final result of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub winner: Option<String>,
    pub stats: Vec<PlayerStatsEntry>,
    /// Everyone who took part, including players that left.
    pub participants: Vec<String>,
}

impl MatchOutcome {
    pub fn is_winner(&self, username: &str) -> bool {
        self.winner.as_deref() == Some(username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub username: String,
    pub avatar: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub alive: bool,
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,
    pub max_bombs: u8,
    pub blast_range: u8,
    pub speed: u8,
    pub invincible: bool,
    pub cheated: bool,
    pub bombs_placed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BombView {
    pub x: i32,
    pub y: i32,
    pub owner: String,
    pub timer: f32,
}

/// Snapshot broadcast to clients every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateView {
    pub players: Vec<PlayerView>,
    /// `map[y][x]` tile codes.
    pub map: Vec<Vec<u8>>,
    pub bombs: Vec<BombView>,
    pub explosions: Vec<Explosion>,
    pub power_ups: Vec<PowerUp>,
    pub elapsed: f32,
    pub ended: bool,
}

/// Authoritative state of one running match.
pub struct ArenaMatch {
    players: Vec<PlayerRuntime>,
    grid: Grid,
    bombs: Vec<Bomb>,
    explosions: Vec<Explosion>,
    power_ups: Vec<PowerUp>,
    pending_inputs: HashMap<SlotId, InputVector>,
    elapsed: f32,
    outcome: Option<MatchOutcome>,
    rng: StdRng,
    config: ArenaConfig,
}

impl ArenaMatch {
    /// Start a match for `roster`, spawning players by roster order.
    pub fn new(roster: &[RosterEntry], config: ArenaConfig, mut rng: StdRng) -> Self {
        let grid = Grid::generate(&mut rng, config.destructible_chance);
        let power_ups = powerups::seed_power_ups(&grid, &mut rng, config.seed_power_ups);
        let players = roster
            .iter()
            .enumerate()
            .map(|(slot, entry)| PlayerRuntime::spawn(slot, entry))
            .collect();

        Self {
            players,
            grid,
            bombs: Vec::new(),
            explosions: Vec::new(),
            power_ups,
            pending_inputs: HashMap::new(),
            elapsed: 0.0,
            outcome: None,
            rng,
            config,
        }
    }

    pub fn with_seed(roster: &[RosterEntry], config: ArenaConfig, seed: u64) -> Self {
        Self::new(roster, config, StdRng::seed_from_u64(seed))
    }

    pub fn players(&self) -> &[PlayerRuntime] {
        &self.players
    }

    pub fn player(&self, username: &str) -> Option<&PlayerRuntime> {
        self.players.iter().find(|p| p.username == username)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn bombs(&self) -> &[Bomb] {
        &self.bombs
    }

    pub fn explosions(&self) -> &[Explosion] {
        &self.explosions
    }

    pub fn power_ups(&self) -> &[PowerUp] {
        &self.power_ups
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_ended(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&MatchOutcome> {
        self.outcome.as_ref()
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    fn slot_of(&self, username: &str) -> Option<SlotId> {
        self.players
            .iter()
            .position(|p| p.username == username)
    }

    /// Buffer movement intent for the next tick. Later input in the same
    /// tick replaces earlier input.
    pub fn set_input(&mut self, username: &str, input: InputVector) {
        let Some(slot) = self.slot_of(username) else {
            return;
        };
        if self.players[slot].alive && !self.is_ended() {
            self.pending_inputs.insert(slot, input);
        }
    }

    /// Place a bomb on the cell nearest `(x, y)`.
    pub fn place_bomb(&mut self, username: &str, x: f32, y: f32) -> Result<(), BombRejection> {
        let slot = self.slot_of(username).ok_or(BombRejection::UnknownPlayer)?;
        let player = &self.players[slot];
        if !player.alive || self.is_ended() {
            return Err(BombRejection::Dead);
        }
        let live = self.bombs.iter().filter(|b| b.owner == slot).count();
        if live >= usize::from(player.max_bombs) {
            return Err(BombRejection::BombLimit);
        }
        let (cx, cy) = cell_of(x, y);
        if self.bombs.iter().any(|b| b.x == cx && b.y == cy) {
            return Err(BombRejection::Occupied);
        }
        if !self.grid.is_empty(cx, cy) {
            return Err(BombRejection::Blocked);
        }

        let mut pass_through: HashSet<SlotId> = self
            .players
            .iter()
            .filter(|p| p.alive)
            .filter(|p| {
                let (px, py) = cell_of(p.x, p.y);
                (px - cx).abs() <= 1 && (py - cy).abs() <= 1
            })
            .map(|p| p.slot)
            .collect();
        pass_through.insert(slot);

        let range = player.blast_range;
        self.bombs.push(Bomb {
            x: cx,
            y: cy,
            owner: slot,
            timer: self.config.bomb_fuse_secs,
            range,
            pass_through,
        });
        self.players[slot].bombs_placed += 1;
        Ok(())
    }

    /// Toggle explosion immunity for a player.
    pub fn set_cheat(&mut self, username: &str, cheat: bool) {
        if let Some(slot) = self.slot_of(username) {
            self.players[slot].cheated = cheat;
        }
    }

    /// The player left the match voluntarily.
    pub fn exit_player(&mut self, username: &str) {
        self.withdraw(username);
    }

    /// The player's connection dropped.
    pub fn disconnect_player(&mut self, username: &str) {
        self.withdraw(username);
    }

    /// Remove a player from play without counting a death. The runtime
    /// entry stays so final stats still list them.
    fn withdraw(&mut self, username: &str) {
        let Some(slot) = self.slot_of(username) else {
            return;
        };
        let player = &mut self.players[slot];
        player.alive = false;
        player.disconnected = true;
        self.pending_inputs.remove(&slot);
    }

    /// Whether every participant has left.
    pub fn everyone_left(&self) -> bool {
        self.players.iter().all(|p| p.disconnected)
    }

    /// Advance the simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        let mut report = TickReport::default();
        if self.is_ended() {
            return report;
        }
        self.elapsed += dt;

        // Movement
        let inputs = std::mem::take(&mut self.pending_inputs);
        for slot in 0..self.players.len() {
            let Some(input) = inputs.get(&slot) else {
                continue;
            };
            collision::step_player(
                &self.grid,
                &mut self.players,
                &mut self.bombs,
                slot,
                input,
                dt,
                &self.config,
            );
        }

        self.collect_power_ups(&mut report);

        for player in &mut self.players {
            powerups::tick_invincibility(player, dt);
        }

        explosion::tick_explosions(&mut self.explosions, dt);

        for bomb in explosion::tick_fuses(&mut self.bombs, dt) {
            self.detonate(&bomb);
            report.detonations += 1;
        }

        for (victim, killer) in explosion::find_victims(&self.players, &self.explosions) {
            let dead = &mut self.players[victim];
            dead.alive = false;
            dead.deaths += 1;
            if killer != victim
                && let Some(owner) = self.players.get_mut(killer)
            {
                owner.kills += 1;
                owner.score += scoring::KILL_POINTS;
            }
            report.kills.push((victim, killer));
        }

        if self.alive_count() <= 1 {
            self.finish();
            report.ended = true;
        }
        report
    }

    fn collect_power_ups(&mut self, report: &mut TickReport) {
        let he = self.config.half_extent;
        for player in self.players.iter_mut().filter(|p| p.alive) {
            let corners = corner_cells(player.x, player.y, he);
            for pu in self
                .power_ups
                .iter_mut()
                .filter(|pu| !pu.collected && corners.contains(&(pu.x, pu.y)))
            {
                pu.collected = true;
                powerups::apply_power_up(player, pu.kind, &self.config);
                player.score += scoring::POWER_UP_POINTS;
                if !report.power_up_collectors.contains(&player.slot) {
                    report.power_up_collectors.push(player.slot);
                }
            }
        }
        self.power_ups.retain(|pu| !pu.collected);
    }

    fn detonate(&mut self, bomb: &Bomb) {
        let blast = explosion::propagate(
            &mut self.grid,
            &mut self.bombs,
            bomb.x,
            bomb.y,
            bomb.range,
            self.config.chain_fuse_secs,
        );
        for &(x, y) in &blast.destroyed {
            if let Some(pu) =
                powerups::roll_drop(&mut self.rng, x, y, self.config.power_up_drop_chance)
            {
                self.power_ups.push(pu);
            }
        }
        let lifetime = self.config.explosion_lifetime_secs;
        self.explosions
            .extend(blast.cells.into_iter().map(|(x, y)| Explosion {
                x,
                y,
                timer: lifetime,
                owner: bomb.owner,
            }));
        tracing::trace!(x = bomb.x, y = bomb.y, owner = bomb.owner, "Bomb detonated");
    }

    /// End the match now; the highest living score wins.
    pub fn force_end(&mut self) -> &MatchOutcome {
        self.finish()
    }

    /// Settle the match once. Later calls return the stored outcome.
    fn finish(&mut self) -> &MatchOutcome {
        let players = &mut self.players;
        let pending = &mut self.pending_inputs;
        self.outcome.get_or_insert_with(|| {
            pending.clear();
            let winner = scoring::pick_winner(players);
            if let Some(slot) = winner {
                players[slot].score += scoring::WIN_BONUS;
            }
            MatchOutcome {
                winner: winner.map(|slot| players[slot].username.clone()),
                stats: players.iter().map(PlayerRuntime::stats).collect(),
                participants: players.iter().map(|p| p.username.clone()).collect(),
            }
        })
    }

    /// Client-facing snapshot.
    pub fn view(&self) -> GameStateView {
        GameStateView {
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    username: p.username.clone(),
                    avatar: p.avatar.clone(),
                    color: p.color.to_hex(),
                    x: p.x,
                    y: p.y,
                    alive: p.alive,
                    score: p.score,
                    kills: p.kills,
                    deaths: p.deaths,
                    max_bombs: p.max_bombs,
                    blast_range: p.blast_range,
                    speed: p.speed,
                    invincible: p.invincible,
                    cheated: p.cheated,
                    bombs_placed: p.bombs_placed,
                })
                .collect(),
            map: self.grid.to_rows(),
            bombs: self
                .bombs
                .iter()
                .map(|b| BombView {
                    x: b.x,
                    y: b.y,
                    owner: self.players[b.owner].username.clone(),
                    timer: b.timer,
                })
                .collect(),
            explosions: self.explosions.clone(),
            power_ups: self.power_ups.clone(),
            elapsed: self.elapsed,
            ended: self.is_ended(),
        }
    }

    /// MessagePack-encoded snapshot for the wire.
    pub fn encode_view(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(&self.view())
    }
}
