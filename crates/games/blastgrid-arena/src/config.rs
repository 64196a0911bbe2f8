use serde::{Deserialize, Serialize};

/// Data-driven tuning for the arena simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Seconds between placing a bomb and its detonation.
    pub bomb_fuse_secs: f32,
    /// Fuse applied to a bomb caught in another bomb's blast.
    pub chain_fuse_secs: f32,
    /// Lifetime of an explosion cell (seconds).
    pub explosion_lifetime_secs: f32,
    /// Probability that a free interior cell starts as a destructible wall.
    pub destructible_chance: f64,
    /// Probability that a destroyed wall drops a power-up.
    pub power_up_drop_chance: f64,
    /// Power-ups scattered on the board at match start.
    pub seed_power_ups: usize,
    /// Upper bound for speed, blast range, and bomb count.
    pub stat_cap: u8,
    /// Duration of the invincibility power-up (seconds).
    pub invincibility_secs: f32,
    /// Tiles per second at speed level 1.
    pub base_speed: f32,
    /// Fractional speed gained per speed level above 1.
    pub speed_step: f32,
    /// Half the side of a player's collision box (tiles).
    pub half_extent: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            bomb_fuse_secs: 3.0,
            chain_fuse_secs: 0.01,
            explosion_lifetime_secs: 0.5,
            destructible_chance: 0.4,
            power_up_drop_chance: 0.2,
            seed_power_ups: 3,
            stat_cap: 5,
            invincibility_secs: 5.0,
            base_speed: 3.0,
            speed_step: 0.2,
            half_extent: 0.47,
        }
    }
}

impl ArenaConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("BLASTGRID_ARENA_CONFIG")
            && let Ok(contents) = std::fs::read_to_string(&path)
        {
            match toml::from_str::<Self>(&contents) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %path, error = %e, "Ignoring invalid arena config"),
            }
        }
        if let Ok(contents) = std::fs::read_to_string("config/arena.toml")
            && let Ok(config) = toml::from_str::<Self>(&contents)
        {
            return config;
        }
        Self::default()
    }

    /// Tiles moved per second at the given speed level.
    pub fn move_speed(&self, speed_level: u8) -> f32 {
        ((f32::from(speed_level.max(1)) - 1.0) * self.speed_step + 1.0) * self.base_speed
    }
}
