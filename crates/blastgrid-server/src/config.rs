use std::time::Duration;

use serde::Deserialize;

use blastgrid_core::room::DEFAULT_MAX_PLAYERS;

/// Top-level server configuration, loaded from `blastgrid.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Browser origin allowed by CORS. `*` allows any origin.
    pub cors_origin: String,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            cors_origin: "http://localhost:5173".to_string(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
            game: GameConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Inbound messages per second per connection. Clients send input
    /// every frame, so this sits above the tick rate.
    pub ws_rate_limit_per_sec: f64,
    pub player_message_buffer: usize,
    pub max_username_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            ws_rate_limit_per_sec: 120.0,
            player_message_buffer: 256,
            max_username_len: 32,
        }
    }
}

/// Room lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub default_max_players: u8,
    pub max_players_cap: u8,
    pub idle_timeout_secs: u64,
    pub idle_check_interval_secs: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            default_max_players: DEFAULT_MAX_PLAYERS,
            max_players_cap: 8,
            idle_timeout_secs: 1800,
            idle_check_interval_secs: 60,
        }
    }
}

/// Match scheduling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub tick_rate_hz: u32,
    /// Server-side match clock. 0 disables it.
    pub match_duration_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            match_duration_secs: 180,
        }
    }
}

impl GameConfig {
    pub fn match_duration(&self) -> Option<Duration> {
        (self.match_duration_secs > 0).then(|| Duration::from_secs(self.match_duration_secs))
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on values the server cannot run with.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }
        if self.cors_origin == "*" {
            tracing::warn!("CORS allows any origin");
        }

        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.limits.player_message_buffer == 0 {
            tracing::error!("limits.player_message_buffer must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_username_len == 0 {
            tracing::error!("limits.max_username_len must be > 0");
            std::process::exit(1);
        }

        if self.rooms.max_players_cap < 2 {
            tracing::error!("rooms.max_players_cap must be >= 2");
            std::process::exit(1);
        }
        if !(2..=self.rooms.max_players_cap).contains(&self.rooms.default_max_players) {
            tracing::error!(
                default = self.rooms.default_max_players,
                cap = self.rooms.max_players_cap,
                "rooms.default_max_players must be between 2 and max_players_cap"
            );
            std::process::exit(1);
        }
        if self.rooms.idle_timeout_secs == 0 {
            tracing::error!("rooms.idle_timeout_secs must be > 0");
            std::process::exit(1);
        }
        if self.rooms.idle_check_interval_secs == 0 {
            tracing::error!("rooms.idle_check_interval_secs must be > 0");
            std::process::exit(1);
        }

        if !(1..=240).contains(&self.game.tick_rate_hz) {
            tracing::error!(
                tick_rate_hz = self.game.tick_rate_hz,
                "game.tick_rate_hz must be between 1 and 240"
            );
            std::process::exit(1);
        }
    }

    /// Load config from `blastgrid.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("blastgrid.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from blastgrid.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse blastgrid.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No blastgrid.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("BLASTGRID_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(origin) = std::env::var("BLASTGRID_CORS_ORIGIN")
            && !origin.is_empty()
        {
            config.cors_origin = origin;
        }
        if let Ok(val) = std::env::var("BLASTGRID_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("BLASTGRID_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }
        if let Ok(val) = std::env::var("BLASTGRID_TICK_RATE")
            && let Ok(n) = val.parse::<u32>()
        {
            config.game.tick_rate_hz = n;
        }
        if let Ok(val) = std::env::var("BLASTGRID_MATCH_DURATION_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.game.match_duration_secs = n;
        }

        config
    }
}
