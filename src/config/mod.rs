//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::util::time::DEFAULT_FPS;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// HS256 secret used to sign admin bearer tokens
    pub admin_jwt_secret: String,
    /// HMAC secret shared with the chat bridge
    pub chat_webhook_secret: String,

    /// Allowed overlay origins for CORS (comma separated)
    pub client_origin: String,

    /// Remote leaderboard table URL (PostgREST style), if mirroring is enabled
    pub leaderboard_url: Option<String>,
    /// API key for the remote leaderboard
    pub leaderboard_key: Option<String>,
    /// Avatar lookup URL with a `{username}` placeholder
    pub avatar_url_template: Option<String>,

    /// Simulation tuning
    pub game: GameConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            admin_jwt_secret: env::var("ADMIN_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("ADMIN_JWT_SECRET"))?,
            chat_webhook_secret: env::var("CHAT_WEBHOOK_SECRET")
                .map_err(|_| ConfigError::Missing("CHAT_WEBHOOK_SECRET"))?,

            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            leaderboard_url: env::var("LEADERBOARD_URL").ok(),
            leaderboard_key: env::var("LEADERBOARD_KEY").ok(),
            avatar_url_template: env::var("AVATAR_URL_TEMPLATE").ok(),

            game: GameConfig::from_env()?,
        })
    }
}

/// Tuning knobs for a Masaqil War match
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    /// Absolute arena radius, centered on the origin
    pub arena_radius: f32,
    /// Radius the zone stops shrinking at
    pub zone_floor_radius: f32,
    /// Seconds the zone takes to shrink from the arena edge to the floor
    pub round_duration_secs: f32,
    pub frames_per_second: u32,
    /// Lobby capacity
    pub max_participants: usize,
    /// Chat keyword that joins the lobby
    pub join_keyword: String,
    /// Sticker/emote identifier that also joins the lobby
    pub join_sticker: Option<String>,
    pub supplies_enabled: bool,
    pub hazards_enabled: bool,
    pub supply_interval_secs: f32,
    pub supply_pickup_radius: f32,
    /// Seconds an unclaimed supply stays on the field (0 = forever)
    pub supply_lifetime_secs: f32,
    /// Per-frame probability of a clash between agents in reach
    pub clash_chance: f64,
    /// Per-frame probability of a combat exchange between agents in reach
    pub combat_chance: f64,
    /// Storm damage applied per frame
    pub storm_damage_per_frame: f32,
    pub win_points: u32,
    pub points_per_kill: u32,
    /// Broadcast a snapshot every N frames
    pub snapshot_every_frames: u32,
    /// Fixed RNG seed; random per match when unset
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            arena_radius: 500.0,
            zone_floor_radius: 60.0,
            round_duration_secs: 90.0,
            frames_per_second: DEFAULT_FPS,
            max_participants: 200,
            join_keyword: "join".to_string(),
            join_sticker: None,
            supplies_enabled: true,
            hazards_enabled: true,
            supply_interval_secs: 4.0,
            supply_pickup_radius: 18.0,
            supply_lifetime_secs: 12.0,
            clash_chance: 0.25,
            combat_chance: 0.15,
            storm_damage_per_frame: 0.5,
            win_points: 10,
            points_per_kill: 2,
            snapshot_every_frames: 2,
            seed: None,
        }
    }
}

impl GameConfig {
    /// Read `GAME_*` overrides on top of the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            arena_radius: env_or("GAME_ARENA_RADIUS", d.arena_radius)?,
            zone_floor_radius: env_or("GAME_ZONE_FLOOR_RADIUS", d.zone_floor_radius)?,
            round_duration_secs: env_or("GAME_ROUND_DURATION_SECS", d.round_duration_secs)?,
            frames_per_second: env_or("GAME_FPS", d.frames_per_second)?,
            max_participants: env_or("GAME_MAX_PARTICIPANTS", d.max_participants)?,
            join_keyword: env::var("GAME_JOIN_KEYWORD").unwrap_or(d.join_keyword),
            join_sticker: env::var("GAME_JOIN_STICKER").ok(),
            supplies_enabled: env_or("GAME_SUPPLIES_ENABLED", d.supplies_enabled)?,
            hazards_enabled: env_or("GAME_HAZARDS_ENABLED", d.hazards_enabled)?,
            supply_interval_secs: env_or("GAME_SUPPLY_INTERVAL_SECS", d.supply_interval_secs)?,
            supply_pickup_radius: env_or("GAME_SUPPLY_PICKUP_RADIUS", d.supply_pickup_radius)?,
            supply_lifetime_secs: env_or("GAME_SUPPLY_LIFETIME_SECS", d.supply_lifetime_secs)?,
            clash_chance: env_or("GAME_CLASH_CHANCE", d.clash_chance)?,
            combat_chance: env_or("GAME_COMBAT_CHANCE", d.combat_chance)?,
            storm_damage_per_frame: env_or("GAME_STORM_DAMAGE", d.storm_damage_per_frame)?,
            win_points: env_or("GAME_WIN_POINTS", d.win_points)?,
            points_per_kill: env_or("GAME_POINTS_PER_KILL", d.points_per_kill)?,
            snapshot_every_frames: env_or("GAME_SNAPSHOT_EVERY_FRAMES", d.snapshot_every_frames)?,
            seed: match env::var("GAME_SEED") {
                Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid("GAME_SEED"))?),
                Err(_) => None,
            },
        })
    }
}

/// Parse an optional variable, falling back to `default` when unset
fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_a_playable_match() {
        let config = GameConfig::default();
        assert!(config.zone_floor_radius < config.arena_radius);
        assert!(config.combat_chance > 0.0 && config.combat_chance < 1.0);
        assert_eq!(config.frames_per_second, 60);
    }

    #[test]
    fn unset_variable_falls_back_to_default() {
        let value: f32 = env_or("GAME_TEST_SURELY_UNSET_VARIABLE", 12.5).unwrap();
        assert_eq!(value, 12.5);
    }
}
