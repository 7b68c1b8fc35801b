//! Client configuration.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::PlayerId;

/// Reconnect backoff: `initial`, doubling per failed attempt, capped at `max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
    /// Give up and close the session after this many failed attempts.
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            max: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

impl BackoffConfig {
    /// Delay before reconnect attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// Whether attempt `attempt` (0-based) is still allowed.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Connection settings for one game session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://host:port/ws`.
    pub url: String,
    /// Session token from the bootstrap endpoint, sent as a bearer header.
    pub token: String,
    /// Our player id, used to recognise snapshots caused by this client.
    pub player_id: Option<PlayerId>,
    /// Keepalive period. Each ping also triggers a full refresh snapshot.
    pub ping_interval: Duration,
    /// Minimum spacing between `move-stack` reports during a drag.
    pub move_interval: Duration,
    pub backoff: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/ws".to_string(),
            token: String::new(),
            player_id: None,
            ping_interval: Duration::from_secs(5),
            move_interval: Duration::from_millis(100),
            backoff: BackoffConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    /// Load from `CARDTABLE_*` environment variables.
    ///
    /// `CARDTABLE_TOKEN` is required. `CARDTABLE_URL`, `CARDTABLE_PLAYER`,
    /// `CARDTABLE_PING_SECS` and `CARDTABLE_MOVE_MS` fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let token = must_var("CARDTABLE_TOKEN")?;
        if token.trim().is_empty() {
            return Err(ConfigError::Empty("CARDTABLE_TOKEN"));
        }
        let url = env::var("CARDTABLE_URL").unwrap_or(defaults.url);
        let player_id = env::var("CARDTABLE_PLAYER").ok().filter(|p| !p.is_empty());

        let ping_interval = parse_var("CARDTABLE_PING_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.ping_interval);
        let move_interval = parse_var("CARDTABLE_MOVE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.move_interval);

        Ok(Self {
            url,
            token,
            player_id,
            ping_interval,
            move_interval,
            ..defaults
        })
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required environment variable '{0}' is not set")]
    Missing(&'static str),
    #[error("Environment variable '{0}' is empty")]
    Empty(&'static str),
    #[error("Environment variable '{name}' must be a number, got '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Get required environment variable or return error
fn must_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_var(name: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(None),
    }
}
