//! Service configuration.
//!
//! Loaded once at startup from `HERMES_*` environment variables. Connection
//! URLs are redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::event::PublisherConfig;
use crate::room::{CleanupConfig, RoomService, RoomSettings};

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default tracing filter, used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "hermes=debug,tower_http=debug";

pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_PUBLISH_QUEUE_CAPACITY: u64 = 1_024;
pub const DEFAULT_JOIN_MAX_ATTEMPTS: u64 = 5;
pub const DEFAULT_ROOM_SWEEP_INTERVAL_SECS: u64 = 30 * 60;

#[derive(Clone)]
pub struct Config {
    pub bind_address: String,

    /// PostgreSQL URL. Rooms are kept in memory when unset.
    pub database_url: Option<String>,

    /// Redis URL. Events stay in-process when unset.
    pub broker_url: Option<String>,

    pub log_level: String,

    pub store_timeout: Duration,
    pub publish_timeout: Duration,
    pub publish_queue_capacity: usize,
    pub join_max_attempts: u32,
    pub republish_on_rejoin: bool,

    /// Rooms idle this long are swept. Sweeper is off when unset.
    pub room_idle_timeout: Option<Duration>,
    pub room_sweep_interval: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");

        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("database_url", &redact(&self.database_url))
            .field("broker_url", &redact(&self.broker_url))
            .field("log_level", &self.log_level)
            .field("store_timeout", &self.store_timeout)
            .field("publish_timeout", &self.publish_timeout)
            .field("publish_queue_capacity", &self.publish_queue_capacity)
            .field("join_max_attempts", &self.join_max_attempts)
            .field("republish_on_rejoin", &self.republish_on_rejoin)
            .field("room_idle_timeout", &self.room_idle_timeout)
            .field("room_sweep_interval", &self.room_sweep_interval)
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: String, value: String },

    #[error("{name} must be true or false, got '{value}'")]
    InvalidBool { name: String, value: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| {
            vars.get(name)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let bind_address =
            non_empty("HERMES_BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let log_level =
            non_empty("HERMES_LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let store_timeout = Duration::from_millis(positive(
            vars,
            "HERMES_STORE_TIMEOUT_MS",
            DEFAULT_STORE_TIMEOUT_MS,
        )?);
        let publish_timeout = Duration::from_millis(positive(
            vars,
            "HERMES_PUBLISH_TIMEOUT_MS",
            DEFAULT_PUBLISH_TIMEOUT_MS,
        )?);
        let publish_queue_capacity = positive(
            vars,
            "HERMES_PUBLISH_QUEUE_CAPACITY",
            DEFAULT_PUBLISH_QUEUE_CAPACITY,
        )? as usize;
        let join_max_attempts = u32::try_from(positive(
            vars,
            "HERMES_JOIN_MAX_ATTEMPTS",
            DEFAULT_JOIN_MAX_ATTEMPTS,
        )?)
        .map_err(|_| ConfigError::InvalidNumber {
            name: "HERMES_JOIN_MAX_ATTEMPTS".to_string(),
            value: vars
                .get("HERMES_JOIN_MAX_ATTEMPTS")
                .cloned()
                .unwrap_or_default(),
        })?;

        let republish_on_rejoin = match non_empty("HERMES_REPUBLISH_ON_REJOIN") {
            None => false,
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidBool {
                        name: "HERMES_REPUBLISH_ON_REJOIN".to_string(),
                        value,
                    })
                }
            },
        };

        let room_idle_timeout = match non_empty("HERMES_ROOM_IDLE_TIMEOUT_SECS") {
            None => None,
            Some(raw) => {
                let idle_for = Duration::from_secs(positive(
                    vars,
                    "HERMES_ROOM_IDLE_TIMEOUT_SECS",
                    0,
                )?);
                // Must leave a representable cutoff timestamp
                if RoomService::idle_cutoff(idle_for).is_err() {
                    return Err(ConfigError::InvalidNumber {
                        name: "HERMES_ROOM_IDLE_TIMEOUT_SECS".to_string(),
                        value: raw,
                    });
                }
                Some(idle_for)
            }
        };
        let room_sweep_interval = Duration::from_secs(positive(
            vars,
            "HERMES_ROOM_SWEEP_INTERVAL_SECS",
            DEFAULT_ROOM_SWEEP_INTERVAL_SECS,
        )?);

        Ok(Config {
            bind_address,
            database_url: non_empty("HERMES_DATABASE_URL"),
            broker_url: non_empty("HERMES_BROKER_URL"),
            log_level,
            store_timeout,
            publish_timeout,
            publish_queue_capacity,
            join_max_attempts,
            republish_on_rejoin,
            room_idle_timeout,
            room_sweep_interval,
        })
    }

    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            max_join_attempts: self.join_max_attempts,
            store_timeout: self.store_timeout,
            republish_on_rejoin: self.republish_on_rejoin,
        }
    }

    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            queue_capacity: self.publish_queue_capacity,
            publish_timeout: self.publish_timeout,
        }
    }

    /// Sweeper settings, or `None` when idle rooms are kept forever
    pub fn cleanup_config(&self) -> Option<CleanupConfig> {
        self.room_idle_timeout
            .map(|inactivity_threshold| CleanupConfig {
                cleanup_interval: self.room_sweep_interval,
                inactivity_threshold,
            })
    }
}

/// Parses an optional positive integer, falling back to `default` when unset
fn positive(vars: &HashMap<String, String>, name: &str, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };

    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}
