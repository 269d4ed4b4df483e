use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

const DEV_SECRET_KEY: &str = "your-secret-key-change-this-in-production";
const DEFAULT_LOG_FILE: &str = "logs/voting_system.log";
const DEFAULT_ORIGINS: [&str; 4] = [
    "http://localhost:8000",
    "http://127.0.0.1:8000",
    "https://localhost:8000",
    "https://127.0.0.1:8000",
];

/// Shortest token that still leaves the hash space out of reach of guessing.
pub const MIN_TOKEN_LENGTH: usize = 16;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Malformed {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Configuration rejected: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub secret_key: String,
    pub token_length: usize,
    pub token_expire_buffer_minutes: u32,
    pub min_voting_duration_minutes: u32,
    pub max_voting_duration_minutes: u32,
    pub default_voting_duration_minutes: u32,
    pub websocket_heartbeat_interval: Duration,
    pub static_dir: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, then validates it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_key = lookup("SECRET_KEY").unwrap_or_else(|| {
            warn!("SECRET_KEY not set, using the development key");
            DEV_SECRET_KEY.to_string()
        });

        let mut allowed_origins = match lookup("ALLOWED_ORIGINS") {
            Some(origins) => split_list(&origins),
            None => DEFAULT_ORIGINS.iter().map(ToString::to_string).collect(),
        };
        if let Some(extra) = lookup("ADDITIONAL_ORIGINS") {
            allowed_origins.extend(split_list(&extra));
        }

        // An empty LOG_FILE turns file logging off.
        let log_file = lookup("LOG_FILE")
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string())
            .trim()
            .to_string();

        let config = Self {
            host: try_load(&lookup, "HOST", "0.0.0.0")?,
            port: try_load(&lookup, "PORT", "8000")?,
            debug: load_flag(&lookup, "DEBUG"),
            secret_key,
            token_length: try_load(&lookup, "TOKEN_LENGTH", "32")?,
            token_expire_buffer_minutes: try_load(&lookup, "TOKEN_EXPIRE_BUFFER_MINUTES", "5")?,
            min_voting_duration_minutes: try_load(&lookup, "MIN_VOTING_DURATION_MINUTES", "1")?,
            max_voting_duration_minutes: try_load(&lookup, "MAX_VOTING_DURATION_MINUTES", "30")?,
            default_voting_duration_minutes: try_load(
                &lookup,
                "DEFAULT_VOTING_DURATION_MINUTES",
                "5",
            )?,
            websocket_heartbeat_interval: Duration::from_secs(try_load(
                &lookup,
                "WEBSOCKET_HEARTBEAT_INTERVAL",
                "30",
            )?),
            static_dir: PathBuf::from(try_load::<_, String>(&lookup, "STATIC_DIR", "static")?),
            log_level: try_load(&lookup, "LOG_LEVEL", "INFO")?,
            log_file: (!log_file.is_empty()).then(|| PathBuf::from(log_file)),
            allowed_origins,
        };

        config.validate()?;

        Ok(config)
    }

    /// Collects every rule violation instead of stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.min_voting_duration_minutes == 0 {
            errors.push("MIN_VOTING_DURATION_MINUTES must be at least 1".to_string());
        }

        if self.min_voting_duration_minutes >= self.max_voting_duration_minutes {
            errors.push(
                "MIN_VOTING_DURATION_MINUTES must be less than MAX_VOTING_DURATION_MINUTES"
                    .to_string(),
            );
        }

        if self.default_voting_duration_minutes < self.min_voting_duration_minutes {
            errors.push(
                "DEFAULT_VOTING_DURATION_MINUTES must not be less than MIN_VOTING_DURATION_MINUTES"
                    .to_string(),
            );
        }

        if self.default_voting_duration_minutes > self.max_voting_duration_minutes {
            errors.push(
                "DEFAULT_VOTING_DURATION_MINUTES must not exceed MAX_VOTING_DURATION_MINUTES"
                    .to_string(),
            );
        }

        if self.token_length < MIN_TOKEN_LENGTH {
            errors.push(format!(
                "TOKEN_LENGTH must be at least {MIN_TOKEN_LENGTH} bytes"
            ));
        }

        if self.websocket_heartbeat_interval.is_zero() {
            errors.push("WEBSOCKET_HEARTBEAT_INTERVAL must be at least 1 second".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    pub fn summary(&self) {
        info!("Host: {}", self.host);
        info!("Port: {}", self.port);
        info!("Debug: {}", self.debug);
        info!(
            "Voting duration: {}-{} min (default {})",
            self.min_voting_duration_minutes,
            self.max_voting_duration_minutes,
            self.default_voting_duration_minutes
        );
        info!("Token length: {} bytes", self.token_length);
        info!("Static directory: {}", self.static_dir.display());
        info!("Log level: {}", self.log_level);
        info!("Allowed origins: {}", self.allowed_origins.join(", "));
    }

    pub fn voting_duration_range(&self) -> std::ops::RangeInclusive<u32> {
        self.min_voting_duration_minutes..=self.max_voting_duration_minutes
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn load_flag<F>(lookup: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn try_load<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");

        ConfigError::Malformed {
            key: key.to_string(),
            value: value.clone(),
            reason: e.to_string(),
        }
    })
}
