// src/config.rs
use std::{env, fmt::Display, str::FromStr, time::Duration};

use chrono::TimeDelta;
use thiserror::Error;
use tracing::{info, warn};

use crate::logging::LogFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("inconsistent poll limits: {0}")]
    Limits(String),
}

/// Bounds applied when polls are created and votes are cast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollLimits {
    pub min_question_len: usize,
    pub max_question_len: usize,
    pub max_option_len: usize,
    pub min_options: usize,
    pub max_options: usize,
    /// How far past creation a poll may be set to expire.
    pub max_horizon: TimeDelta,
    pub max_voter_id_len: usize,
}

impl Default for PollLimits {
    fn default() -> Self {
        Self {
            min_question_len: 5,
            max_question_len: 200,
            max_option_len: 100,
            min_options: 2,
            max_options: 10,
            max_horizon: TimeDelta::days(365),
            max_voter_id_len: 40,
        }
    }
}

impl PollLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_question_len == 0 || self.min_question_len > self.max_question_len {
            return Err(ConfigError::Limits(format!(
                "question length bounds [{}, {}]",
                self.min_question_len, self.max_question_len
            )));
        }
        if self.max_option_len == 0 {
            return Err(ConfigError::Limits("option length must be positive".into()));
        }
        if self.min_options < 2 || self.min_options > self.max_options {
            return Err(ConfigError::Limits(format!(
                "option count bounds [{}, {}]",
                self.min_options, self.max_options
            )));
        }
        if self.max_horizon <= TimeDelta::zero() {
            return Err(ConfigError::Limits("expiration horizon must be positive".into()));
        }
        if self.max_voter_id_len == 0 {
            return Err(ConfigError::Limits("voter id length must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database: DatabaseConfig,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
    pub log_level: String,
    pub limits: PollLimits,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PollLimits::default();
        let horizon_days: i64 = try_load(&lookup, "POLL_MAX_HORIZON_DAYS", defaults.max_horizon.num_days())?;

        let limits = PollLimits {
            min_question_len: try_load(&lookup, "POLL_MIN_QUESTION_LEN", defaults.min_question_len)?,
            max_question_len: try_load(&lookup, "POLL_MAX_QUESTION_LEN", defaults.max_question_len)?,
            max_option_len: try_load(&lookup, "POLL_MAX_OPTION_LEN", defaults.max_option_len)?,
            min_options: try_load(&lookup, "POLL_MIN_OPTIONS", defaults.min_options)?,
            max_options: try_load(&lookup, "POLL_MAX_OPTIONS", defaults.max_options)?,
            max_horizon: TimeDelta::try_days(horizon_days).ok_or_else(|| ConfigError::Invalid {
                key: "POLL_MAX_HORIZON_DAYS",
                value: horizon_days.to_string(),
                reason: "out of range".into(),
            })?,
            max_voter_id_len: try_load(&lookup, "POLL_MAX_VOTER_ID_LEN", defaults.max_voter_id_len)?,
        };
        limits.validate()?;

        Ok(Self {
            port: try_load(&lookup, "PORT", 3030)?,
            database: DatabaseConfig {
                url: try_load(&lookup, "DATABASE_URL", "sqlite://polls.db".to_string())?,
                max_connections: try_load(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            },
            request_timeout: Duration::from_secs(try_load(&lookup, "REQUEST_TIMEOUT_SECS", 10)?),
            log_format: try_load(&lookup, "LOG_FORMAT", LogFormat::Human)?,
            log_level: try_load(&lookup, "LOG_LEVEL", "info".to_string())?,
            limits,
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
