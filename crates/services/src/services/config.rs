//! Runtime configuration read from the environment.

use std::time::Duration as StdDuration;

use chrono::Duration;
use secrecy::SecretString;
use thiserror::Error;

use super::authz::{StaffId, StaffRoster};

const DEFAULT_DATABASE_URL: &str = "sqlite://workroom.db";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_CEILING_HOURS: i64 = 10;
const DEFAULT_REAPER_INTERVAL_SECS: u64 = 900;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Bearer token expected by the cron endpoint. `None` disables it.
    pub cron_secret: Option<SecretString>,
    pub stale_timer_ceiling: Duration,
    pub reaper_interval: StdDuration,
    pub reaper_enabled: bool,
    pub operator_staff_ids: Vec<StaffId>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ceiling_hours: i64 = parse_or(&get, "STALE_TIMER_CEILING_HOURS", DEFAULT_CEILING_HOURS)?;
        if ceiling_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "STALE_TIMER_CEILING_HOURS",
                value: ceiling_hours.to_string(),
            });
        }
        let interval_secs: u64 =
            parse_or(&get, "REAPER_INTERVAL_SECS", DEFAULT_REAPER_INTERVAL_SECS)?;
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "REAPER_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            cron_secret: get("CRON_SECRET").map(SecretString::from),
            stale_timer_ceiling: Duration::hours(ceiling_hours),
            reaper_interval: StdDuration::from_secs(interval_secs),
            reaper_enabled: parse_bool_or(&get, "REAPER_ENABLED", true)?,
            operator_staff_ids: get("OPERATOR_STAFF_IDS")
                .map(|raw| raw.split(',').filter_map(StaffId::new).collect())
                .unwrap_or_default(),
        })
    }

    pub fn roster(&self) -> StaffRoster {
        StaffRoster::new(self.operator_staff_ids.iter().cloned())
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_bool_or(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
    }
}
