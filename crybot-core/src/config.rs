// File: crybot-core/src/config.rs

use std::path::Path;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crybot_common::models::Language;
use crybot_common::Error;

use crate::cache::CacheConfig;
use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// History samples older than this are dropped on each sweep.
    #[serde(default = "default_metrics_max_age_secs")]
    pub metrics_max_age_secs: i64,
}

fn default_interval_secs() -> u64 {
    300
}

fn default_metrics_max_age_secs() -> i64 {
    24 * 60 * 60
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            metrics_max_age_secs: default_metrics_max_age_secs(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Everything the core needs at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub admin_user_ids: Vec<String>,
    #[serde(default)]
    pub default_language: Language,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            maintenance: MaintenanceConfig::default(),
            admin_user_ids: Vec::new(),
            default_language: Language::default(),
            log_level: default_log_level(),
        }
    }
}

impl CoreConfig {
    /// Loads `.env` (if present) and then reads the process environment.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenv::dotenv() {
            info!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`CoreConfig::from_env`], but unset variables keep the values of `base`.
    pub fn from_env_over(base: Self) -> Self {
        if let Ok(path) = dotenv::dotenv() {
            info!("Loaded environment from {}", path.display());
        }
        base.overlay(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source. Unset variables keep
    /// their defaults; unparsable ones are reported and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().overlay(lookup)
    }

    /// Applies every variable `lookup` knows about on top of `self`.
    pub fn overlay<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = self;

        parse_into(&lookup, "CACHE_MAX_SIZE", &mut cfg.cache.max_size);
        parse_into(&lookup, "CACHE_DEFAULT_TTL", &mut cfg.cache.default_ttl_secs);
        parse_into(&lookup, "RATE_LIMIT_ACTOR", &mut cfg.rate_limit.actor_limit);
        parse_into(&lookup, "RATE_LIMIT_ACTOR_WINDOW", &mut cfg.rate_limit.actor_window_secs);
        parse_into(&lookup, "RATE_LIMIT_CHANNEL", &mut cfg.rate_limit.channel_limit);
        parse_into(&lookup, "RATE_LIMIT_CHANNEL_WINDOW", &mut cfg.rate_limit.channel_window_secs);
        parse_into(&lookup, "MAINTENANCE_INTERVAL", &mut cfg.maintenance.interval_secs);
        parse_into(&lookup, "METRICS_MAX_AGE", &mut cfg.maintenance.metrics_max_age_secs);
        parse_into(&lookup, "DEFAULT_LANGUAGE", &mut cfg.default_language);

        if let Some(raw) = lookup("ADMIN_USER_IDS") {
            cfg.admin_user_ids = raw
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            let level = level.trim();
            if !level.is_empty() {
                cfg.log_level = level.to_lowercase();
            }
        }

        cfg
    }

    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let cfg: CoreConfig = serde_json::from_str(&raw)?;
        info!("Loaded configuration from {}", path.as_ref().display());
        Ok(cfg)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), raw)?;
        Ok(())
    }

    /// Returns every hard problem with the configuration. An empty admin list
    /// is allowed and only logged.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.cache.max_size == 0 {
            problems.push("cache max_size must be greater than 0".to_string());
        }
        if self.rate_limit.actor_limit > 0 && self.rate_limit.actor_window_secs == 0 {
            problems.push("actor window must be greater than 0 when the actor limit is set".to_string());
        }
        if self.rate_limit.channel_limit > 0 && self.rate_limit.channel_window_secs == 0 {
            problems.push("channel window must be greater than 0 when the channel limit is set".to_string());
        }
        if self.maintenance.interval_secs == 0 {
            problems.push("maintenance interval must be greater than 0".to_string());
        }
        if self.maintenance.metrics_max_age_secs <= 0 {
            problems.push("metrics max age must be greater than 0".to_string());
        }
        if self.admin_user_ids.is_empty() {
            warn!("ADMIN_USER_IDS is empty; admin commands will be refused for everyone");
        }

        problems
    }

    /// `validate()` folded into a single `Error::Config`.
    pub fn ensure_valid(&self) -> Result<(), Error> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(problems.join("; ")))
        }
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => warn!("Ignoring invalid value '{}' for {}", raw, key),
    }
}
