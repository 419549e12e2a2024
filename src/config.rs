use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;

/// Channel names tried, in order, when the original channel rejects a delivery.
pub const DEFAULT_FALLBACK_CHANNELS: &[&str] = &["bot-spam", "general", "reminders", "chat"];

pub const MIN_TICK_INTERVAL_SECS: u64 = 30;
pub const MAX_TICK_INTERVAL_SECS: u64 = 120;

#[derive(Clone, Deserialize)]
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    pub status_message: String,
    pub command_prefix: String,
    // Scheduler settings
    pub tick_interval_secs: u64,
    pub delivery_batch_size: usize,
    pub max_failed_ticks: i64,
    pub fallback_channels: Vec<String>,
    // Retention settings
    pub retention_days: i64,
    pub retention_interval_secs: u64,
    // Cache settings
    pub timezone_cache_size: usize,
}

/// Optional on-disk overrides, read from `chime.toml` when present.
#[derive(Default, Deserialize)]
struct FileOverrides {
    #[serde(default)]
    scheduler: SchedulerOverrides,
    #[serde(default)]
    retention: RetentionOverrides,
}

#[derive(Default, Deserialize)]
struct SchedulerOverrides {
    tick_interval_secs: Option<u64>,
    delivery_batch_size: Option<usize>,
    max_failed_ticks: Option<i64>,
    fallback_channels: Option<Vec<String>>,
}

#[derive(Default, Deserialize)]
struct RetentionOverrides {
    days: Option<i64>,
    interval_secs: Option<u64>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        let mut config = Self::build()?;
        config.apply_file_overrides(&Self::load_file_overrides("chime.toml"));
        config.tick_interval_secs = config
            .tick_interval_secs
            .clamp(MIN_TICK_INTERVAL_SECS, MAX_TICK_INTERVAL_SECS);
        Ok(config)
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "data/chime.db".to_string()),
            status_message: env::var("STATUS_MESSAGE")
                .unwrap_or_else(|_| "Watching the clock".to_string()),
            command_prefix: env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".to_string()),
            tick_interval_secs: env_parse("CHIME_TICK_INTERVAL_SECS", 30),
            delivery_batch_size: env_parse("CHIME_DELIVERY_BATCH_SIZE", 100),
            max_failed_ticks: env_parse("CHIME_MAX_FAILED_TICKS", 10),
            fallback_channels: env::var("CHIME_FALLBACK_CHANNELS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    DEFAULT_FALLBACK_CHANNELS
                        .iter()
                        .map(|s| s.to_string())
                        .collect()
                }),
            retention_days: env_parse("CHIME_RETENTION_DAYS", 30),
            retention_interval_secs: env_parse("CHIME_RETENTION_INTERVAL_SECS", 3600),
            timezone_cache_size: env_parse("CHIME_TIMEZONE_CACHE_SIZE", 500),
        })
    }

    fn load_file_overrides(path: &str) -> FileOverrides {
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => FileOverrides::default(),
        }
    }

    fn apply_file_overrides(&mut self, overrides: &FileOverrides) {
        if let Some(v) = overrides.scheduler.tick_interval_secs {
            self.tick_interval_secs = v;
        }
        if let Some(v) = overrides.scheduler.delivery_batch_size {
            self.delivery_batch_size = v;
        }
        if let Some(v) = overrides.scheduler.max_failed_ticks {
            self.max_failed_ticks = v;
        }
        if let Some(v) = &overrides.scheduler.fallback_channels {
            self.fallback_channels = v.clone();
        }
        if let Some(v) = overrides.retention.days {
            self.retention_days = v;
        }
        if let Some(v) = overrides.retention.interval_secs {
            self.retention_interval_secs = v;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("database_url", &self.database_url)
            .field("status_message", &self.status_message)
            .field("command_prefix", &self.command_prefix)
            .field("tick_interval_secs", &self.tick_interval_secs)
            .field("delivery_batch_size", &self.delivery_batch_size)
            .field("max_failed_ticks", &self.max_failed_ticks)
            .field("fallback_channels", &self.fallback_channels)
            .field("retention_days", &self.retention_days)
            .field("retention_interval_secs", &self.retention_interval_secs)
            .field("timezone_cache_size", &self.timezone_cache_size)
            .finish()
    }
}

/// Reminder text is capped well below the embed description limit
pub const MAX_REMINDER_TEXT_CHARS: usize = 400;
