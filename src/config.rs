//! Runtime configuration assembled from the environment

use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use tracing::warn;

use crate::types::{FastlyStatsError, Result};

pub const DEFAULT_API_URL: &str = "https://api.fastly.com";
pub const DEFAULT_RT_URL: &str = "https://rt.fastly.com";
pub const DEFAULT_SLACK_URL: &str = "https://slack.com/api";

/// Default streaming session length
pub const DEFAULT_STREAM_SECS: u64 = 60;

/// Default wait between real-time polls
pub const DEFAULT_WAIT_SECS: u64 = 2;

pub const SERVICES_CACHE_FILE: &str = "services_cache.json";
pub const FIELDS_CACHE_FILE: &str = "fields_cache.json";

/// Slack destination for progress and summary messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackConfig {
    pub token: String,
    pub channel: String,
    pub thread_ts: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Fastly API key, validated only by the remote API
    pub api_token: String,
    pub api_url: String,
    pub rt_url: String,
    pub cache_dir: PathBuf,
    pub slack: Option<SlackConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_token = get("FASTLY_API_TOKEN").unwrap_or_default();
        if api_token.is_empty() {
            warn!("FASTLY_API_TOKEN is not set; API calls will likely be rejected");
        }

        let cache_dir = match get("FASTLY_STATS_CACHE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => Self::default_cache_dir()?,
        };

        let slack = match (get("SLACK_API_TOKEN"), get("SLACK_CHANNEL_ID")) {
            (Some(token), Some(channel)) => Some(SlackConfig {
                token,
                channel,
                thread_ts: get("SLACK_THREAD_TS"),
                base_url: get("SLACK_API_URL").unwrap_or_else(|| DEFAULT_SLACK_URL.into()),
            }),
            (Some(_), None) => {
                warn!("SLACK_API_TOKEN set without SLACK_CHANNEL_ID; reporting to console");
                None
            }
            _ => None,
        };

        Ok(Self {
            api_token,
            api_url: get("FASTLY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            rt_url: get("FASTLY_RT_URL").unwrap_or_else(|| DEFAULT_RT_URL.into()),
            cache_dir,
            slack,
        })
    }

    /// Get the default cache directory (~/.fastly-stats/cache)
    fn default_cache_dir() -> Result<PathBuf> {
        let base_dirs = BaseDirs::new()
            .ok_or_else(|| FastlyStatsError::Config("Cannot determine home directory".into()))?;
        Ok(base_dirs.home_dir().join(".fastly-stats").join("cache"))
    }

    pub fn services_cache_path(&self) -> PathBuf {
        self.cache_dir.join(SERVICES_CACHE_FILE)
    }

    pub fn fields_cache_path(&self) -> PathBuf {
        self.cache_dir.join(FIELDS_CACHE_FILE)
    }
}

/// Timing of a streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub duration: Duration,
    pub interval: Duration,
}

impl StreamConfig {
    pub fn from_secs(duration_secs: u64, interval_secs: u64) -> Result<Self> {
        if duration_secs == 0 {
            return Err(FastlyStatsError::Config(
                "stream duration must be > 0 seconds".into(),
            ));
        }
        if interval_secs == 0 {
            return Err(FastlyStatsError::Config(
                "wait interval must be > 0 seconds".into(),
            ));
        }
        Ok(Self {
            duration: Duration::from_secs(duration_secs),
            interval: Duration::from_secs(interval_secs),
        })
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(DEFAULT_STREAM_SECS),
            interval: Duration::from_secs(DEFAULT_WAIT_SECS),
        }
    }
}
