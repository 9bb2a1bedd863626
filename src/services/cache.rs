//! Expiring JSON cache files
//!
//! Each cache file holds `{"timestamp": <ISO-8601>, "data": <payload>}` and
//! is considered stale once older than its TTL. Stale entries are re-fetched
//! wholesale by the caller; nothing is updated incrementally.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::types::{CacheWarning, FastlyStatsError, Result};

/// Default time-to-live for cached lookups (24 hours)
pub const CACHE_TTL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope<T> {
    timestamp: String,
    data: T,
}

/// Parse an ISO-8601 timestamp. Naive timestamps are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// A single expiring JSON cache file
pub struct JsonCache<T> {
    path: PathBuf,
    ttl: TimeDelta,
    _payload: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> JsonCache<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            ttl: TimeDelta::hours(CACHE_TTL_HOURS),
            _payload: PhantomData,
        }
    }

    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the payload if present and fresh. Returns (payload, optional_warning).
    pub fn load(&self) -> (Option<T>, Option<CacheWarning>) {
        self.load_at(Utc::now())
    }

    pub fn load_at(&self, now: DateTime<Utc>) -> (Option<T>, Option<CacheWarning>) {
        if !self.path.exists() {
            return (None, None);
        }

        let content = match self.read_locked() {
            Ok(c) => c,
            Err(e) => {
                let warning = CacheWarning::LoadFailed(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                ));
                warn!(?warning, "cache load failed");
                return (None, Some(warning));
            }
        };

        let envelope: CacheEnvelope<T> = match serde_json::from_str(&content) {
            Ok(env) => env,
            Err(e) => {
                let warning = CacheWarning::Corrupted(format!(
                    "Corrupted cache file {}: {}",
                    self.path.display(),
                    e
                ));
                warn!(?warning, "ignoring cache");
                return (None, Some(warning));
            }
        };

        let Some(stored_at) = parse_timestamp(&envelope.timestamp) else {
            let warning = CacheWarning::Corrupted(format!(
                "Invalid timestamp '{}' in {}",
                envelope.timestamp,
                self.path.display()
            ));
            warn!(?warning, "ignoring cache");
            return (None, Some(warning));
        };

        if now - stored_at >= self.ttl {
            debug!(path = %self.path.display(), %stored_at, "cache expired");
            return (None, None);
        }

        debug!(path = %self.path.display(), "loaded from cache");
        (Some(envelope.data), None)
    }

    /// Save using atomic write (temp file + rename) with exclusive lock.
    pub fn save(&self, data: &T) -> Result<()> {
        self.save_at(data, Utc::now())
    }

    pub fn save_at(&self, data: &T, now: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let envelope = CacheEnvelope {
            timestamp: now.to_rfc3339(),
            data,
        };
        let content = serde_json::to_string_pretty(&envelope)
            .map_err(|e| FastlyStatsError::Cache(format!("Serialization failed: {}", e)))?;

        let temp_path = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&temp_path).map_err(|e| {
                FastlyStatsError::Cache(format!("Failed to create temp file: {}", e))
            })?;
            file.write_all(content.as_bytes()).map_err(|e| {
                FastlyStatsError::Cache(format!("Failed to write temp file: {}", e))
            })?;
            file.sync_all()
                .map_err(|e| FastlyStatsError::Cache(format!("Failed to sync temp file: {}", e)))?;
        }

        let target = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        target.lock_exclusive().map_err(|e| {
            FastlyStatsError::Cache(format!("Failed to acquire write lock: {}", e))
        })?;

        fs::rename(&temp_path, &self.path)
            .map_err(|e| FastlyStatsError::Cache(format!("Failed to rename temp file: {}", e)))?;

        let _ = target.unlock();
        debug!(path = %self.path.display(), "saved cache");
        Ok(())
    }

    /// Save, logging rather than returning failures
    pub fn store(&self, data: &T) {
        if let Err(e) = self.save(data) {
            warn!(path = %self.path.display(), error = %e, "failed to save cache");
        }
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Read under a shared lock for concurrent read safety
    fn read_locked(&self) -> std::io::Result<String> {
        let file = File::open(&self.path)?;
        file.lock_shared()?;
        let mut content = String::new();
        let result = std::io::BufReader::new(&file).read_to_string(&mut content);
        let _ = file.unlock();
        result.map(|_| content)
    }
}
