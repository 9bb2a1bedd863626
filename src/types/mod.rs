//! Type definitions for fastly-stats

mod error;
mod stats;
mod summary;

pub use error::*;
pub use stats::*;
pub use summary::*;

/// Fields reported for `overview` queries and tracked by streaming sessions
pub const COMMON_FIELDS: [&str; 5] = [
    "status_5xx",
    "requests",
    "hits",
    "miss",
    "all_pass_requests",
];

/// Cache loading warning types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWarning {
    /// Failed to open or read cache file
    LoadFailed(String),
    /// Cache file was corrupted (invalid JSON or timestamp)
    Corrupted(String),
}
