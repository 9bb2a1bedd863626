use thiserror::Error;

/// fastly-stats error types
#[derive(Error, Debug)]
pub enum FastlyStatsError {
    /// Duration expression did not match any accepted shape
    #[error("invalid duration format: {0}")]
    InvalidFormat(String),

    /// Duration unit could not be resolved to a known unit
    #[error("invalid duration unit: {0}")]
    InvalidUnit(String),

    /// Best field match scored below the acceptance threshold
    #[error("ambiguous field name '{query}'")]
    AmbiguousField {
        query: String,
        suggestions: Vec<String>,
    },

    /// No service could be resolved for the prefix
    #[error("no matching service found for '{0}'")]
    NoMatchingService(String),

    /// Environment is not one of the known deployment tiers
    #[error("no matching environment found for '{0}'")]
    InvalidEnvironment(String),

    /// Stats API transport or HTTP failure
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Chat sink publish/update/delete failure
    #[error("sink error: {0}")]
    Sink(String),

    /// Cache operation failed
    #[error("cache error: {0}")]
    Cache(String),

    /// Configuration or invocation error
    #[error("config error: {0}")]
    Config(String),

    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FastlyStatsError {
    /// Whether this error should terminate the process with a failure status
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AmbiguousField { .. })
    }
}

/// Result type alias for fastly-stats
pub type Result<T> = std::result::Result<T, FastlyStatsError>;
