//! Summary types handed to progress sinks

use super::Environment;

/// What a summary describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    /// Ephemeral in-flight view of a streaming session
    Progress,
    /// Durable cumulative result of a streaming session
    Final,
    /// One-shot historical query result
    Historical,
}

impl SummaryKind {
    pub fn is_realtime(&self) -> bool {
        !matches!(self, Self::Historical)
    }
}

/// Direction of the latest interval compared to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trend {
    Up,
    Down,
    #[default]
    Flat,
}

impl Trend {
    pub fn between(previous: f64, current: f64) -> Self {
        if current > previous {
            Self::Up
        } else if current < previous {
            Self::Down
        } else {
            Self::Flat
        }
    }
}

/// Resolved service a summary is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRef {
    pub name: String,
    pub id: String,
    pub environment: Environment,
}

/// Per-field line of a summary
#[derive(Debug, Clone, PartialEq)]
pub struct FieldReport {
    pub field: String,
    pub total: f64,
    /// Sum over the most recent polling interval (streaming only)
    pub last_interval: Option<f64>,
    pub trend: Trend,
}

/// Everything a sink needs to render one message
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub kind: SummaryKind,
    pub service: ServiceRef,
    pub fields: Vec<FieldReport>,
    /// Polling interval length in seconds (streaming only)
    pub interval_secs: Option<u64>,
    pub dashboard_url: String,
}
