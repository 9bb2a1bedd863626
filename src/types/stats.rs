//! Stats domain types: environments, durations, windows and samples

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::FastlyStatsError;

/// Service display name → opaque service id
pub type ServiceDirectory = BTreeMap<String, String>;

/// Deployment tier used as a naming prefix for service lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Dev,
    Qa,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Self::Production, Self::Dev, Self::Qa];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Dev => "dev",
            Self::Qa => "qa",
        }
    }

    /// Capitalized name for display ("Production", "Dev", "Qa")
    pub fn title(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Environment-qualified service name prefix.
    /// Production services carry no prefix.
    pub fn service_prefix(&self, service: &str) -> String {
        match self {
            Self::Production => service.to_string(),
            _ => format!("{}-{}", self.as_str(), service),
        }
    }
}

impl FromStr for Environment {
    type Err = FastlyStatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|env| env.as_str() == lower)
            .ok_or_else(|| FastlyStatsError::InvalidEnvironment(s.to_string()))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Duration unit accepted in human-typed expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl TimeUnit {
    /// Length of one unit in seconds. A month is exactly 30 days.
    pub fn seconds(&self) -> i64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
            Self::Week => 7 * 86_400,
            Self::Month => 30 * 86_400,
        }
    }

    /// Compact suffix used in dashboard range tokens
    pub fn range_suffix(&self) -> &'static str {
        match self {
            Self::Second => "s",
            Self::Minute => "m",
            Self::Hour => "h",
            Self::Day => "d",
            Self::Week => "w",
            Self::Month => "mo",
        }
    }
}

/// Bucket width the stats API aggregates samples into (`by=`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Second,
    Minute,
    Hour,
    Day,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed duration expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationSpec {
    pub quantity: u32,
    pub unit: TimeUnit,
}

/// Resolved query window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub granularity: Granularity,
    /// Dashboard range token, e.g. "5m" or "2mo"
    pub range: String,
}

/// One stats record: field name → value, in API order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sample(pub Map<String, Value>);

impl Sample {
    /// Numeric value of a field. Missing or non-numeric fields count as zero.
    pub fn value(&self, field: &str) -> f64 {
        self.0.get(field).and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Sample {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let map = iter
            .into_iter()
            .filter_map(|(k, v)| {
                serde_json::Number::from_f64(v).map(|n| (k.into(), Value::Number(n)))
            })
            .collect();
        Sample(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_from_str_case_insensitive() {
        assert_eq!("PRODUCTION".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!(" qa ".parse::<Environment>().unwrap(), Environment::Qa);
    }

    #[test]
    fn test_environment_unknown_rejected() {
        let err = "staging".parse::<Environment>().unwrap_err();
        assert!(matches!(err, FastlyStatsError::InvalidEnvironment(e) if e == "staging"));
    }

    #[test]
    fn test_service_prefix() {
        assert_eq!(Environment::Production.service_prefix("api"), "api");
        assert_eq!(Environment::Dev.service_prefix("my-service"), "dev-my-service");
        assert_eq!(Environment::Qa.service_prefix("web"), "qa-web");
    }

    #[test]
    fn test_environment_title() {
        assert_eq!(Environment::Production.title(), "Production");
        assert_eq!(Environment::Qa.title(), "Qa");
    }

    #[test]
    fn test_month_is_thirty_days() {
        assert_eq!(TimeUnit::Month.seconds(), 30 * TimeUnit::Day.seconds());
        assert_eq!(TimeUnit::Week.seconds(), 7 * TimeUnit::Day.seconds());
    }

    #[test]
    fn test_sample_value_missing_and_non_numeric() {
        let sample: Sample = serde_json::from_str(
            r#"{"requests": 12, "bandwidth": 1.5, "service_id": "abc", "hits": null}"#,
        )
        .unwrap();
        assert_eq!(sample.value("requests"), 12.0);
        assert_eq!(sample.value("bandwidth"), 1.5);
        assert_eq!(sample.value("service_id"), 0.0);
        assert_eq!(sample.value("hits"), 0.0);
        assert_eq!(sample.value("miss"), 0.0);
    }

    #[test]
    fn test_sample_preserves_field_order() {
        let sample: Sample =
            serde_json::from_str(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
        assert_eq!(sample.field_names(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_granularity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Granularity::Hour).unwrap(), "\"hour\"");
        assert_eq!(Granularity::Minute.to_string(), "minute");
    }
}
