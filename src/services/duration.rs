//! Human duration parsing and query window resolution
//!
//! Turns loosely typed expressions such as "last 5 mins" or "2 days ago"
//! into a `DurationSpec`, and a spec into the `TimeWindow` sent to the
//! historical stats API.

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use regex::Regex;
use tracing::debug;

use crate::matching::{best_match_by, simple_ratio};
use crate::types::{DurationSpec, FastlyStatsError, Granularity, Result, TimeUnit, TimeWindow};

/// Accepted expression shapes, checked in order.
/// Each captures (quantity, unit); trailing words after the unit are ignored.
const SHAPES: [&str; 4] = [
    r"^(\d+)\s+(\S+)$",
    r"^last\s+(\S+)\s+(\S+)",
    r"^(\S+)\s+(\S+)(?:\s.*)?\s+ago$",
    r"^(\d+)\s+(\S+)",
];

/// Unit vocabulary the fuzzy unit resolver matches against
const UNIT_VOCABULARY: [(&str, TimeUnit); 12] = [
    ("second", TimeUnit::Second),
    ("seconds", TimeUnit::Second),
    ("minute", TimeUnit::Minute),
    ("minutes", TimeUnit::Minute),
    ("hour", TimeUnit::Hour),
    ("hours", TimeUnit::Hour),
    ("day", TimeUnit::Day),
    ("days", TimeUnit::Day),
    ("week", TimeUnit::Week),
    ("weeks", TimeUnit::Week),
    ("month", TimeUnit::Month),
    ("months", TimeUnit::Month),
];

/// A unit token sharing no characters with any vocabulary entry is rejected
const MIN_UNIT_SCORE: u8 = 1;

pub const SUPPORTED_FORMATS: &str = "'X seconds ago', 'X minutes ago', 'X hours ago', \
'X days ago', 'X weeks ago', 'X months ago', 'last X hours', 'X days'";

/// Split an expression into its (quantity, unit) tokens
fn split_expression(text: &str) -> Option<(String, String)> {
    SHAPES.iter().find_map(|pattern| {
        let re = Regex::new(pattern).expect("valid regex");
        re.captures(text)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
    })
}

/// Resolve a unit token against the vocabulary. Always picks the closest
/// entry unless nothing overlaps at all.
pub fn resolve_unit(token: &str) -> Result<TimeUnit> {
    let names: Vec<&str> = UNIT_VOCABULARY.iter().map(|(name, _)| *name).collect();
    let best = best_match_by(token, &names, simple_ratio)
        .filter(|m| m.score >= MIN_UNIT_SCORE)
        .ok_or_else(|| FastlyStatsError::InvalidUnit(token.to_string()))?;
    debug!(token, unit = best.candidate, score = best.score, "resolved duration unit");
    Ok(UNIT_VOCABULARY[best.index].1)
}

/// Parse a free-text duration expression
pub fn parse_duration(text: &str) -> Result<DurationSpec> {
    let normalized = text.trim().to_lowercase();
    let (quantity, unit) = split_expression(&normalized)
        .ok_or_else(|| FastlyStatsError::InvalidFormat(format!("'{}'", text.trim())))?;

    let quantity: u32 = quantity.parse().map_err(|_| {
        FastlyStatsError::InvalidFormat(format!(
            "invalid quantity '{}', must be an integer",
            quantity
        ))
    })?;
    if quantity == 0 {
        return Err(FastlyStatsError::InvalidFormat(
            "quantity must be greater than zero".into(),
        ));
    }

    let unit = resolve_unit(&unit)?;
    Ok(DurationSpec { quantity, unit })
}

/// Sampling granularity for a spec. Single hours and days get one
/// level finer buckets than multiples do.
pub fn granularity_for(spec: &DurationSpec) -> Granularity {
    match spec.unit {
        TimeUnit::Second => Granularity::Second,
        TimeUnit::Minute => Granularity::Minute,
        TimeUnit::Hour if spec.quantity == 1 => Granularity::Minute,
        TimeUnit::Hour => Granularity::Hour,
        TimeUnit::Day if spec.quantity == 1 => Granularity::Hour,
        TimeUnit::Day => Granularity::Day,
        TimeUnit::Week | TimeUnit::Month => Granularity::Day,
    }
}

/// Dashboard range token: quantity plus unit initial, "mo" for months
pub fn range_token(spec: &DurationSpec) -> String {
    format!("{}{}", spec.quantity, spec.unit.range_suffix())
}

/// Resolve a duration into a window ending at `now` truncated to the minute
pub fn resolve_window_at(spec: &DurationSpec, now: DateTime<Utc>) -> Result<TimeWindow> {
    let end = now
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .ok_or_else(|| FastlyStatsError::InvalidFormat("cannot truncate current time".into()))?;

    let span = i64::from(spec.quantity) * spec.unit.seconds();
    let start = TimeDelta::try_seconds(span)
        .and_then(|delta| end.checked_sub_signed(delta))
        .ok_or_else(|| FastlyStatsError::InvalidFormat("duration out of range".into()))?;

    let window = TimeWindow {
        start,
        end,
        granularity: granularity_for(spec),
        range: range_token(spec),
    };
    debug!(
        start = %window.start,
        end = %window.end,
        by = %window.granularity,
        "resolved query window"
    );
    Ok(window)
}

pub fn resolve_window(spec: &DurationSpec) -> Result<TimeWindow> {
    resolve_window_at(spec, Utc::now())
}
