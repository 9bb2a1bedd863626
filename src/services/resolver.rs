//! Fuzzy resolution of services and fields to exact API identifiers

use tracing::debug;

use crate::matching::{best_match, best_of, score_all, top_n, weighted_ratio, Scored};
use crate::types::{FastlyStatsError, Result};

/// Minimum score for a field match to be accepted
pub const FIELD_MATCH_THRESHOLD: u8 = 80;

/// Suggestions listed when a field is ambiguous
pub const AMBIGUOUS_SUGGESTIONS: usize = 5;

/// Close fields considered for "you might also want" hints
pub const RELATED_FIELDS: usize = 3;

/// Resolve an environment-qualified prefix to a service name.
///
/// Names that literally start with the prefix are preferred: the best of
/// those wins even when an unrelated name scores higher overall. Without
/// any such name, the best overall match is taken.
pub fn resolve_service<'a>(prefix: &str, names: &'a [String]) -> Result<Scored<'a>> {
    let scored = score_all(prefix, names, weighted_ratio);

    let prefixed = scored
        .iter()
        .copied()
        .filter(|s| s.candidate.starts_with(prefix));

    let best = best_of(prefixed)
        .or_else(|| best_of(scored.iter().copied()))
        .ok_or_else(|| FastlyStatsError::NoMatchingService(prefix.to_string()))?;

    debug!(prefix, service = best.candidate, score = best.score, "resolved service");
    Ok(best)
}

/// Treat `_` and `-` as word separators so "status_5xx" reads as "status 5xx"
pub fn normalize_field(name: &str) -> String {
    name.replace(['_', '-'], " ")
}

/// A resolved field name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    /// Exact field name as the API returns it
    pub field: String,
    pub score: u8,
    /// Other close fields, best first
    pub related: Vec<String>,
}

/// Resolve a human-typed field name against the known schema.
/// Scores below `FIELD_MATCH_THRESHOLD` fail with the top suggestions.
pub fn resolve_field(query: &str, fields: &[String]) -> Result<FieldMatch> {
    let normalized: Vec<String> = fields.iter().map(|f| normalize_field(f)).collect();
    let query_normalized = normalize_field(query);

    let best = best_match(&query_normalized, &normalized)
        .filter(|b| b.score >= FIELD_MATCH_THRESHOLD)
        .ok_or_else(|| FastlyStatsError::AmbiguousField {
            query: query.to_string(),
            suggestions: top_n(&query_normalized, &normalized, AMBIGUOUS_SUGGESTIONS)
                .iter()
                .map(|s| fields[s.index].clone())
                .collect(),
        })?;

    let related = top_n(&query_normalized, &normalized, RELATED_FIELDS)
        .iter()
        .filter(|s| s.index != best.index)
        .map(|s| fields[s.index].clone())
        .collect();

    debug!(query, field = %fields[best.index], score = best.score, "resolved field");
    Ok(FieldMatch {
        field: fields[best.index].clone(),
        score: best.score,
        related,
    })
}
