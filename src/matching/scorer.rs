//! Similarity scorers on a 0..=100 scale
//!
//! `weighted_ratio` blends a plain edit ratio with partial (substring) and
//! token-based (order independent) variants, picking whichever explains the
//! pair best. All scorers are case-insensitive and run on processed input.

use std::collections::BTreeSet;

/// Scale applied to token-based ratios so they never beat an equal plain ratio
const UNBASE_SCALE: f64 = 0.95;

/// Scale applied to partial ratios for moderately different lengths
const PARTIAL_SCALE: f64 = 0.90;

/// Scale applied to partial ratios when one string dwarfs the other
const LONG_PARTIAL_SCALE: f64 = 0.60;

/// Length ratio below which partial matching is not attempted
const PARTIAL_MIN_LEN_RATIO: f64 = 1.5;

/// Length ratio above which `LONG_PARTIAL_SCALE` applies
const LONG_LEN_RATIO: f64 = 8.0;

/// Lowercase, replace punctuation other than `-` and `_` with spaces,
/// collapse runs of whitespace.
pub fn process(s: &str) -> String {
    let mapped: String = s
        .chars()
        .flat_map(|c| {
            let keep = c.is_alphanumeric() || c == '-' || c == '_';
            let c = if keep { c } else { ' ' };
            c.to_lowercase()
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Length of the longest common subsequence of two char slices
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Indel similarity: 2 * LCS / (len(a) + len(b)). Empty input scores 0.
fn ratio_chars(a: &[char], b: &[char]) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let total = (a.len() + b.len()) as f64;
    let sim = 2.0 * lcs_len(a, b) as f64 / total;
    (sim * 100.0).round() as u8
}

/// Best ratio of the shorter string against every equal-length window of the longer
fn partial_ratio_chars(a: &[char], b: &[char]) -> u8 {
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if shorter.is_empty() {
        return 0;
    }
    let mut best = 0;
    for window in longer.windows(shorter.len()) {
        best = best.max(ratio_chars(shorter, window));
        if best == 100 {
            break;
        }
    }
    best
}

pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    partial_ratio_chars(&a, &b)
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Ratio after sorting whitespace tokens, so word order does not matter
pub fn token_sort_ratio(a: &str, b: &str, partial: bool) -> u8 {
    let a = sorted_tokens(a);
    let b = sorted_tokens(b);
    if partial {
        partial_ratio(&a, &b)
    } else {
        ratio(&a, &b)
    }
}

/// Ratio over the shared tokens plus each side's remainder
pub fn token_set_ratio(a: &str, b: &str, partial: bool) -> u8 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();

    let join = |tokens: Vec<&str>| tokens.join(" ");
    let sect = join(ta.intersection(&tb).copied().collect());
    let only_a = join(ta.difference(&tb).copied().collect());
    let only_b = join(tb.difference(&ta).copied().collect());

    let combined_a = format!("{} {}", sect, only_a).trim().to_string();
    let combined_b = format!("{} {}", sect, only_b).trim().to_string();

    let score = |x: &str, y: &str| {
        if partial {
            partial_ratio(x, y)
        } else {
            ratio(x, y)
        }
    };

    score(&sect, &combined_a)
        .max(score(&sect, &combined_b))
        .max(score(&combined_a, &combined_b))
}

/// Plain ratio on processed input. Used for short fixed vocabularies.
pub fn simple_ratio(a: &str, b: &str) -> u8 {
    ratio(&process(a), &process(b))
}

/// Weighted similarity of two strings
pub fn weighted_ratio(a: &str, b: &str) -> u8 {
    let p1 = process(a);
    let p2 = process(b);
    if p1.is_empty() || p2.is_empty() {
        return 0;
    }

    let base = ratio(&p1, &p2) as f64;

    let len1 = p1.chars().count() as f64;
    let len2 = p2.chars().count() as f64;
    let len_ratio = len1.max(len2) / len1.min(len2);

    let best = if len_ratio < PARTIAL_MIN_LEN_RATIO {
        let sort = token_sort_ratio(&p1, &p2, false) as f64 * UNBASE_SCALE;
        let set = token_set_ratio(&p1, &p2, false) as f64 * UNBASE_SCALE;
        base.max(sort).max(set)
    } else {
        let scale = if len_ratio > LONG_LEN_RATIO {
            LONG_PARTIAL_SCALE
        } else {
            PARTIAL_SCALE
        };
        let partial = partial_ratio(&p1, &p2) as f64 * scale;
        let sort = token_sort_ratio(&p1, &p2, true) as f64 * UNBASE_SCALE * scale;
        let set = token_set_ratio(&p1, &p2, true) as f64 * UNBASE_SCALE * scale;
        base.max(partial).max(sort).max(set)
    };

    best.round() as u8
}
