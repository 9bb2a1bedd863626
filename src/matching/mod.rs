//! Approximate string matching over candidate lists

pub mod scorer;

pub use scorer::{simple_ratio, weighted_ratio};

/// Scoring function on a 0..=100 scale
pub type Scorer = fn(&str, &str) -> u8;

/// A candidate with its similarity score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scored<'a> {
    pub candidate: &'a str,
    /// Position in the original candidate list
    pub index: usize,
    pub score: u8,
}

/// Score every candidate against the query, in candidate order
pub fn score_all<'a, S: AsRef<str>>(
    query: &str,
    candidates: &'a [S],
    scorer: Scorer,
) -> Vec<Scored<'a>> {
    candidates
        .iter()
        .enumerate()
        .map(|(index, c)| Scored {
            candidate: c.as_ref(),
            index,
            score: scorer(query, c.as_ref()),
        })
        .collect()
}

/// Highest-scoring entry; the earliest wins ties
pub fn best_of<'a>(scored: impl IntoIterator<Item = Scored<'a>>) -> Option<Scored<'a>> {
    scored.into_iter().fold(None, |best, s| match best {
        Some(b) if b.score >= s.score => Some(b),
        _ => Some(s),
    })
}

/// Single best candidate by weighted similarity
pub fn best_match<'a, S: AsRef<str>>(query: &str, candidates: &'a [S]) -> Option<Scored<'a>> {
    best_match_by(query, candidates, weighted_ratio)
}

pub fn best_match_by<'a, S: AsRef<str>>(
    query: &str,
    candidates: &'a [S],
    scorer: Scorer,
) -> Option<Scored<'a>> {
    best_of(score_all(query, candidates, scorer))
}

/// Up to `n` candidates by descending weighted similarity, ties in candidate order
pub fn top_n<'a, S: AsRef<str>>(query: &str, candidates: &'a [S], n: usize) -> Vec<Scored<'a>> {
    let mut scored = score_all(query, candidates, weighted_ratio);
    // stable sort keeps original order among equal scores
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(n);
    scored
}
