//! Victim selection for the response cache.
//!
//! Each entry gets a score of `age_weight * age/max_age - hit_weight * hits/max_hits`,
//! normalized over the current candidate set. Higher scores go first; ties
//! fall to the least recently accessed entry, then to the smaller key.

use std::cmp::Ordering;

/// What the selector needs to know about an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: String,
    pub last_accessed_at: u64,
    pub hit_count: u64,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvictionWeights {
    pub age: f64,
    pub hits: f64,
}

fn ratio(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        value / max
    } else {
        0.0
    }
}

/// Order candidates from first-to-evict to last.
pub fn rank(mut candidates: Vec<Candidate>, now: u64, weights: EvictionWeights) -> Vec<Candidate> {
    let age = |c: &Candidate| now.saturating_sub(c.last_accessed_at) as f64;
    let max_age = candidates.iter().map(age).fold(0.0, f64::max);
    let max_hits = candidates.iter().map(|c| c.hit_count as f64).fold(0.0, f64::max);

    let score = |c: &Candidate| {
        weights.age * ratio(age(c), max_age) - weights.hits * ratio(c.hit_count as f64, max_hits)
    };

    candidates.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.last_accessed_at.cmp(&b.last_accessed_at))
            .then_with(|| a.key.cmp(&b.key))
    });
    candidates
}

/// Shortest prefix of `ranked` whose sizes add up to at least `needed`.
/// Returns everything when the total falls short.
pub fn take_until_freed(ranked: Vec<Candidate>, needed: usize) -> Vec<Candidate> {
    let mut freed = 0usize;
    ranked
        .into_iter()
        .take_while(|c| {
            let more = freed < needed;
            freed = freed.saturating_add(c.size_bytes);
            more
        })
        .collect()
}
