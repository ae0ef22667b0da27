//! Ghost matching: past deliberations ranked against a query context.
//!
//! `relevance = keyword_overlap * KEYWORD_WEIGHT + base_score * BASE_WEIGHT`
//!
//! Ghosts are never filtered by author. What carries over between agents is
//! the shape of the reasoning, not who did it.

use crate::ledger::ResonanceLedger;
use crate::retrieval::{sort_ranked, Ranked};
use crate::scoring::base_score;
use crate::supersession::resolve_stale;
use crate::types::MemoryEntry;
use chrono::{DateTime, Utc};

pub const KEYWORD_WEIGHT: f64 = 2.0;
pub const BASE_WEIGHT: f64 = 0.3;

/// Lowercased text a ghost is matched against: branch labels, branch
/// reasoning, collapse target, collapse reason, domain tags.
fn haystack(entry: &MemoryEntry) -> String {
    let Some(trace) = entry.ghost() else {
        return String::new();
    };
    let labels: Vec<&str> = trace.branches.iter().map(|b| b.label.as_str()).collect();
    let reasons: Vec<&str> = trace.branches.iter().map(|b| b.reasoning.as_str()).collect();
    [
        labels.join(" "),
        reasons.join(" "),
        trace.collapsed_to.clone(),
        trace.collapse_reason.clone(),
        entry.domain.join(" "),
    ]
    .join(" ")
    .to_lowercase()
}

/// Fraction of `keywords` found as case-insensitive substrings.
/// `None` when there are no usable keywords.
pub fn keyword_overlap(entry: &MemoryEntry, keywords: &[String]) -> Option<f64> {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return None;
    }
    let text = haystack(entry);
    let hits = keywords.iter().filter(|k| text.contains(k.as_str())).count();
    Some(hits as f64 / keywords.len() as f64)
}

pub fn ghost_relevance(overlap: f64, base: f64) -> f64 {
    overlap * KEYWORD_WEIGHT + base * BASE_WEIGHT
}

/// Score and order ghost candidates. Non-ghost entries are dropped.
/// `neutral` stands in for the overlap when no keywords are supplied.
pub fn rank_ghosts(
    candidates: Vec<MemoryEntry>,
    ledger: &ResonanceLedger,
    keywords: &[String],
    neutral: f64,
    now: DateTime<Utc>,
) -> Vec<Ranked> {
    let ghosts: Vec<MemoryEntry> = candidates.into_iter().filter(MemoryEntry::is_ghost).collect();
    let stale = resolve_stale(&ghosts);

    let mut ranked: Vec<Ranked> = ghosts
        .into_iter()
        .zip(stale)
        .map(|(entry, stale)| {
            let fingerprint = entry.fingerprint();
            let base = base_score(&entry, ledger.taste_count(&fingerprint), stale, now);
            let overlap = keyword_overlap(&entry, keywords).unwrap_or(neutral);
            Ranked {
                score: ghost_relevance(overlap, base),
                entry,
                fingerprint,
                stale,
            }
        })
        .collect();

    sort_ranked(&mut ranked);
    ranked
}
