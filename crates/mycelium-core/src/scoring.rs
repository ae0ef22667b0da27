//! Relevance scoring.
//!
//! `score = taste_count * TASTE_BOOST + confidence + urgency
//!          - age_days * DECAY_PER_DAY - (SUPERSEDED_PENALTY if stale)`
//!
//! Scores depend on the current instant and are recomputed on every read,
//! never stored.

use crate::config::SelfAuthorship;
use crate::ledger::ResonanceLedger;
use crate::types::MemoryEntry;
use chrono::{DateTime, Utc};

/// Points per recorded taste.
pub const TASTE_BOOST: f64 = 1.5;
/// Points lost per day of age.
pub const DECAY_PER_DAY: f64 = 0.05;
/// Points lost when a newer candidate supersedes the entry.
pub const SUPERSEDED_PENALTY: f64 = 2.0;

/// Score from already-resolved inputs.
pub fn base_score(entry: &MemoryEntry, taste_count: u64, stale: bool, now: DateTime<Utc>) -> f64 {
    let taste = taste_count as f64 * TASTE_BOOST;
    let decay = entry.age_days(now) * DECAY_PER_DAY;
    let penalty = if stale { SUPERSEDED_PENALTY } else { 0.0 };
    taste + entry.confidence.weight() + entry.urgency.weight() - decay - penalty
}

/// Score an entry against the ledger.
pub fn score(entry: &MemoryEntry, ledger: &ResonanceLedger, stale: bool, now: DateTime<Utc>) -> f64 {
    base_score(entry, ledger.taste_count(&entry.fingerprint()), stale, now)
}

/// Apply the self-authorship policy to a base score.
/// `None` means the entry is excluded from the requester's results.
///
/// Under `Weight` the score moves down by `(1 - self_weight)` of its
/// magnitude, so a negative score gets more negative rather than closer to
/// zero. For positive scores this is `base * self_weight`.
pub fn authored_score(
    entry: &MemoryEntry,
    requester: &str,
    base: f64,
    policy: SelfAuthorship,
    self_weight: f64,
) -> Option<f64> {
    if entry.agent != requester {
        return Some(base);
    }
    match policy {
        SelfAuthorship::Exclude => None,
        SelfAuthorship::Weight => Some(base - base.abs() * (1.0 - self_weight)),
    }
}
