//! Ranking stage of the `taste` pipeline.
//!
//! Candidates arrive already domain-filtered, in scan order. Supersession is
//! resolved over the whole candidate set before the self-authorship policy
//! runs, so an update written by the requester still marks the entry it
//! replaces as stale.

use crate::config::SelfAuthorship;
use crate::ledger::ResonanceLedger;
use crate::scoring::{authored_score, base_score};
use crate::supersession::resolve_stale;
use crate::types::{MemoryEntry, Tasted};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Who is asking, and how their own entries are treated.
#[derive(Debug, Clone, Copy)]
pub struct RankOptions<'a> {
    pub requester: &'a str,
    pub self_authored: SelfAuthorship,
    pub self_weight: f64,
}

/// A candidate with its read-time score.
#[derive(Debug, Clone)]
pub struct Ranked {
    pub entry: MemoryEntry,
    pub fingerprint: String,
    pub stale: bool,
    pub score: f64,
}

impl Ranked {
    /// Drop the internal scoring fields for hand-off to a caller.
    pub fn into_tasted(self) -> Tasted {
        Tasted {
            entry: self.entry,
            stale: self.stale,
        }
    }
}

/// Sort descending by score. The sort is stable, so ties keep scan order.
pub(crate) fn sort_ranked(ranked: &mut [Ranked]) {
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Score and order candidates for `taste`.
pub fn rank(
    candidates: Vec<MemoryEntry>,
    ledger: &ResonanceLedger,
    options: RankOptions<'_>,
    now: DateTime<Utc>,
) -> Vec<Ranked> {
    let stale = resolve_stale(&candidates);

    let mut ranked: Vec<Ranked> = candidates
        .into_iter()
        .zip(stale)
        .filter_map(|(entry, stale)| {
            let fingerprint = entry.fingerprint();
            let base = base_score(&entry, ledger.taste_count(&fingerprint), stale, now);
            let score = authored_score(
                &entry,
                options.requester,
                base,
                options.self_authored,
                options.self_weight,
            )?;
            Some(Ranked {
                entry,
                fingerprint,
                stale,
                score,
            })
        })
        .collect();

    sort_ranked(&mut ranked);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_timestamp, Confidence, EntryBody, Urgency};
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        parse_timestamp("2026-06-01T00:00:00Z").unwrap()
    }

    fn entry(agent: &str, ts: &str, confidence: Confidence, content: &str) -> MemoryEntry {
        MemoryEntry {
            timestamp: ts.to_string(),
            agent: agent.to_string(),
            domain: vec!["code".to_string()],
            urgency: Urgency::Routine,
            confidence,
            content: content.to_string(),
            reference: None,
            supersedes: None,
            body: EntryBody::Lesson,
        }
    }

    fn options(requester: &str, policy: SelfAuthorship) -> RankOptions<'_> {
        RankOptions {
            requester,
            self_authored: policy,
            self_weight: 0.5,
        }
    }

    fn empty_ledger() -> (ResonanceLedger, TempDir) {
        let dir = TempDir::new().unwrap();
        (ResonanceLedger::load(dir.path().join("ledger.json")), dir)
    }

    #[test]
    fn higher_confidence_ranks_first() {
        let (ledger, _dir) = empty_ledger();
        let candidates = vec![
            entry("a", "2026-06-01T00:00:00Z", Confidence::Speculation, "maybe"),
            entry("b", "2026-06-01T00:00:00Z", Confidence::Canonical, "always"),
        ];
        let ranked = rank(candidates, &ledger, options("reader", SelfAuthorship::Weight), now());
        assert_eq!(ranked[0].entry.content, "always");
    }

    #[test]
    fn ties_keep_scan_order() {
        let (ledger, _dir) = empty_ledger();
        let candidates: Vec<MemoryEntry> = (0..5)
            .map(|i| entry("a", "2026-06-01T00:00:00Z", Confidence::Observation, &format!("n{i}")))
            .collect();
        let ranked = rank(candidates, &ledger, options("reader", SelfAuthorship::Weight), now());
        let order: Vec<&str> = ranked.iter().map(|r| r.entry.content.as_str()).collect();
        assert_eq!(order, vec!["n0", "n1", "n2", "n3", "n4"]);
    }

    #[test]
    fn own_entries_are_halved_or_excluded() {
        let (ledger, _dir) = empty_ledger();
        let candidates = vec![
            entry("me", "2026-06-01T00:00:00Z", Confidence::Proven, "mine"),
            entry("them", "2026-06-01T00:00:00Z", Confidence::Hypothesis, "theirs"),
        ];

        let weighted = rank(candidates.clone(), &ledger, options("me", SelfAuthorship::Weight), now());
        assert_eq!(weighted[0].entry.content, "theirs");
        assert!((weighted[1].score - 1.5).abs() < 1e-9);

        let excluded = rank(candidates, &ledger, options("me", SelfAuthorship::Exclude), now());
        assert_eq!(excluded.len(), 1);
        assert_eq!(excluded[0].entry.content, "theirs");
    }

    #[test]
    fn aged_own_entry_stays_below_identical_foreign_one() {
        let (ledger, _dir) = empty_ledger();
        // well over a year old: both base scores are negative
        let candidates = vec![
            entry("forge", "2025-01-01T00:00:00Z", Confidence::Observation, "mine"),
            entry("alpha", "2025-01-01T00:00:00Z", Confidence::Observation, "theirs"),
        ];
        let ranked = rank(candidates, &ledger, options("forge", SelfAuthorship::Weight), now());
        assert!(ranked[1].score < 0.0);
        let order: Vec<&str> = ranked.iter().map(|r| r.entry.content.as_str()).collect();
        assert_eq!(order, vec!["theirs", "mine"]);
    }

    #[test]
    fn own_update_still_marks_replaced_entry_stale() {
        let (ledger, _dir) = empty_ledger();
        let old = entry("them", "2026-05-01T00:00:00Z", Confidence::Proven, "old");
        let mut new = entry("me", "2026-05-02T00:00:00Z", Confidence::Proven, "new");
        new.supersedes = Some(old.timestamp.clone());

        let ranked = rank(vec![old, new], &ledger, options("me", SelfAuthorship::Exclude), now());
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].stale);
    }

    #[test]
    fn into_tasted_keeps_stale_flag() {
        let (ledger, _dir) = empty_ledger();
        let old = entry("a", "2026-05-01T00:00:00Z", Confidence::Proven, "old");
        let mut new = entry("a", "2026-05-02T00:00:00Z", Confidence::Proven, "new");
        new.supersedes = Some(old.timestamp.clone());

        let tasted: Vec<Tasted> = rank(vec![old, new], &ledger, options("r", SelfAuthorship::Weight), now())
            .into_iter()
            .map(Ranked::into_tasted)
            .collect();
        assert_eq!(tasted[0].entry.content, "new");
        assert!(!tasted[0].stale);
        assert!(tasted[1].stale);
    }
}
