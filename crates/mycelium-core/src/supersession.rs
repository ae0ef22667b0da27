//! Read-time supersession.
//!
//! A candidate is stale when another candidate in the same retrieval names
//! its timestamp in `supersedes`. Chains are not followed: if A supersedes B
//! and C supersedes A, both A and B are flagged on their own.

use crate::types::MemoryEntry;
use std::collections::HashSet;

/// Stale flag per candidate, index-aligned with `candidates`.
pub fn resolve_stale(candidates: &[MemoryEntry]) -> Vec<bool> {
    let replaced: HashSet<&str> = candidates
        .iter()
        .filter_map(|e| e.supersedes.as_deref())
        .collect();
    candidates
        .iter()
        .map(|e| replaced.contains(e.timestamp.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Confidence, EntryBody, Urgency};

    fn entry(ts: &str, supersedes: Option<&str>) -> MemoryEntry {
        MemoryEntry {
            timestamp: ts.to_string(),
            agent: "forge".to_string(),
            domain: vec!["code".to_string()],
            urgency: Urgency::Routine,
            confidence: Confidence::Observation,
            content: format!("entry at {ts}"),
            reference: None,
            supersedes: supersedes.map(str::to_string),
            body: EntryBody::Lesson,
        }
    }

    #[test]
    fn superseded_candidate_is_flagged() {
        let b = entry("2026-01-01T00:00:00Z", None);
        let a = entry("2026-01-02T00:00:00Z", Some("2026-01-01T00:00:00Z"));
        assert_eq!(resolve_stale(&[b, a]), vec![true, false]);
    }

    #[test]
    fn chains_flag_each_link_independently() {
        let b = entry("2026-01-01T00:00:00Z", None);
        let a = entry("2026-01-02T00:00:00Z", Some("2026-01-01T00:00:00Z"));
        let c = entry("2026-01-03T00:00:00Z", Some("2026-01-02T00:00:00Z"));
        assert_eq!(resolve_stale(&[b, a, c]), vec![true, true, false]);
    }

    #[test]
    fn pointer_outside_candidate_set_flags_nothing() {
        let a = entry("2026-01-02T00:00:00Z", Some("2025-12-31T00:00:00Z"));
        assert_eq!(resolve_stale(&[a]), vec![false]);
    }
}
