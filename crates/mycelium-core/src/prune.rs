//! Retention sweep.
//!
//! An entry goes only when its score is below the threshold and it is older
//! than the age cutoff. Canonical or critical entries never go. Lines that do
//! not parse are kept verbatim.

use crate::error::Result;
use crate::ledger::ResonanceLedger;
use crate::scoring::score;
use crate::store::Partition;
use crate::types::{Confidence, MemoryEntry, Urgency};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::info;

/// Entries the sweep selected for removal.
#[derive(Debug, Clone)]
pub struct PrunedEntry {
    pub entry: MemoryEntry,
    pub score: f64,
    pub partition: PathBuf,
}

/// Outcome of a sweep. `removed` is the same in preview and apply mode.
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    /// Lines retained across all partitions, malformed ones included.
    pub kept: usize,
    pub removed: Vec<PrunedEntry>,
    /// True when partitions were actually rewritten.
    pub applied: bool,
}

/// Canonical knowledge and critical warnings are never swept.
pub fn is_exempt(entry: &MemoryEntry) -> bool {
    entry.confidence == Confidence::Canonical || entry.urgency == Urgency::Critical
}

/// Removal rule for one entry.
pub fn should_remove(entry: &MemoryEntry, score: f64, now: DateTime<Utc>, min_score: f64, older_than_days: u32) -> bool {
    !is_exempt(entry) && score < min_score && entry.age_days(now) > f64::from(older_than_days)
}

/// Sweep one partition, rewriting it when `apply` is set and something was
/// selected. Returns `(kept, removed)`.
pub(crate) fn sweep_partition(
    partition: &Partition,
    ledger: &ResonanceLedger,
    min_score: f64,
    older_than_days: u32,
    now: DateTime<Utc>,
    apply: bool,
) -> Result<(usize, Vec<PrunedEntry>)> {
    let lines = partition.raw_lines()?;
    let mut retained = Vec::with_capacity(lines.len());
    let mut removed = Vec::new();

    for line in lines {
        let Ok(entry) = serde_json::from_str::<MemoryEntry>(&line) else {
            retained.push(line);
            continue;
        };
        // Supersession is a retrieval-time notion; the sweep scores unflagged.
        let entry_score = score(&entry, ledger, false, now);
        if should_remove(&entry, entry_score, now, min_score, older_than_days) {
            removed.push(PrunedEntry {
                entry,
                score: entry_score,
                partition: partition.path().to_path_buf(),
            });
        } else {
            retained.push(line);
        }
    }

    if apply && !removed.is_empty() {
        partition.rewrite(&retained)?;
        info!(
            "Pruned {} entries from {}, {} kept",
            removed.len(),
            partition.path().display(),
            retained.len()
        );
    }
    Ok((retained.len(), removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_timestamp, EntryBody};
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        parse_timestamp("2026-06-01T00:00:00Z").unwrap()
    }

    fn entry(ts: &str, confidence: Confidence, urgency: Urgency, content: &str) -> MemoryEntry {
        MemoryEntry {
            timestamp: ts.to_string(),
            agent: "forge".to_string(),
            domain: vec!["code".to_string()],
            urgency,
            confidence,
            content: content.to_string(),
            reference: None,
            supersedes: None,
            body: EntryBody::Lesson,
        }
    }

    #[test]
    fn exempt_entries_survive_any_threshold() {
        let old = "2020-01-01T00:00:00Z";
        let canonical = entry(old, Confidence::Canonical, Urgency::Routine, "c");
        let critical = entry(old, Confidence::Speculation, Urgency::Critical, "k");
        for e in [&canonical, &critical] {
            assert!(is_exempt(e));
            assert!(!should_remove(e, -100.0, now(), f64::MAX, 0));
        }
    }

    #[test]
    fn both_conditions_are_required() {
        let old = entry("2026-01-01T00:00:00Z", Confidence::Speculation, Urgency::Routine, "o");
        let young = entry("2026-05-30T00:00:00Z", Confidence::Speculation, Urgency::Routine, "y");
        assert!(should_remove(&old, 0.1, now(), 0.5, 30));
        assert!(!should_remove(&old, 0.9, now(), 0.5, 30));
        assert!(!should_remove(&young, 0.1, now(), 0.5, 30));
    }

    #[test]
    fn preview_leaves_file_untouched_and_apply_rewrites() {
        let dir = TempDir::new().unwrap();
        let ledger = ResonanceLedger::load(dir.path().join("ledger.json"));
        let partition = Partition::at(dir.path().join("code.jsonl"));
        partition
            .append(&entry("2025-01-01T00:00:00Z", Confidence::Speculation, Urgency::Routine, "stale guess"))
            .unwrap();
        partition
            .append(&entry("2025-01-01T00:00:00Z", Confidence::Canonical, Urgency::Routine, "rule"))
            .unwrap();
        let mut raw = std::fs::read_to_string(partition.path()).unwrap();
        raw.push_str("garbage line\n");
        std::fs::write(partition.path(), &raw).unwrap();

        let (kept, removed) = sweep_partition(&partition, &ledger, 0.5, 30, now(), false).unwrap();
        assert_eq!(kept, 2);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].entry.content, "stale guess");
        assert_eq!(std::fs::read_to_string(partition.path()).unwrap(), raw);

        let (kept, removed) = sweep_partition(&partition, &ledger, 0.5, 30, now(), true).unwrap();
        assert_eq!((kept, removed.len()), (2, 1));
        let lines = partition.raw_lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&"garbage line".to_string()));
        assert!(!lines.iter().any(|l| l.contains("stale guess")));
    }

    #[test]
    fn nothing_selected_means_no_rewrite() {
        let dir = TempDir::new().unwrap();
        let ledger = ResonanceLedger::load(dir.path().join("ledger.json"));
        let partition = Partition::at(dir.path().join("missing.jsonl"));
        let (kept, removed) = sweep_partition(&partition, &ledger, 0.5, 30, now(), true).unwrap();
        assert_eq!((kept, removed.len()), (0, 0));
        assert!(!partition.exists());
    }
}
