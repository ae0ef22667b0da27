//! Read-only views over the store and ledger: resonance ranking and totals.

use crate::ledger::ResonanceLedger;
use crate::scoring::base_score;
use crate::supersession::resolve_stale;
use crate::types::MemoryEntry;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One line of the resonance report.
#[derive(Debug, Clone)]
pub struct ResonanceRow {
    pub entry: MemoryEntry,
    pub score: f64,
    pub taste_count: u64,
    pub last_tasted: Option<String>,
    pub stale: bool,
}

/// Which end of the ranking to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResonanceOrder {
    #[default]
    MostResonant,
    LeastResonant,
}

/// Score every entry and return the `top` rows from the requested end.
pub fn resonance_rows(
    entries: Vec<MemoryEntry>,
    ledger: &ResonanceLedger,
    order: ResonanceOrder,
    top: usize,
    now: DateTime<Utc>,
) -> Vec<ResonanceRow> {
    let stale = resolve_stale(&entries);
    let mut rows: Vec<ResonanceRow> = entries
        .into_iter()
        .zip(stale)
        .map(|(entry, stale)| {
            let record = ledger.get(&entry.fingerprint()).cloned().unwrap_or_default();
            ResonanceRow {
                score: base_score(&entry, record.taste_count, stale, now),
                taste_count: record.taste_count,
                last_tasted: record.last_tasted,
                entry,
                stale,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        let ord = b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal);
        match order {
            ResonanceOrder::MostResonant => ord,
            ResonanceOrder::LeastResonant => ord.reverse(),
        }
    });
    rows.truncate(top);
    rows
}

/// Substrate totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_entries: usize,
    pub total_tastes: u64,
    pub ledger_entries: usize,
    pub partitions: usize,
    pub by_agent: BTreeMap<String, usize>,
    /// Counted once per tag, so multi-domain entries appear under each.
    pub by_domain: BTreeMap<String, usize>,
    pub ghosts: usize,
}

impl Stats {
    pub fn collect(
        entries: impl IntoIterator<Item = MemoryEntry>,
        ledger: &ResonanceLedger,
        partitions: usize,
    ) -> Self {
        let mut stats = Stats {
            total_tastes: ledger.total_tastes(),
            ledger_entries: ledger.len(),
            partitions,
            ..Default::default()
        };
        for entry in entries {
            stats.total_entries += 1;
            if entry.is_ghost() {
                stats.ghosts += 1;
            }
            *stats.by_agent.entry(entry.agent.clone()).or_default() += 1;
            for tag in &entry.domain {
                *stats.by_domain.entry(tag.clone()).or_default() += 1;
            }
        }
        stats
    }
}
