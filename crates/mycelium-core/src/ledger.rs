//! Resonance ledger: how often each entry has been handed back to a reader.
//!
//! Stored as one JSON object, fingerprint → `{taste_count, last_tasted}`,
//! rewritten wholesale on every update. The ledger is a derived index; a
//! missing or corrupt file reads as empty and only costs ranking quality.

use crate::error::Result;
use crate::store::write_atomic;
use crate::types::format_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Ledger file name under the data directory.
pub const LEDGER_FILE: &str = "mycelium.resonance.json";

/// Retrieval history of one entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResonanceRecord {
    #[serde(default)]
    pub taste_count: u64,
    #[serde(default)]
    pub last_tasted: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResonanceLedger {
    path: PathBuf,
    records: BTreeMap<String, ResonanceRecord>,
}

impl ResonanceLedger {
    /// Load the ledger at `path`. Missing, unreadable, or corrupt files give
    /// an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = Self::read_records(&path);
        Self { path, records }
    }

    fn read_records(path: &Path) -> BTreeMap<String, ResonanceRecord> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!("Could not read resonance ledger {}: {e}", path.display());
                return BTreeMap::new();
            }
        };
        if raw.trim().is_empty() {
            return BTreeMap::new();
        }
        match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "Resonance ledger {} is corrupt, ranking without it: {e}",
                    path.display()
                );
                BTreeMap::new()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, fingerprint: &str) -> Option<&ResonanceRecord> {
        self.records.get(fingerprint)
    }

    pub fn taste_count(&self, fingerprint: &str) -> u64 {
        self.records.get(fingerprint).map_or(0, |r| r.taste_count)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of all taste counts.
    pub fn total_tastes(&self) -> u64 {
        self.records.values().map(|r| r.taste_count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResonanceRecord)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Count one taste for each fingerprint and persist.
    ///
    /// The file is re-read right before the update to narrow the window in
    /// which a concurrent writer's increments are lost. There is no lock;
    /// two overlapping updates can still drop one another's counts.
    pub fn record_tastes(&mut self, fingerprints: &[String], now: DateTime<Utc>) -> Result<()> {
        if fingerprints.is_empty() {
            return Ok(());
        }
        self.records = Self::read_records(&self.path);

        let stamp = format_timestamp(now);
        for fp in fingerprints {
            let record = self.records.entry(fp.clone()).or_default();
            record.taste_count += 1;
            record.last_tasted = Some(stamp.clone());
        }
        self.save()?;
        debug!("Recorded {} tastes in {}", fingerprints.len(), self.path.display());
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.records)?;
        write_atomic(&self.path, json.as_bytes())
    }
}
