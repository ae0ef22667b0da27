//! The `Mycelium` handle: the write path, the two retrieval pipelines, the
//! retention sweep and the read-only reports.

use crate::config::MyceliumConfig;
use crate::dedup::DedupWindow;
use crate::error::{MyceliumError, Result};
use crate::fingerprint::content_fingerprint;
use crate::ghosts::rank_ghosts;
use crate::ledger::{ResonanceLedger, LEDGER_FILE};
use crate::prune::{sweep_partition, PruneReport};
use crate::report::{resonance_rows, ResonanceOrder, ResonanceRow, Stats};
use crate::retrieval::{rank, RankOptions, Ranked};
use crate::store::EntryStore;
use crate::types::{
    normalize_domains, Branch, Confidence, EntryBody, GhostTrace, Kind, MemoryEntry, Tasted,
    Urgency,
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Arguments to [`Mycelium::exude`].
#[derive(Debug, Clone, Default)]
pub struct Exude {
    pub agent: String,
    pub domains: Vec<String>,
    pub content: String,
    pub kind: Kind,
    pub urgency: Urgency,
    pub confidence: Confidence,
    pub reference: Option<String>,
    pub supersedes: Option<String>,
}

impl Exude {
    pub fn new(agent: impl Into<String>, domains: Vec<String>, content: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            domains,
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Arguments to [`Mycelium::superpose`].
#[derive(Debug, Clone, Default)]
pub struct Superpose {
    pub agent: String,
    pub domains: Vec<String>,
    pub branches: Vec<Branch>,
    pub collapsed_to: String,
    pub collapse_reason: String,
    pub urgency: Urgency,
}

/// Open substrate: store, dedup window and ledger location.
#[derive(Debug)]
pub struct Mycelium {
    config: MyceliumConfig,
    store: EntryStore,
    dedup: DedupWindow,
    ledger_path: PathBuf,
}

impl Mycelium {
    /// Open the substrate described by `config` and warm the dedup window
    /// from the tail of every partition.
    pub fn open(config: MyceliumConfig) -> Result<Self> {
        config.validate()?;
        let root = config.data_path();
        let store = EntryStore::open(&root)?;
        let mut dedup = DedupWindow::new(config.dedup_window);
        store.warm(&mut dedup)?;
        info!("Opened mycelium at {}", root.display());
        Ok(Self {
            ledger_path: root.join(LEDGER_FILE),
            config,
            store,
            dedup,
        })
    }

    /// Shorthand for a default config rooted at `dir`.
    pub fn open_at(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(MyceliumConfig::with_data_dir(dir))
    }

    pub fn config(&self) -> &MyceliumConfig {
        &self.config
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Fresh snapshot of the resonance ledger.
    pub fn ledger(&self) -> ResonanceLedger {
        ResonanceLedger::load(&self.ledger_path)
    }

    /// Write a lesson or question. `Ok(None)` means the content repeats a
    /// recent write in the same primary domain and nothing was stored.
    pub fn exude(&mut self, request: Exude) -> Result<Option<MemoryEntry>> {
        let body = match request.kind {
            Kind::Lesson => EntryBody::Lesson,
            Kind::Question => EntryBody::Question,
            Kind::Ghost => {
                return Err(MyceliumError::InvalidEntry(
                    "ghost traces are written with superpose".into(),
                ))
            }
        };
        let content = request.content.trim();
        if content.is_empty() {
            return Err(MyceliumError::InvalidEntry("content must not be empty".into()));
        }

        let mut entry = MemoryEntry::new(check_agent(&request.agent)?, request.domains, content, body);
        entry.urgency = request.urgency;
        entry.confidence = request.confidence;
        entry.reference = request.reference.filter(|r| !r.trim().is_empty());
        entry.supersedes = request.supersedes.filter(|s| !s.trim().is_empty());
        self.write(entry)
    }

    /// Record a deliberation. Branch weights are normalized to sum to 1.0.
    pub fn superpose(&mut self, request: Superpose) -> Result<Option<MemoryEntry>> {
        if request.branches.is_empty() {
            return Err(MyceliumError::InvalidEntry("a ghost trace needs at least one branch".into()));
        }
        if request.collapsed_to.trim().is_empty() {
            return Err(MyceliumError::InvalidEntry("collapsed_to must not be empty".into()));
        }

        let trace = GhostTrace::normalized(request.branches, request.collapsed_to, request.collapse_reason);
        let summary = trace.summary();
        let mut entry = MemoryEntry::new(
            check_agent(&request.agent)?,
            request.domains,
            summary,
            EntryBody::Ghost(trace),
        );
        entry.urgency = request.urgency;
        entry.confidence = Confidence::Observation;
        self.write(entry)
    }

    fn write(&mut self, entry: MemoryEntry) -> Result<Option<MemoryEntry>> {
        let domain = entry.primary_domain().to_string();
        if self.dedup.is_duplicate(&domain, &entry) {
            info!("Dropped duplicate {} from {} in {domain}", entry.kind(), entry.agent);
            return Ok(None);
        }
        if let Err(e) = self.store.append(&entry) {
            self.dedup.forget(&domain, &content_fingerprint(&entry));
            return Err(e);
        }
        info!("Exuded {} from {} into {domain}", entry.kind(), entry.agent);
        Ok(Some(entry))
    }

    /// Ranked entries for `agent` from `domains` (every domain when empty).
    /// With `record`, each returned entry's taste count goes up by one.
    pub fn taste(&self, agent: &str, domains: &[String], limit: usize, record: bool) -> Result<Vec<Tasted>> {
        let domains = requested_domains(domains);
        let candidates: Vec<MemoryEntry> = self.store.scan(&domains, true)?.collect();
        let scanned = candidates.len();
        let now = Utc::now();

        let mut ledger = self.ledger();
        let options = RankOptions {
            requester: agent,
            self_authored: self.config.self_authored,
            self_weight: self.config.self_weight,
        };
        let mut ranked = rank(candidates, &ledger, options, now);
        ranked.truncate(limit);

        if record {
            ledger.record_tastes(&fingerprints(&ranked), now)?;
        }
        debug!(
            "Taste for {agent} over {:?}: {} of {scanned} candidates",
            domains,
            ranked.len()
        );
        Ok(ranked.into_iter().map(Ranked::into_tasted).collect())
    }

    /// Ghost traces from `domains` ranked against `keywords`. Always recorded
    /// in the ledger.
    pub fn taste_ghosts(
        &self,
        agent: &str,
        domains: &[String],
        keywords: Option<&[String]>,
        limit: usize,
    ) -> Result<Vec<Tasted>> {
        let domains = requested_domains(domains);
        let candidates: Vec<MemoryEntry> = self
            .store
            .scan(&domains, true)?
            .filter(MemoryEntry::is_ghost)
            .collect();
        let now = Utc::now();

        let mut ledger = self.ledger();
        let mut ranked = rank_ghosts(
            candidates,
            &ledger,
            keywords.unwrap_or_default(),
            self.config.ghost_neutral_relevance,
            now,
        );
        ranked.truncate(limit);

        ledger.record_tastes(&fingerprints(&ranked), now)?;
        debug!("Ghost taste for {agent} over {:?}: {} traces", domains, ranked.len());
        Ok(ranked.into_iter().map(Ranked::into_tasted).collect())
    }

    /// Retention sweep over the legacy file and every partition. Storage is
    /// only touched when `apply` is set.
    pub fn prune(&self, min_score: f64, older_than_days: u32, apply: bool) -> Result<PruneReport> {
        let ledger = self.ledger();
        let now = Utc::now();
        let mut report = PruneReport {
            applied: apply,
            ..Default::default()
        };
        for partition in self.store.sweep_targets() {
            let (kept, removed) = sweep_partition(partition, &ledger, min_score, older_than_days, now, apply)?;
            report.kept += kept;
            report.removed.extend(removed);
        }
        info!(
            "Sweep (score < {min_score}, older than {older_than_days}d, apply={apply}): {} removed, {} kept",
            report.removed.len(),
            report.kept
        );
        Ok(report)
    }

    /// Entries ordered by score with their ledger history. Read-only.
    pub fn resonance(&self, order: ResonanceOrder, top: usize) -> Result<Vec<ResonanceRow>> {
        let entries: Vec<MemoryEntry> = self.store.scan(&[], true)?.collect();
        Ok(resonance_rows(entries, &self.ledger(), order, top, Utc::now()))
    }

    pub fn stats(&self) -> Result<Stats> {
        let ledger = self.ledger();
        let partitions = self.store.registry().len();
        Ok(Stats::collect(self.store.scan(&[], true)?, &ledger, partitions))
    }
}

fn check_agent(agent: &str) -> Result<&str> {
    let agent = agent.trim();
    if agent.is_empty() {
        return Err(MyceliumError::InvalidEntry("agent must not be empty".into()));
    }
    Ok(agent)
}

/// Trimmed, non-empty domain filter. Empty means every domain.
fn requested_domains(domains: &[String]) -> Vec<String> {
    if domains.iter().all(|d| d.trim().is_empty()) {
        return Vec::new();
    }
    normalize_domains(domains)
}

fn fingerprints(ranked: &[Ranked]) -> Vec<String> {
    ranked.iter().map(|r| r.fingerprint.clone()).collect()
}
