//! Partitioned append-only entry store.
//!
//! Layout under the data directory:
//!
//! ```text
//! <root>/mycelium.jsonl           legacy, unpartitioned
//! <root>/domains/<domain>.jsonl   one partition per primary domain
//! ```
//!
//! Every partition is newline-delimited JSON, one entry per line. Lines that
//! fail to parse are skipped with a warning and never abort a scan.

use crate::dedup::DedupWindow;
use crate::error::{MyceliumError, Result};
use crate::fingerprint::content_fingerprint;
use crate::types::MemoryEntry;
use std::collections::{BTreeMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Lines, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory holding per-domain partitions.
pub const PARTITION_DIR: &str = "domains";
/// Legacy unpartitioned log, always scanned alongside the partitions.
pub const LEGACY_FILE: &str = "mycelium.jsonl";
const PARTITION_EXT: &str = "jsonl";

/// File stem for a domain tag. Characters outside `[A-Za-z0-9_.-]` become `_`.
///
/// Distinct tags may share a stem; they then share a file, which is harmless
/// because scans filter on each entry's own domain list.
pub fn partition_key(domain: &str) -> String {
    let key: String = domain
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match key.trim_matches('.') {
        "" => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Replace `path` with `contents` through a temporary sibling and a rename,
/// so readers see either the old file or the new one.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| MyceliumError::io(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| MyceliumError::io(dir, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| MyceliumError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| MyceliumError::io(path, e.error))?;
    Ok(())
}

/// Handle to one JSONL log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    path: PathBuf,
}

impl Partition {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append one entry as a single line.
    ///
    /// The line is serialized in full first and handed to one `write_all` on
    /// an append-mode handle, so a reader never sees half an entry.
    pub fn append(&self, entry: &MemoryEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MyceliumError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MyceliumError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| MyceliumError::io(&self.path, e))?;
        Ok(())
    }

    /// Lazily parsed entries. A missing file yields nothing.
    pub fn entries(&self) -> Result<PartitionEntries> {
        let lines = match File::open(&self.path) {
            Ok(file) => Some(BufReader::new(file).lines()),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(MyceliumError::io(&self.path, e)),
        };
        Ok(PartitionEntries {
            path: self.path.clone(),
            lines,
            line_no: 0,
        })
    }

    /// The last `n` parseable entries, oldest first.
    pub fn tail(&self, n: usize) -> Result<Vec<MemoryEntry>> {
        let mut window = VecDeque::with_capacity(n.min(1024));
        if n == 0 {
            return Ok(Vec::new());
        }
        for entry in self.entries()? {
            if window.len() == n {
                window.pop_front();
            }
            window.push_back(entry);
        }
        Ok(window.into())
    }

    /// Every non-blank line, verbatim. Used by the sweep so that lines it
    /// cannot parse survive a rewrite untouched.
    pub fn raw_lines(&self) -> Result<Vec<String>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MyceliumError::io(&self.path, e)),
        };
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| MyceliumError::io(&self.path, e))?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
        }
        Ok(out)
    }

    /// Replace the partition's contents with `lines`.
    pub fn rewrite(&self, lines: &[String]) -> Result<()> {
        let mut buf = String::new();
        for line in lines {
            buf.push_str(line);
            buf.push('\n');
        }
        write_atomic(&self.path, buf.as_bytes())
    }
}

/// Iterator over the entries of one partition.
pub struct PartitionEntries {
    path: PathBuf,
    lines: Option<Lines<BufReader<File>>>,
    line_no: usize,
}

impl Iterator for PartitionEntries {
    type Item = MemoryEntry;

    fn next(&mut self) -> Option<MemoryEntry> {
        loop {
            let line = match self.lines.as_mut()?.next()? {
                Ok(line) => line,
                Err(e) => {
                    warn!("Stopped reading {} at line {}: {e}", self.path.display(), self.line_no + 1);
                    self.lines = None;
                    return None;
                }
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<MemoryEntry>(trimmed) {
                Ok(entry) => return Some(entry),
                Err(e) => {
                    warn!(
                        "Skipping malformed entry {}:{}: {e}",
                        self.path.display(),
                        self.line_no
                    );
                }
            }
        }
    }
}

/// Lazily populated mapping from domain tag to partition handle.
#[derive(Debug, Default)]
pub struct PartitionRegistry {
    dir: PathBuf,
    partitions: BTreeMap<String, Partition>,
}

impl PartitionRegistry {
    /// Register every partition file already present in `dir`.
    pub fn discover(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let mut partitions = BTreeMap::new();

        match std::fs::read_dir(&dir) {
            Ok(read_dir) => {
                for item in read_dir {
                    let path = item.map_err(|e| MyceliumError::io(&dir, e))?.path();
                    if path.extension().and_then(|e| e.to_str()) != Some(PARTITION_EXT) {
                        continue;
                    }
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        partitions.insert(stem.to_string(), Partition::at(path.clone()));
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(MyceliumError::io(&dir, e)),
        }

        debug!("Discovered {} partitions in {}", partitions.len(), dir.display());
        Ok(Self { dir, partitions })
    }

    /// Partition for `domain`, registering it on first use. The file itself is
    /// only created by the first append.
    pub fn resolve(&mut self, domain: &str) -> &Partition {
        let key = partition_key(domain);
        let dir = &self.dir;
        self.partitions
            .entry(key)
            .or_insert_with_key(|key| Partition::at(dir.join(format!("{key}.{PARTITION_EXT}"))))
    }

    pub fn get(&self, domain: &str) -> Option<&Partition> {
        self.partitions.get(&partition_key(domain))
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Partitions in key order, paired with their key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Partition)> {
        self.partitions.iter().map(|(k, p)| (k.as_str(), p))
    }
}

/// The durable log: a legacy file plus one partition per primary domain.
#[derive(Debug)]
pub struct EntryStore {
    root: PathBuf,
    legacy: Partition,
    registry: PartitionRegistry,
}

impl EntryStore {
    /// Open the store rooted at `root`. Nothing is created until the first append.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let registry = PartitionRegistry::discover(root.join(PARTITION_DIR))?;
        Ok(Self {
            legacy: Partition::at(root.join(LEGACY_FILE)),
            root,
            registry,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn legacy(&self) -> &Partition {
        &self.legacy
    }

    pub fn registry(&self) -> &PartitionRegistry {
        &self.registry
    }

    /// Append to the partition of the entry's primary domain.
    /// Returns the entry fingerprint.
    pub fn append(&mut self, entry: &MemoryEntry) -> Result<String> {
        let partition = self.registry.resolve(entry.primary_domain());
        partition.append(entry)?;
        debug!(
            "Appended {} entry by {} to {}",
            entry.kind(),
            entry.agent,
            partition.path().display()
        );
        Ok(entry.fingerprint())
    }

    /// Entries whose domain list intersects `domains` (all entries when
    /// empty), legacy first and then partitions in key order.
    ///
    /// Every partition is consulted, not only those named in `domains`: a
    /// multi-domain entry lives in its primary partition but must match a
    /// query on any of its tags.
    pub fn scan(&self, domains: &[String], include_legacy: bool) -> Result<Scan> {
        let mut sources = Vec::with_capacity(self.registry.len() + 1);
        if include_legacy {
            sources.push(self.legacy.entries()?);
        }
        for (_, partition) in self.registry.iter() {
            sources.push(partition.entries()?);
        }
        Ok(Scan {
            sources: sources.into_iter(),
            current: None,
            domains: domains.to_vec(),
        })
    }

    /// Partitions a retention sweep walks: legacy first, then every domain.
    pub fn sweep_targets(&self) -> impl Iterator<Item = &Partition> {
        std::iter::once(&self.legacy).chain(self.registry.iter().map(|(_, p)| p))
    }

    /// Seed `window` with the content fingerprints of the most recent stored
    /// entries of each domain, so dedup survives a restart. Returns the
    /// number of entries read.
    ///
    /// The legacy file mixes domains, so it is read whole and the window's
    /// own per-domain eviction keeps the last `capacity` of each. A
    /// partition holds one primary domain, so its tail is enough.
    pub fn warm(&self, window: &mut DedupWindow) -> Result<usize> {
        let n = window.capacity();
        let mut seeded = 0;
        for entry in self.legacy.entries()? {
            window.remember(entry.primary_domain(), content_fingerprint(&entry));
            seeded += 1;
        }
        for (_, partition) in self.registry.iter() {
            for entry in partition.tail(n)? {
                window.remember(entry.primary_domain(), content_fingerprint(&entry));
                seeded += 1;
            }
        }
        debug!("Warmed dedup window from {seeded} entries");
        Ok(seeded)
    }
}

/// Lazy, domain-filtered sequence of entries from several partitions.
pub struct Scan {
    sources: std::vec::IntoIter<PartitionEntries>,
    current: Option<PartitionEntries>,
    domains: Vec<String>,
}

impl Iterator for Scan {
    type Item = MemoryEntry;

    fn next(&mut self) -> Option<MemoryEntry> {
        loop {
            if let Some(current) = self.current.as_mut() {
                for entry in current.by_ref() {
                    if entry.matches_domains(&self.domains) {
                        return Some(entry);
                    }
                }
            }
            self.current = Some(self.sources.next()?);
        }
    }
}
