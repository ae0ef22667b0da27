//! Bounded per-domain dedup window.

use crate::fingerprint::content_fingerprint;
use crate::types::MemoryEntry;
use std::collections::{HashMap, VecDeque};

/// Default number of fingerprints remembered per domain.
pub const DEFAULT_WINDOW: usize = 100;

/// Recently written content fingerprints, one FIFO per domain.
///
/// Only the last `capacity` writes of a domain are remembered; an older
/// duplicate slips through. Owned by the engine and passed to every write.
#[derive(Debug, Clone)]
pub struct DedupWindow {
    capacity: usize,
    windows: HashMap<String, VecDeque<String>>,
}

impl DedupWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            windows: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if `entry` repeats a recent write in `domain`.
    /// Otherwise records its fingerprint and returns false.
    pub fn is_duplicate(&mut self, domain: &str, entry: &MemoryEntry) -> bool {
        let fingerprint = content_fingerprint(entry);
        if self.contains(domain, &fingerprint) {
            return true;
        }
        self.remember(domain, fingerprint);
        false
    }

    pub fn contains(&self, domain: &str, fingerprint: &str) -> bool {
        self.windows
            .get(domain)
            .is_some_and(|w| w.iter().any(|f| f == fingerprint))
    }

    /// Push a fingerprint, evicting the oldest one past capacity.
    pub fn remember(&mut self, domain: &str, fingerprint: String) {
        let window = self
            .windows
            .entry(domain.to_string())
            .or_insert_with(VecDeque::new);
        window.push_back(fingerprint);
        while window.len() > self.capacity {
            window.pop_front();
        }
    }

    /// Drop the most recent occurrence of `fingerprint`, e.g. after the write
    /// it was recorded for failed.
    pub fn forget(&mut self, domain: &str, fingerprint: &str) {
        if let Some(window) = self.windows.get_mut(domain) {
            if let Some(pos) = window.iter().rposition(|f| f == fingerprint) {
                window.remove(pos);
            }
        }
    }

    /// Fingerprints currently held for `domain`.
    pub fn len(&self, domain: &str) -> usize {
        self.windows.get(domain).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.windows.values().all(VecDeque::is_empty)
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Confidence, EntryBody, Urgency};

    fn entry(agent: &str, content: &str) -> MemoryEntry {
        MemoryEntry {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            agent: agent.to_string(),
            domain: vec!["code".to_string()],
            urgency: Urgency::Routine,
            confidence: Confidence::Observation,
            content: content.to_string(),
            reference: None,
            supersedes: None,
            body: EntryBody::Lesson,
        }
    }

    #[test]
    fn second_write_is_duplicate() {
        let mut window = DedupWindow::default();
        assert!(!window.is_duplicate("code", &entry("forge", "Never force-push.")));
        assert!(window.is_duplicate("code", &entry("alpha", "Never force-push.")));
        assert_eq!(window.len("code"), 1);
    }

    #[test]
    fn windows_are_per_domain() {
        let mut window = DedupWindow::default();
        assert!(!window.is_duplicate("code", &entry("forge", "same")));
        assert!(!window.is_duplicate("infra", &entry("forge", "same")));
    }

    #[test]
    fn oldest_fingerprint_is_evicted() {
        let mut window = DedupWindow::new(2);
        assert!(!window.is_duplicate("code", &entry("a", "one")));
        assert!(!window.is_duplicate("code", &entry("a", "two")));
        assert!(!window.is_duplicate("code", &entry("a", "three")));
        assert_eq!(window.len("code"), 2);
        // "one" fell out of the window and is accepted again
        assert!(!window.is_duplicate("code", &entry("a", "one")));
        assert!(window.is_duplicate("code", &entry("a", "three")));
    }

    #[test]
    fn forgotten_fingerprint_is_accepted_again() {
        let mut window = DedupWindow::default();
        let e = entry("forge", "retry me");
        assert!(!window.is_duplicate("code", &e));
        window.forget("code", &content_fingerprint(&e));
        assert!(!window.is_duplicate("code", &e));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let window = DedupWindow::new(0);
        assert_eq!(window.capacity(), 1);
        assert!(window.is_empty());
    }
}
