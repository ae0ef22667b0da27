//! Entry and content fingerprints.
//!
//! Two different hashes live here. The entry fingerprint identifies one stored
//! record and keys the resonance ledger. The content fingerprint identifies
//! what a record says, independent of who wrote it and when, and drives the
//! dedup window.

use crate::types::{EntryBody, MemoryEntry};
use md5::Md5;
use sha2::{Digest, Sha256};

/// Characters of content folded into the entry fingerprint.
pub const CONTENT_PREFIX_CHARS: usize = 64;

/// Hex characters kept from the entry digest.
const ENTRY_FINGERPRINT_LEN: usize = 12;

/// Field separator that cannot appear in a domain tag typed on a command line.
const SEP: u8 = 0x1f;

/// Ledger key: timestamp + agent + a bounded prefix of the content.
///
/// md5 truncated to 12 hex chars, matching the keys in existing
/// `mycelium.resonance.json` files.
pub fn entry_fingerprint(entry: &MemoryEntry) -> String {
    let prefix: String = entry.content.chars().take(CONTENT_PREFIX_CHARS).collect();
    let mut hasher = Md5::new();
    hasher.update(entry.timestamp.as_bytes());
    hasher.update(entry.agent.as_bytes());
    hasher.update(prefix.as_bytes());
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(ENTRY_FINGERPRINT_LEN);
    hex
}

/// Dedup key over (kind, domain list, content, confidence, urgency).
///
/// Ghost entries also fold in their branches and collapse fields, since their
/// content is a generated summary that two different deliberations can share.
pub fn content_fingerprint(entry: &MemoryEntry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entry.kind().as_str().as_bytes());
    hasher.update([SEP]);
    for tag in &entry.domain {
        hasher.update(tag.as_bytes());
        hasher.update([SEP]);
    }
    hasher.update(entry.content.as_bytes());
    hasher.update([SEP]);
    hasher.update(entry.confidence.as_str().as_bytes());
    hasher.update([SEP]);
    hasher.update(entry.urgency.as_str().as_bytes());

    if let EntryBody::Ghost(trace) = &entry.body {
        for branch in &trace.branches {
            hasher.update([SEP]);
            hasher.update(branch.label.as_bytes());
            hasher.update([SEP]);
            hasher.update(format!("{:.3}", branch.weight).as_bytes());
            hasher.update([SEP]);
            hasher.update(branch.reasoning.as_bytes());
        }
        hasher.update([SEP]);
        hasher.update(trace.collapsed_to.as_bytes());
        hasher.update([SEP]);
        hasher.update(trace.collapse_reason.as_bytes());
    }

    hex::encode(hasher.finalize())
}
