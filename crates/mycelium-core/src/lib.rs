//! Shared memory substrate for a fleet of agents.
//!
//! Agents exude short observations into an append-only log partitioned by
//! domain, and taste them back ranked by confidence, urgency, age, and how
//! often other readers found them useful. Deliberations are kept as ghost
//! traces so later agents can see which branches were weighed and why one
//! won.

pub mod config;
pub mod dedup;
pub mod error;
pub mod fingerprint;
pub mod ghosts;
pub mod ledger;
pub mod prune;
pub mod report;
pub mod retrieval;
pub mod scoring;
pub mod store;
pub mod substrate;
pub mod supersession;
pub mod types;

pub use config::{MyceliumConfig, SelfAuthorship};
pub use dedup::DedupWindow;
pub use error::{MyceliumError, Result};
pub use ledger::{ResonanceLedger, ResonanceRecord};
pub use prune::{PruneReport, PrunedEntry};
pub use report::{ResonanceOrder, ResonanceRow, Stats};
pub use store::{EntryStore, Partition, PartitionRegistry};
pub use substrate::{Exude, Mycelium, Superpose};
pub use types::{
    Branch, Confidence, EntryBody, GhostTrace, Kind, MemoryEntry, Tasted, Urgency,
};
