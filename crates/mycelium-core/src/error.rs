//! Error type shared by the store, ledger, and engine.

use std::path::PathBuf;

/// Errors surfaced by mycelium operations.
///
/// Soft failures (malformed lines, a corrupt ledger, unparseable timestamps)
/// never reach this type; they are logged and degraded around.
#[derive(Debug, thiserror::Error)]
pub enum MyceliumError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("invalid entry: {0}")]
    InvalidEntry(String),
}

impl MyceliumError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MyceliumError>;
