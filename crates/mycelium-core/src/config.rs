//! Configuration for the substrate.

use crate::dedup::DEFAULT_WINDOW;
use crate::error::{MyceliumError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up inside the data directory.
pub const CONFIG_FILE: &str = "mycelium.toml";
/// Environment variable overriding `data_dir`.
pub const DATA_DIR_ENV: &str = "MYCELIUM_DIR";

/// How a reader's own entries are treated in `taste`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SelfAuthorship {
    /// Keep them, down-weighted by `self_weight`.
    #[default]
    Weight,
    /// Leave them out entirely.
    Exclude,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MyceliumConfig {
    /// Root of partitions, legacy file and ledger. `~` is expanded.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Default result count for `taste`.
    #[serde(default = "default_taste_limit")]
    pub taste_limit: usize,

    /// Default result count for `taste_ghosts`.
    #[serde(default = "default_ghost_limit")]
    pub ghost_limit: usize,

    /// Fingerprints remembered per domain for dedup.
    #[serde(default = "default_dedup_window")]
    pub dedup_window: usize,

    #[serde(default)]
    pub self_authored: SelfAuthorship,

    /// Multiplier for a reader's own entries under `SelfAuthorship::Weight`.
    #[serde(default = "default_self_weight")]
    pub self_weight: f64,

    /// Ghost relevance used when no context keywords are given.
    #[serde(default = "default_ghost_neutral_relevance")]
    pub ghost_neutral_relevance: f64,

    /// Default sweep threshold.
    #[serde(default = "default_prune_min_score")]
    pub prune_min_score: f64,

    /// Default sweep age, in days.
    #[serde(default = "default_prune_older_than_days")]
    pub prune_older_than_days: u32,
}

impl Default for MyceliumConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            taste_limit: default_taste_limit(),
            ghost_limit: default_ghost_limit(),
            dedup_window: default_dedup_window(),
            self_authored: SelfAuthorship::default(),
            self_weight: default_self_weight(),
            ghost_neutral_relevance: default_ghost_neutral_relevance(),
            prune_min_score: default_prune_min_score(),
            prune_older_than_days: default_prune_older_than_days(),
        }
    }
}

fn default_data_dir() -> String {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".mycelium").to_string_lossy().into_owned())
        .unwrap_or_else(|| ".mycelium".to_string())
}

fn default_taste_limit() -> usize {
    50
}

fn default_ghost_limit() -> usize {
    5
}

fn default_dedup_window() -> usize {
    DEFAULT_WINDOW
}

fn default_self_weight() -> f64 {
    0.5
}

fn default_ghost_neutral_relevance() -> f64 {
    0.5
}

fn default_prune_min_score() -> f64 {
    0.5
}

fn default_prune_older_than_days() -> u32 {
    30
}

impl MyceliumConfig {
    /// Config rooted at `dir`, everything else default.
    pub fn with_data_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: dir.as_ref().to_string_lossy().into_owned(),
            ..Default::default()
        }
    }

    /// Parse a TOML config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| MyceliumError::io(path, e))?;
        toml::from_str(&content)
            .map_err(|e| MyceliumError::Config(format!("{}: {e}", path.display())))
    }

    /// Resolve the effective config: an explicit file wins, then
    /// `$MYCELIUM_DIR/mycelium.toml` or `<default dir>/mycelium.toml` when
    /// present, then defaults. `MYCELIUM_DIR` always overrides `data_dir`.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let env_dir = std::env::var(DATA_DIR_ENV).ok().filter(|d| !d.is_empty());

        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let dir = env_dir.clone().unwrap_or_else(default_data_dir);
                let candidate = PathBuf::from(shellexpand::tilde(&dir).as_ref()).join(CONFIG_FILE);
                if candidate.exists() {
                    Self::load_from_file(&candidate)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(dir) = env_dir {
            config.data_dir = dir;
        }
        config.validate()?;
        Ok(config)
    }

    /// Data directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).as_ref())
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.trim().is_empty() {
            return Err(MyceliumError::Config("data_dir must not be empty".into()));
        }
        if self.taste_limit == 0 || self.ghost_limit == 0 {
            return Err(MyceliumError::Config("taste and ghost limits must be positive".into()));
        }
        if self.dedup_window == 0 {
            return Err(MyceliumError::Config("dedup_window must be positive".into()));
        }
        for (name, value) in [
            ("self_weight", self.self_weight),
            ("ghost_neutral_relevance", self.ghost_neutral_relevance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MyceliumError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.self_weight > 1.0 {
            return Err(MyceliumError::Config(format!(
                "self_weight must be at most 1.0, got {}",
                self.self_weight
            )));
        }
        if !self.prune_min_score.is_finite() {
            return Err(MyceliumError::Config("prune_min_score must be finite".into()));
        }
        Ok(())
    }
}
