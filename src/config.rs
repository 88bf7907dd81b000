//! Indexer configuration.
//!
//! Settings come from an optional TOML file, overridden by command-line
//! arguments (which may themselves come from `PROV_INDEX_*` environment
//! variables):
//!
//! ```toml
//! root = "/data/provenance"
//! suffix = ".prov"
//! debounce_ms = 100
//! log_level = "info"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::scanner::DEFAULT_SUFFIX;
use crate::watcher::WatchConfig;

/// Indexer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Watched root directory
    pub root: PathBuf,

    /// Suffix of provenance documents
    pub suffix: String,

    /// Window for coalescing bursts of change notifications
    pub debounce_ms: u64,

    /// Poll the tree at this interval instead of using native notifications
    pub poll_interval_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            suffix: DEFAULT_SUFFIX.to_string(),
            debounce_ms: 100,
            poll_interval_ms: None,
            log_level: "info".to_string(),
        }
    }
}

impl IndexerConfig {
    /// Configuration watching `root` with default settings
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| IndexError::Config {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| IndexError::Config {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })
    }

    /// Check settings that would otherwise fail later in confusing ways
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(IndexError::Config {
                message: "no watched root configured (use --root or PROV_INDEX_ROOT)".to_string(),
            });
        }
        if self.suffix.is_empty() {
            return Err(IndexError::Config {
                message: "document suffix must not be empty".to_string(),
            });
        }
        if self.poll_interval_ms == Some(0) {
            return Err(IndexError::Config {
                message: "poll interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            suffix: self.suffix.clone(),
            coalesce_window: Duration::from_millis(self.debounce_ms),
            poll_interval: self.poll_interval_ms.map(Duration::from_millis),
        }
    }
}
