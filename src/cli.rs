//! CLI argument definitions using clap with subcommand architecture

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::IndexerConfig;
use crate::error::Result;
use crate::query::Query;

/// Live index of provenance documents
#[derive(Parser, Debug)]
#[command(name = "prov-index")]
#[command(about = "Index provenance documents in a directory tree and answer label queries")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// TOML configuration file
    #[arg(long, global = true, env = "PROV_INDEX_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Watched root directory
    #[arg(long, global = true, env = "PROV_INDEX_ROOT", value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Suffix of provenance documents
    #[arg(long, global = true, env = "PROV_INDEX_SUFFIX")]
    pub suffix: Option<String>,

    /// Window for coalescing bursts of change notifications (milliseconds)
    #[arg(long, global = true, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Poll for changes at this interval instead of using native notifications
    #[arg(long, global = true, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the root once and print the records matching a query
    Scan(ScanArgs),

    /// Keep the index live and answer JSON Lines queries on stdin/stdout
    Serve,
}

/// Arguments for the scan command
#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Pretty-print the JSON response
    #[arg(long)]
    pub pretty: bool,
}

/// Entity filters shared by query-taking commands
#[derive(Args, Debug, Default)]
pub struct QueryArgs {
    /// Entity label (case-insensitive equality)
    #[arg(long)]
    pub label: Option<String>,

    /// Substring of the entity label (case-insensitive)
    #[arg(long)]
    pub contains: Option<String>,

    /// Entity type (case-insensitive equality)
    #[arg(long = "type", value_name = "TYPE")]
    pub entity_type: Option<String>,

    /// Entity data hash (exact)
    #[arg(long)]
    pub hash: Option<String>,
}

impl QueryArgs {
    pub fn to_query(&self) -> Query {
        Query {
            label: self.label.clone(),
            label_contains: self.contains.clone(),
            entity_type: self.entity_type.clone(),
            data_hash: self.hash.clone(),
        }
    }
}

impl Cli {
    /// Merge the configuration file (if any) with command-line overrides
    pub fn resolve_config(&self) -> Result<IndexerConfig> {
        let mut config = match &self.config {
            Some(path) => IndexerConfig::load_from(path)?,
            None => IndexerConfig::default(),
        };

        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(suffix) = &self.suffix {
            config.suffix = suffix.clone();
        }
        if let Some(debounce_ms) = self.debounce_ms {
            config.debounce_ms = debounce_ms;
        }
        if self.poll_interval_ms.is_some() {
            config.poll_interval_ms = self.poll_interval_ms;
        }
        if self.verbose {
            config.log_level = "debug".to_string();
        }

        config.validate()?;
        Ok(config)
    }
}
