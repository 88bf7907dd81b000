//! One-shot scan command handler
//!
//! Walks the watched root once, indexes every document and prints the
//! records matching the query as JSON. Nothing is watched.

use std::fs;

use crate::cli::ScanArgs;
use crate::config::IndexerConfig;
use crate::error::{IndexError, Result};
use crate::index::ProvenanceIndex;
use crate::parser::RecordParser;
use crate::query::QueryEngine;
use crate::scanner::DirectoryScanner;

/// Run the scan command
pub fn run_scan(config: &IndexerConfig, args: &ScanArgs) -> Result<String> {
    let index = build_index(config)?;
    let engine = QueryEngine::new(index.reader());
    let response = engine.execute(&args.query.to_query());

    let json = if args.pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    }
    .map_err(|e| IndexError::Io(e.into()))?;

    Ok(format!("{}\n", json))
}

/// Build an index from a single walk of the configured root
pub fn build_index(config: &IndexerConfig) -> Result<ProvenanceIndex> {
    let scanner = DirectoryScanner::new(config.suffix.clone());
    let parser = RecordParser::new();
    let outcome = scanner.scan(&config.root)?;

    let index = ProvenanceIndex::new();
    for path in outcome.documents {
        match fs::read(&path) {
            Ok(bytes) => {
                let parsed = parser.parse_outcome(&bytes);
                if let Some(e) = &parsed.error {
                    tracing::warn!("{} ({})", e, path.display());
                }
                index.upsert(path, parsed.record);
            }
            Err(e) => {
                let err = IndexError::DocumentRead {
                    path,
                    message: e.to_string(),
                };
                tracing::warn!("{}", err);
            }
        }
    }

    tracing::info!("Indexed {} documents from {}", index.len(), config.root.display());
    Ok(index)
}
