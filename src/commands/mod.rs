//! Command modules for the prov-index CLI
//!
//! Each command module implements a single top-level command:
//! - `scan` - One-shot scan of the watched root and query
//! - `serve` - Live index with JSON Lines queries on stdin/stdout
//!
//! Handlers take the resolved [`IndexerConfig`](crate::config::IndexerConfig)
//! and return the text to print on stdout.

pub mod scan;
pub mod serve;

pub use scan::{build_index, run_scan};
pub use serve::{handle_request, run_serve, serve_lines};
