//! prov-index: live in-memory index of provenance documents
//!
//! This library keeps an index of `.prov` documents (JSON provenance records
//! describing an entity, the agent responsible for it and the activity that
//! produced it) found under a watched directory tree, and answers filter
//! queries against it while the tree keeps changing.
//!
//! # Pipeline
//!
//! ```text
//! DirectoryScanner (startup) ──┐
//!                              ├──> IndexCoordinator ──> RecordParser ──> ProvenanceIndex
//! ChangeWatcher (steady state) ┘        (single writer)                        │
//!                                                                  IndexReader │ snapshot
//!                                                                              v
//!                                                                         QueryEngine
//! ```
//!
//! # Example
//!
//! ```no_run
//! use prov_index::{IndexCoordinator, IndexerConfig, Query, QueryEngine};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> prov_index::Result<()> {
//! let config = IndexerConfig::for_root("/data/provenance");
//! let coordinator = IndexCoordinator::from_config(&config)?;
//! let engine = QueryEngine::new(coordinator.reader());
//!
//! let shutdown = CancellationToken::new();
//! let task = coordinator.spawn(shutdown.clone());
//!
//! let response = engine.execute(&Query::by_label("testfile1.txt"));
//! println!("{} matches", response.data.len());
//!
//! shutdown.cancel();
//! task.await.expect("index task panicked")?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod index;
pub mod parser;
pub mod query;
pub mod record;
pub mod scanner;
pub mod watcher;

// Re-export commonly used types
pub use cli::{Cli, Commands};
pub use config::IndexerConfig;
pub use coordinator::{CoordinatorState, CoordinatorStatus, IndexCoordinator, StatusHandle};
pub use error::{IndexError, Result};
pub use index::{IndexReader, IndexedRecord, ProvenanceIndex};
pub use parser::{Parsed, RecordParser};
pub use query::{Query, QueryEngine, QueryResponse};
pub use record::{Activity, Agent, Entity, Provenance};
pub use scanner::{DirectoryScanner, ScanOutcome};
pub use watcher::{ChangeEvent, ChangeKind, ChangeWatcher, WatchConfig};
