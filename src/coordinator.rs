//! Index maintenance task
//!
//! The coordinator is the single writer into the [`ProvenanceIndex`]. It runs
//! one initial scan of the watched root and then applies change events until
//! it is cancelled or the watch subscription fails.
//!
//! # States
//!
//! ```text
//! Initializing ──> Scanning ──> Watching ──> ShuttingDown ──> Stopped
//!                     │            │              ^
//!                     └── error ───┴──────────────┘
//! ```
//!
//! Per-document problems (unreadable file, undecodable content) are logged
//! and counted; they never stop the task. A scan failure of the root or a
//! subscription failure ends the task with an error. On every exit path the
//! watch subscription is released before the state becomes `Stopped`.

use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::IndexerConfig;
use crate::error::{IndexError, Result};
use crate::index::{IndexReader, ProvenanceIndex};
use crate::parser::RecordParser;
use crate::scanner::DirectoryScanner;
use crate::watcher::{ChangeEvent, ChangeWatcher};

/// Lifecycle state of the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinatorState {
    #[default]
    Initializing,
    Scanning,
    Watching,
    ShuttingDown,
    Stopped,
}

/// Observable progress of the coordinator
#[derive(Debug, Clone, Default)]
pub struct CoordinatorStatus {
    pub state: CoordinatorState,
    /// Documents written to the index (scan and events)
    pub documents_indexed: usize,
    /// Documents whose content could not be decoded (indexed as absent)
    pub decode_failures: usize,
    /// Documents that could not be read and were dropped
    pub read_failures: usize,
    /// Change events applied while watching
    pub events_applied: usize,
    /// Directories registered for notifications
    pub watched_dirs: usize,
}

/// Read-only view of the coordinator's status
#[derive(Clone)]
pub struct StatusHandle {
    rx: watch::Receiver<CoordinatorStatus>,
}

impl StatusHandle {
    pub fn snapshot(&self) -> CoordinatorStatus {
        self.rx.borrow().clone()
    }

    pub fn state(&self) -> CoordinatorState {
        self.rx.borrow().state
    }

    /// Wait until the status satisfies `predicate`. Returns the matching
    /// status, or `None` if the coordinator is gone without reaching it.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&CoordinatorStatus) -> bool,
    ) -> Option<CoordinatorStatus> {
        self.rx.wait_for(predicate).await.ok().map(|s| s.clone())
    }
}

/// Outcome of the initial scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub directories: usize,
    pub documents: usize,
    pub indexed: usize,
}

/// Owner of the index write path
pub struct IndexCoordinator {
    root: PathBuf,
    scanner: DirectoryScanner,
    parser: RecordParser,
    index: ProvenanceIndex,
    watcher: ChangeWatcher,
    status: watch::Sender<CoordinatorStatus>,
}

impl IndexCoordinator {
    /// Assemble a coordinator from explicitly constructed collaborators
    pub fn new(
        root: impl Into<PathBuf>,
        scanner: DirectoryScanner,
        parser: RecordParser,
        index: ProvenanceIndex,
        watcher: ChangeWatcher,
    ) -> Self {
        let (status, _) = watch::channel(CoordinatorStatus::default());
        Self {
            root: root.into(),
            scanner,
            parser,
            index,
            watcher,
            status,
        }
    }

    /// Build every collaborator from configuration
    pub fn from_config(config: &IndexerConfig) -> Result<Self> {
        let watcher = ChangeWatcher::new(config.watch_config())?;
        Ok(Self::new(
            config.root.clone(),
            DirectoryScanner::new(config.suffix.clone()),
            RecordParser::new(),
            ProvenanceIndex::new(),
            watcher,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read-only view of the index for query serving
    pub fn reader(&self) -> IndexReader {
        self.index.reader()
    }

    pub fn status(&self) -> StatusHandle {
        StatusHandle {
            rx: self.status.subscribe(),
        }
    }

    /// Run on a dedicated task
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run(shutdown))
    }

    /// Scan, then watch until `shutdown` is cancelled or the subscription
    /// fails. Consumes the coordinator so the watch handle and the write
    /// handle are released when this returns.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        let result = self.drive(&shutdown).await;
        if let Err(e) = &result {
            tracing::error!("Indexing stopped: {}", e);
        }

        self.set_state(CoordinatorState::ShuttingDown);
        let Self {
            watcher, status, ..
        } = self;
        drop(watcher);
        status.send_modify(|s| s.state = CoordinatorState::Stopped);
        tracing::info!("Index coordinator stopped");

        result
    }

    async fn drive(&mut self, shutdown: &CancellationToken) -> Result<()> {
        let summary = self.scan(shutdown).await?;
        tracing::info!(
            "Initial scan of {}: {} directories, {}/{} documents indexed",
            self.root.display(),
            summary.directories,
            summary.indexed,
            summary.documents
        );
        if shutdown.is_cancelled() {
            return Ok(());
        }
        self.watch(shutdown).await
    }

    /// Initial scan: register every directory, then index every document
    pub async fn scan(&mut self, shutdown: &CancellationToken) -> Result<ScanSummary> {
        self.set_state(CoordinatorState::Scanning);

        let scanner = self.scanner.clone();
        let root = self.root.clone();
        let outcome = tokio::task::spawn_blocking(move || scanner.scan(&root))
            .await
            .map_err(|e| IndexError::Scan {
                path: self.root.clone(),
                message: format!("scan worker failed: {}", e),
            })??;

        // Register before loading so changes made while loading are seen
        let directories = outcome.watched_dirs.len();
        self.watcher.register_all(outcome.watched_dirs);
        let watched = self.watcher.watched_dirs().len();
        self.status.send_modify(|s| s.watched_dirs = watched);

        let documents = outcome.documents.len();
        let mut indexed = 0;
        for path in outcome.documents {
            if shutdown.is_cancelled() {
                tracing::info!("Scan interrupted by shutdown");
                break;
            }
            if self.index_document(&path).await {
                indexed += 1;
            }
        }

        Ok(ScanSummary {
            directories,
            documents,
            indexed,
        })
    }

    /// Apply change events until cancelled. An in-flight event is always
    /// finished before shutdown is honoured.
    pub async fn watch(&mut self, shutdown: &CancellationToken) -> Result<()> {
        self.set_state(CoordinatorState::Watching);
        tracing::info!(
            "Watching {} directories under {}",
            self.watcher.watched_dirs().len(),
            self.root.display()
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, no longer accepting events");
                    return Ok(());
                }
                next = self.watcher.next_event() => next,
            };

            match next {
                Some(Ok(event)) => self.apply(event).await,
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(IndexError::WatchSubscription {
                        message: "notification channel closed".to_string(),
                    })
                }
            }
        }
    }

    async fn apply(&mut self, event: ChangeEvent) {
        tracing::debug!("{:?} {}", event.kind, event.path.display());
        let indexed = self.index_document(&event.path).await;

        let watched = self.watcher.watched_dirs().len();
        self.status.send_modify(|s| {
            s.watched_dirs = watched;
            if indexed {
                s.events_applied += 1;
            }
        });
    }

    /// Read, decode and upsert one document. Returns whether the index was
    /// written.
    async fn index_document(&mut self, path: &Path) -> bool {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = IndexError::DocumentRead {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                };
                tracing::warn!("{}", err);
                self.status.send_modify(|s| s.read_failures += 1);
                return false;
            }
        };

        let parsed = self.parser.parse_outcome(&bytes);
        let decoded = parsed.is_decoded();
        if let Some(e) = &parsed.error {
            tracing::warn!("{} ({})", e, path.display());
        }

        let replaced = self.index.upsert(path, parsed.record);
        tracing::debug!(
            "{} {}",
            if replaced { "Replaced" } else { "Indexed" },
            path.display()
        );

        self.status.send_modify(|s| {
            s.documents_indexed += 1;
            if !decoded {
                s.decode_failures += 1;
            }
        });
        true
    }

    fn set_state(&self, state: CoordinatorState) {
        tracing::debug!("Coordinator state -> {:?}", state);
        self.status.send_modify(|s| s.state = state);
    }
}
