//! Filesystem change notifications for the watched tree
//!
//! Uses the `notify` crate to receive create/modify notifications for every
//! registered directory and turns them into a normalized stream of
//! [`ChangeEvent`]s for provenance documents.
//!
//! # Features
//!
//! - Per-directory (non-recursive) registration
//! - Directories created after startup are registered as they appear, and
//!   documents already inside them are reported as `Created`
//! - Directory walks for adopted directories run on the blocking pool
//! - Burst coalescing: at most one undelivered event per path
//! - Removed or renamed-away directories are forgotten, so a directory
//!   recreated under the same name gets a fresh OS watch
//! - Document removals produce no event (deletions are not tracked)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  raw   ┌──────────────┐  ChangeEvent  ┌──────────────────┐
//! │   notify    │───────>│ ChangeWatcher│──────────────>│ IndexCoordinator │
//! │   backend   │  mpsc  │  (coalesce)  │  next_event() │                  │
//! └─────────────┘        └──────────────┘               └──────────────────┘
//!        ^                      │
//!        └──── watch(new dir) ──┘
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{IndexError, Result};
use crate::scanner::{DirectoryScanner, ScanOutcome, DEFAULT_SUFFIX};

/// Raw notification as delivered by the notify backend
pub type RawEvent = notify::Result<Event>;

/// Kind of change observed for a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
}

/// A change to one provenance document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Created,
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Modified,
        }
    }
}

/// Configuration for the change watcher
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Document suffix (default: `.prov`)
    pub suffix: String,
    /// Window in which a burst of notifications is collected before the
    /// first event of the burst is delivered (default: 100ms)
    pub coalesce_window: Duration,
    /// Use a polling backend with this interval instead of native
    /// notifications
    pub poll_interval: Option<Duration>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
            coalesce_window: Duration::from_millis(100),
            poll_interval: None,
        }
    }
}

/// Registration side of a notification backend
pub trait WatchBackend: Send {
    /// Start receiving notifications for entries directly inside `dir`
    fn watch(&mut self, dir: &Path) -> notify::Result<()>;
}

impl WatchBackend for notify::RecommendedWatcher {
    fn watch(&mut self, dir: &Path) -> notify::Result<()> {
        Watcher::watch(self, dir, RecursiveMode::NonRecursive)
    }
}

impl WatchBackend for notify::PollWatcher {
    fn watch(&mut self, dir: &Path) -> notify::Result<()> {
        Watcher::watch(self, dir, RecursiveMode::NonRecursive)
    }
}

/// Lazy, unbounded stream of document changes for a growing set of
/// directories.
///
/// The OS subscription lives as long as the watcher: dropping it releases
/// the backend and closes the notification channel.
pub struct ChangeWatcher {
    backend: Box<dyn WatchBackend>,
    raw_rx: mpsc::UnboundedReceiver<RawEvent>,
    scanner: DirectoryScanner,
    coalesce_window: Duration,
    watched: BTreeSet<PathBuf>,
    pending: VecDeque<ChangeEvent>,
    deferred_error: Option<IndexError>,
}

impl ChangeWatcher {
    /// Create a watcher backed by the platform's native notifications (or a
    /// poll watcher if `config.poll_interval` is set). No directory is
    /// registered yet.
    pub fn new(config: WatchConfig) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = move |event: RawEvent| {
            // Receiver gone means the watcher is shutting down
            let _ = tx.send(event);
        };

        let subscription_error = |e: notify::Error| IndexError::WatchSubscription {
            message: e.to_string(),
        };

        let backend: Box<dyn WatchBackend> = match config.poll_interval {
            Some(interval) => Box::new(
                notify::PollWatcher::new(
                    handler,
                    notify::Config::default().with_poll_interval(interval),
                )
                .map_err(subscription_error)?,
            ),
            None => Box::new(notify::recommended_watcher(handler).map_err(subscription_error)?),
        };

        Ok(Self::with_backend(backend, rx, config))
    }

    /// Create a watcher and register `dirs`. Directories that fail to
    /// register are logged and skipped.
    pub fn subscribe<I>(config: WatchConfig, dirs: I) -> Result<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut watcher = Self::new(config)?;
        watcher.register_all(dirs);
        Ok(watcher)
    }

    /// Create a watcher over an arbitrary backend whose notifications arrive
    /// on `raw_rx`
    pub fn with_backend(
        backend: Box<dyn WatchBackend>,
        raw_rx: mpsc::UnboundedReceiver<RawEvent>,
        config: WatchConfig,
    ) -> Self {
        Self {
            backend,
            raw_rx,
            scanner: DirectoryScanner::new(config.suffix),
            coalesce_window: config.coalesce_window,
            watched: BTreeSet::new(),
            pending: VecDeque::new(),
            deferred_error: None,
        }
    }

    /// Directories currently registered
    pub fn watched_dirs(&self) -> &BTreeSet<PathBuf> {
        &self.watched
    }

    /// Register one directory. Registering a directory twice is a no-op.
    pub fn register(&mut self, dir: &Path) -> Result<()> {
        if self.watched.contains(dir) {
            return Ok(());
        }
        self.backend
            .watch(dir)
            .map_err(|e| IndexError::DirectoryRegistration {
                path: dir.to_path_buf(),
                message: e.to_string(),
            })?;
        self.watched.insert(dir.to_path_buf());
        tracing::debug!("[WATCHER] Watching {}", dir.display());
        Ok(())
    }

    /// Register every directory, logging failures. Returns the number of
    /// directories newly registered.
    pub fn register_all<I>(&mut self, dirs: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let before = self.watched.len();
        for dir in dirs {
            if let Err(e) = self.register(&dir) {
                tracing::warn!("{}", e);
            }
        }
        self.watched.len() - before
    }

    /// Wait for the next document change.
    ///
    /// Returns `None` once the notification channel has closed, and
    /// `Some(Err(_))` for an unrecoverable subscription failure. Events
    /// already queued are kept if the call is cancelled; a notification
    /// whose directory adoption was in progress may be lost.
    pub async fn next_event(&mut self) -> Option<Result<ChangeEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if let Some(err) = self.deferred_error.take() {
                return Some(Err(err));
            }

            let first = self.raw_rx.recv().await?;
            self.absorb(first).await;

            // Collect the rest of the burst so repeated notifications for
            // the same path collapse into one pending event
            let deadline = Instant::now() + self.coalesce_window;
            while self.deferred_error.is_none() {
                match tokio::time::timeout_at(deadline, self.raw_rx.recv()).await {
                    Ok(Some(raw)) => self.absorb(raw).await,
                    Ok(None) | Err(_) => break,
                }
            }
        }
    }

    /// Fold one raw notification into the pending queue
    async fn absorb(&mut self, raw: RawEvent) {
        let event = match raw {
            Ok(event) => event,
            Err(e) if e.paths.is_empty() => {
                self.deferred_error = Some(IndexError::WatchSubscription {
                    message: e.to_string(),
                });
                return;
            }
            Err(e) => {
                tracing::warn!("[WATCHER] Notification error for {:?}: {}", e.paths, e);
                return;
            }
        };

        let (kind, paths): (ChangeKind, Vec<PathBuf>) = match event.kind {
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                for path in &event.paths {
                    self.forget(path);
                }
                return;
            }
            // Paths are [from, to]; the target behaves like a creation
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = event.paths.into_iter();
                if let Some(from) = paths.next() {
                    self.forget(&from);
                }
                (ChangeKind::Created, paths.collect())
            }
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                (ChangeKind::Created, event.paths)
            }
            EventKind::Modify(_) => (ChangeKind::Modified, event.paths),
            _ => return,
        };

        for path in paths {
            if kind == ChangeKind::Created && is_directory(&path).await {
                self.adopt_directory(path).await;
            } else if self.scanner.is_document(&path) {
                self.enqueue(ChangeEvent { path, kind });
            }
        }
    }

    /// Drop `path` and every directory below it from the registered set.
    /// The OS discards the watches of deleted directories itself.
    fn forget(&mut self, path: &Path) {
        let before = self.watched.len();
        self.watched.retain(|dir| !dir.starts_with(path));
        let dropped = before - self.watched.len();
        if dropped > 0 {
            tracing::debug!(
                "[WATCHER] Forgot {} directories under {}",
                dropped,
                path.display()
            );
        }
    }

    /// Start watching a directory that appeared after startup and report the
    /// documents it already holds.
    async fn adopt_directory(&mut self, dir: PathBuf) {
        // First walk finds the directories to register. The second walk runs
        // after registration so documents created in between are not missed.
        let Some(outcome) = walk(self.scanner.clone(), dir.clone()).await else {
            return;
        };

        // Always hand these to the backend: a same-named directory seen
        // before may have lost its watch without a removal notification
        let mut added = 0;
        for sub in outcome.watched_dirs {
            self.watched.remove(&sub);
            match self.register(&sub) {
                Ok(()) => added += 1,
                Err(e) => tracing::warn!("{}", e),
            }
        }

        let Some(outcome) = walk(self.scanner.clone(), dir.clone()).await else {
            return;
        };
        let added = added + self.register_all(outcome.watched_dirs);

        tracing::info!(
            "[WATCHER] Adopted {} ({} directories, {} documents)",
            dir.display(),
            added,
            outcome.documents.len()
        );

        for path in outcome.documents {
            self.enqueue(ChangeEvent::created(path));
        }
    }

    /// Queue an event unless one is already pending for the same path; the
    /// pending event's read will pick up the latest content.
    fn enqueue(&mut self, event: ChangeEvent) {
        if self.pending.iter().any(|p| p.path == event.path) {
            tracing::debug!("[WATCHER] Coalesced {:?}", event.path);
            return;
        }
        self.pending.push_back(event);
    }
}

async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
}

/// Walk `dir` on the blocking pool
async fn walk(scanner: DirectoryScanner, dir: PathBuf) -> Option<ScanOutcome> {
    let root = dir.clone();
    match tokio::task::spawn_blocking(move || scanner.scan(&root)).await {
        Ok(Ok(outcome)) => Some(outcome),
        Ok(Err(e)) => {
            tracing::warn!("[WATCHER] New directory vanished before registration: {}", e);
            None
        }
        Err(e) => {
            tracing::warn!("[WATCHER] Walk of {} failed: {}", dir.display(), e);
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
