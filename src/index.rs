//! Concurrent in-memory provenance index
//!
//! Records are keyed by the path of their source document, so there is
//! exactly one record per path and a later write for a path replaces the
//! earlier one.
//!
//! # Thread Safety
//!
//! - `parking_lot::RwLock` around the map: concurrent reads, exclusive writes
//! - Records are stored as `Arc<Provenance>`; a snapshot clones the `Arc`s
//!   under the read lock and releases it before the caller looks at them
//! - A record is fully built before it is inserted, so readers never see a
//!   half-written record
//!
//! # Ownership
//!
//! `ProvenanceIndex` is the write handle and is not `Clone`: the indexing
//! task is its single owner. Query code gets an [`IndexReader`], which can
//! only read.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::record::Provenance;

/// A record together with the document it was decoded from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedRecord {
    pub path: PathBuf,
    #[serde(flatten)]
    pub record: Arc<Provenance>,
}

#[derive(Default)]
struct Shared {
    records: RwLock<BTreeMap<PathBuf, Arc<Provenance>>>,
    /// Bumped on every write
    version: AtomicU64,
}

/// Write handle of the index
#[derive(Default)]
pub struct ProvenanceIndex {
    shared: Arc<Shared>,
}

impl ProvenanceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view sharing this index's storage
    pub fn reader(&self) -> IndexReader {
        IndexReader {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Insert or replace the record for `path`. Returns `true` if a previous
    /// record was replaced.
    pub fn upsert(&self, path: impl Into<PathBuf>, record: Provenance) -> bool {
        let record = Arc::new(record);
        let replaced = self.shared.records.write().insert(path.into(), record);
        self.shared.version.fetch_add(1, Ordering::SeqCst);
        replaced.is_some()
    }

    /// Remove the record for `path`, returning it if present
    pub fn remove(&self, path: &Path) -> Option<Arc<Provenance>> {
        let removed = self.shared.records.write().remove(path);
        if removed.is_some() {
            self.shared.version.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    pub fn snapshot_all(&self) -> Vec<IndexedRecord> {
        self.shared.snapshot_all()
    }

    pub fn get(&self, path: &Path) -> Option<Arc<Provenance>> {
        self.shared.get(path)
    }

    pub fn len(&self) -> usize {
        self.shared.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read-only capability over a [`ProvenanceIndex`]
#[derive(Clone)]
pub struct IndexReader {
    shared: Arc<Shared>,
}

impl IndexReader {
    /// All records, ordered by source path
    pub fn snapshot_all(&self) -> Vec<IndexedRecord> {
        self.shared.snapshot_all()
    }

    pub fn get(&self, path: &Path) -> Option<Arc<Provenance>> {
        self.shared.get(path)
    }

    /// Source paths currently indexed, in order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.shared.records.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shared.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write counter, increases with every upsert or removal
    pub fn version(&self) -> u64 {
        self.shared.version.load(Ordering::SeqCst)
    }
}

impl Shared {
    fn snapshot_all(&self) -> Vec<IndexedRecord> {
        self.records
            .read()
            .iter()
            .map(|(path, record)| IndexedRecord {
                path: path.clone(),
                record: Arc::clone(record),
            })
            .collect()
    }

    fn get(&self, path: &Path) -> Option<Arc<Provenance>> {
        self.records.read().get(path).cloned()
    }
}
