//! Initial recursive walk of the watched root
//!
//! Collects every directory (for change-notification registration) and every
//! provenance document under the root. Registration and content loading are
//! independent: a directory is collected even if every document in it later
//! fails to decode.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::{IndexError, Result};

/// Default suffix of provenance documents
pub const DEFAULT_SUFFIX: &str = ".prov";

/// Result of walking the watched root
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Every directory found, including the root
    pub watched_dirs: BTreeSet<PathBuf>,
    /// Matching documents in lexicographic path order
    pub documents: Vec<PathBuf>,
    /// Directories that could not be walked
    pub skipped_dirs: usize,
}

/// Recursive directory walker for provenance documents
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    suffix: String,
}

impl Default for DirectoryScanner {
    fn default() -> Self {
        Self::new(DEFAULT_SUFFIX)
    }
}

impl DirectoryScanner {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Whether `path` names a provenance document
    pub fn is_document(&self, path: &Path) -> bool {
        is_document(path, &self.suffix)
    }

    /// Walk `root` and collect directories and documents.
    ///
    /// Fails only when the root itself is missing, not a directory, or
    /// unreadable. Failures below the root are logged and skipped.
    pub fn scan(&self, root: &Path) -> Result<ScanOutcome> {
        check_root(root)?;

        let mut outcome = ScanOutcome::default();
        for entry in self.build_walker(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let err = IndexError::DirectoryRegistration {
                        path: error_path(&e).unwrap_or(root).to_path_buf(),
                        message: e.to_string(),
                    };
                    tracing::warn!("{}", err);
                    outcome.skipped_dirs += 1;
                    continue;
                }
            };

            let Some(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                outcome.watched_dirs.insert(entry.into_path());
            } else if file_type.is_file() && self.is_document(entry.path()) {
                outcome.documents.push(entry.into_path());
            }
        }

        outcome.documents.sort();

        tracing::debug!(
            "Scanned {}: {} directories, {} documents, {} skipped",
            root.display(),
            outcome.watched_dirs.len(),
            outcome.documents.len(),
            outcome.skipped_dirs
        );

        Ok(outcome)
    }

    /// Build a walker that sees everything under the root
    fn build_walker(&self, root: &Path) -> ignore::Walk {
        let mut builder = WalkBuilder::new(root);

        // A provenance tree is not a source repository: no ignore files,
        // hidden directories included
        builder.standard_filters(false);

        // Do not follow symlinks
        builder.follow_links(false);

        builder.sort_by_file_name(|a, b| a.cmp(b));

        builder.build()
    }
}

/// Whether the file name of `path` ends with `suffix`
pub fn is_document(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(suffix))
        .unwrap_or(false)
}

/// Path of the entry a walk error refers to
fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Partial(errs) => errs.iter().find_map(error_path),
        _ => None,
    }
}

fn check_root(root: &Path) -> Result<()> {
    let scan_error = |message: String| IndexError::Scan {
        path: root.to_path_buf(),
        message,
    };

    let metadata = fs::metadata(root).map_err(|e| scan_error(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(scan_error("not a directory".to_string()));
    }
    fs::read_dir(root).map_err(|e| scan_error(e.to_string()))?;
    Ok(())
}
