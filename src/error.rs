//! Error types and exit codes for prov-index

use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Main error type for indexing and query operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// Watched root is missing, not a directory, or unreadable
    #[error("Cannot scan {path}: {message}")]
    Scan { path: PathBuf, message: String },

    /// One directory could not be walked or registered for notifications
    #[error("Cannot register directory {path}: {message}")]
    DirectoryRegistration { path: PathBuf, message: String },

    /// A document vanished or became unreadable between discovery and read
    #[error("Cannot read document {path}: {message}")]
    DocumentRead { path: PathBuf, message: String },

    /// Document content is not a decodable provenance object
    #[error("Failed to decode provenance document: {message}")]
    Decode { message: String },

    /// The notification subsystem failed as a whole
    #[error("Watch subscription failed: {message}")]
    WatchSubscription { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// Convert error to a process exit code:
    /// - 0: Success
    /// - 1: IO error
    /// - 2: Configuration error
    /// - 3: Watched root could not be scanned
    /// - 4: Watch subscription failure
    /// - 5: Per-document errors that escaped to the top level
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io(_) => ExitCode::from(1),
            Self::Config { .. } => ExitCode::from(2),
            Self::Scan { .. } => ExitCode::from(3),
            Self::WatchSubscription { .. } => ExitCode::from(4),
            Self::DirectoryRegistration { .. }
            | Self::DocumentRead { .. }
            | Self::Decode { .. } => ExitCode::from(5),
        }
    }

    /// Whether the pipeline can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DirectoryRegistration { .. } | Self::DocumentRead { .. } | Self::Decode { .. }
        )
    }
}

/// Result type alias for prov-index operations
pub type Result<T> = std::result::Result<T, IndexError>;
