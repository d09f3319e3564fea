//! Error kinds raised by the manifest, reconciliation and apply layers.
//!
//! Only the manifest I/O variants are fatal to a session. Everything else is
//! reported against the entry or index it concerns and the batch carries on.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the flashback core
#[derive(Error, Debug)]
pub enum Error {
    /// The manifest file does not exist (caller decides: bootstrap or abort)
    #[error("Manifest not found: {}", path.display())]
    ManifestMissing {
        /// Path that was looked up
        path: PathBuf,
    },

    /// The manifest exists but could not be read
    #[error("Failed to read manifest {}: {source}", path.display())]
    ManifestRead {
        /// Manifest path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The manifest could not be written atomically
    #[error("Failed to write manifest {}: {source}", path.display())]
    ManifestWrite {
        /// Manifest path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A manifest block that could not be parsed into an entry
    #[error("Malformed manifest entry #{block}: {reason}")]
    MalformedEntry {
        /// 1-based block number within the file
        block: usize,
        /// What was wrong with it
        reason: String,
    },

    /// A source file could not be opened or read
    #[error("Source unavailable {}: {source}", path.display())]
    SourceUnavailable {
        /// Source path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The destination could not be written
    #[error("Destination unavailable {}: {source}", path.display())]
    DestinationUnavailable {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An entry with this name is already tracked
    #[error("An entry named '{name}' is already tracked")]
    DuplicateName {
        /// The colliding name
        name: String,
    },

    /// A name or destination directory that would not stay under the destination root
    #[error("Invalid path '{value}': {reason}")]
    InvalidPath {
        /// Offending value
        value: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// A 1-based index outside `[1, len]`
    #[error("Index {index} is out of range (1..={len})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of entries at the time
        len: usize,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Session lock could not be taken
    #[error("Another session holds the lock at {}", path.display())]
    Lock {
        /// Lock file path
        path: PathBuf,
    },

    /// Other I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error threatens manifest durability and must end the session
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ManifestRead { .. } | Self::ManifestWrite { .. } | Self::Lock { .. }
        )
    }
}
