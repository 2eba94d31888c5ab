//! Error types for the loupe engine
//!
//! Startup failures (bad configuration, unreadable dictionaries, storage
//! that cannot be opened) surface as [`EngineError`] from `Engine::new`.
//! After startup the engine exposes no error returns: per-operation storage
//! failures are logged and dropped (the in-memory index stays authoritative
//! and recovery reconciles on the next start), and query timeouts are
//! reported as a response flag.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias for engine APIs.
pub type EngineResult<T> = Result<T, EngineError>;

/// Fatal engine construction errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration (e.g. persistence enabled without a folder).
    #[error("invalid engine configuration: {0}")]
    Config(String),

    /// A segmenter dictionary could not be read.
    #[error("failed to load segmenter dictionary {path}: {source}")]
    Dictionary {
        /// The dictionary file.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },

    /// The stop-token file could not be read.
    #[error("failed to load stop token file {path}: {source}")]
    StopTokens {
        /// The stop-token file.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },

    /// The persistence folder could not be created.
    #[error("failed to create storage folder {path}: {source}")]
    StorageFolder {
        /// The configured folder.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },

    /// A persistent store failed to open or is corrupt.
    #[error("storage error: {message}")]
    Storage {
        /// Human-readable description of the failure.
        message: String,
    },
}

impl EngineError {
    /// Storage error from any displayable source.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        EngineError::Storage {
            message: err.to_string(),
        }
    }
}
