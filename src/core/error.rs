//! Error types for the morpheus library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using morpheus's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while ingesting or querying coverage history.
#[derive(Error, Debug)]
pub enum Error {
    /// A raw test identifier matched none of the known dialects.
    #[error("Unparseable test identifier: {identifier}")]
    UnparseableIdentifier { identifier: String },

    /// No production method survived filtering for a commit.
    #[error("No production methods declared for commit {commit}")]
    EmptyMethodSet { commit: String },

    /// The coverage payload reports too few tests to be meaningful.
    #[error("Insufficient coverage data: payload reports {test_count} test(s)")]
    InsufficientCoverageData { test_count: i64 },

    /// Parsing succeeded but no test survived the test/line merge.
    #[error("No coverage produced for commit {commit}")]
    NoCoverageProduced { commit: String },

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// I/O error reading input files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input file not found.
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A queried row does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Create a new unparseable-identifier error.
    pub fn unparseable(identifier: impl Into<String>) -> Self {
        Self::UnparseableIdentifier {
            identifier: identifier.into(),
        }
    }

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a not-found error for the given entity kind.
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Whether this error must abort the ingestion of the current commit.
    ///
    /// Only a single malformed test identifier is recoverable; everything
    /// else invalidates the commit and must roll back its partial writes.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::UnparseableIdentifier { .. })
    }
}
