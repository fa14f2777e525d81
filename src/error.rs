// src/error.rs

//! Error types for the conversion engine

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the conversion engine
///
/// The per-requirement kinds (`NoMatch`, `Retrieval`, `UnsupportedArtifact`)
/// are recorded and reported collectively by the conversion tree unless
/// fail-fast is enabled. `Write` is always fatal to a session: once the
/// repository cannot be written, its integrity is no longer guaranteed.
#[derive(Debug, Error)]
pub enum Error {
    /// No index yields an artifact satisfying the requirement.
    /// An expected outcome for unresolvable requirements, not a defect.
    #[error("no matching artifact for '{0}'")]
    NoMatch(String),

    /// Artifact content could not be fetched
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// Artifact content cannot be mapped to the target format
    #[error("unsupported artifact: {0}")]
    UnsupportedArtifact(String),

    /// Target repository unwritable. Fatal to the session.
    #[error("repository write failed: {0}")]
    Write(String),

    /// Filesystem error outside the repository write path
    #[error("I/O error: {0}")]
    Io(String),

    /// Malformed requirement string, index document, or manifest
    #[error("parse error: {0}")]
    Parse(String),

    /// Version string that cannot be interpreted
    #[error("invalid version: {0}")]
    InvalidVersion(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl Error {
    /// Whether this error aborts a whole conversion session rather than
    /// a single requirement
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Write(_))
    }
}
