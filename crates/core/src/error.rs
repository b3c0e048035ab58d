//! Unified error types for quire.
//!
//! Display strings carry a stable `CODE:` prefix so tool callers can match on
//! the failure class without parsing the message.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the versioning store and offline layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty document id).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No version log exists for the document.
    #[error("DOCUMENT_NOT_FOUND: {0}")]
    DocumentNotFound(String),

    /// The document has no version with the given id.
    #[error("VERSION_NOT_FOUND: version {version_id} of document {document_id}")]
    VersionNotFound { document_id: String, version_id: i64 },

    /// Database operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Non-database storage backend failure.
    #[error("STORAGE_ERROR: {0}")]
    Storage(String),

    /// A persisted value could not be encoded or decoded.
    #[error("SERIALIZATION_ERROR: {0}")]
    Serialization(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Transport-level failure (connection refused, timeout, DNS).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// A lifecycle transition was requested from the wrong phase.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// Installation could not complete; the new generation never activates.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),
}

impl Error {
    /// Whether this error signals a missing document or version rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::DocumentNotFound(_) | Error::VersionNotFound { .. })
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::DocumentNotFound(_) | Error::VersionNotFound { .. } => (-32001, err.to_string()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) | Error::Storage(msg) => (-32002, msg.clone()),
            Error::Serialization(msg) => (-32003, msg.clone()),
            Error::InvalidUrl(msg) => (-32004, msg.clone()),
            Error::Network(msg) => (-32005, msg.clone()),
            Error::FetchTooLarge(msg) => (-32006, msg.clone()),
            Error::InvalidState(msg) => (-32007, msg.clone()),
            Error::InstallFailed(msg) => (-32008, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
