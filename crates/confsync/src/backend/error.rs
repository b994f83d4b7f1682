//! Backend error types.

use std::path::PathBuf;
use thiserror::Error;

/// Message the configuration service returns when a session polls before
/// its minimum interval has elapsed.
pub const TOO_EARLY_MESSAGE: &str = "Request too early";

/// Errors that can occur while fetching configuration from a backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Name resolution found no match.
    #[error("no \"{operation}\" results found for Name=\"{name}\"")]
    NotFound { operation: String, name: String },

    /// The service rejected the request as malformed (HTTP 400).
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Transport-level failure talking to the service.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The service answered with an unexpected status.
    #[error("Unexpected response status {status}: {message}")]
    Status { status: u16, message: String },

    /// The service answered with something we could not understand.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Failed to read a local configuration file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File watcher failure.
    #[error("Watch error: {0}")]
    Watch(String),
}

impl BackendError {
    /// Returns true if the service asked us to wait longer before polling again.
    ///
    /// This is the only recoverable error during a poll session.
    pub fn is_too_early(&self) -> bool {
        matches!(self, BackendError::BadRequest { message } if message == TOO_EARLY_MESSAGE)
    }
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
