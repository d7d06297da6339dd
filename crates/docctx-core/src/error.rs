//! Error taxonomy shared by the core pipeline and the application layer.
//!
//! Validation errors carry the exact message surfaced to tool callers
//! (e.g. `"Content cannot be empty"`), so their `Display` output is the
//! bare message with no prefix.

use thiserror::Error;

/// Errors produced by indexing, retrieval, and the filesystem tools.
#[derive(Error, Debug)]
pub enum Error {
    /// Empty or invalid input (query, content, line numbers, out-of-range values).
    #[error("{0}")]
    Validation(String),

    /// Unknown platform/driver or malformed settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Embedding or store request failure, including non-2xx responses.
    #[error("Network error: {0}")]
    Network(String),

    /// An external call exceeded its configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Write or query failure against the vector backend.
    #[error("Store error: {0}")]
    Store(String),

    /// Path blocked by the project exclude registry.
    #[error("Path '{0}' is excluded by project configuration")]
    Exclusion(String),

    /// Missing file or entry.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Read/write failure, permission problem, or a path outside the project root.
    #[error("File system error: {0}")]
    FileSystem(String),

    /// An index operation failed; nothing from the batch should remain in the store.
    #[error("Indexing failed: {0}")]
    Indexing(#[source] Box<Error>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Short machine-readable code, used by the HTTP error body.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "bad_request",
            Error::Configuration(_) => "configuration",
            Error::Network(_) => "network",
            Error::Timeout(_) => "timeout",
            Error::Store(_) => "store",
            Error::Exclusion(_) => "excluded",
            Error::NotFound(_) => "not_found",
            Error::FileSystem(_) => "filesystem",
            Error::Indexing(inner) => inner.code(),
            Error::Other(_) => "internal",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(err.to_string()),
            _ => Error::FileSystem(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
