//! Error types for coursegraph.

use thiserror::Error;

/// Result type alias using coursegraph's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for coursegraph operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Course not found
    #[error("Course not found: {0}")]
    CourseNotFound(String),

    /// Completion/generation call failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Structured model output could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Graph read/write failed for a reason other than the database driver
    #[error("Graph error: {0}")]
    Graph(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
