//! Core error types

use thiserror::Error;

/// Errors raised while building, validating or decoding a trace.
#[derive(Error, Debug)]
pub enum TraceError {
    /// A trace needs at least one record
    #[error("Empty trace")]
    Empty,

    /// Record timestamps went backwards
    #[error("Record {index} is timestamped before record {}", .index - 1)]
    Unordered { index: usize },

    /// A multi-session trace contains an unnamed session
    #[error("Session names must not be blank")]
    BlankSessionName,

    /// The starting session is not listed in the session metadata
    #[error("Must set sessionName when trace includes multiple sessions (got `{0}`)")]
    MissingStartSession(String),

    /// Two sessions share a name
    #[error("Session `{0}` is listed more than once")]
    DuplicateSession(String),

    /// The wire form could not be decoded
    #[error("Invalid trace JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by an editing surface when an operation cannot be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// An edit referenced a location outside the document
    #[error("Location {row}:{column} is outside the document")]
    OutOfBounds { row: usize, column: usize },

    /// The named session does not exist on the surface
    #[error("Session `{0}` does not exist")]
    UnknownSession(String),

    /// Removed text did not match the document
    #[error("Edit does not match document contents: {0}")]
    Mismatch(String),
}

/// Result type for trace operations
pub type Result<T> = std::result::Result<T, TraceError>;
