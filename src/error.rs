//! Error types for the target

use std::path::PathBuf;

use thiserror::Error;

/// Result type for target operations
pub type Result<T> = std::result::Result<T, TargetError>;

/// Everything that can abort a run. No error is recoverable: the first one
/// terminates the process without emitting a state line, and any batch files
/// already on disk are left in place for the operator.
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Unable to parse: {line}")]
    MalformedLine { line: String },

    #[error("Line is missing required key '{key}': {line}")]
    MissingKey { key: &'static str, line: String },

    #[error("Line has a non-string value for key '{key}': {line}")]
    InvalidKeyType { key: &'static str, line: String },

    #[error("Unknown message type {message_type} in message {line}")]
    UnknownMessageType { message_type: String, line: String },

    #[error("A record for stream {stream} was encountered before a corresponding schema")]
    UndeclaredStream { stream: String },

    #[error("Schema for stream {stream} is not a valid draft-4 schema: {reason}")]
    InvalidSchema { stream: String, reason: String },

    #[error("Record for stream {stream} failed validation: {reason}")]
    RecordInvalid { stream: String, reason: String },

    #[error("key_properties field is required")]
    KeyPropertiesRequired,

    #[error("No bookmark key configured for stream {stream}")]
    MissingBookmarkKey { stream: String },

    #[error("State value is missing bookmarks.{stream}.{key}")]
    MissingBookmark { stream: String, key: String },

    #[error("State file {}: {reason}", .path.display())]
    StateFile { path: PathBuf, reason: String },

    #[error("Upload of {} failed: {reason}", .path.display())]
    Upload { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
