//! Sink error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while handing a submission to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing to the outbox failed.
    #[error("outbox I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The payload could not be serialized.
    #[error("failed to serialize submission: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The sink refused the submission.
    #[error("submission rejected: {0}")]
    Rejected(String),
}
