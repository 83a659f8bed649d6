//! Error types for the streaming anomaly pipeline

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Custom error type for the library
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed input: non-finite or non-positive price, or an incomplete
    /// feature vector handed to the model
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Tick timestamp not strictly greater than the last accepted one
    #[error("out-of-order input: received {received}, last accepted {previous}")]
    OutOfOrderInput {
        previous: DateTime<Utc>,
        received: DateTime<Utc>,
    },

    /// Model fit failed (degenerate training set)
    #[error("training failed: {0}")]
    TrainingFailed(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, PipelineError>;
