//! Error types for failure submission.

use snafu::prelude::*;

use crate::failure::FailureType;

// Re-export common errors
pub use tailrace_core::error::{ConfigError, MetricsError};

/// Errors raised by a failure submission queue.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueueError {
    /// The consuming side is gone and will never accept another batch.
    #[snafu(display("Failure queue is closed: the consumer is no longer available"))]
    QueueClosed,

    /// A full queue cannot be waited on from a current-thread runtime
    /// without deadlocking the consumer that shares the thread.
    #[snafu(display(
        "Failure queue is full and cannot block inside a current-thread runtime"
    ))]
    BlockingInCurrentThreadRuntime,
}

/// Errors raised when constructing a failure batch.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum BatchError {
    /// Batches must hold at least one failure; callers skip submission instead.
    #[snafu(display("A failure batch must contain at least one failure"))]
    EmptyBatch,
}

/// Errors returned to the pipeline stage that reported a failure.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SubmissionError {
    /// The batch could not be handed to the queue.
    #[snafu(display("Failed to submit {failure_type} failure batch: {source}"))]
    Queue {
        failure_type: FailureType,
        source: QueueError,
    },
}

impl SubmissionError {
    /// The stage whose failure could not be submitted.
    pub fn failure_type(&self) -> FailureType {
        match self {
            SubmissionError::Queue { failure_type, .. } => *failure_type,
        }
    }
}
