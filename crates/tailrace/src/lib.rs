//! Tailrace: failure normalization and submission for log ingestion.
//!
//! Input, processing and indexing stages fail with very different data in
//! hand. This crate handles:
//! - Normalizing stage-specific errors into uniform [`Failure`] records
//! - Deciding per origin and configuration whether a failed message continues
//!   or is filtered out
//! - Grouping failures into [`FailureBatch`]es and submitting them to a queue
//!   that blocks submitters when the consumer falls behind

pub mod batch;
pub mod config;
pub mod error;
pub mod failure;
pub mod message;
pub mod metrics;
pub mod queue;
pub mod service;

// Re-export commonly used items
pub use batch::FailureBatch;
pub use config::{Config, FailureHandlingConfig, FailureHandlingConfiguration};
pub use error::{BatchError, QueueError, SubmissionError};
pub use failure::{Failure, FailureCause, FailureType};
pub use message::{
    IndexingError, IndexingErrorType, InputProcessingException, Message, ProcessingError,
    RawMessage, RootCause,
};
pub use queue::{BoundedFailureQueue, FailureReceiver, FailureStats, FailureSubmissionQueue};
pub use service::{FailureSubmissionService, ProcessingDecision};

// Re-export from tailrace-core
pub use tailrace_core::{ConfigPath, init_metrics_test, init_recorder, init_tracing};

/// Install tracing and, if enabled, the Prometheus recorder.
///
/// Intended to be called once by the host process at startup.
pub fn init_observability(config: &Config) -> Result<(), error::MetricsError> {
    init_tracing();
    if config.metrics.enabled {
        init_recorder()?;
    }
    Ok(())
}
