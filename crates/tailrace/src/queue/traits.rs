//! The queue contract consumed by the submission service.

use crate::batch::FailureBatch;
use crate::error::QueueError;

/// A sink accepting failure batches under blocking backpressure.
#[cfg_attr(test, mockall::automock)]
pub trait FailureSubmissionQueue: Send + Sync {
    /// Hand a batch to the consumer, blocking the calling thread until it is
    /// accepted.
    ///
    /// There is no timeout at this layer; a saturated consumer may block the
    /// caller indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::QueueClosed`] if the consumer is permanently
    /// unavailable. The batch is lost in that case. Implementations that
    /// cannot block in the caller's context return a dedicated error instead
    /// of panicking.
    fn submit_blocking(&self, batch: FailureBatch) -> Result<(), QueueError>;
}
