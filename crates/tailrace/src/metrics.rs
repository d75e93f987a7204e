//! Internal events for failure submission metrics.
//!
//! Each event records one Prometheus series through the `metrics` facade; see
//! [`tailrace_core::InternalEvent`].

use std::time::Duration;

use metrics::{counter, gauge, histogram};
use tracing::trace;

use tailrace_core::InternalEvent;

use crate::failure::FailureType;

/// A batch was accepted by the queue.
pub struct FailureBatchSubmitted {
    pub failure_type: FailureType,
    pub size: usize,
}

impl InternalEvent for FailureBatchSubmitted {
    fn emit(self) {
        trace!(failure_type = %self.failure_type, size = self.size, "Failure batch submitted");
        counter!("tailrace_failure_batches_submitted_total", "failure_type" => self.failure_type.as_str())
            .increment(1);
        counter!("tailrace_failures_submitted_total", "failure_type" => self.failure_type.as_str())
            .increment(self.size as u64);
        histogram!("tailrace_failure_batch_size").record(self.size as f64);
    }
}

/// Time a submitter spent waiting for the queue to accept a batch.
pub struct SubmissionBlocked {
    pub duration: Duration,
}

impl InternalEvent for SubmissionBlocked {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Submission wait");
        histogram!("tailrace_submission_wait_seconds").record(self.duration.as_secs_f64());
    }
}

/// A message was dropped from the pipeline because of a processing failure.
pub struct MessageFilteredOut;

impl InternalEvent for MessageFilteredOut {
    fn emit(self) {
        counter!("tailrace_messages_filtered_out_total").increment(1);
    }
}

/// An input failed to decode a raw message.
pub struct InputFailureRecorded {
    pub input_id: String,
}

impl InternalEvent for InputFailureRecorded {
    fn emit(self) {
        trace!(input_id = %self.input_id, "Input failure recorded");
        counter!("tailrace_input_failures_total", "input_id" => self.input_id).increment(1);
    }
}

/// Number of batches waiting in the queue.
pub struct FailureQueueSize {
    pub size: usize,
}

impl InternalEvent for FailureQueueSize {
    fn emit(self) {
        gauge!("tailrace_failure_queue_size").set(self.size as f64);
    }
}

/// A batch was taken off the queue by the consumer.
pub struct FailureBatchConsumed {
    pub size: usize,
}

impl InternalEvent for FailureBatchConsumed {
    fn emit(self) {
        trace!(size = self.size, "Failure batch consumed");
        counter!("tailrace_failure_batches_consumed_total").increment(1);
    }
}
