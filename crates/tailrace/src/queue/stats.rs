//! Consumer-side failure statistics.

use crate::batch::FailureBatch;
use crate::failure::{Failure, FailureType};

/// Counts of consumed failures by stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureStats {
    pub indexing: usize,
    pub processing: usize,
    pub input: usize,
    /// Failures whose message was dropped from the pipeline.
    pub requiring_acknowledgement: usize,
    pub batches: usize,
}

impl FailureStats {
    /// Increment the counts for a single failure.
    pub fn increment(&mut self, failure: &Failure) {
        match failure.failure_type() {
            FailureType::Indexing => self.indexing += 1,
            FailureType::Processing => self.processing += 1,
            FailureType::Input => self.input += 1,
        }
        if failure.requires_acknowledgement() {
            self.requiring_acknowledgement += 1;
        }
    }

    /// Record every failure of a consumed batch.
    pub fn record_batch(&mut self, batch: &FailureBatch) {
        self.batches += 1;
        for failure in batch.failures() {
            self.increment(failure);
        }
    }

    /// Get total failure count.
    pub fn total(&self) -> usize {
        self.indexing + self.processing + self.input
    }
}
