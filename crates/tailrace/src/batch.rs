//! Typed, non-empty groups of failures submitted in a single queue call.

use serde::Serialize;
use snafu::prelude::*;

use crate::error::{BatchError, EmptyBatchSnafu};
use crate::failure::{Failure, FailureType};

/// An ordered, non-empty collection of failures.
///
/// Ownership moves to the queue on submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureBatch {
    failures: Vec<Failure>,
}

impl FailureBatch {
    /// Build a batch, preserving the order of `failures`.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::EmptyBatch`] if `failures` is empty.
    pub fn new(failures: Vec<Failure>) -> Result<Self, BatchError> {
        ensure!(!failures.is_empty(), EmptyBatchSnafu);
        Ok(Self { failures })
    }

    /// A batch holding exactly one failure.
    pub fn single(failure: Failure) -> Self {
        Self {
            failures: vec![failure],
        }
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<Failure> {
        self.failures
    }

    pub fn size(&self) -> usize {
        self.failures.len()
    }

    pub fn contains_indexing_failures(&self) -> bool {
        self.contains(FailureType::Indexing)
    }

    pub fn contains_processing_failures(&self) -> bool {
        self.contains(FailureType::Processing)
    }

    pub fn contains_input_failures(&self) -> bool {
        self.contains(FailureType::Input)
    }

    /// The type of the first failure; used to label metrics and logs.
    pub fn primary_type(&self) -> FailureType {
        self.failures[0].failure_type()
    }

    fn contains(&self, failure_type: FailureType) -> bool {
        self.failures
            .iter()
            .any(|failure| failure.failure_type() == failure_type)
    }
}

impl IntoIterator for FailureBatch {
    type Item = Failure;
    type IntoIter = std::vec::IntoIter<Failure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.into_iter()
    }
}
