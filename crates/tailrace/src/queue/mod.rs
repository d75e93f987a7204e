//! Failure submission queue.
//!
//! The service only depends on the [`FailureSubmissionQueue`] contract. The
//! bounded channel implementation here is the default sink: submitters block
//! when the consumer falls behind, which slows ingestion instead of dropping
//! failures or growing memory without bound.

mod bounded;
mod stats;
mod traits;

pub use bounded::{BoundedFailureQueue, FailureReceiver};
pub use stats::FailureStats;
pub use traits::FailureSubmissionQueue;

#[cfg(test)]
pub use traits::MockFailureSubmissionQueue;
