//! Bounded channel queue with blocking submission.

use std::time::Instant;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, error};

use tailrace_core::emit;

use crate::batch::FailureBatch;
use crate::config::FailureHandlingConfig;
use crate::error::QueueError;
use crate::metrics::{FailureBatchConsumed, FailureQueueSize, SubmissionBlocked};

use super::{FailureStats, FailureSubmissionQueue};

/// Producer half of the default failure queue.
///
/// Cheap to clone; every pipeline worker may hold its own handle.
#[derive(Debug, Clone)]
pub struct BoundedFailureQueue {
    sender: mpsc::Sender<FailureBatch>,
}

impl BoundedFailureQueue {
    /// Create a queue holding up to `capacity` batches (at least one).
    pub fn new(capacity: usize) -> (Self, FailureReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self { sender },
            FailureReceiver {
                receiver,
                stats: FailureStats::default(),
            },
        )
    }

    pub fn from_config(config: &FailureHandlingConfig) -> (Self, FailureReceiver) {
        Self::new(config.queue_capacity)
    }

    /// Submit from async code, waiting for capacity without blocking the
    /// executor thread.
    pub async fn submit(&self, batch: FailureBatch) -> Result<(), QueueError> {
        let started = Instant::now();
        self.sender.send(batch).await.map_err(|_| {
            error!("Failure queue closed, dropping batch");
            QueueError::QueueClosed
        })?;
        emit!(SubmissionBlocked {
            duration: started.elapsed(),
        });
        emit!(FailureQueueSize { size: self.len() });
        Ok(())
    }

    /// Number of batches waiting for the consumer.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl FailureSubmissionQueue for BoundedFailureQueue {
    /// Blocks the calling thread while the queue is full.
    ///
    /// Inside a multi-thread runtime the worker is handed off with
    /// `block_in_place` while waiting. A full queue inside a current-thread
    /// runtime fails with [`QueueError::BlockingInCurrentThreadRuntime`];
    /// such callers use [`BoundedFailureQueue::submit`].
    fn submit_blocking(&self, batch: FailureBatch) -> Result<(), QueueError> {
        let batch = match self.sender.try_send(batch) {
            Ok(()) => {
                emit!(FailureQueueSize { size: self.len() });
                return Ok(());
            }
            Err(TrySendError::Full(batch)) => batch,
            Err(TrySendError::Closed(_)) => {
                error!("Failure queue closed, dropping batch");
                return Err(QueueError::QueueClosed);
            }
        };

        debug!(capacity = self.capacity(), "Failure queue full, blocking submitter");
        let started = Instant::now();
        let sent = match Handle::try_current() {
            Err(_) => self.sender.blocking_send(batch),
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.sender.send(batch)))
            }
            Ok(_) => {
                error!("Failure queue full inside a current-thread runtime");
                return Err(QueueError::BlockingInCurrentThreadRuntime);
            }
        };
        sent.map_err(|_| {
            error!("Failure queue closed while waiting, dropping batch");
            QueueError::QueueClosed
        })?;
        emit!(SubmissionBlocked {
            duration: started.elapsed(),
        });
        emit!(FailureQueueSize { size: self.len() });
        Ok(())
    }
}

/// Consumer half of the default failure queue.
///
/// Dropping the receiver closes the queue: pending and future submissions
/// fail with [`QueueError::QueueClosed`].
#[derive(Debug)]
pub struct FailureReceiver {
    receiver: mpsc::Receiver<FailureBatch>,
    stats: FailureStats,
}

impl FailureReceiver {
    /// Wait for the next batch. Returns `None` once every producer is gone
    /// and the queue is drained.
    pub async fn recv(&mut self) -> Option<FailureBatch> {
        let batch = self.receiver.recv().await?;
        Some(self.consumed(batch))
    }

    /// Blocking variant of [`FailureReceiver::recv`] for consumer threads.
    pub fn blocking_recv(&mut self) -> Option<FailureBatch> {
        let batch = self.receiver.blocking_recv()?;
        Some(self.consumed(batch))
    }

    /// Take a batch if one is immediately available.
    pub fn try_recv(&mut self) -> Option<FailureBatch> {
        match self.receiver.try_recv() {
            Ok(batch) => Some(self.consumed(batch)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Stop accepting new batches; already queued batches can still be drained.
    pub fn close(&mut self) {
        self.receiver.close();
    }

    pub fn stats(&self) -> &FailureStats {
        &self.stats
    }

    fn consumed(&mut self, batch: FailureBatch) -> FailureBatch {
        self.stats.record_batch(&batch);
        emit!(FailureBatchConsumed { size: batch.size() });
        emit!(FailureQueueSize {
            size: self.receiver.len(),
        });
        batch
    }
}
