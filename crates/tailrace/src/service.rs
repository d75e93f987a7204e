//! Failure normalization and submission.
//!
//! [`FailureSubmissionService`] turns stage-specific errors into [`Failure`]
//! records, applies the configured policy, and hands batches to the queue.
//! It keeps no state between calls and needs no locking: concurrent callers
//! only meet at the queue, whose blocking acceptance is the backpressure point.

use std::sync::Arc;

use snafu::prelude::*;
use tracing::{debug, trace};

use tailrace_core::emit;

use crate::batch::FailureBatch;
use crate::config::{FailureHandlingConfig, FailureHandlingConfiguration};
use crate::error::{QueueSnafu, SubmissionError};
use crate::failure::{Failure, FailureCause};
use crate::message::{IndexingError, InputProcessingException, Message, ProcessingError};
use crate::metrics::{FailureBatchSubmitted, InputFailureRecorded, MessageFilteredOut};
use crate::queue::{BoundedFailureQueue, FailureReceiver, FailureSubmissionQueue};

const UNRECOGNIZABLE_PROCESSING_ERROR: &str = "Encountered an unrecognizable processing error";

/// What the pipeline should do with a message after its failures were handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingDecision {
    /// Continue processing the message.
    Keep,
    /// Drop the message; its failure record replaces it.
    FilterOut,
}

impl ProcessingDecision {
    pub fn should_keep(self) -> bool {
        matches!(self, ProcessingDecision::Keep)
    }
}

/// Normalizes pipeline failures and submits them under backpressure.
///
/// Every method may block while the queue is saturated. Callers must treat
/// failure reporting as potentially slow.
#[derive(Clone)]
pub struct FailureSubmissionService {
    queue: Arc<dyn FailureSubmissionQueue>,
    config: Arc<dyn FailureHandlingConfiguration>,
}

impl FailureSubmissionService {
    pub fn new(
        queue: Arc<dyn FailureSubmissionQueue>,
        config: Arc<dyn FailureHandlingConfiguration>,
    ) -> Self {
        Self { queue, config }
    }

    /// Wire a service to a fresh bounded queue sized from `config`.
    pub fn with_bounded_queue(config: FailureHandlingConfig) -> (Self, FailureReceiver) {
        let (queue, receiver) = BoundedFailureQueue::from_config(&config);
        (Self::new(Arc::new(queue), Arc::new(config)), receiver)
    }

    /// Submit the errors an indexing request reported, as one batch.
    ///
    /// Errors for messages without failure-handling support are skipped; if
    /// none remain the queue is not touched.
    pub fn submit_indexing_errors(&self, errors: &[IndexingError]) -> Result<(), SubmissionError> {
        let failures: Vec<Failure> = errors
            .iter()
            .filter(|error| error.message.supports_failure_handling())
            .map(|error| {
                Failure::indexing(
                    FailureCause::new(error.error_type.label()),
                    error.message.resolved_id(),
                    error.target_index.as_str(),
                    error.details.as_str(),
                )
            })
            .collect();

        let Ok(batch) = FailureBatch::new(failures) else {
            trace!(errors = errors.len(), "No indexing errors eligible for failure handling");
            return Ok(());
        };

        self.submit(batch)
    }

    /// Submit the failure of an input to decode a raw message.
    ///
    /// Raw input failures happen before any message-level policy applies, so
    /// they are always submitted.
    pub fn submit_input_failure(
        &self,
        exception: &InputProcessingException,
        input_id: &str,
    ) -> Result<(), SubmissionError> {
        let raw = exception.raw_message();
        let failure = Failure::input(
            raw.id().to_string(),
            raw.timestamp(),
            input_id,
            exception.message(),
            exception.details(),
        );

        self.submit(FailureBatch::single(failure))?;
        emit!(InputFailureRecorded {
            input_id: input_id.to_string(),
        });
        Ok(())
    }

    /// Apply the processing-failure policy to a message.
    ///
    /// Returns [`ProcessingDecision::FilterOut`] only when failures are
    /// submitted, the message supports failure handling, and failed-message
    /// duplicates are not kept. Every other combination keeps the message.
    pub fn submit_processing_errors(
        &self,
        message: &Message,
    ) -> Result<ProcessingDecision, SubmissionError> {
        if !message.has_processing_errors() {
            return Ok(ProcessingDecision::Keep);
        }

        if !self.config.submit_processing_failures() {
            trace!(message_id = message.resolved_id(), "Processing failure submission disabled");
            return Ok(ProcessingDecision::Keep);
        }

        if !message.supports_failure_handling() {
            trace!(
                message_id = message.resolved_id(),
                "Message does not support failure handling"
            );
            return Ok(ProcessingDecision::Keep);
        }

        if self.config.keep_failed_message_duplicate() {
            // One batch per error, in recorded order
            for error in message.processing_errors() {
                self.submit(FailureBatch::single(processing_failure(message, error, false)))?;
            }
            return Ok(ProcessingDecision::Keep);
        }

        // Only the first error is reported; the consumer must acknowledge it
        // since the message itself is dropped.
        if let Some(error) = message.processing_errors().first() {
            self.submit(FailureBatch::single(processing_failure(message, error, true)))?;
        }

        debug!(
            message_id = message.resolved_id(),
            errors = message.processing_errors().len(),
            "Filtering out message after processing failure"
        );
        emit!(MessageFilteredOut);
        Ok(ProcessingDecision::FilterOut)
    }

    /// Submit a processing failure detected outside the message's own error
    /// list, such as a panic or error escaping a pipeline stage.
    ///
    /// Always submits and never filters the message out, independent of
    /// configuration.
    pub fn submit_unknown_processing_error(
        &self,
        message: &Message,
        details: &str,
    ) -> Result<ProcessingDecision, SubmissionError> {
        let failure = Failure::processing(
            FailureCause::unknown(),
            message.resolved_id(),
            UNRECOGNIZABLE_PROCESSING_ERROR,
            details,
            false,
        );

        self.submit(FailureBatch::single(failure))?;
        Ok(ProcessingDecision::Keep)
    }

    fn submit(&self, batch: FailureBatch) -> Result<(), SubmissionError> {
        let failure_type = batch.primary_type();
        let size = batch.size();

        debug!(%failure_type, size, "Submitting failure batch");
        self.queue
            .submit_blocking(batch)
            .context(QueueSnafu { failure_type })?;

        emit!(FailureBatchSubmitted { failure_type, size });
        Ok(())
    }
}

fn processing_failure(
    message: &Message,
    error: &ProcessingError,
    requires_acknowledgement: bool,
) -> Failure {
    Failure::processing(
        error.cause(),
        message.resolved_id(),
        error.message(),
        error.details(),
        requires_acknowledgement,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockFailureHandlingConfiguration;
    use crate::error::QueueError;
    use crate::failure::FailureType;
    use crate::message::{IndexingErrorType, RawMessage};
    use crate::queue::MockFailureSubmissionQueue;
    use bytes::Bytes;
    use std::sync::Mutex;

    /// Queue mock that records every submitted batch.
    fn capturing_queue(times: usize) -> (MockFailureSubmissionQueue, Arc<Mutex<Vec<FailureBatch>>>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let mut queue = MockFailureSubmissionQueue::new();
        let sink = Arc::clone(&captured);
        queue
            .expect_submit_blocking()
            .times(times)
            .returning(move |batch| {
                sink.lock().unwrap().push(batch);
                Ok(())
            });
        (queue, captured)
    }

    fn silent_queue() -> MockFailureSubmissionQueue {
        let mut queue = MockFailureSubmissionQueue::new();
        queue.expect_submit_blocking().never();
        queue
    }

    fn policy(submit: bool, keep_duplicate: bool) -> MockFailureHandlingConfiguration {
        let mut config = MockFailureHandlingConfiguration::new();
        config
            .expect_submit_processing_failures()
            .return_const(submit);
        config
            .expect_keep_failed_message_duplicate()
            .return_const(keep_duplicate);
        config
    }

    fn service(
        queue: MockFailureSubmissionQueue,
        config: MockFailureHandlingConfiguration,
    ) -> FailureSubmissionService {
        FailureSubmissionService::new(Arc::new(queue), Arc::new(config))
    }

    fn message_with_two_errors(id: &str) -> Message {
        Message::new("uuid")
            .with_message_id(id)
            .with_failure_handling(true)
            .with_processing_error(ProcessingError::new(
                || FailureCause::new("Cause 1"),
                "Message 1",
                "Details 1",
            ))
            .with_processing_error(ProcessingError::new(
                || FailureCause::new("Cause 2"),
                "Message 2",
                "Details 2",
            ))
    }

    #[test]
    fn test_indexing_errors_transformed_and_submitted_as_one_batch() {
        let (queue, captured) = capturing_queue(1);
        let under_test = service(queue, policy(false, false));

        let msg1 = Arc::new(Message::new("a").with_message_id("msg-1").with_failure_handling(true));
        let msg2 = Arc::new(Message::new("b").with_message_id("msg-2").with_failure_handling(true));
        let errors = vec![
            IndexingError::new(msg1, "index-1", IndexingErrorType::MappingError, "Error"),
            IndexingError::new(msg2, "index-2", IndexingErrorType::Unknown, "Error2"),
        ];

        under_test.submit_indexing_errors(&errors).unwrap();

        let batches = captured.lock().unwrap();
        let batch = &batches[0];
        assert!(batch.contains_indexing_failures());
        assert_eq!(batch.size(), 2);

        let first = &batch.failures()[0];
        assert_eq!(first.failure_type(), FailureType::Indexing);
        assert_eq!(first.failure_cause().label(), "MappingError");
        assert_eq!(
            first.message(),
            "Failed to index message with id 'msg-1' targeting 'index-1'"
        );
        assert_eq!(first.failure_details(), "Error");
        assert_eq!(first.message_id(), "msg-1");
        assert_eq!(first.target_index(), Some("index-1"));
        assert!(!first.requires_acknowledgement());

        let second = &batch.failures()[1];
        assert_eq!(second.failure_cause().label(), "UNKNOWN");
        assert_eq!(
            second.message(),
            "Failed to index message with id 'msg-2' targeting 'index-2'"
        );
        assert_eq!(second.failure_details(), "Error2");
        assert_eq!(second.target_index(), Some("index-2"));
        assert!(!second.requires_acknowledgement());
    }

    #[test]
    fn test_indexing_errors_skip_messages_without_failure_handling() {
        let (queue, captured) = capturing_queue(1);
        let under_test = service(queue, policy(false, false));

        let errors = vec![
            IndexingError::new(
                Arc::new(Message::new("a").with_message_id("skipped")),
                "index-1",
                IndexingErrorType::MappingError,
                "Error",
            ),
            IndexingError::new(
                Arc::new(Message::new("b").with_message_id("kept").with_failure_handling(true)),
                "index-2",
                IndexingErrorType::IndexBlocked,
                "Blocked",
            ),
        ];

        under_test.submit_indexing_errors(&errors).unwrap();

        let batches = captured.lock().unwrap();
        assert_eq!(batches[0].size(), 1);
        assert_eq!(batches[0].failures()[0].message_id(), "kept");
        assert_eq!(batches[0].failures()[0].failure_cause().label(), "IndexBlocked");
    }

    #[test]
    fn test_indexing_errors_not_submitted_when_no_message_supports_failure_handling() {
        let under_test = service(silent_queue(), policy(true, true));

        let errors = vec![
            IndexingError::new(
                Arc::new(Message::new("a")),
                "index-1",
                IndexingErrorType::MappingError,
                "Error",
            ),
            IndexingError::new(
                Arc::new(Message::new("b")),
                "index-2",
                IndexingErrorType::Unknown,
                "Error2",
            ),
        ];

        under_test.submit_indexing_errors(&errors).unwrap();
    }

    #[test]
    fn test_empty_indexing_error_list_is_a_no_op() {
        let under_test = service(silent_queue(), policy(true, true));
        under_test.submit_indexing_errors(&[]).unwrap();
    }

    #[test]
    fn test_processing_errors_each_submitted_and_message_kept_when_duplicates_kept() {
        let (queue, captured) = capturing_queue(2);
        let under_test = service(queue, policy(true, true));

        let decision = under_test
            .submit_processing_errors(&message_with_two_errors("msg-x"))
            .unwrap();

        assert_eq!(decision, ProcessingDecision::Keep);
        assert!(decision.should_keep());

        let batches = captured.lock().unwrap();
        assert_eq!(batches.len(), 2);
        for (i, batch) in batches.iter().enumerate() {
            let n = i + 1;
            assert!(batch.contains_processing_failures());
            assert_eq!(batch.size(), 1);

            let failure = &batch.failures()[0];
            assert_eq!(failure.failure_type(), FailureType::Processing);
            assert_eq!(failure.failure_cause().label(), format!("Cause {n}"));
            assert_eq!(
                failure.message(),
                format!("Failed to process message with id 'msg-x': Message {n}")
            );
            assert_eq!(failure.failure_details(), format!("Details {n}"));
            assert_eq!(failure.message_id(), "msg-x");
            assert_eq!(failure.target_index(), None);
            assert!(!failure.requires_acknowledgement());
        }
    }

    #[test]
    fn test_nothing_submitted_when_message_does_not_support_failure_handling() {
        let under_test = service(silent_queue(), policy(true, true));

        let msg = message_with_two_errors("msg-x").with_failure_handling(false);
        let decision = under_test.submit_processing_errors(&msg).unwrap();

        assert_eq!(decision, ProcessingDecision::Keep);
    }

    #[test]
    fn test_nothing_submitted_when_submission_disabled() {
        for keep_duplicate in [true, false] {
            let under_test = service(silent_queue(), policy(false, keep_duplicate));

            let decision = under_test
                .submit_processing_errors(&message_with_two_errors("msg-x"))
                .unwrap();

            assert_eq!(decision, ProcessingDecision::Keep);
        }
    }

    #[test]
    fn test_nothing_submitted_when_message_has_no_errors() {
        let mut config = MockFailureHandlingConfiguration::new();
        config.expect_submit_processing_failures().never();
        config.expect_keep_failed_message_duplicate().never();
        let under_test = service(silent_queue(), config);

        let msg = Message::new("uuid").with_failure_handling(true);
        assert_eq!(
            under_test.submit_processing_errors(&msg).unwrap(),
            ProcessingDecision::Keep
        );
    }

    #[test]
    fn test_processing_error_submitted_and_message_filtered_out_when_duplicates_not_kept() {
        let (queue, captured) = capturing_queue(1);
        let under_test = service(queue, policy(true, false));

        let msg = Message::new("uuid")
            .with_message_id("msg-x")
            .with_failure_handling(true)
            .with_processing_error(ProcessingError::new(
                || FailureCause::new("Cause"),
                "Message",
                "Details",
            ));

        let decision = under_test.submit_processing_errors(&msg).unwrap();

        assert_eq!(decision, ProcessingDecision::FilterOut);
        assert!(!decision.should_keep());

        let batches = captured.lock().unwrap();
        let failure = &batches[0].failures()[0];
        assert_eq!(batches[0].size(), 1);
        assert_eq!(failure.failure_cause().label(), "Cause");
        assert_eq!(
            failure.message(),
            "Failed to process message with id 'msg-x': Message"
        );
        assert_eq!(failure.failure_details(), "Details");
        assert_eq!(failure.target_index(), None);
        assert!(failure.requires_acknowledgement());
    }

    #[test]
    fn test_only_first_error_submitted_when_filtering_out_message_with_several_errors() {
        let (queue, captured) = capturing_queue(1);
        let under_test = service(queue, policy(true, false));

        let decision = under_test
            .submit_processing_errors(&message_with_two_errors("msg-x"))
            .unwrap();

        assert_eq!(decision, ProcessingDecision::FilterOut);
        let batches = captured.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].size(), 1);

        let failure = &batches[0].failures()[0];
        assert_eq!(failure.failure_cause().label(), "Cause 1");
        assert_eq!(failure.failure_details(), "Details 1");
        assert!(failure.requires_acknowledgement());
    }

    #[test]
    fn test_cause_supplier_not_evaluated_when_nothing_submitted() {
        let under_test = service(silent_queue(), policy(false, true));

        let msg = Message::new("uuid")
            .with_failure_handling(true)
            .with_processing_error(ProcessingError::new(
                || panic!("cause must not be evaluated"),
                "Message",
                "Details",
            ));

        under_test.submit_processing_errors(&msg).unwrap();
    }

    #[test]
    fn test_unknown_processing_error_submitted() {
        let (queue, captured) = capturing_queue(1);
        let under_test = service(queue, policy(true, true));

        let msg = Message::new("").with_failure_handling(true);
        let decision = under_test
            .submit_unknown_processing_error(&msg, "Details of the unknown error!")
            .unwrap();

        assert_eq!(decision, ProcessingDecision::Keep);

        let batches = captured.lock().unwrap();
        let failure = &batches[0].failures()[0];
        assert!(batches[0].contains_processing_failures());
        assert_eq!(failure.failure_type(), FailureType::Processing);
        assert_eq!(failure.failure_cause().label(), "UNKNOWN");
        assert_eq!(
            failure.message(),
            "Failed to process message with id 'UNKNOWN': Encountered an unrecognizable processing error"
        );
        assert_eq!(failure.failure_details(), "Details of the unknown error!");
        assert_eq!(failure.target_index(), None);
        assert!(!failure.requires_acknowledgement());
    }

    #[test]
    fn test_unknown_processing_error_falls_back_to_message_id() {
        let (queue, captured) = capturing_queue(1);
        let under_test = service(queue, policy(true, true));

        let msg = Message::new("msg-uuid").with_failure_handling(true);
        under_test
            .submit_unknown_processing_error(&msg, "Details of the unknown error!")
            .unwrap();

        let batches = captured.lock().unwrap();
        assert_eq!(
            batches[0].failures()[0].message(),
            "Failed to process message with id 'msg-uuid': Encountered an unrecognizable processing error"
        );
    }

    #[test]
    fn test_unknown_processing_error_ignores_policy() {
        let (queue, _captured) = capturing_queue(1);
        let under_test = service(queue, policy(false, false));

        let decision = under_test
            .submit_unknown_processing_error(&Message::new("id"), "details")
            .unwrap();

        assert_eq!(decision, ProcessingDecision::Keep);
    }

    #[test]
    fn test_input_failure_transformed_and_submitted() {
        let (queue, captured) = capturing_queue(1);
        let under_test = service(queue, policy(false, false));

        let raw = RawMessage::new(Bytes::new());
        let exception = InputProcessingException::new("error1", raw.clone());

        under_test.submit_input_failure(&exception, "1234").unwrap();

        let batches = captured.lock().unwrap();
        assert!(batches[0].contains_input_failures());
        assert_eq!(batches[0].size(), 1);

        let failure = &batches[0].failures()[0];
        assert_eq!(failure.failure_type(), FailureType::Input);
        assert_eq!(failure.failure_cause().label(), "InputParseError");
        assert_eq!(
            failure.message(),
            format!(
                "Failed to process message with id '{}' from input with id '1234': error1",
                raw.id()
            )
        );
        assert_eq!(failure.failure_details(), "error1");
        assert_eq!(failure.message_timestamp(), Some(raw.timestamp()));
        assert_eq!(failure.message_id(), raw.id().to_string());
        assert!(!failure.requires_acknowledgement());
    }

    #[test]
    fn test_input_failure_uses_root_cause_for_details() {
        let (queue, captured) = capturing_queue(1);
        let under_test = service(queue, policy(false, false));

        let cause = "not-a-number".parse::<i32>().unwrap_err();
        let exception =
            InputProcessingException::with_cause("error1", &cause, RawMessage::new(Bytes::new()));

        under_test.submit_input_failure(&exception, "1234").unwrap();

        let batches = captured.lock().unwrap();
        assert_eq!(
            batches[0].failures()[0].failure_details(),
            format!("ParseIntError: {cause}")
        );
    }

    #[test]
    fn test_queue_closed_propagates_to_caller() {
        let mut queue = MockFailureSubmissionQueue::new();
        queue
            .expect_submit_blocking()
            .times(1)
            .returning(|_| Err(QueueError::QueueClosed));
        let under_test = service(queue, policy(true, true));

        let err = under_test
            .submit_processing_errors(&message_with_two_errors("msg-x"))
            .unwrap_err();

        assert_eq!(err.failure_type(), FailureType::Processing);
        assert!(err.to_string().contains("closed"));
    }
}
