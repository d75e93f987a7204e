//! The normalized failure record.
//!
//! A [`Failure`] is built by exactly one of the stage-specific constructors,
//! which keeps the per-stage optional fields consistent: only indexing
//! failures carry a target index and only input failures carry the raw
//! message timestamp.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage of the ingestion flow that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    Indexing,
    Processing,
    Input,
}

impl FailureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::Indexing => "indexing",
            FailureType::Processing => "processing",
            FailureType::Input => "input",
        }
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short label classifying why a failure occurred.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureCause(String);

impl FailureCause {
    /// Cause used when the originating stage cannot classify the error.
    pub const UNKNOWN: &'static str = "UNKNOWN";
    /// Cause used for every input-stage failure.
    pub const INPUT_PARSE_ERROR: &'static str = "InputParseError";

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN)
    }

    pub fn input_parse_error() -> Self {
        Self::new(Self::INPUT_PARSE_ERROR)
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FailureCause {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for FailureCause {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// A single failure occurrence, ready for submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    failure_type: FailureType,
    failure_cause: FailureCause,
    message: String,
    failure_details: String,
    failure_timestamp: DateTime<Utc>,
    message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_index: Option<String>,
    requires_acknowledgement: bool,
}

impl Failure {
    /// A message could not be written to its target index.
    ///
    /// The message has already left the pipeline, so indexing failures never
    /// require acknowledgement.
    pub fn indexing(
        failure_cause: FailureCause,
        message_id: impl Into<String>,
        target_index: impl Into<String>,
        failure_details: impl Into<String>,
    ) -> Self {
        let message_id = message_id.into();
        let target_index = target_index.into();
        Self {
            failure_type: FailureType::Indexing,
            failure_cause,
            message: format!(
                "Failed to index message with id '{message_id}' targeting '{target_index}'"
            ),
            failure_details: failure_details.into(),
            failure_timestamp: Utc::now(),
            message_id,
            message_timestamp: None,
            target_index: Some(target_index),
            requires_acknowledgement: false,
        }
    }

    /// A pipeline stage failed while processing a message.
    ///
    /// `requires_acknowledgement` is true when the message is dropped because
    /// of this failure and no processed duplicate survives.
    pub fn processing(
        failure_cause: FailureCause,
        message_id: impl Into<String>,
        error_message: &str,
        failure_details: impl Into<String>,
        requires_acknowledgement: bool,
    ) -> Self {
        let message_id = message_id.into();
        Self {
            failure_type: FailureType::Processing,
            failure_cause,
            message: format!("Failed to process message with id '{message_id}': {error_message}"),
            failure_details: failure_details.into(),
            failure_timestamp: Utc::now(),
            message_id,
            message_timestamp: None,
            target_index: None,
            requires_acknowledgement,
        }
    }

    /// A raw message could not be decoded by its input.
    pub fn input(
        raw_message_id: impl Into<String>,
        raw_message_timestamp: DateTime<Utc>,
        input_id: &str,
        error_message: &str,
        failure_details: impl Into<String>,
    ) -> Self {
        let message_id = raw_message_id.into();
        Self {
            failure_type: FailureType::Input,
            failure_cause: FailureCause::input_parse_error(),
            message: format!(
                "Failed to process message with id '{message_id}' from input with id '{input_id}': {error_message}"
            ),
            failure_details: failure_details.into(),
            failure_timestamp: Utc::now(),
            message_id,
            message_timestamp: Some(raw_message_timestamp),
            target_index: None,
            requires_acknowledgement: false,
        }
    }

    pub fn failure_type(&self) -> FailureType {
        self.failure_type
    }

    pub fn failure_cause(&self) -> &FailureCause {
        &self.failure_cause
    }

    /// Human-readable, stage-specific description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Raw diagnostic text from the originating stage.
    pub fn failure_details(&self) -> &str {
        &self.failure_details
    }

    pub fn failure_timestamp(&self) -> DateTime<Utc> {
        self.failure_timestamp
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn message_timestamp(&self) -> Option<DateTime<Utc>> {
        self.message_timestamp
    }

    pub fn target_index(&self) -> Option<&str> {
        self.target_index.as_deref()
    }

    pub fn requires_acknowledgement(&self) -> bool {
        self.requires_acknowledgement
    }
}
