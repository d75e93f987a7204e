//! The pipeline-side views of messages and stage errors.
//!
//! These types are what the input, processing and indexing stages hand to
//! [`FailureSubmissionService`](crate::FailureSubmissionService). They carry
//! only what failure normalization needs.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::failure::FailureCause;

/// Lazily evaluated cause label.
pub type CauseSupplier = Box<dyn Fn() -> FailureCause + Send + Sync>;

/// An error recorded on a message by a processing stage.
pub struct ProcessingError {
    cause: CauseSupplier,
    message: String,
    details: String,
}

impl ProcessingError {
    /// `cause` is only invoked if a failure is actually built for this error.
    pub fn new<F>(cause: F, message: impl Into<String>, details: impl Into<String>) -> Self
    where
        F: Fn() -> FailureCause + Send + Sync + 'static,
    {
        Self {
            cause: Box::new(cause),
            message: message.into(),
            details: details.into(),
        }
    }

    /// Evaluate the cause label.
    pub fn cause(&self) -> FailureCause {
        (self.cause)()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &str {
        &self.details
    }
}

impl fmt::Debug for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingError")
            .field("message", &self.message)
            .field("details", &self.details)
            .finish_non_exhaustive()
    }
}

/// A decoded message travelling through the processing pipeline.
#[derive(Debug, Default)]
pub struct Message {
    id: String,
    message_id: Option<String>,
    supports_failure_handling: bool,
    processing_errors: Vec<ProcessingError>,
}

impl Message {
    /// Create a message with its generic identifier.
    ///
    /// Failure handling is disabled until [`Message::with_failure_handling`]
    /// opts in.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Set the dedicated message identifier.
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_failure_handling(mut self, supported: bool) -> Self {
        self.supports_failure_handling = supported;
        self
    }

    pub fn with_processing_error(mut self, error: ProcessingError) -> Self {
        self.processing_errors.push(error);
        self
    }

    /// Record a processing error, preserving insertion order.
    pub fn add_processing_error(&mut self, error: ProcessingError) {
        self.processing_errors.push(error);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn supports_failure_handling(&self) -> bool {
        self.supports_failure_handling
    }

    pub fn processing_errors(&self) -> &[ProcessingError] {
        &self.processing_errors
    }

    pub fn has_processing_errors(&self) -> bool {
        !self.processing_errors.is_empty()
    }

    /// Best-effort identifier for failure records.
    ///
    /// Prefers the dedicated message id, then the generic id, then the literal
    /// `UNKNOWN`.
    pub fn resolved_id(&self) -> &str {
        self.message_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| Some(self.id.as_str()).filter(|id| !id.is_empty()))
            .unwrap_or(FailureCause::UNKNOWN)
    }
}

/// Classification reported by the indexer for a rejected message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexingErrorType {
    MappingError,
    IndexBlocked,
    Unknown,
}

impl IndexingErrorType {
    /// The failure cause label for this classification.
    pub fn label(&self) -> &'static str {
        match self {
            IndexingErrorType::MappingError => "MappingError",
            IndexingErrorType::IndexBlocked => "IndexBlocked",
            IndexingErrorType::Unknown => FailureCause::UNKNOWN,
        }
    }
}

/// A message the indexer refused to write.
#[derive(Debug, Clone)]
pub struct IndexingError {
    pub message: Arc<Message>,
    pub target_index: String,
    pub error_type: IndexingErrorType,
    pub details: String,
}

impl IndexingError {
    pub fn new(
        message: Arc<Message>,
        target_index: impl Into<String>,
        error_type: IndexingErrorType,
        details: impl Into<String>,
    ) -> Self {
        Self {
            message,
            target_index: target_index.into(),
            error_type,
            details: details.into(),
        }
    }
}

/// Undecoded bytes as received by an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    id: Uuid,
    timestamp: DateTime<Utc>,
    payload: Bytes,
}

impl RawMessage {
    /// A freshly received raw message, stamped with a new id and the current time.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// Type name and text of the error underlying an input failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootCause {
    pub type_name: String,
    pub message: String,
}

impl RootCause {
    /// Capture the deepest error of `error`'s `source()` chain.
    ///
    /// Sources are type-erased, so the type name of a deeper root is read
    /// from the leading identifier of its `Debug` output. When `error` has no
    /// source its static type name is used.
    pub fn of<E>(error: &E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let Some(mut root) = error.source() else {
            return Self {
                type_name: simple_type_name(std::any::type_name::<E>()).to_string(),
                message: error.to_string(),
            };
        };
        while let Some(source) = root.source() {
            root = source;
        }

        let debug = format!("{root:?}");
        Self {
            type_name: debug_type_name(&debug).to_string(),
            message: root.to_string(),
        }
    }
}

impl fmt::Display for RootCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

/// `std::io::error::Error` -> `Error`, `a::Wrapper<b::C>` -> `Wrapper`.
fn simple_type_name(full: &str) -> &str {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}

/// `ParseIntError { kind: InvalidDigit }` -> `ParseIntError`.
fn debug_type_name(debug: &str) -> &str {
    let end = debug
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(debug.len());
    match &debug[..end] {
        "" => "Error",
        name => name,
    }
}

/// An input failed to turn a raw message into a [`Message`].
#[derive(Debug, Clone)]
pub struct InputProcessingException {
    message: String,
    cause: Option<RootCause>,
    raw_message: RawMessage,
}

impl InputProcessingException {
    pub fn new(message: impl Into<String>, raw_message: RawMessage) -> Self {
        Self {
            message: message.into(),
            cause: None,
            raw_message,
        }
    }

    /// Attach the underlying error that made decoding fail.
    pub fn with_cause<E>(message: impl Into<String>, cause: &E, raw_message: RawMessage) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self {
            message: message.into(),
            cause: Some(RootCause::of(cause)),
            raw_message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&RootCause> {
        self.cause.as_ref()
    }

    pub fn raw_message(&self) -> &RawMessage {
        &self.raw_message
    }

    /// Diagnostic text for the failure record: the root cause if one is
    /// attached, otherwise the exception's own message.
    pub fn details(&self) -> String {
        match &self.cause {
            Some(cause) => cause.to_string(),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for InputProcessingException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for InputProcessingException {}
