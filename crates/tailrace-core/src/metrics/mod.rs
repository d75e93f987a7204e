//! Metrics infrastructure.
//!
//! - `InternalEvent`: a measurable occurrence that knows how to record itself
//! - `emit!`: shorthand for emitting an event
//! - `recorder`: Prometheus recorder installation and rendering

mod recorder;

pub use recorder::{DEFAULT_HISTOGRAM_BUCKETS, MetricsController, init_recorder, init_test};

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Record this event with the installed metrics recorder.
    fn emit(self);
}

/// Emit an internal event (Vector-style pattern).
///
/// ```ignore
/// use tailrace_core::emit;
///
/// emit!(MessageFilteredOut);
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::InternalEvent::emit($event)
    };
}
