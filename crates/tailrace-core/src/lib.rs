//! tailrace-core: Shared infrastructure for the tailrace failure subsystem.
//!
//! This crate holds the pieces that do not depend on the failure model itself:
//!
//! - `config/` - Config path discovery, multi-file loading and environment variable interpolation
//! - `metrics/` - `InternalEvent` trait, `emit!` macro and Prometheus recorder setup
//! - `tracing` - Subscriber initialization for host binaries and tests
//! - `error` - Common error types

pub mod config;
pub mod error;
pub mod metrics;
pub mod tracing;

// Re-export commonly used items
pub use config::{ConfigPath, YamlDocument, interpolate, is_yaml_file, load_documents};
pub use error::{ConfigError, MetricsError};
pub use self::metrics::{InternalEvent, MetricsController, init_recorder, init_test as init_metrics_test};
pub use self::tracing::init_tracing;
