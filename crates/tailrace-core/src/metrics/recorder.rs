//! Prometheus recorder with singleton-based initialization.
//!
//! The host process owns the HTTP surface; this module only installs the
//! recorder and exposes the rendered text format.

use std::sync::{Mutex, OnceLock, PoisonError};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use tracing::info;

use crate::error::{AlreadyInitializedSnafu, MetricsError, NotInitializedSnafu, PrometheusInitSnafu};

/// Histogram buckets shared by duration and batch-size histograms.
pub const DEFAULT_HISTOGRAM_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0,
];

static CONTROLLER: OnceLock<MetricsController> = OnceLock::new();
static INSTALL_LOCK: Mutex<()> = Mutex::new(());

/// Access point for the installed Prometheus recorder.
pub struct MetricsController {
    handle: PrometheusHandle,
}

impl MetricsController {
    /// Get the global controller.
    ///
    /// # Errors
    ///
    /// Returns an error if no recorder has been installed.
    pub fn get() -> Result<&'static Self, MetricsError> {
        CONTROLLER.get().context(NotInitializedSnafu)
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Install the global Prometheus recorder.
///
/// # Errors
///
/// Returns an error if a recorder is already installed or the builder rejects
/// the configuration.
pub fn init_recorder() -> Result<(), MetricsError> {
    install()?;
    info!("Prometheus metrics recorder installed");
    Ok(())
}

/// Install the recorder for tests.
///
/// Safe to call from many test threads: installation is serialized, so
/// every caller returns with the controller published.
///
/// # Panics
///
/// Panics if the recorder cannot be installed, for instance because another
/// global recorder was set outside this module.
pub fn init_test() {
    match install() {
        Ok(()) | Err(MetricsError::AlreadyInitialized) => {}
        Err(e) => panic!("failed to install test metrics recorder: {e}"),
    }
}

fn install() -> Result<(), MetricsError> {
    let _guard = INSTALL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if CONTROLLER.get().is_some() {
        return AlreadyInitializedSnafu.fail();
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(DEFAULT_HISTOGRAM_BUCKETS)
        .context(PrometheusInitSnafu)?
        .install_recorder()
        .context(PrometheusInitSnafu)?;

    CONTROLLER
        .set(MetricsController { handle })
        .map_err(|_| AlreadyInitializedSnafu.build())
}
