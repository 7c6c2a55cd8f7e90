//! Observability: structured logging and metrics.

mod logging;
mod metrics;

pub use logging::{DEFAULT_LOG_FILTER, LogFormat, LoggingConfig};
pub use metrics::{MetricsConfig, MetricsHandle, install_prometheus};

use crate::config::GcConfig;
use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Full observability configuration.
#[derive(Debug)]
pub struct ObservabilityConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
    /// Whether to expose metrics via HTTP listener.
    pub metrics_expose: bool,
}

impl ObservabilityConfig {
    /// Builds observability configuration from the service config.
    #[must_use]
    pub fn from_config(config: &GcConfig, metrics_expose: bool) -> Self {
        Self {
            logging: LoggingConfig::from_settings(Some(&config.logging)),
            metrics: MetricsConfig::from_settings(Some(&config.metrics)),
            metrics_expose,
        }
    }
}

/// Handle for observability runtime components.
#[derive(Debug)]
pub struct ObservabilityHandle {
    metrics_handle: Option<MetricsHandle>,
}

impl ObservabilityHandle {
    /// Returns the metrics handle, if metrics are enabled.
    #[must_use]
    pub const fn metrics(&self) -> Option<&MetricsHandle> {
        self.metrics_handle.as_ref()
    }
}

static OBSERVABILITY_INIT: OnceLock<()> = OnceLock::new();

/// Initializes logging and metrics for the process.
///
/// # Errors
///
/// Returns an error if observability has already been initialized or if any
/// component fails to initialize.
pub fn init(config: ObservabilityConfig) -> Result<ObservabilityHandle> {
    if OBSERVABILITY_INIT.get().is_some() {
        return Err(Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: "observability already initialized".to_string(),
        });
    }

    let metrics_handle = metrics::install_prometheus(&config.metrics, config.metrics_expose)?;

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_target(true)
                        .with_thread_names(true),
                )
                .with(config.logging.filter)
                .try_init()
                .map_err(init_error)?;
        },
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_thread_names(true),
                )
                .with(config.logging.filter)
                .try_init()
                .map_err(init_error)?;
        },
    }

    OBSERVABILITY_INIT
        .set(())
        .map_err(|()| Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: "failed to mark observability initialized".to_string(),
        })?;

    Ok(ObservabilityHandle { metrics_handle })
}

/// Helper to convert init errors.
#[allow(clippy::needless_pass_by_value)]
fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::OperationFailed {
        operation: "observability_init".to_string(),
        cause: e.to_string(),
    }
}
