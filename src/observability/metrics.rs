//! Prometheus metrics.

use crate::config::MetricsSettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,
    /// Address to bind the metrics exporter.
    pub listen_addr: SocketAddr,
}

impl MetricsConfig {
    /// Builds metrics configuration from config settings with env overrides.
    #[must_use]
    pub fn from_settings(settings: Option<&MetricsSettings>) -> Self {
        let enabled = settings.and_then(|config| config.enabled).unwrap_or(false);
        let port = settings.and_then(|config| config.port).unwrap_or(9090);

        let mut config = Self {
            enabled,
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        };

        if let Some(enabled) = parse_bool_env("MAPPING_GC_METRICS_ENABLED") {
            config.enabled = enabled;
        }
        if let Some(port) = std::env::var("MAPPING_GC_METRICS_PORT")
            .ok()
            .and_then(|p| p.trim().parse::<u16>().ok())
        {
            config.listen_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        }

        config
    }
}

/// Handle to the installed recorder.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    prometheus: PrometheusHandle,
}

impl MetricsHandle {
    /// Renders the current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.prometheus.render()
    }
}

/// Installs the Prometheus recorder, with an HTTP listener when `expose` is set.
///
/// The listener is spawned on the current tokio runtime, so `expose` requires
/// being called from within one.
///
/// # Errors
///
/// Returns an error if a recorder is already installed or the listener
/// cannot be bound.
pub fn install_prometheus(config: &MetricsConfig, expose: bool) -> Result<Option<MetricsHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    let builder = PrometheusBuilder::new();
    let prometheus = if expose {
        let (recorder, exporter) = builder
            .with_http_listener(config.listen_addr)
            .build()
            .map_err(|e| Error::OperationFailed {
                operation: "metrics_listener_build".to_string(),
                cause: e.to_string(),
            })?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder).map_err(|e| Error::OperationFailed {
            operation: "metrics_recorder_install".to_string(),
            cause: e.to_string(),
        })?;
        tokio::spawn(async move {
            if let Err(e) = exporter.await {
                tracing::warn!(error = ?e, "Metrics exporter stopped");
            }
        });
        handle
    } else {
        builder
            .install_recorder()
            .map_err(|e| Error::OperationFailed {
                operation: "metrics_recorder_install".to_string(),
                cause: e.to_string(),
            })?
    };

    Ok(Some(MetricsHandle { prometheus }))
}

fn parse_bool_env(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|value| match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}
