//! Structured logging.

use crate::config::LoggingSettings;
use tracing_subscriber::EnvFilter;

/// Default filter directive when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
}

impl LoggingConfig {
    /// Builds logging configuration from settings.
    ///
    /// `RUST_LOG` takes precedence over the configured filter, and
    /// `MAPPING_GC_LOG_FORMAT` over the configured format.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>) -> Self {
        let format = std::env::var("MAPPING_GC_LOG_FORMAT")
            .ok()
            .or_else(|| settings.and_then(|s| s.format.clone()))
            .map_or_else(LogFormat::default, |f| LogFormat::parse(&f));

        let directive = settings
            .and_then(|s| s.filter.clone())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&directive))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

        Self { format, filter }
    }
}
