//! Configuration management.
//!
//! Values come from three layers, later layers winning:
//! 1. built-in defaults
//! 2. a TOML file (`load_from_file`)
//! 3. `MAPPING_GC_*` environment variables (`with_env_overrides`)

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default maintenance window: 04:00-04:59 local time.
pub const DEFAULT_DELETE_WHEN: &str = "04";

/// Default RPC timeout in milliseconds.
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 3_000;

/// Default interval between cleanup cycles (five minutes).
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 300;

/// Default pause after each topic in milliseconds.
pub const DEFAULT_TOPIC_THROTTLE_MS: u64 = 10;

/// Runtime configuration of the cleanup service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcConfig {
    /// Name of this broker.
    pub node_name: String,
    /// Hours of the day (`;`-separated, `00`-`23`) during which cleanup runs.
    pub delete_when: String,
    /// Timeout applied to each remote call.
    pub rpc_timeout: Duration,
    /// Interval between cleanup cycles.
    pub scan_interval: Duration,
    /// Pause after each topic to bound outbound load.
    pub topic_throttle: Duration,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
}

/// Logging section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct LoggingSettings {
    /// Output format: `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive, e.g. `info,mapping_gc=debug`.
    pub filter: Option<String>,
}

/// Metrics section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct MetricsSettings {
    /// Whether the Prometheus recorder is installed.
    pub enabled: Option<bool>,
    /// Port of the Prometheus HTTP listener.
    pub port: Option<u16>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Broker name.
    pub node_name: Option<String>,
    /// Maintenance window hours.
    pub delete_when: Option<String>,
    /// RPC timeout in milliseconds.
    pub rpc_timeout_ms: Option<u64>,
    /// Cycle interval in seconds.
    pub scan_interval_secs: Option<u64>,
    /// Per-topic pause in milliseconds.
    pub topic_throttle_ms: Option<u64>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            node_name: "broker-a".to_string(),
            delete_when: DEFAULT_DELETE_WHEN.to_string(),
            rpc_timeout: Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS),
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            topic_throttle: Duration::from_millis(DEFAULT_TOPIC_THROTTLE_MS),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

impl GcConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from defaults and environment variables.
    ///
    /// Reads:
    /// - `MAPPING_GC_NODE_NAME`: Broker name
    /// - `MAPPING_GC_DELETE_WHEN`: Maintenance window hours
    /// - `MAPPING_GC_RPC_TIMEOUT_MS`: RPC timeout
    /// - `MAPPING_GC_SCAN_INTERVAL_SECS`: Cycle interval
    /// - `MAPPING_GC_TOPIC_THROTTLE_MS`: Per-topic pause
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Loads configuration from a TOML file, then applies env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: e.to_string(),
            })?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file).with_env_overrides())
    }

    /// Converts a `ConfigFile` to `GcConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(node_name) = file.node_name {
            config.node_name = node_name;
        }
        if let Some(delete_when) = file.delete_when {
            config.delete_when = delete_when;
        }
        if let Some(ms) = file.rpc_timeout_ms {
            config.rpc_timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(secs) = file.scan_interval_secs {
            config.scan_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(ms) = file.topic_throttle_ms {
            config.topic_throttle = Duration::from_millis(ms);
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(metrics) = file.metrics {
            config.metrics = metrics;
        }

        config
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup`, keyed by environment variable
    /// name. Blank values leave the current setting in place.
    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str| text(key).and_then(|v| v.parse::<u64>().ok());

        if let Some(v) = text("MAPPING_GC_NODE_NAME") {
            self.node_name = v;
        }
        if let Some(v) = text("MAPPING_GC_DELETE_WHEN") {
            self.delete_when = v;
        }
        if let Some(ms) = number("MAPPING_GC_RPC_TIMEOUT_MS") {
            self.rpc_timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(secs) = number("MAPPING_GC_SCAN_INTERVAL_SECS") {
            self.scan_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(ms) = number("MAPPING_GC_TOPIC_THROTTLE_MS") {
            self.topic_throttle = Duration::from_millis(ms);
        }
        self
    }

    /// Sets the broker name.
    #[must_use]
    pub fn with_node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    /// Sets the maintenance window hours.
    #[must_use]
    pub fn with_delete_when(mut self, delete_when: impl Into<String>) -> Self {
        self.delete_when = delete_when.into();
        self
    }

    /// Sets the RPC timeout.
    #[must_use]
    pub const fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Sets the cycle interval.
    #[must_use]
    pub const fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Sets the per-topic pause.
    #[must_use]
    pub const fn with_topic_throttle(mut self, throttle: Duration) -> Self {
        self.topic_throttle = throttle;
        self
    }
}
