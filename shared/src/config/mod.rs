//! Pipeline configuration.
//!
//! The configuration is a TOML file read once at startup. Every section is
//! optional and falls back to defaults, except `[[exporters]]`: at least one
//! exporter must be configured.
//!
//! ```toml
//! [receivers.otlp_grpc]
//! endpoint = "0.0.0.0:4317"
//!
//! [processors.batch]
//! send_batch_size = 8192
//! timeout_ms = 5000
//!
//! [[exporters]]
//! name = "upstream"
//! kind = "otlp_http"
//! endpoint = "http://collector:4318"
//! ```

pub mod exporters;
pub mod processors;
pub mod receivers;

pub use exporters::{ExporterConfig, ExporterKind, HttpEncoding, RetryConfig};
pub use processors::{
    BatchConfig, DetectorKind, ProcessorsConfig, ResourceConfig, ResourceDetectionConfig,
};
pub use receivers::{
    GrpcReceiverConfig, HostMetricsConfig, HttpReceiverConfig, ReceiversConfig, ScraperKind,
};

use crate::models::{ExporterSet, Signal};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

/// Default health listener port.
pub const DEFAULT_HEALTH_PORT: u16 = 13133;

/// Default ingress queue capacity, in enqueue units (one per request or tick).
pub const DEFAULT_INGRESS_CAPACITY: usize = 1024;

/// Default bound on a receiver's enqueue wait in milliseconds.
pub const DEFAULT_ENQUEUE_TIMEOUT_MS: u64 = 1_000;

/// Default export queue capacity, in batches.
pub const DEFAULT_EXPORT_QUEUE_CAPACITY: usize = 16;

/// Default number of export workers.
pub const DEFAULT_EXPORT_WORKERS: usize = 1;

/// Default bound on draining in-flight receiver requests at shutdown.
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 5_000;

/// Default bound on the final export at shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field failed a range or format check.
    #[error("invalid config in `{section}`: {source}")]
    Validation {
        /// Section holding the field, e.g. `processors.batch`.
        section: String,
        /// Field-level errors.
        #[source]
        source: validator::ValidationErrors,
    },

    /// A cross-field rule was violated.
    #[error("invalid config field `{field}`: {message}")]
    Invalid {
        /// Dotted path of the field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Queueing, concurrency and shutdown settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    /// Ingress queue capacity in enqueue units.
    #[validate(range(min = 1, max = 1_000_000, message = "must be between 1 and 1000000"))]
    pub ingress_capacity: usize,
    /// Bound on a receiver's enqueue wait in milliseconds.
    #[validate(range(min = 1, max = 60_000, message = "must be between 1 and 60000 ms"))]
    pub enqueue_timeout_ms: u64,
    /// Export queue capacity in batches.
    #[validate(range(min = 1, max = 10_000, message = "must be between 1 and 10000"))]
    pub export_queue_capacity: usize,
    /// Concurrent export workers. With one worker, batches reach each sink
    /// in creation order.
    #[validate(range(min = 1, max = 64, message = "must be between 1 and 64"))]
    pub export_workers: usize,
    /// Bound on draining in-flight receiver requests at shutdown.
    pub drain_timeout_ms: u64,
    /// Bound on delivering the remaining batches at shutdown.
    pub shutdown_timeout_ms: u64,
}

impl PipelineSettings {
    /// Enqueue wait bound.
    #[must_use]
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    /// Receiver drain bound.
    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Final export bound.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            ingress_capacity: DEFAULT_INGRESS_CAPACITY,
            enqueue_timeout_ms: DEFAULT_ENQUEUE_TIMEOUT_MS,
            export_queue_capacity: DEFAULT_EXPORT_QUEUE_CAPACITY,
            export_workers: DEFAULT_EXPORT_WORKERS,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

/// Health and stats listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the listener is started.
    pub enabled: bool,
    /// Bind address.
    pub endpoint: SocketAddr,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HEALTH_PORT)),
        }
    }
}

/// The complete, validated process configuration.
///
/// Loaded once at startup and passed by reference into component
/// constructors; it is never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Receivers.
    pub receivers: ReceiversConfig,
    /// Processors.
    pub processors: ProcessorsConfig,
    /// Exporters, addressed by position.
    pub exporters: Vec<ExporterConfig>,
    /// Queueing and shutdown.
    pub pipeline: PipelineSettings,
    /// Health listener.
    pub health: HealthConfig,
}

impl PipelineConfig {
    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the file or field at fault.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate_config()?;
        Ok(config)
    }

    /// Checks field ranges and cross-field rules.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        let sections: [(&str, Result<(), validator::ValidationErrors>); 6] = [
            ("receivers.otlp_grpc", self.receivers.otlp_grpc.validate()),
            ("receivers.otlp_http", self.receivers.otlp_http.validate()),
            ("receivers.hostmetrics", self.receivers.hostmetrics.validate()),
            ("processors.batch", self.processors.batch.validate()),
            (
                "processors.resource_detection",
                self.processors.resource_detection.validate(),
            ),
            ("pipeline", self.pipeline.validate()),
        ];
        for (section, result) in sections {
            result.map_err(|source| ConfigError::Validation {
                section: section.to_string(),
                source,
            })?;
        }

        if self.exporters.is_empty() {
            return Err(ConfigError::invalid(
                "exporters",
                "at least one exporter is required",
            ));
        }
        if self.exporters.len() > ExporterSet::CAPACITY {
            return Err(ConfigError::invalid(
                "exporters",
                format!("at most {} exporters are supported", ExporterSet::CAPACITY),
            ));
        }

        let mut names = HashSet::new();
        for (index, exporter) in self.exporters.iter().enumerate() {
            let section = format!("exporters[{index}]");
            exporter
                .validate()
                .map_err(|source| ConfigError::Validation {
                    section: section.clone(),
                    source,
                })?;
            exporter
                .retry
                .validate()
                .map_err(|source| ConfigError::Validation {
                    section: format!("{section}.retry"),
                    source,
                })?;
            if exporter.retry.initial_interval_ms > exporter.retry.max_interval_ms {
                return Err(ConfigError::invalid(
                    format!("{section}.retry.initial_interval_ms"),
                    "must not exceed max_interval_ms",
                ));
            }
            if !names.insert(exporter.name.as_str()) {
                return Err(ConfigError::invalid(
                    format!("{section}.name"),
                    format!("duplicate exporter name `{}`", exporter.name),
                ));
            }
            if exporter.kind != ExporterKind::Debug {
                for signal in &exporter.signals {
                    let Some(url) = exporter.endpoint_for(*signal) else {
                        return Err(ConfigError::invalid(
                            format!("{section}.endpoint"),
                            format!("required for {} exporter `{}`", exporter.kind, exporter.name),
                        ));
                    };
                    if !(url.starts_with("http://") || url.starts_with("https://")) {
                        return Err(ConfigError::invalid(
                            format!("{section}.{signal}_endpoint"),
                            format!("`{url}` must start with http:// or https://"),
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Exporters that receive `signal`.
    #[must_use]
    pub fn route(&self, signal: Signal) -> ExporterSet {
        self.exporters
            .iter()
            .enumerate()
            .filter(|(_, e)| e.accepts(signal))
            .map(|(i, _)| i)
            .collect()
    }

    /// Routes for every signal, indexed by [`Signal::index`].
    #[must_use]
    pub fn routes(&self) -> [ExporterSet; 3] {
        Signal::ALL.map(|signal| self.route(signal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [[exporters]]
        name = "stdout"
        kind = "debug"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = PipelineConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.processors.batch.send_batch_size, 8192);
        assert_eq!(config.processors.batch.timeout(), Duration::from_secs(5));
        assert_eq!(config.receivers.otlp_grpc.endpoint.port(), 4317);
        assert_eq!(config.receivers.otlp_http.endpoint.port(), 4318);
        assert_eq!(config.health.endpoint.port(), 13133);
        assert_eq!(config.pipeline.export_workers, 1);
        assert_eq!(config.receivers.hostmetrics.interval(), Duration::from_secs(10));
        assert_eq!(
            config.processors.resource_detection.timeout(),
            Duration::from_secs(2)
        );
        assert_eq!(config.exporters[0].signals, Signal::ALL.to_vec());
    }

    #[test]
    fn test_full_config() {
        let raw = r#"
            [receivers.otlp_grpc]
            endpoint = "127.0.0.1:14317"

            [receivers.otlp_http]
            enabled = false

            [receivers.hostmetrics]
            collection_interval_secs = 30
            scrapers = ["cpu", "memory"]

            [processors.batch]
            send_batch_size = 100
            timeout_ms = 250

            [processors.resource_detection]
            detectors = ["env", "host"]

            [processors.resource]
            attributes = { "deployment.environment" = "staging" }

            [[exporters]]
            name = "prometheus"
            kind = "otlp_http"
            endpoint = "http://prometheus:9090/api/v1/otlp"
            signals = ["metrics"]
            encoding = "json"

            [exporters.retry]
            max_attempts = 3

            [[exporters]]
            name = "tempo"
            kind = "otlp_grpc"
            endpoint = "http://tempo:4317"
            signals = ["traces"]

            [pipeline]
            export_workers = 2
        "#;

        let config = PipelineConfig::from_toml_str(raw).unwrap();

        assert!(!config.receivers.otlp_http.enabled);
        assert_eq!(
            config.receivers.hostmetrics.scrapers,
            vec![ScraperKind::Cpu, ScraperKind::Memory]
        );
        assert_eq!(config.processors.batch.send_batch_size, 100);
        assert_eq!(
            config.processors.resource.attributes.get("deployment.environment"),
            Some(&"staging".to_string())
        );
        assert_eq!(config.exporters[0].encoding, HttpEncoding::Json);
        assert_eq!(config.exporters[0].retry.max_attempts, 3);
        assert_eq!(config.route(Signal::Metrics), ExporterSet::empty().with(0));
        assert_eq!(config.route(Signal::Traces), ExporterSet::empty().with(1));
        assert!(config.route(Signal::Logs).is_empty());
    }

    #[test]
    fn test_missing_exporter_endpoint_names_field() {
        let raw = r#"
            [[exporters]]
            name = "upstream"
            kind = "otlp_grpc"
        "#;

        let err = PipelineConfig::from_toml_str(raw).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "exporters[0].endpoint"));
    }

    #[test]
    fn test_missing_required_field_is_parse_error() {
        let raw = r#"
            [[exporters]]
            kind = "debug"
        "#;

        let err = PipelineConfig::from_toml_str(raw).unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let raw = format!("{MINIMAL}\n[processors.batch]\nsend_batch_size = 0\n");

        let err = PipelineConfig::from_toml_str(&raw).unwrap_err();

        assert!(
            matches!(err, ConfigError::Validation { ref section, .. } if section == "processors.batch")
        );
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let raw = format!("{MINIMAL}\n[processors.batch]\nmax_size = 10\n");
        assert!(PipelineConfig::from_toml_str(&raw).is_err());
    }

    #[test]
    fn test_no_exporters_is_rejected() {
        let err = PipelineConfig::from_toml_str("").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "exporters"));
    }

    #[test]
    fn test_duplicate_exporter_names_are_rejected() {
        let raw = format!("{MINIMAL}\n{MINIMAL}");
        let err = PipelineConfig::from_toml_str(&raw).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_file("/nonexistent/beacon.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = PipelineConfig::from_toml_str(include_str!("../../../beacon.toml")).unwrap();

        assert_eq!(config.exporters.len(), 2);
        assert_eq!(config.processors.batch.send_batch_size, processors::DEFAULT_SEND_BATCH_SIZE);
        assert_eq!(config.route(Signal::Traces).len(), 2);
    }
}
