//! Exporter configuration.

use crate::models::Signal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

/// Default per-attempt export timeout in milliseconds.
pub const DEFAULT_EXPORT_TIMEOUT_MS: u64 = 10_000;

/// Default delivery attempts per batch and sink.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first retry in milliseconds.
pub const DEFAULT_INITIAL_INTERVAL_MS: u64 = 500;

/// Default cap on the retry delay in milliseconds.
pub const DEFAULT_MAX_INTERVAL_MS: u64 = 30_000;

/// Sink protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExporterKind {
    /// OTLP over gRPC.
    OtlpGrpc,
    /// OTLP over HTTP.
    OtlpHttp,
    /// Log a summary of each batch.
    Debug,
}

impl std::fmt::Display for ExporterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OtlpGrpc => write!(f, "otlp_grpc"),
            Self::OtlpHttp => write!(f, "otlp_http"),
            Self::Debug => write!(f, "debug"),
        }
    }
}

/// Body encoding for the OTLP/HTTP sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpEncoding {
    /// `application/x-protobuf`.
    #[default]
    Protobuf,
    /// `application/json`.
    Json,
}

impl HttpEncoding {
    /// Content type header value.
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Protobuf => "application/x-protobuf",
            Self::Json => "application/json",
        }
    }
}

/// Retry policy for one exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total delivery attempts, including the first.
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    #[validate(range(min = 1, message = "must be at least 1 ms"))]
    pub initial_interval_ms: u64,
    /// Cap on the retry delay in milliseconds.
    #[validate(range(min = 1, message = "must be at least 1 ms"))]
    pub max_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_interval_ms: DEFAULT_INITIAL_INTERVAL_MS,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
        }
    }
}

/// One configured sink.
///
/// ```toml
/// [[exporters]]
/// name = "tempo"
/// kind = "otlp_grpc"
/// endpoint = "http://tempo:4317"
/// signals = ["traces"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    /// Unique exporter name, used in logs and stats.
    #[validate(length(min = 1, message = "cannot be empty"))]
    pub name: String,
    /// Sink protocol.
    pub kind: ExporterKind,
    /// Base endpoint for all signals.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Full endpoint for metrics, overriding `endpoint`.
    #[serde(default)]
    pub metrics_endpoint: Option<String>,
    /// Full endpoint for logs, overriding `endpoint`.
    #[serde(default)]
    pub logs_endpoint: Option<String>,
    /// Full endpoint for traces, overriding `endpoint`.
    #[serde(default)]
    pub traces_endpoint: Option<String>,
    /// HTTP body encoding.
    #[serde(default)]
    pub encoding: HttpEncoding,
    /// Signals routed to this exporter.
    #[serde(default = "all_signals")]
    #[validate(length(min = 1, message = "at least one signal is required"))]
    pub signals: Vec<Signal>,
    /// Extra request headers (HTTP headers or gRPC metadata).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_export_timeout_ms")]
    #[validate(range(min = 1, max = 600_000, message = "must be between 1 and 600000 ms"))]
    pub timeout_ms: u64,
    /// Retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn all_signals() -> Vec<Signal> {
    Signal::ALL.to_vec()
}

fn default_export_timeout_ms() -> u64 {
    DEFAULT_EXPORT_TIMEOUT_MS
}

impl ExporterConfig {
    /// Creates a debug exporter receiving every signal.
    #[must_use]
    pub fn debug(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ExporterKind::Debug,
            endpoint: None,
            metrics_endpoint: None,
            logs_endpoint: None,
            traces_endpoint: None,
            encoding: HttpEncoding::default(),
            signals: all_signals(),
            headers: BTreeMap::new(),
            timeout_ms: DEFAULT_EXPORT_TIMEOUT_MS,
            retry: RetryConfig::default(),
        }
    }

    /// Returns true if `signal` is routed to this exporter.
    #[must_use]
    pub fn accepts(&self, signal: Signal) -> bool {
        self.signals.contains(&signal)
    }

    /// Per-attempt timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn signal_override(&self, signal: Signal) -> Option<&str> {
        match signal {
            Signal::Metrics => self.metrics_endpoint.as_deref(),
            Signal::Logs => self.logs_endpoint.as_deref(),
            Signal::Traces => self.traces_endpoint.as_deref(),
        }
    }

    /// Resolves the endpoint used for `signal`.
    ///
    /// A per-signal override is used verbatim. Otherwise the base endpoint is
    /// used; for HTTP sinks the signal path (`/v1/traces`, ...) is appended.
    #[must_use]
    pub fn endpoint_for(&self, signal: Signal) -> Option<String> {
        if let Some(url) = self.signal_override(signal) {
            return Some(url.to_string());
        }
        let base = self.endpoint.as_deref()?;
        match self.kind {
            ExporterKind::OtlpHttp => Some(format!(
                "{}{}",
                base.trim_end_matches('/'),
                signal.http_path()
            )),
            ExporterKind::OtlpGrpc | ExporterKind::Debug => Some(base.to_string()),
        }
    }
}
