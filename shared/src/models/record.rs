//! The signal-agnostic telemetry record.

use super::{Attributes, AttributeValue, LogRecord, MetricRecord, Resource, Scope, SpanRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// The three OTLP signal types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Metric data points.
    Metrics,
    /// Log records.
    Logs,
    /// Spans.
    Traces,
}

impl Signal {
    /// All signals in export order.
    pub const ALL: [Signal; 3] = [Signal::Metrics, Signal::Logs, Signal::Traces];

    /// OTLP/HTTP path for this signal.
    #[must_use]
    pub fn http_path(self) -> &'static str {
        match self {
            Self::Metrics => "/v1/metrics",
            Self::Logs => "/v1/logs",
            Self::Traces => "/v1/traces",
        }
    }

    /// Index into per-signal arrays.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Metrics => 0,
            Self::Logs => 1,
            Self::Traces => 2,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metrics => write!(f, "metrics"),
            Self::Logs => write!(f, "logs"),
            Self::Traces => write!(f, "traces"),
        }
    }
}

/// Signal-specific payload of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBody {
    /// A metric data point.
    Metric(MetricRecord),
    /// A log record.
    Log(LogRecord),
    /// A span.
    Span(SpanRecord),
}

impl RecordBody {
    /// The signal this body belongs to.
    #[must_use]
    pub fn signal(&self) -> Signal {
        match self {
            Self::Metric(_) => Signal::Metrics,
            Self::Log(_) => Signal::Logs,
            Self::Span(_) => Signal::Traces,
        }
    }
}

/// One unit of telemetry flowing through the pipeline.
///
/// The timestamp and body (and therefore the signal) are fixed at
/// construction. Attributes can only grow.
#[derive(Debug, Clone)]
pub struct TelemetryRecord {
    timestamp_unix_nano: u64,
    attributes: Attributes,
    resource: Arc<Resource>,
    scope: Arc<Scope>,
    body: RecordBody,
}

impl TelemetryRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(
        timestamp_unix_nano: u64,
        body: RecordBody,
        attributes: Attributes,
        resource: Arc<Resource>,
        scope: Arc<Scope>,
    ) -> Self {
        Self {
            timestamp_unix_nano,
            attributes,
            resource,
            scope,
            body,
        }
    }

    /// Creates a metric record stamped with the current time.
    #[must_use]
    pub fn metric_now(
        metric: MetricRecord,
        attributes: Attributes,
        resource: Arc<Resource>,
        scope: Arc<Scope>,
    ) -> Self {
        Self::new(
            now_unix_nano(),
            RecordBody::Metric(metric),
            attributes,
            resource,
            scope,
        )
    }

    /// Record timestamp in nanoseconds since the Unix epoch.
    ///
    /// Metric points use the point time, logs the event time, spans the start time.
    #[must_use]
    pub fn timestamp_unix_nano(&self) -> u64 {
        self.timestamp_unix_nano
    }

    /// The record's signal.
    #[must_use]
    pub fn signal(&self) -> Signal {
        self.body.signal()
    }

    /// The signal-specific payload.
    #[must_use]
    pub fn body(&self) -> &RecordBody {
        &self.body
    }

    /// Record attributes.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Adds an attribute unless the key is already present.
    pub fn insert_attribute_if_absent(
        &mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> bool {
        self.attributes.insert_if_absent(key, value)
    }

    /// Adds every attribute of `other` whose key is missing. Returns how many were added.
    pub fn merge_attributes(&mut self, other: &Attributes) -> usize {
        self.attributes.merge_missing(other)
    }

    /// The resource that produced this record.
    #[must_use]
    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    /// The instrumentation scope of this record.
    #[must_use]
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    /// Returns the metric point, if this is a metric record.
    #[must_use]
    pub fn as_metric(&self) -> Option<&MetricRecord> {
        match &self.body {
            RecordBody::Metric(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the log, if this is a log record.
    #[must_use]
    pub fn as_log(&self) -> Option<&LogRecord> {
        match &self.body {
            RecordBody::Log(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the span, if this is a span record.
    #[must_use]
    pub fn as_span(&self) -> Option<&SpanRecord> {
        match &self.body {
            RecordBody::Span(s) => Some(s),
            _ => None,
        }
    }
}

/// Current wall-clock time in nanoseconds since the Unix epoch.
#[must_use]
pub fn now_unix_nano() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}
