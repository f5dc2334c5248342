//! Data models for the Beacon pipeline.
//!
//! Every receiver decodes into [`TelemetryRecord`], so the pipeline above the
//! receivers never branches on wire formats.

pub mod attributes;
pub mod batch;
pub mod log;
pub mod metric;
pub mod record;
pub mod resource;
pub mod trace;

pub use attributes::{AttributeValue, Attributes};
pub use batch::{Batch, ExporterSet};
pub use log::LogRecord;
pub use metric::{
    ExponentialBuckets, ExponentialHistogramPoint, HistogramPoint, MetricKind, MetricRecord,
    PointValue, Quantile, SummaryPoint, Temporality,
};
pub use record::{now_unix_nano, RecordBody, Signal, TelemetryRecord};
pub use resource::{Resource, Scope, SERVICE_NAME};
pub use trace::{SpanEvent, SpanKind, SpanLink, SpanRecord, SpanStatus, StatusCode};
