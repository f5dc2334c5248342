//! OpenTelemetry Protocol (OTLP) support.
//!
//! This module converts between OTLP protobuf types and the internal record
//! model, in both directions:
//!
//! - [`conversions`] decodes export requests into [`TelemetryRecord`]s
//! - [`encode`] regroups records into export requests for sinks
//!
//! The generated message and service types come from `opentelemetry-proto`
//! and are re-exported as [`proto`], laid out by package
//! (`proto::collector::metrics::v1`, `proto::common::v1`, ...).
//!
//! [`TelemetryRecord`]: crate::models::TelemetryRecord

pub mod conversions;
pub mod encode;

#[cfg(test)]
mod conversions_test;

pub use conversions::{decode_logs, decode_metrics, decode_traces, Decoded};
pub use encode::{encode_records, ExportRequest};

/// Generated OTLP protobuf types and gRPC services.
pub use opentelemetry_proto::tonic as proto;
