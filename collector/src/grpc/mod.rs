//! OTLP gRPC receiver services.
//!
//! Implements the OpenTelemetry Protocol collector services and works with
//! standard OpenTelemetry SDK exporters.
//!
//! # Services
//!
//! - `MetricsService` - Receives metrics via gRPC
//! - `LogsService` - Receives logs via gRPC
//! - `TraceService` - Receives traces via gRPC
//!
//! A request body that is not valid protobuf is answered with
//! `InvalidArgument`.

mod server;
mod services;

pub use server::{ExportServer, ExportService, OtlpCodec};
pub use services::{LogsServiceImpl, MetricsServiceImpl, TracesServiceImpl};
