//! The closed set of configurable sinks.

use super::{DebugSink, ExportResult, Exporter, GrpcSink, HttpSink};
use crate::config::{ConfigError, ExporterConfig, ExporterKind};
use crate::otlp::ExportRequest;

/// A sink built from an `[[exporters]]` entry.
#[derive(Debug)]
pub enum Sink {
    /// OTLP/gRPC.
    Grpc(GrpcSink),
    /// OTLP/HTTP.
    Http(HttpSink),
    /// Logging only.
    Debug(DebugSink),
}

impl Sink {
    /// Builds the sink for one exporter entry.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry's endpoints or headers are malformed.
    pub fn from_config(config: &ExporterConfig) -> Result<Self, ConfigError> {
        Ok(match config.kind {
            ExporterKind::OtlpGrpc => Self::Grpc(GrpcSink::from_config(config)?),
            ExporterKind::OtlpHttp => Self::Http(HttpSink::from_config(config)?),
            ExporterKind::Debug => Self::Debug(DebugSink::new(&config.name)),
        })
    }
}

impl Exporter for Sink {
    fn name(&self) -> &str {
        match self {
            Self::Grpc(sink) => sink.name(),
            Self::Http(sink) => sink.name(),
            Self::Debug(sink) => sink.name(),
        }
    }

    async fn export(&self, request: &ExportRequest) -> ExportResult {
        match self {
            Self::Grpc(sink) => sink.export(request).await,
            Self::Http(sink) => sink.export(request).await,
            Self::Debug(sink) => sink.export(request).await,
        }
    }
}
