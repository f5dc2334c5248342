//! OTLP/gRPC sink.

use super::{ExportAck, ExportError, ExportResult, Exporter};
use crate::config::{ConfigError, ExporterConfig};
use crate::models::Signal;
use crate::otlp::proto::collector::{
    logs::v1::logs_service_client::LogsServiceClient,
    metrics::v1::metrics_service_client::MetricsServiceClient,
    trace::v1::trace_service_client::TraceServiceClient,
};
use crate::otlp::ExportRequest;
use std::time::Duration;
use tonic::metadata::{AsciiMetadataValue, MetadataKey, MetadataMap};
use tonic::transport::{Channel, Endpoint};

/// Sends export requests to an OTLP/gRPC endpoint.
///
/// Channels connect lazily, so building the sink never blocks on the
/// backend. One channel is kept per routed signal.
#[derive(Debug, Clone)]
pub struct GrpcSink {
    name: String,
    channels: [Option<Channel>; 3],
    metadata: MetadataMap,
}

impl GrpcSink {
    /// Builds a sink from exporter configuration.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint or header is malformed.
    pub fn from_config(config: &ExporterConfig) -> Result<Self, ConfigError> {
        let mut channels: [Option<Channel>; 3] = [None, None, None];
        for signal in &config.signals {
            let field = format!("exporters.{}.{signal}_endpoint", config.name);
            let url = config
                .endpoint_for(*signal)
                .ok_or_else(|| ConfigError::invalid(&field, "no endpoint configured"))?;
            channels[signal.index()] = Some(connect_lazy(&url, config.timeout()).map_err(
                |e| ConfigError::invalid(&field, format!("invalid endpoint `{url}`: {e}")),
            )?);
        }

        let mut metadata = MetadataMap::new();
        for (key, value) in &config.headers {
            let field = format!("exporters.{}.headers.{key}", config.name);
            let key = MetadataKey::from_bytes(key.to_ascii_lowercase().as_bytes())
                .map_err(|e| ConfigError::invalid(&field, e.to_string()))?;
            let value = AsciiMetadataValue::try_from(value.as_str())
                .map_err(|e| ConfigError::invalid(&field, e.to_string()))?;
            metadata.insert(key, value);
        }

        Ok(Self {
            name: config.name.clone(),
            channels,
            metadata,
        })
    }

    fn channel(&self, signal: Signal) -> Result<Channel, ExportError> {
        self.channels[signal.index()]
            .clone()
            .ok_or_else(|| ExportError::Permanent(format!("{signal} are not routed to this sink")))
    }

    fn request<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        *request.metadata_mut() = self.metadata.clone();
        request
    }
}

fn connect_lazy(url: &str, timeout: Duration) -> Result<Channel, tonic::transport::Error> {
    Ok(Endpoint::from_shared(url.to_string())?
        .connect_timeout(timeout)
        .timeout(timeout)
        .connect_lazy())
}

/// Builds an acknowledgment from a partial success block.
fn ack(rejected: i64, error_message: String) -> ExportAck {
    ExportAck {
        rejected,
        message: (!error_message.is_empty()).then_some(error_message),
    }
}

impl Exporter for GrpcSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn export(&self, request: &ExportRequest) -> ExportResult {
        let channel = self.channel(request.signal())?;

        match request {
            ExportRequest::Metrics(req) => {
                let response = MetricsServiceClient::new(channel)
                    .export(self.request(req.clone()))
                    .await
                    .map_err(|status| ExportError::from_grpc_status(&status))?
                    .into_inner();
                Ok(response.partial_success.map_or_else(ExportAck::full, |p| {
                    ack(p.rejected_data_points, p.error_message)
                }))
            }
            ExportRequest::Logs(req) => {
                let response = LogsServiceClient::new(channel)
                    .export(self.request(req.clone()))
                    .await
                    .map_err(|status| ExportError::from_grpc_status(&status))?
                    .into_inner();
                Ok(response.partial_success.map_or_else(ExportAck::full, |p| {
                    ack(p.rejected_log_records, p.error_message)
                }))
            }
            ExportRequest::Traces(req) => {
                let response = TraceServiceClient::new(channel)
                    .export(self.request(req.clone()))
                    .await
                    .map_err(|status| ExportError::from_grpc_status(&status))?
                    .into_inner();
                Ok(response.partial_success.map_or_else(ExportAck::full, |p| {
                    ack(p.rejected_spans, p.error_message)
                }))
            }
        }
    }
}
