//! OTLP/HTTP sink.

use super::{ExportAck, ExportError, ExportResult, Exporter};
use crate::config::{ConfigError, ExporterConfig, HttpEncoding};
use crate::otlp::proto::collector::{
    logs::v1::ExportLogsServiceResponse, metrics::v1::ExportMetricsServiceResponse,
    trace::v1::ExportTraceServiceResponse,
};
use crate::otlp::ExportRequest;
use prost::Message;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};

/// Longest response body echoed into error messages.
const MAX_ERROR_DETAIL: usize = 256;

/// Posts export requests to OTLP/HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpSink {
    name: String,
    client: reqwest::Client,
    endpoints: [Option<String>; 3],
    encoding: HttpEncoding,
}

impl HttpSink {
    /// Builds a sink from exporter configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a header is malformed or the client cannot be built.
    pub fn from_config(config: &ExporterConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let field = format!("exporters.{}.headers.{key}", config.name);
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ConfigError::invalid(&field, e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ConfigError::invalid(&field, e.to_string()))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::invalid(format!("exporters.{}", config.name), e.to_string()))?;

        let mut endpoints: [Option<String>; 3] = [None, None, None];
        for signal in &config.signals {
            endpoints[signal.index()] = config.endpoint_for(*signal);
        }

        Ok(Self {
            name: config.name.clone(),
            client,
            endpoints,
            encoding: config.encoding,
        })
    }

    fn encode_body(&self, request: &ExportRequest) -> Result<Vec<u8>, ExportError> {
        match self.encoding {
            HttpEncoding::Protobuf => Ok(request.encode_to_vec()),
            HttpEncoding::Json => request
                .to_json()
                .map_err(|e| ExportError::Permanent(format!("JSON encoding failed: {e}"))),
        }
    }

    /// Reads a partial success from a 2xx response body, if the backend sent one.
    fn decode_ack(&self, request: &ExportRequest, body: &[u8]) -> ExportAck {
        if body.is_empty() {
            return ExportAck::full();
        }
        let partial = match (self.encoding, request) {
            (HttpEncoding::Protobuf, ExportRequest::Metrics(_)) => {
                ExportMetricsServiceResponse::decode(body)
                    .ok()
                    .and_then(|r| r.partial_success)
                    .map(|p| (p.rejected_data_points, p.error_message))
            }
            (HttpEncoding::Protobuf, ExportRequest::Logs(_)) => {
                ExportLogsServiceResponse::decode(body)
                    .ok()
                    .and_then(|r| r.partial_success)
                    .map(|p| (p.rejected_log_records, p.error_message))
            }
            (HttpEncoding::Protobuf, ExportRequest::Traces(_)) => {
                ExportTraceServiceResponse::decode(body)
                    .ok()
                    .and_then(|r| r.partial_success)
                    .map(|p| (p.rejected_spans, p.error_message))
            }
            (HttpEncoding::Json, _) => json_partial_success(body),
        };

        match partial {
            Some((rejected, message)) => ExportAck {
                rejected,
                message: (!message.is_empty()).then_some(message),
            },
            None => ExportAck::full(),
        }
    }
}

/// Extracts `partialSuccess` from an OTLP/JSON response.
fn json_partial_success(body: &[u8]) -> Option<(i64, String)> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let partial = value.get("partialSuccess")?;
    let rejected = ["rejectedDataPoints", "rejectedLogRecords", "rejectedSpans"]
        .iter()
        .find_map(|key| {
            let field = partial.get(*key)?;
            field
                .as_i64()
                .or_else(|| field.as_str().and_then(|s| s.parse().ok()))
        })
        .unwrap_or(0);
    let message = partial
        .get("errorMessage")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some((rejected, message))
}

fn truncate(detail: &str) -> &str {
    match detail.char_indices().nth(MAX_ERROR_DETAIL) {
        Some((end, _)) => &detail[..end],
        None => detail,
    }
}

impl Exporter for HttpSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn export(&self, request: &ExportRequest) -> ExportResult {
        let signal = request.signal();
        let url = self.endpoints[signal.index()]
            .as_deref()
            .ok_or_else(|| ExportError::Permanent(format!("{signal} are not routed to this sink")))?;
        let body = self.encode_body(request)?;

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, self.encoding.content_type())
            .body(body)
            .send()
            .await
            .map_err(|e| ExportError::Retryable(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExportError::Retryable(format!("reading response from {url} failed: {e}")))?;

        if status.is_success() {
            Ok(self.decode_ack(request, &bytes))
        } else {
            let detail = String::from_utf8_lossy(&bytes);
            Err(ExportError::from_http_status(status.as_u16(), truncate(detail.trim())))
        }
    }
}
