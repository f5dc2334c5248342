//! OTLP/HTTP receiver endpoints.
//!
//! Accepts protobuf (`application/x-protobuf`, the default when no content
//! type is sent) and JSON (`application/json`) bodies and answers in the
//! request's encoding. Gzip request bodies are decompressed transparently.
//!
//! # Endpoints
//!
//! - `POST /v1/metrics` - Ingest OTLP metrics
//! - `POST /v1/logs` - Ingest OTLP logs
//! - `POST /v1/traces` - Ingest OTLP traces

use crate::pipeline::IngressError;
use crate::state::{AppState, Rejections};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use prost::Message;
use shared::otlp::proto::collector::{
    logs::v1::{ExportLogsPartialSuccess, ExportLogsServiceRequest, ExportLogsServiceResponse},
    metrics::v1::{
        ExportMetricsPartialSuccess, ExportMetricsServiceRequest, ExportMetricsServiceResponse,
    },
    trace::v1::{ExportTracePartialSuccess, ExportTraceServiceRequest, ExportTraceServiceResponse},
};
use shared::otlp::{decode_logs, decode_metrics, decode_traces};
use thiserror::Error;
use tower_http::decompression::RequestDecompressionLayer;

/// Content type for protobuf requests.
const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";

/// Content type for JSON requests.
const CONTENT_TYPE_JSON: &str = "application/json";

/// Errors returned by the OTLP/HTTP endpoints.
#[derive(Debug, Error)]
pub enum OtlpError {
    /// The content type is neither protobuf nor JSON.
    #[error("unsupported content type `{0}`")]
    UnsupportedMediaType(String),

    /// The protobuf body could not be decoded.
    #[error("malformed protobuf payload: {0}")]
    ProtoDecode(#[from] prost::DecodeError),

    /// The JSON body could not be decoded.
    #[error("malformed JSON payload: {0}")]
    JsonDecode(#[source] serde_json::Error),

    /// The response could not be encoded.
    #[error("failed to encode response: {0}")]
    JsonEncode(#[source] serde_json::Error),

    /// The records could not be enqueued.
    #[error(transparent)]
    Ingress(#[from] IngressError),
}

impl IntoResponse for OtlpError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::ProtoDecode(_) | Self::JsonDecode(_) => StatusCode::BAD_REQUEST,
            Self::JsonEncode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Ingress(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let mut response = (status, self.to_string()).into_response();
        if let Self::Ingress(e) = &self {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(e.retry_after_secs()),
            );
        }
        response
    }
}

/// Body encoding of a request and its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentType {
    Protobuf,
    Json,
}

impl ContentType {
    fn from_headers(headers: &HeaderMap) -> Result<Self, OtlpError> {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(CONTENT_TYPE_PROTOBUF);

        if content_type.starts_with(CONTENT_TYPE_PROTOBUF) {
            Ok(Self::Protobuf)
        } else if content_type.starts_with(CONTENT_TYPE_JSON) {
            Ok(Self::Json)
        } else {
            Err(OtlpError::UnsupportedMediaType(content_type.to_string()))
        }
    }

    fn header_value(self) -> &'static str {
        match self {
            Self::Protobuf => CONTENT_TYPE_PROTOBUF,
            Self::Json => CONTENT_TYPE_JSON,
        }
    }
}

/// Creates the OTLP routes with a request body limit in bytes.
pub fn otlp_routes(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/v1/metrics", post(ingest_metrics))
        .route("/v1/logs", post(ingest_logs))
        .route("/v1/traces", post(ingest_traces))
        .layer(RequestDecompressionLayer::new())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Handle POST /v1/metrics
#[tracing::instrument(skip(state, headers, body), fields(signal = "metrics"))]
async fn ingest_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, OtlpError> {
    let content_type = ContentType::from_headers(&headers)?;
    let request = decode_request::<ExportMetricsServiceRequest>(content_type, &body)?;

    let rejections = state
        .accept(decode_metrics(&request, state.resource()))
        .await?;

    let response = ExportMetricsServiceResponse {
        partial_success: build_partial_success::<ExportMetricsPartialSuccess>(rejections),
    };
    encode_response(content_type, &response)
}

/// Handle POST /v1/logs
#[tracing::instrument(skip(state, headers, body), fields(signal = "logs"))]
async fn ingest_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, OtlpError> {
    let content_type = ContentType::from_headers(&headers)?;
    let request = decode_request::<ExportLogsServiceRequest>(content_type, &body)?;

    let rejections = state.accept(decode_logs(&request, state.resource())).await?;

    let response = ExportLogsServiceResponse {
        partial_success: build_partial_success::<ExportLogsPartialSuccess>(rejections),
    };
    encode_response(content_type, &response)
}

/// Handle POST /v1/traces
#[tracing::instrument(skip(state, headers, body), fields(signal = "traces"))]
async fn ingest_traces(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, OtlpError> {
    let content_type = ContentType::from_headers(&headers)?;
    let request = decode_request::<ExportTraceServiceRequest>(content_type, &body)?;

    let rejections = state
        .accept(decode_traces(&request, state.resource()))
        .await?;

    let response = ExportTraceServiceResponse {
        partial_success: build_partial_success::<ExportTracePartialSuccess>(rejections),
    };
    encode_response(content_type, &response)
}

/// The three OTLP partial success messages differ only in the name of the
/// rejected counter.
pub(crate) trait PartialSuccessBuilder: Default {
    fn with_rejected_count(count: i64) -> Self;
    fn with_error_message(self, message: String) -> Self;
}

impl PartialSuccessBuilder for ExportMetricsPartialSuccess {
    fn with_rejected_count(count: i64) -> Self {
        Self {
            rejected_data_points: count,
            error_message: String::new(),
        }
    }
    fn with_error_message(mut self, message: String) -> Self {
        self.error_message = message;
        self
    }
}

impl PartialSuccessBuilder for ExportLogsPartialSuccess {
    fn with_rejected_count(count: i64) -> Self {
        Self {
            rejected_log_records: count,
            error_message: String::new(),
        }
    }
    fn with_error_message(mut self, message: String) -> Self {
        self.error_message = message;
        self
    }
}

impl PartialSuccessBuilder for ExportTracePartialSuccess {
    fn with_rejected_count(count: i64) -> Self {
        Self {
            rejected_spans: count,
            error_message: String::new(),
        }
    }
    fn with_error_message(mut self, message: String) -> Self {
        self.error_message = message;
        self
    }
}

/// Builds `partial_success`, which is only set when something was rejected.
pub(crate) fn build_partial_success<T: PartialSuccessBuilder>(
    rejections: Rejections,
) -> Option<T> {
    if rejections.count == 0 && rejections.message.is_none() {
        return None;
    }
    let partial = T::with_rejected_count(rejections.count);
    Some(match rejections.message {
        Some(message) => partial.with_error_message(message),
        None => partial,
    })
}

fn decode_request<T>(content_type: ContentType, body: &[u8]) -> Result<T, OtlpError>
where
    T: Message + Default + serde::de::DeserializeOwned,
{
    match content_type {
        ContentType::Protobuf => Ok(T::decode(body)?),
        ContentType::Json => serde_json::from_slice(body).map_err(OtlpError::JsonDecode),
    }
}

fn encode_response<T>(content_type: ContentType, response: &T) -> Result<Response, OtlpError>
where
    T: Message + serde::Serialize,
{
    let body = match content_type {
        ContentType::Protobuf => response.encode_to_vec(),
        ContentType::Json => serde_json::to_vec(response).map_err(OtlpError::JsonEncode)?,
    };
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type.header_value())],
        body,
    )
        .into_response())
}
