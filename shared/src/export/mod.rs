//! Export sinks.
//!
//! A sink takes one per-signal [`ExportRequest`] and delivers it to a backend.
//! The concrete sinks are:
//!
//! - [`GrpcSink`] - OTLP over gRPC via tonic
//! - [`HttpSink`] - OTLP over HTTP via reqwest, protobuf or JSON bodies
//! - [`DebugSink`] - logs a summary of each request through `tracing`
//!
//! [`Sink`] wraps them in a closed enum built from configuration, and
//! [`retry::deliver_with_retry`] applies the per-exporter retry policy.

pub mod debug;
pub mod grpc;
pub mod http;
pub mod retry;
pub mod sink;

pub use debug::DebugSink;
pub use grpc::GrpcSink;
pub use http::HttpSink;
pub use retry::{deliver_with_retry, Delivery, ExponentialBackoff, RetryPolicy};
pub use sink::Sink;

use crate::otlp::ExportRequest;
use std::future::Future;
use thiserror::Error;

/// A failed delivery, classified by whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// Transient failure: backpressure, timeout or unavailable backend.
    #[error("retryable export failure: {0}")]
    Retryable(String),

    /// The backend refused the data; retrying would fail the same way.
    #[error("permanent export failure: {0}")]
    Permanent(String),
}

impl ExportError {
    /// Returns true for [`ExportError::Retryable`].
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Classifies a non-success HTTP status code.
    ///
    /// 429, 502, 503 and 504 are retryable; everything else is permanent.
    #[must_use]
    pub fn from_http_status(status: u16, detail: &str) -> Self {
        let message = if detail.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {detail}")
        };
        match status {
            429 | 502 | 503 | 504 => Self::Retryable(message),
            _ => Self::Permanent(message),
        }
    }

    /// Classifies a gRPC status.
    #[must_use]
    pub fn from_grpc_status(status: &tonic::Status) -> Self {
        use tonic::Code;

        let message = format!("gRPC {:?}: {}", status.code(), status.message());
        match status.code() {
            Code::Unavailable
            | Code::DeadlineExceeded
            | Code::ResourceExhausted
            | Code::Aborted
            | Code::Cancelled
            | Code::OutOfRange
            | Code::DataLoss => Self::Retryable(message),
            _ => Self::Permanent(message),
        }
    }
}

/// A successful delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportAck {
    /// Items the backend reported as rejected in a partial success.
    pub rejected: i64,
    /// The backend's partial success message, if any.
    pub message: Option<String>,
}

impl ExportAck {
    /// An acknowledgment with no rejections.
    #[must_use]
    pub fn full() -> Self {
        Self::default()
    }

    /// Returns true if the backend rejected part of the request.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.rejected > 0
    }
}

/// Outcome of one delivery attempt.
pub type ExportResult = Result<ExportAck, ExportError>;

/// A destination for export requests.
///
/// Implementations must be cheap to share: the router keeps each sink in an
/// `Arc` and calls it from concurrent tasks.
pub trait Exporter: Send + Sync + 'static {
    /// Name used in logs and stats.
    fn name(&self) -> &str;

    /// Delivers one request. Called once per attempt.
    fn export(&self, request: &ExportRequest) -> impl Future<Output = ExportResult> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        for status in [429, 502, 503, 504] {
            assert!(ExportError::from_http_status(status, "").is_retryable());
        }
        for status in [400, 401, 404, 413, 500] {
            assert!(!ExportError::from_http_status(status, "").is_retryable());
        }
    }

    #[test]
    fn test_grpc_status_classification() {
        assert!(ExportError::from_grpc_status(&tonic::Status::unavailable("down")).is_retryable());
        assert!(
            ExportError::from_grpc_status(&tonic::Status::resource_exhausted("full"))
                .is_retryable()
        );
        assert!(
            !ExportError::from_grpc_status(&tonic::Status::invalid_argument("bad"))
                .is_retryable()
        );
        assert!(
            !ExportError::from_grpc_status(&tonic::Status::permission_denied("no"))
                .is_retryable()
        );
    }

    #[test]
    fn test_error_message_includes_detail() {
        let err = ExportError::from_http_status(503, "overloaded");
        assert_eq!(err.to_string(), "retryable export failure: HTTP 503: overloaded");
    }
}
