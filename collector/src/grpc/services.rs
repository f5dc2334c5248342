//! gRPC service implementations for OTLP collectors.

use super::ExportService;
use crate::pipeline::IngressError;
use crate::routes::otlp::build_partial_success;
use crate::state::AppState;
use shared::otlp::proto;
use shared::otlp::{decode_logs, decode_metrics, decode_traces};
use tonic::{Request, Response, Status};

impl From<IngressError> for Status {
    fn from(err: IngressError) -> Self {
        Status::unavailable(err.to_string())
    }
}

/// Implementation of the OTLP `MetricsService` gRPC service.
#[derive(Clone)]
pub struct MetricsServiceImpl {
    state: AppState,
}

impl MetricsServiceImpl {
    /// Creates a new `MetricsServiceImpl` with the given application state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl ExportService for MetricsServiceImpl {
    const NAME: &'static str = proto::collector::metrics::v1::metrics_service_server::SERVICE_NAME;
    type Request = proto::collector::metrics::v1::ExportMetricsServiceRequest;
    type Response = proto::collector::metrics::v1::ExportMetricsServiceResponse;

    #[tracing::instrument(skip(self, request), fields(signal = "metrics"))]
    async fn export(
        &self,
        request: Request<Self::Request>,
    ) -> Result<Response<Self::Response>, Status> {
        let request = request.into_inner();
        let decoded = decode_metrics(&request, self.state.resource());
        let rejections = self.state.accept(decoded).await?;

        Ok(Response::new(
            proto::collector::metrics::v1::ExportMetricsServiceResponse {
                partial_success: build_partial_success(rejections),
            },
        ))
    }
}

/// Implementation of the OTLP `LogsService` gRPC service.
#[derive(Clone)]
pub struct LogsServiceImpl {
    state: AppState,
}

impl LogsServiceImpl {
    /// Creates a new `LogsServiceImpl` with the given application state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl ExportService for LogsServiceImpl {
    const NAME: &'static str = proto::collector::logs::v1::logs_service_server::SERVICE_NAME;
    type Request = proto::collector::logs::v1::ExportLogsServiceRequest;
    type Response = proto::collector::logs::v1::ExportLogsServiceResponse;

    #[tracing::instrument(skip(self, request), fields(signal = "logs"))]
    async fn export(
        &self,
        request: Request<Self::Request>,
    ) -> Result<Response<Self::Response>, Status> {
        let request = request.into_inner();
        let decoded = decode_logs(&request, self.state.resource());
        let rejections = self.state.accept(decoded).await?;

        Ok(Response::new(
            proto::collector::logs::v1::ExportLogsServiceResponse {
                partial_success: build_partial_success(rejections),
            },
        ))
    }
}

/// Implementation of the OTLP `TraceService` gRPC service.
#[derive(Clone)]
pub struct TracesServiceImpl {
    state: AppState,
}

impl TracesServiceImpl {
    /// Creates a new `TracesServiceImpl` with the given application state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl ExportService for TracesServiceImpl {
    const NAME: &'static str = proto::collector::trace::v1::trace_service_server::SERVICE_NAME;
    type Request = proto::collector::trace::v1::ExportTraceServiceRequest;
    type Response = proto::collector::trace::v1::ExportTraceServiceResponse;

    #[tracing::instrument(skip(self, request), fields(signal = "traces"))]
    async fn export(
        &self,
        request: Request<Self::Request>,
    ) -> Result<Response<Self::Response>, Status> {
        let request = request.into_inner();
        let decoded = decode_traces(&request, self.state.resource());
        let rejections = self.state.accept(decoded).await?;

        Ok(Response::new(
            proto::collector::trace::v1::ExportTraceServiceResponse {
                partial_success: build_partial_success(rejections),
            },
        ))
    }
}
