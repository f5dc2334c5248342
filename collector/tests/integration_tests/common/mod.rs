//! Common test utilities and helpers for integration tests.
//!
//! This module provides a mock OTLP/HTTP backend, a pipeline configuration
//! bound to ephemeral ports, and OTLP request builders.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use prost::Message;
use shared::config::{ExporterConfig, ExporterKind, PipelineConfig, RetryConfig};
use shared::models::Signal;
use shared::otlp::proto::collector::logs::v1::ExportLogsServiceRequest;
use shared::otlp::proto::collector::metrics::v1::ExportMetricsServiceRequest;
use shared::otlp::proto::collector::trace::v1::ExportTraceServiceRequest;
use shared::otlp::proto::common::v1::{any_value, AnyValue, KeyValue};
use shared::otlp::proto::logs::v1::{LogRecord, ResourceLogs, ScopeLogs};
use shared::otlp::proto::metrics::v1::{
    metric, number_data_point, Gauge, Metric, NumberDataPoint, ResourceMetrics, ScopeMetrics,
};
use shared::otlp::proto::resource::v1::Resource;
use shared::otlp::ExportRequest;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// What the mock backend has seen.
#[derive(Default)]
pub struct Received {
    items: [AtomicUsize; 3],
    failures_remaining: AtomicUsize,
    requests: Mutex<Vec<ExportRequest>>,
}

/// An OTLP/HTTP backend that records every export it receives.
pub struct MockBackend {
    /// Base URL, e.g. `http://127.0.0.1:40000`.
    pub url: String,
    received: Arc<Received>,
}

impl MockBackend {
    /// Starts a backend that accepts everything.
    pub async fn start() -> Self {
        Self::failing_first(0).await
    }

    /// Starts a backend that answers 503 to the first `failures` requests.
    pub async fn failing_first(failures: usize) -> Self {
        let received = Arc::new(Received::default());
        received.failures_remaining.store(failures, Ordering::SeqCst);

        let app = Router::new()
            .route("/v1/metrics", post(receive_metrics))
            .route("/v1/logs", post(receive_logs))
            .route("/v1/traces", post(receive_traces))
            .with_state(Arc::clone(&received));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            received,
        }
    }

    /// Items received for `signal`.
    pub fn items(&self, signal: Signal) -> usize {
        self.received.items[signal.index()].load(Ordering::SeqCst)
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ExportRequest> {
        self.received.requests.lock().unwrap().clone()
    }

    /// Waits until at least `count` items of `signal` have arrived.
    pub async fn wait_for(&self, signal: Signal, count: usize) -> usize {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let items = self.items(signal);
            if items >= count || tokio::time::Instant::now() >= deadline {
                return items;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

fn record(received: &Received, request: ExportRequest) -> StatusCode {
    let failing = received
        .failures_remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    received.items[request.signal().index()].fetch_add(request.item_count(), Ordering::SeqCst);
    received.requests.lock().unwrap().push(request);
    StatusCode::OK
}

async fn receive_metrics(State(received): State<Arc<Received>>, body: Bytes) -> StatusCode {
    match ExportMetricsServiceRequest::decode(body) {
        Ok(request) => record(&received, ExportRequest::Metrics(request)),
        Err(_) => StatusCode::BAD_REQUEST,
    }
}

async fn receive_logs(State(received): State<Arc<Received>>, body: Bytes) -> StatusCode {
    match ExportLogsServiceRequest::decode(body) {
        Ok(request) => record(&received, ExportRequest::Logs(request)),
        Err(_) => StatusCode::BAD_REQUEST,
    }
}

async fn receive_traces(State(received): State<Arc<Received>>, body: Bytes) -> StatusCode {
    match ExportTraceServiceRequest::decode(body) {
        Ok(request) => record(&received, ExportRequest::Traces(request)),
        Err(_) => StatusCode::BAD_REQUEST,
    }
}

fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

/// A pipeline exporting everything to `backend_url` over OTLP/HTTP.
///
/// All listeners bind ephemeral loopback ports; host metrics and resource
/// detection are off so tests only see the records they send.
pub fn test_config(backend_url: &str) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.receivers.otlp_grpc.endpoint = loopback();
    config.receivers.otlp_http.endpoint = loopback();
    config.receivers.hostmetrics.enabled = false;
    config.health.endpoint = loopback();
    config.processors.resource_detection.detectors = Vec::new();
    config
        .processors
        .resource
        .attributes
        .insert("deployment.environment".to_string(), "test".to_string());
    config.processors.batch.send_batch_size = 1;
    config.processors.batch.timeout_ms = 50;
    config.pipeline.drain_timeout_ms = 1_000;
    config.pipeline.shutdown_timeout_ms = 5_000;
    config.exporters = vec![ExporterConfig {
        kind: ExporterKind::OtlpHttp,
        endpoint: Some(backend_url.to_string()),
        timeout_ms: 2_000,
        retry: RetryConfig {
            max_attempts: 3,
            initial_interval_ms: 10,
            max_interval_ms: 50,
        },
        ..ExporterConfig::debug("backend")
    }];
    config
}

/// A resource carrying only `service.name`.
pub fn service_resource(name: &str) -> Option<Resource> {
    Some(Resource {
        attributes: vec![KeyValue {
            key: "service.name".to_string(),
            value: Some(AnyValue {
                value: Some(any_value::Value::StringValue(name.to_string())),
            }),
        }],
        ..Default::default()
    })
}

/// A logs request with `count` records from `service`.
pub fn logs_request(service: &str, count: usize) -> ExportLogsServiceRequest {
    let log_records = (0..count)
        .map(|i| LogRecord {
            time_unix_nano: 1_700_000_000_000_000_000 + i as u64,
            severity_text: "INFO".to_string(),
            severity_number: 9,
            body: Some(AnyValue {
                value: Some(any_value::Value::StringValue(format!("message {i}"))),
            }),
            ..Default::default()
        })
        .collect();

    ExportLogsServiceRequest {
        resource_logs: vec![ResourceLogs {
            resource: service_resource(service),
            scope_logs: vec![ScopeLogs {
                log_records,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// A metrics request with one gauge point from `service`.
pub fn metrics_request(service: &str) -> ExportMetricsServiceRequest {
    ExportMetricsServiceRequest {
        resource_metrics: vec![ResourceMetrics {
            resource: service_resource(service),
            scope_metrics: vec![ScopeMetrics {
                metrics: vec![Metric {
                    name: "queue.depth".to_string(),
                    data: Some(metric::Data::Gauge(Gauge {
                        data_points: vec![NumberDataPoint {
                            time_unix_nano: 1_700_000_000_000_000_000,
                            value: Some(number_data_point::Value::AsInt(12)),
                            ..Default::default()
                        }],
                    })),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// Posts a protobuf body to the collector's OTLP/HTTP receiver.
pub async fn post_protobuf(addr: SocketAddr, path: &str, body: Vec<u8>) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .header("content-type", "application/x-protobuf")
        .body(body)
        .send()
        .await
        .unwrap()
}

/// Resource attribute `key` of the first resource in a request, as a string.
pub fn resource_attribute(request: &ExportRequest, key: &str) -> Option<String> {
    let attributes = match request {
        ExportRequest::Metrics(r) => &r.resource_metrics.first()?.resource.as_ref()?.attributes,
        ExportRequest::Logs(r) => &r.resource_logs.first()?.resource.as_ref()?.attributes,
        ExportRequest::Traces(r) => &r.resource_spans.first()?.resource.as_ref()?.attributes,
    };
    attributes
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| match kv.value.as_ref()?.value.as_ref()? {
            any_value::Value::StringValue(s) => Some(s.clone()),
            _ => None,
        })
}
