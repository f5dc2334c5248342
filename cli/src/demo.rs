//! Demo telemetry generator.
//!
//! Emits one trace (a parent span with a child), a request counter, a
//! latency histogram, and a log line per iteration, addressed to the
//! collector the way an instrumented application would be.

use anyhow::{Context, Result};
use shared::client::ClientSettings;
use shared::export::{Exporter, Sink};
use shared::models::{
    now_unix_nano, Attributes, HistogramPoint, LogRecord, MetricKind, MetricRecord, PointValue,
    RecordBody, Resource, Scope, SpanKind, SpanRecord, TelemetryRecord, Temporality,
};
use shared::otlp::encode_records;
use std::sync::Arc;

const SCOPE_NAME: &str = "beacon/demo";

/// Latency bucket bounds in milliseconds.
const LATENCY_BOUNDS: [f64; 5] = [5.0, 10.0, 25.0, 50.0, 100.0];

/// Builds the records of one demo iteration.
pub fn iteration(resource: &Arc<Resource>, seq: u64, total_requests: i64) -> Vec<TelemetryRecord> {
    let scope = Arc::new(Scope::named(SCOPE_NAME).with_version(env!("CARGO_PKG_VERSION")));
    let start = now_unix_nano();
    let end = start + 12_000_000;

    let trace_id = trace_id(start, seq);
    let parent_id = span_id(start, seq, 1);
    let child_id = span_id(start, seq, 2);

    let record = |timestamp, body, attributes| {
        TelemetryRecord::new(
            timestamp,
            body,
            attributes,
            Arc::clone(resource),
            Arc::clone(&scope),
        )
    };

    let parent = SpanRecord::new(trace_id, parent_id, "demo-operation")
        .with_kind(SpanKind::Server)
        .with_end_time(end);
    let child = SpanRecord::new(trace_id, child_id, "process-data")
        .with_parent(parent_id)
        .with_end_time(start + 8_000_000);

    let latency = MetricRecord::new(
        "demo.latency",
        MetricKind::Histogram {
            temporality: Temporality::Cumulative,
        },
        PointValue::Histogram(HistogramPoint {
            count: 1,
            sum: Some(12.0),
            min: Some(12.0),
            max: Some(12.0),
            explicit_bounds: LATENCY_BOUNDS.to_vec(),
            bucket_counts: vec![0, 0, 1, 0, 0, 0],
        }),
    )
    .with_unit("ms");

    let log = LogRecord {
        trace_id: trace_id.to_vec(),
        span_id: parent_id.to_vec(),
        ..LogRecord::new(format!("demo iteration {seq} complete")).with_severity(9, "INFO")
    };

    let endpoint = Attributes::new().with("endpoint", "/demo");
    vec![
        record(start, RecordBody::Span(parent), Attributes::new().with("demo.seq", seq.to_string())),
        record(start, RecordBody::Span(child), Attributes::new()),
        record(
            end,
            RecordBody::Metric(
                MetricRecord::counter("demo.requests", total_requests).with_unit("{request}"),
            ),
            endpoint.clone(),
        ),
        record(end, RecordBody::Metric(latency), endpoint),
        record(end, RecordBody::Log(log), Attributes::new()),
    ]
}

fn trace_id(nanos: u64, seq: u64) -> [u8; 16] {
    let high = nanos ^ u64::from(std::process::id()).rotate_left(32);
    let value = (u128::from(high) << 64) | u128::from(seq.wrapping_add(1));
    value.to_be_bytes()
}

fn span_id(nanos: u64, seq: u64, index: u64) -> [u8; 8] {
    let value = nanos.rotate_left(17) ^ (seq << 8) ^ index;
    if value == 0 { index } else { value }.to_be_bytes()
}

/// Sends `iterations` rounds of demo telemetry, one per `interval`.
pub async fn run(iterations: u64, interval: std::time::Duration) -> Result<()> {
    let settings = ClientSettings::from_env().context("invalid OTEL_* environment")?;
    let sink = Sink::from_config(&settings.exporter_config("demo"))?;
    let resource = Arc::new(settings.resource());

    tracing::info!(
        endpoint = %settings.endpoint,
        protocol = ?settings.protocol,
        service = resource.service_name().unwrap_or_default(),
        "Sending demo telemetry"
    );

    let mut total_requests = 0;
    for seq in 0..iterations {
        if seq > 0 {
            tokio::time::sleep(interval).await;
        }
        total_requests += 1;
        let records = iteration(&resource, seq, total_requests);
        for request in encode_records(&records) {
            let ack = sink
                .export(&request)
                .await
                .with_context(|| format!("failed to send {}", request.signal()))?;
            if ack.is_partial() {
                tracing::warn!(
                    signal = %request.signal(),
                    rejected = ack.rejected,
                    message = ack.message.as_deref().unwrap_or_default(),
                    "Collector rejected part of the demo data"
                );
            }
        }
        println!("Sent demo iteration {}/{iterations}", seq + 1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::Signal;

    #[test]
    fn test_iteration_covers_every_signal() {
        let resource = Arc::new(Resource::new(Attributes::new().with("service.name", "demo")));
        let records = iteration(&resource, 0, 1);

        for signal in Signal::ALL {
            assert!(records.iter().any(|r| r.signal() == signal));
        }
    }

    #[test]
    fn test_child_span_shares_trace_with_parent() {
        let resource = Arc::new(Resource::default());
        let records = iteration(&resource, 3, 4);
        let spans: Vec<_> = records.iter().filter_map(TelemetryRecord::as_span).collect();

        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].name, "demo-operation");
        assert_eq!(spans[1].name, "process-data");
        assert_eq!(spans[0].trace_id, spans[1].trace_id);
        assert_eq!(spans[1].parent_span_id, Some(spans[0].span_id));
        assert_ne!(spans[0].span_id, spans[1].span_id);
    }

    #[test]
    fn test_iteration_encodes_one_request_per_signal() {
        let resource = Arc::new(Resource::default());
        let requests = encode_records(&iteration(&resource, 0, 1));

        assert_eq!(requests.len(), 3);
        let items: usize = requests.iter().map(|r| r.item_count()).sum();
        assert_eq!(items, 5);
    }
}
