//! Sink that logs what it receives.

use super::{ExportAck, ExportResult, Exporter};
use crate::otlp::conversions::any_value_to_attribute;
use crate::otlp::proto::metrics::v1::metric::Data;
use crate::otlp::ExportRequest;
use std::sync::atomic::{AtomicU64, Ordering};

/// Logs a summary of every request at `info` and one line per item at `debug`.
#[derive(Debug, Default)]
pub struct DebugSink {
    name: String,
    requests: AtomicU64,
    items: AtomicU64,
}

impl DebugSink {
    /// Creates a debug sink.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Items (points, log records, spans) received so far.
    #[must_use]
    pub fn items(&self) -> u64 {
        self.items.load(Ordering::Relaxed)
    }
}

fn log_items(request: &ExportRequest) {
    match request {
        ExportRequest::Metrics(req) => {
            for metric in req
                .resource_metrics
                .iter()
                .flat_map(|rm| &rm.scope_metrics)
                .flat_map(|sm| &sm.metrics)
            {
                let (kind, points) = match &metric.data {
                    Some(Data::Gauge(g)) => ("gauge", g.data_points.len()),
                    Some(Data::Sum(s)) => ("sum", s.data_points.len()),
                    Some(Data::Histogram(h)) => ("histogram", h.data_points.len()),
                    Some(Data::ExponentialHistogram(h)) => {
                        ("exponential_histogram", h.data_points.len())
                    }
                    Some(Data::Summary(s)) => ("summary", s.data_points.len()),
                    None => ("empty", 0),
                };
                tracing::debug!(name = %metric.name, unit = %metric.unit, kind, points, "metric");
            }
        }
        ExportRequest::Logs(req) => {
            for log in req
                .resource_logs
                .iter()
                .flat_map(|rl| &rl.scope_logs)
                .flat_map(|sl| &sl.log_records)
            {
                let body = log
                    .body
                    .as_ref()
                    .map(any_value_to_attribute)
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                tracing::debug!(
                    severity = %log.severity_text,
                    trace_id = %hex::encode(&log.trace_id),
                    body = %body,
                    "log"
                );
            }
        }
        ExportRequest::Traces(req) => {
            for span in req
                .resource_spans
                .iter()
                .flat_map(|rs| &rs.scope_spans)
                .flat_map(|ss| &ss.spans)
            {
                let duration_ns = span
                    .end_time_unix_nano
                    .saturating_sub(span.start_time_unix_nano);
                tracing::debug!(
                    name = %span.name,
                    trace_id = %hex::encode(&span.trace_id),
                    span_id = %hex::encode(&span.span_id),
                    parent_span_id = %hex::encode(&span.parent_span_id),
                    duration_ns,
                    "span"
                );
            }
        }
    }
}

impl Exporter for DebugSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn export(&self, request: &ExportRequest) -> ExportResult {
        let items = request.item_count();
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.items
            .fetch_add(u64::try_from(items).unwrap_or(u64::MAX), Ordering::Relaxed);

        tracing::info!(
            exporter = %self.name,
            signal = %request.signal(),
            items,
            "Debug export"
        );
        log_items(request);

        Ok(ExportAck::full())
    }
}
