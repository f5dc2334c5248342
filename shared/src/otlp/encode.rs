//! Conversions from internal records back to OTLP export requests.
//!
//! Records are regrouped by resource, then scope, then (for metrics) stream,
//! preserving first-seen order at every level.

use crate::models::{
    AttributeValue, Attributes, ExponentialBuckets, LogRecord, MetricKind, MetricRecord,
    PointValue, Resource, Scope, Signal, SpanRecord, TelemetryRecord,
};
use crate::otlp::proto;
use proto::collector::logs::v1::ExportLogsServiceRequest;
use proto::collector::metrics::v1::ExportMetricsServiceRequest;
use proto::collector::trace::v1::ExportTraceServiceRequest;
use prost::Message;
use std::sync::Arc;

/// One OTLP export request for a single signal.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportRequest {
    /// Metrics request.
    Metrics(ExportMetricsServiceRequest),
    /// Logs request.
    Logs(ExportLogsServiceRequest),
    /// Traces request.
    Traces(ExportTraceServiceRequest),
}

impl ExportRequest {
    /// The signal carried by this request.
    #[must_use]
    pub fn signal(&self) -> Signal {
        match self {
            Self::Metrics(_) => Signal::Metrics,
            Self::Logs(_) => Signal::Logs,
            Self::Traces(_) => Signal::Traces,
        }
    }

    /// Number of data points, log records or spans in the request.
    #[must_use]
    pub fn item_count(&self) -> usize {
        use proto::metrics::v1::metric::Data;

        match self {
            Self::Metrics(req) => req
                .resource_metrics
                .iter()
                .flat_map(|rm| &rm.scope_metrics)
                .flat_map(|sm| &sm.metrics)
                .map(|m| match &m.data {
                    Some(Data::Gauge(g)) => g.data_points.len(),
                    Some(Data::Sum(s)) => s.data_points.len(),
                    Some(Data::Histogram(h)) => h.data_points.len(),
                    Some(Data::ExponentialHistogram(h)) => h.data_points.len(),
                    Some(Data::Summary(s)) => s.data_points.len(),
                    None => 0,
                })
                .sum(),
            Self::Logs(req) => req
                .resource_logs
                .iter()
                .flat_map(|rl| &rl.scope_logs)
                .map(|sl| sl.log_records.len())
                .sum(),
            Self::Traces(req) => req
                .resource_spans
                .iter()
                .flat_map(|rs| &rs.scope_spans)
                .map(|ss| ss.spans.len())
                .sum(),
        }
    }

    /// Encodes the request as protobuf.
    #[must_use]
    pub fn encode_to_vec(&self) -> Vec<u8> {
        match self {
            Self::Metrics(req) => req.encode_to_vec(),
            Self::Logs(req) => req.encode_to_vec(),
            Self::Traces(req) => req.encode_to_vec(),
        }
    }

    /// Encodes the request as OTLP/JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Metrics(req) => serde_json::to_vec(req),
            Self::Logs(req) => serde_json::to_vec(req),
            Self::Traces(req) => serde_json::to_vec(req),
        }
    }
}

/// Encodes records into export requests, one per signal present, in
/// [`Signal::ALL`] order.
#[must_use]
pub fn encode_records(records: &[TelemetryRecord]) -> Vec<ExportRequest> {
    let mut requests = Vec::new();

    for signal in Signal::ALL {
        let groups = group_records(records.iter().filter(|r| r.signal() == signal));
        if groups.is_empty() {
            continue;
        }
        let request = match signal {
            Signal::Metrics => ExportRequest::Metrics(ExportMetricsServiceRequest {
                resource_metrics: groups.iter().map(encode_resource_metrics).collect(),
            }),
            Signal::Logs => ExportRequest::Logs(ExportLogsServiceRequest {
                resource_logs: groups.iter().map(encode_resource_logs).collect(),
            }),
            Signal::Traces => ExportRequest::Traces(ExportTraceServiceRequest {
                resource_spans: groups.iter().map(encode_resource_spans).collect(),
            }),
        };
        requests.push(request);
    }

    requests
}

struct ResourceGroup<'a> {
    resource: &'a Arc<Resource>,
    scopes: Vec<ScopeGroup<'a>>,
}

struct ScopeGroup<'a> {
    scope: &'a Arc<Scope>,
    records: Vec<&'a TelemetryRecord>,
}

fn same<T: PartialEq>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::ptr_eq(a, b) || **a == **b
}

fn group_records<'a>(records: impl Iterator<Item = &'a TelemetryRecord>) -> Vec<ResourceGroup<'a>> {
    let mut groups: Vec<ResourceGroup<'a>> = Vec::new();

    for record in records {
        let group = match groups
            .iter_mut()
            .position(|g| same(g.resource, record.resource()))
        {
            Some(i) => &mut groups[i],
            None => {
                groups.push(ResourceGroup {
                    resource: record.resource(),
                    scopes: Vec::new(),
                });
                let last = groups.len() - 1;
                &mut groups[last]
            }
        };

        match group
            .scopes
            .iter_mut()
            .find(|s| same(s.scope, record.scope()))
        {
            Some(scope) => scope.records.push(record),
            None => group.scopes.push(ScopeGroup {
                scope: record.scope(),
                records: vec![record],
            }),
        }
    }

    groups
}

/// Converts an [`AttributeValue`] to an OTLP `AnyValue`.
///
/// [`AttributeValue::Empty`] becomes an `AnyValue` with no variant set.
#[must_use]
pub fn attribute_to_any_value(value: &AttributeValue) -> proto::common::v1::AnyValue {
    use proto::common::v1::{any_value::Value, AnyValue, ArrayValue, KeyValueList};

    let value = match value {
        AttributeValue::String(s) => Value::StringValue(s.clone()),
        AttributeValue::Bool(b) => Value::BoolValue(*b),
        AttributeValue::Int(i) => Value::IntValue(*i),
        AttributeValue::Double(d) => Value::DoubleValue(*d),
        AttributeValue::Bytes(b) => Value::BytesValue(b.clone()),
        AttributeValue::Array(values) => Value::ArrayValue(ArrayValue {
            values: values.iter().map(attribute_to_any_value).collect(),
        }),
        AttributeValue::Map(entries) => Value::KvlistValue(KeyValueList {
            values: entries
                .iter()
                .map(|(k, v)| key_value(k, v))
                .collect(),
        }),
        AttributeValue::Empty => return AnyValue { value: None },
    };
    AnyValue { value: Some(value) }
}

fn key_value(key: &str, value: &AttributeValue) -> proto::common::v1::KeyValue {
    proto::common::v1::KeyValue {
        key: key.to_string(),
        value: Some(attribute_to_any_value(value)),
        ..Default::default()
    }
}

/// Converts [`Attributes`] to OTLP key-value pairs, in insertion order.
#[must_use]
pub fn attributes_to_key_values(attributes: &Attributes) -> Vec<proto::common::v1::KeyValue> {
    attributes.iter().map(|(k, v)| key_value(k, v)).collect()
}

fn encode_resource(resource: &Resource) -> proto::resource::v1::Resource {
    proto::resource::v1::Resource {
        attributes: attributes_to_key_values(resource.attributes()),
        ..Default::default()
    }
}

fn encode_scope(scope: &Scope) -> proto::common::v1::InstrumentationScope {
    proto::common::v1::InstrumentationScope {
        name: scope.name.clone(),
        version: scope.version.clone(),
        attributes: attributes_to_key_values(&scope.attributes),
        ..Default::default()
    }
}

fn encode_resource_metrics(group: &ResourceGroup<'_>) -> proto::metrics::v1::ResourceMetrics {
    proto::metrics::v1::ResourceMetrics {
        resource: Some(encode_resource(group.resource)),
        scope_metrics: group
            .scopes
            .iter()
            .map(|s| proto::metrics::v1::ScopeMetrics {
                scope: Some(encode_scope(s.scope)),
                metrics: encode_metrics(&s.records),
                schema_url: s.scope.schema_url.clone(),
            })
            .collect(),
        schema_url: group.resource.schema_url().to_string(),
    }
}

fn encode_metrics(records: &[&TelemetryRecord]) -> Vec<proto::metrics::v1::Metric> {
    let mut streams: Vec<(&MetricRecord, Vec<&TelemetryRecord>)> = Vec::new();
    for record in records {
        let Some(point) = record.as_metric() else {
            continue;
        };
        match streams.iter_mut().find(|(head, _)| head.same_stream(point)) {
            Some((_, members)) => members.push(record),
            None => streams.push((point, vec![record])),
        }
    }

    streams
        .into_iter()
        .map(|(head, members)| proto::metrics::v1::Metric {
            name: head.name.clone(),
            description: head.description.clone(),
            unit: head.unit.clone(),
            data: Some(encode_metric_data(head.kind, &members)),
            ..Default::default()
        })
        .collect()
}

fn encode_metric_data(
    kind: MetricKind,
    members: &[&TelemetryRecord],
) -> proto::metrics::v1::metric::Data {
    use proto::metrics::v1::{metric::Data, ExponentialHistogram, Gauge, Histogram, Sum, Summary};

    let points = || {
        members
            .iter()
            .filter_map(|r| r.as_metric().map(|m| (*r, m)))
    };

    match kind {
        MetricKind::Gauge => Data::Gauge(Gauge {
            data_points: points().filter_map(|(r, m)| number_point(r, m)).collect(),
        }),
        MetricKind::Sum {
            monotonic,
            temporality,
        } => Data::Sum(Sum {
            data_points: points().filter_map(|(r, m)| number_point(r, m)).collect(),
            aggregation_temporality: temporality.as_otlp(),
            is_monotonic: monotonic,
        }),
        MetricKind::Histogram { temporality } => Data::Histogram(Histogram {
            data_points: points()
                .filter_map(|(r, m)| histogram_point(r, m))
                .collect(),
            aggregation_temporality: temporality.as_otlp(),
        }),
        MetricKind::ExponentialHistogram { temporality } => {
            Data::ExponentialHistogram(ExponentialHistogram {
                data_points: points()
                    .filter_map(|(r, m)| exponential_histogram_point(r, m))
                    .collect(),
                aggregation_temporality: temporality.as_otlp(),
            })
        }
        MetricKind::Summary => Data::Summary(Summary {
            data_points: points().filter_map(|(r, m)| summary_point(r, m)).collect(),
        }),
    }
}

fn number_point(
    record: &TelemetryRecord,
    metric: &MetricRecord,
) -> Option<proto::metrics::v1::NumberDataPoint> {
    use proto::metrics::v1::number_data_point::Value;

    let value = match metric.value {
        PointValue::Double(v) => Value::AsDouble(v),
        PointValue::Int(v) => Value::AsInt(v),
        PointValue::Histogram(_)
        | PointValue::ExponentialHistogram(_)
        | PointValue::Summary(_) => return None,
    };
    Some(proto::metrics::v1::NumberDataPoint {
        attributes: attributes_to_key_values(record.attributes()),
        start_time_unix_nano: metric.start_time_unix_nano,
        time_unix_nano: record.timestamp_unix_nano(),
        flags: metric.flags,
        value: Some(value),
        ..Default::default()
    })
}

fn histogram_point(
    record: &TelemetryRecord,
    metric: &MetricRecord,
) -> Option<proto::metrics::v1::HistogramDataPoint> {
    let PointValue::Histogram(h) = &metric.value else {
        return None;
    };
    Some(proto::metrics::v1::HistogramDataPoint {
        attributes: attributes_to_key_values(record.attributes()),
        start_time_unix_nano: metric.start_time_unix_nano,
        time_unix_nano: record.timestamp_unix_nano(),
        count: h.count,
        sum: h.sum,
        bucket_counts: h.bucket_counts.clone(),
        explicit_bounds: h.explicit_bounds.clone(),
        flags: metric.flags,
        min: h.min,
        max: h.max,
        ..Default::default()
    })
}

fn exponential_histogram_point(
    record: &TelemetryRecord,
    metric: &MetricRecord,
) -> Option<proto::metrics::v1::ExponentialHistogramDataPoint> {
    use proto::metrics::v1::exponential_histogram_data_point::Buckets;

    let PointValue::ExponentialHistogram(h) = &metric.value else {
        return None;
    };
    let buckets = |b: &ExponentialBuckets| Buckets {
        offset: b.offset,
        bucket_counts: b.bucket_counts.clone(),
    };
    Some(proto::metrics::v1::ExponentialHistogramDataPoint {
        attributes: attributes_to_key_values(record.attributes()),
        start_time_unix_nano: metric.start_time_unix_nano,
        time_unix_nano: record.timestamp_unix_nano(),
        count: h.count,
        sum: h.sum,
        scale: h.scale,
        zero_count: h.zero_count,
        positive: h.positive.as_ref().map(buckets),
        negative: h.negative.as_ref().map(buckets),
        flags: metric.flags,
        min: h.min,
        max: h.max,
        zero_threshold: h.zero_threshold,
        ..Default::default()
    })
}

fn summary_point(
    record: &TelemetryRecord,
    metric: &MetricRecord,
) -> Option<proto::metrics::v1::SummaryDataPoint> {
    use proto::metrics::v1::summary_data_point::ValueAtQuantile;

    let PointValue::Summary(s) = &metric.value else {
        return None;
    };
    Some(proto::metrics::v1::SummaryDataPoint {
        attributes: attributes_to_key_values(record.attributes()),
        start_time_unix_nano: metric.start_time_unix_nano,
        time_unix_nano: record.timestamp_unix_nano(),
        count: s.count,
        sum: s.sum,
        quantile_values: s
            .quantiles
            .iter()
            .map(|q| ValueAtQuantile {
                quantile: q.quantile,
                value: q.value,
            })
            .collect(),
        flags: metric.flags,
        ..Default::default()
    })
}

fn encode_resource_logs(group: &ResourceGroup<'_>) -> proto::logs::v1::ResourceLogs {
    proto::logs::v1::ResourceLogs {
        resource: Some(encode_resource(group.resource)),
        scope_logs: group
            .scopes
            .iter()
            .map(|s| proto::logs::v1::ScopeLogs {
                scope: Some(encode_scope(s.scope)),
                log_records: s
                    .records
                    .iter()
                    .filter_map(|r| r.as_log().map(|log| encode_log(r, log)))
                    .collect(),
                schema_url: s.scope.schema_url.clone(),
            })
            .collect(),
        schema_url: group.resource.schema_url().to_string(),
    }
}

fn encode_log(record: &TelemetryRecord, log: &LogRecord) -> proto::logs::v1::LogRecord {
    proto::logs::v1::LogRecord {
        time_unix_nano: record.timestamp_unix_nano(),
        observed_time_unix_nano: log.observed_time_unix_nano,
        severity_number: log.severity_number,
        severity_text: log.severity_text.clone(),
        body: log.body.as_ref().map(attribute_to_any_value),
        attributes: attributes_to_key_values(record.attributes()),
        flags: log.flags,
        trace_id: log.trace_id.clone(),
        span_id: log.span_id.clone(),
        ..Default::default()
    }
}

fn encode_resource_spans(group: &ResourceGroup<'_>) -> proto::trace::v1::ResourceSpans {
    proto::trace::v1::ResourceSpans {
        resource: Some(encode_resource(group.resource)),
        scope_spans: group
            .scopes
            .iter()
            .map(|s| proto::trace::v1::ScopeSpans {
                scope: Some(encode_scope(s.scope)),
                spans: s
                    .records
                    .iter()
                    .filter_map(|r| r.as_span().map(|span| encode_span(r, span)))
                    .collect(),
                schema_url: s.scope.schema_url.clone(),
            })
            .collect(),
        schema_url: group.resource.schema_url().to_string(),
    }
}

fn encode_span(record: &TelemetryRecord, span: &SpanRecord) -> proto::trace::v1::Span {
    use proto::trace::v1::{span, Status};

    proto::trace::v1::Span {
        trace_id: span.trace_id.to_vec(),
        span_id: span.span_id.to_vec(),
        trace_state: span.trace_state.clone(),
        parent_span_id: span.parent_span_id.map(|p| p.to_vec()).unwrap_or_default(),
        flags: span.flags,
        name: span.name.clone(),
        kind: span.kind.as_otlp(),
        start_time_unix_nano: record.timestamp_unix_nano(),
        end_time_unix_nano: span.end_time_unix_nano,
        attributes: attributes_to_key_values(record.attributes()),
        events: span
            .events
            .iter()
            .map(|e| span::Event {
                time_unix_nano: e.time_unix_nano,
                name: e.name.clone(),
                attributes: attributes_to_key_values(&e.attributes),
                ..Default::default()
            })
            .collect(),
        links: span
            .links
            .iter()
            .map(|l| span::Link {
                trace_id: l.trace_id.clone(),
                span_id: l.span_id.clone(),
                trace_state: l.trace_state.clone(),
                attributes: attributes_to_key_values(&l.attributes),
                flags: l.flags,
                ..Default::default()
            })
            .collect(),
        status: Some(Status {
            message: span.status.message.clone(),
            code: span.status.code.as_otlp(),
        }),
        ..Default::default()
    }
}
