//! Conversions from OTLP protobuf types to internal Beacon types.
//!
//! Decoding never fails as a whole: a request that parsed successfully is
//! walked item by item, and items that cannot form a valid record are counted
//! as rejected so receivers can report an OTLP partial success.

use crate::models::{
    now_unix_nano, AttributeValue, Attributes, ExponentialBuckets, ExponentialHistogramPoint,
    HistogramPoint, LogRecord, MetricKind, MetricRecord, PointValue, Quantile, RecordBody,
    Resource, Scope, SpanEvent, SpanKind, SpanLink, SpanRecord, SpanStatus, StatusCode,
    SummaryPoint, TelemetryRecord, Temporality,
};
use crate::otlp::proto;
use std::sync::Arc;

/// Result of decoding one export request.
#[derive(Debug, Default)]
pub struct Decoded {
    /// Records built from the request, in request order.
    pub records: Vec<TelemetryRecord>,
    /// Number of items that could not be converted.
    pub rejected: i64,
    /// Description of the first rejection, if any.
    pub error_message: Option<String>,
}

impl Decoded {
    fn reject(&mut self, count: i64, reason: impl FnOnce() -> String) {
        if count == 0 {
            return;
        }
        self.rejected += count;
        if self.error_message.is_none() {
            self.error_message = Some(reason());
        }
    }
}

/// Converts an OTLP `AnyValue` to an [`AttributeValue`].
///
/// A value with no variant set becomes [`AttributeValue::Empty`].
#[must_use]
pub fn any_value_to_attribute(value: &proto::common::v1::AnyValue) -> AttributeValue {
    use proto::common::v1::any_value::Value;

    let Some(value) = value.value.as_ref() else {
        return AttributeValue::Empty;
    };
    match value {
        Value::StringValue(s) => AttributeValue::String(s.clone()),
        Value::BoolValue(b) => AttributeValue::Bool(*b),
        Value::IntValue(i) => AttributeValue::Int(*i),
        Value::DoubleValue(d) => AttributeValue::Double(*d),
        Value::BytesValue(b) => AttributeValue::Bytes(b.clone()),
        Value::ArrayValue(arr) => {
            AttributeValue::Array(arr.values.iter().map(any_value_to_attribute).collect())
        }
        Value::KvlistValue(kv) => AttributeValue::Map(
            kv.values
                .iter()
                .map(|pair| (pair.key.clone(), key_value_to_attribute(pair)))
                .collect(),
        ),
    }
}

fn key_value_to_attribute(pair: &proto::common::v1::KeyValue) -> AttributeValue {
    pair.value
        .as_ref()
        .map_or(AttributeValue::Empty, any_value_to_attribute)
}

/// Converts OTLP key-value pairs to [`Attributes`].
///
/// Keys without a value are kept as [`AttributeValue::Empty`].
#[must_use]
pub fn key_values_to_attributes(attributes: &[proto::common::v1::KeyValue]) -> Attributes {
    attributes
        .iter()
        .map(|kv| (kv.key.clone(), key_value_to_attribute(kv)))
        .collect()
}

/// Converts an optional OTLP resource to a [`Resource`] and fills gaps from `local`.
#[must_use]
pub fn resource_from_otlp(
    resource: Option<&proto::resource::v1::Resource>,
    schema_url: &str,
    local: &Resource,
) -> Resource {
    let declared = resource.map_or_else(Attributes::new, |r| {
        key_values_to_attributes(&r.attributes)
    });
    Resource::new(declared)
        .with_schema_url(schema_url)
        .merged_with(local)
}

fn scope_from_otlp(
    scope: Option<&proto::common::v1::InstrumentationScope>,
    schema_url: &str,
) -> Scope {
    let mut converted = scope.map_or_else(Scope::default, |s| Scope {
        name: s.name.clone(),
        version: s.version.clone(),
        attributes: key_values_to_attributes(&s.attributes),
        schema_url: String::new(),
    });
    converted.schema_url = schema_url.to_string();
    converted
}

/// Uses `nanos` unless it is zero, in which case the current time is used.
fn timestamp_or_now(nanos: u64) -> u64 {
    if nanos > 0 {
        nanos
    } else {
        now_unix_nano()
    }
}

/// Decodes an OTLP metrics export request.
///
/// Each data point becomes one record. Metrics without data and number points
/// without a value are rejected.
#[must_use]
pub fn decode_metrics(
    request: &proto::collector::metrics::v1::ExportMetricsServiceRequest,
    local: &Resource,
) -> Decoded {
    use proto::metrics::v1::metric::Data;

    let mut decoded = Decoded::default();

    for resource_metrics in &request.resource_metrics {
        let resource = Arc::new(resource_from_otlp(
            resource_metrics.resource.as_ref(),
            &resource_metrics.schema_url,
            local,
        ));

        for scope_metrics in &resource_metrics.scope_metrics {
            let scope = Arc::new(scope_from_otlp(
                scope_metrics.scope.as_ref(),
                &scope_metrics.schema_url,
            ));

            for metric in &scope_metrics.metrics {
                let Some(data) = metric.data.as_ref() else {
                    decoded.reject(1, || format!("metric `{}` has no data", metric.name));
                    continue;
                };

                match data {
                    Data::Gauge(gauge) => {
                        push_number_points(
                            &mut decoded,
                            metric,
                            MetricKind::Gauge,
                            &gauge.data_points,
                            &resource,
                            &scope,
                        );
                    }
                    Data::Sum(sum) => {
                        let kind = MetricKind::Sum {
                            monotonic: sum.is_monotonic,
                            temporality: Temporality::from_otlp(sum.aggregation_temporality),
                        };
                        push_number_points(
                            &mut decoded,
                            metric,
                            kind,
                            &sum.data_points,
                            &resource,
                            &scope,
                        );
                    }
                    Data::Histogram(histogram) => {
                        let kind = MetricKind::Histogram {
                            temporality: Temporality::from_otlp(
                                histogram.aggregation_temporality,
                            ),
                        };
                        for dp in &histogram.data_points {
                            let value = PointValue::Histogram(HistogramPoint {
                                count: dp.count,
                                sum: dp.sum,
                                min: dp.min,
                                max: dp.max,
                                explicit_bounds: dp.explicit_bounds.clone(),
                                bucket_counts: dp.bucket_counts.clone(),
                            });
                            decoded.records.push(metric_point(
                                metric,
                                kind,
                                value,
                                (dp.start_time_unix_nano, dp.time_unix_nano, dp.flags),
                                &dp.attributes,
                                &resource,
                                &scope,
                            ));
                        }
                    }
                    Data::Summary(summary) => {
                        for dp in &summary.data_points {
                            let value = PointValue::Summary(SummaryPoint {
                                count: dp.count,
                                sum: dp.sum,
                                quantiles: dp
                                    .quantile_values
                                    .iter()
                                    .map(|q| Quantile {
                                        quantile: q.quantile,
                                        value: q.value,
                                    })
                                    .collect(),
                            });
                            decoded.records.push(metric_point(
                                metric,
                                MetricKind::Summary,
                                value,
                                (dp.start_time_unix_nano, dp.time_unix_nano, dp.flags),
                                &dp.attributes,
                                &resource,
                                &scope,
                            ));
                        }
                    }
                    Data::ExponentialHistogram(histogram) => {
                        let kind = MetricKind::ExponentialHistogram {
                            temporality: Temporality::from_otlp(
                                histogram.aggregation_temporality,
                            ),
                        };
                        for dp in &histogram.data_points {
                            let value =
                                PointValue::ExponentialHistogram(ExponentialHistogramPoint {
                                    count: dp.count,
                                    sum: dp.sum,
                                    min: dp.min,
                                    max: dp.max,
                                    scale: dp.scale,
                                    zero_count: dp.zero_count,
                                    zero_threshold: dp.zero_threshold,
                                    positive: dp.positive.as_ref().map(buckets_from_otlp),
                                    negative: dp.negative.as_ref().map(buckets_from_otlp),
                                });
                            decoded.records.push(metric_point(
                                metric,
                                kind,
                                value,
                                (dp.start_time_unix_nano, dp.time_unix_nano, dp.flags),
                                &dp.attributes,
                                &resource,
                                &scope,
                            ));
                        }
                    }
                }
            }
        }
    }

    decoded
}

fn buckets_from_otlp(
    buckets: &proto::metrics::v1::exponential_histogram_data_point::Buckets,
) -> ExponentialBuckets {
    ExponentialBuckets {
        offset: buckets.offset,
        bucket_counts: buckets.bucket_counts.clone(),
    }
}

fn push_number_points(
    decoded: &mut Decoded,
    metric: &proto::metrics::v1::Metric,
    kind: MetricKind,
    points: &[proto::metrics::v1::NumberDataPoint],
    resource: &Arc<Resource>,
    scope: &Arc<Scope>,
) {
    use proto::metrics::v1::number_data_point::Value;

    for dp in points {
        let value = match dp.value {
            Some(Value::AsDouble(v)) => PointValue::Double(v),
            Some(Value::AsInt(v)) => PointValue::Int(v),
            None => {
                decoded.reject(1, || format!("metric `{}` has a point without value", metric.name));
                continue;
            }
        };
        decoded.records.push(metric_point(
            metric,
            kind,
            value,
            (dp.start_time_unix_nano, dp.time_unix_nano, dp.flags),
            &dp.attributes,
            resource,
            scope,
        ));
    }
}

fn metric_point(
    metric: &proto::metrics::v1::Metric,
    kind: MetricKind,
    value: PointValue,
    (start_time, time, flags): (u64, u64, u32),
    attributes: &[proto::common::v1::KeyValue],
    resource: &Arc<Resource>,
    scope: &Arc<Scope>,
) -> TelemetryRecord {
    let point = MetricRecord {
        name: metric.name.clone(),
        description: metric.description.clone(),
        unit: metric.unit.clone(),
        kind,
        start_time_unix_nano: start_time,
        value,
        flags,
    };
    TelemetryRecord::new(
        timestamp_or_now(time),
        RecordBody::Metric(point),
        key_values_to_attributes(attributes),
        Arc::clone(resource),
        Arc::clone(scope),
    )
}

/// Decodes an OTLP logs export request. Every log record is accepted.
#[must_use]
pub fn decode_logs(
    request: &proto::collector::logs::v1::ExportLogsServiceRequest,
    local: &Resource,
) -> Decoded {
    let mut decoded = Decoded::default();

    for resource_logs in &request.resource_logs {
        let resource = Arc::new(resource_from_otlp(
            resource_logs.resource.as_ref(),
            &resource_logs.schema_url,
            local,
        ));

        for scope_logs in &resource_logs.scope_logs {
            let scope = Arc::new(scope_from_otlp(
                scope_logs.scope.as_ref(),
                &scope_logs.schema_url,
            ));

            for log in &scope_logs.log_records {
                let timestamp = if log.time_unix_nano > 0 {
                    log.time_unix_nano
                } else {
                    timestamp_or_now(log.observed_time_unix_nano)
                };
                let body = LogRecord {
                    observed_time_unix_nano: log.observed_time_unix_nano,
                    severity_number: log.severity_number,
                    severity_text: log.severity_text.clone(),
                    body: log.body.as_ref().map(any_value_to_attribute),
                    trace_id: log.trace_id.clone(),
                    span_id: log.span_id.clone(),
                    flags: log.flags,
                };
                decoded.records.push(TelemetryRecord::new(
                    timestamp,
                    RecordBody::Log(body),
                    key_values_to_attributes(&log.attributes),
                    Arc::clone(&resource),
                    Arc::clone(&scope),
                ));
            }
        }
    }

    decoded
}

/// Decodes an OTLP trace export request.
///
/// Spans whose trace id is not 16 bytes or whose span id is not 8 bytes are rejected.
#[must_use]
pub fn decode_traces(
    request: &proto::collector::trace::v1::ExportTraceServiceRequest,
    local: &Resource,
) -> Decoded {
    let mut decoded = Decoded::default();

    for resource_spans in &request.resource_spans {
        let resource = Arc::new(resource_from_otlp(
            resource_spans.resource.as_ref(),
            &resource_spans.schema_url,
            local,
        ));

        for scope_spans in &resource_spans.scope_spans {
            let scope = Arc::new(scope_from_otlp(
                scope_spans.scope.as_ref(),
                &scope_spans.schema_url,
            ));

            for span in &scope_spans.spans {
                match otlp_span_to_record(span) {
                    Some(record) => decoded.records.push(TelemetryRecord::new(
                        timestamp_or_now(span.start_time_unix_nano),
                        RecordBody::Span(record),
                        key_values_to_attributes(&span.attributes),
                        Arc::clone(&resource),
                        Arc::clone(&scope),
                    )),
                    None => decoded.reject(1, || {
                        format!("span `{}` has an invalid trace or span id", span.name)
                    }),
                }
            }
        }
    }

    decoded
}

/// Converts an OTLP span to a [`SpanRecord`], or `None` if its ids are malformed.
fn otlp_span_to_record(span: &proto::trace::v1::Span) -> Option<SpanRecord> {
    let trace_id = <[u8; 16]>::try_from(span.trace_id.as_slice()).ok()?;
    let span_id = <[u8; 8]>::try_from(span.span_id.as_slice()).ok()?;
    if trace_id == [0; 16] || span_id == [0; 8] {
        return None;
    }

    let parent_span_id = if span.parent_span_id.is_empty() {
        None
    } else {
        Some(<[u8; 8]>::try_from(span.parent_span_id.as_slice()).ok()?)
    };

    let status = span.status.as_ref().map_or_else(SpanStatus::default, |s| SpanStatus {
        code: StatusCode::from_otlp(s.code),
        message: s.message.clone(),
    });

    let events = span
        .events
        .iter()
        .map(|e| SpanEvent {
            time_unix_nano: e.time_unix_nano,
            name: e.name.clone(),
            attributes: key_values_to_attributes(&e.attributes),
        })
        .collect();

    let links = span
        .links
        .iter()
        .map(|l| SpanLink {
            trace_id: l.trace_id.clone(),
            span_id: l.span_id.clone(),
            trace_state: l.trace_state.clone(),
            attributes: key_values_to_attributes(&l.attributes),
            flags: l.flags,
        })
        .collect();

    Some(SpanRecord {
        trace_id,
        span_id,
        parent_span_id,
        trace_state: span.trace_state.clone(),
        name: span.name.clone(),
        kind: SpanKind::from_otlp(span.kind),
        end_time_unix_nano: span.end_time_unix_nano,
        status,
        events,
        links,
        flags: span.flags,
    })
}
