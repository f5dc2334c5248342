//! Tests for OTLP conversions.

#[cfg(test)]
mod tests {
    use crate::models::{
        AttributeValue, Attributes, MetricKind, PointValue, Resource, Signal, SpanKind,
        StatusCode, Temporality,
    };
    use crate::otlp::conversions::*;
    use crate::otlp::encode::{encode_records, ExportRequest};
    use crate::otlp::proto;

    fn string_value(s: &str) -> Option<proto::common::v1::AnyValue> {
        Some(proto::common::v1::AnyValue {
            value: Some(proto::common::v1::any_value::Value::StringValue(
                s.to_string(),
            )),
        })
    }

    fn kv(key: &str, value: &str) -> proto::common::v1::KeyValue {
        proto::common::v1::KeyValue {
            key: key.to_string(),
            value: string_value(value),
            ..Default::default()
        }
    }

    fn otlp_resource(service: &str) -> Option<proto::resource::v1::Resource> {
        Some(proto::resource::v1::Resource {
            attributes: vec![kv("service.name", service)],
            ..Default::default()
        })
    }

    fn local_resource() -> Resource {
        Resource::new(
            Attributes::new()
                .with("service.name", "beacon-collector")
                .with("host.name", "node-1"),
        )
    }

    fn gauge_metric(name: &str, values: &[f64]) -> proto::metrics::v1::Metric {
        proto::metrics::v1::Metric {
            name: name.to_string(),
            unit: "1".to_string(),
            data: Some(proto::metrics::v1::metric::Data::Gauge(
                proto::metrics::v1::Gauge {
                    data_points: values
                        .iter()
                        .map(|v| proto::metrics::v1::NumberDataPoint {
                            time_unix_nano: 1_700_000_000_000_000_000,
                            value: Some(proto::metrics::v1::number_data_point::Value::AsDouble(
                                *v,
                            )),
                            ..Default::default()
                        })
                        .collect(),
                },
            )),
            ..Default::default()
        }
    }

    fn metrics_request(
        metrics: Vec<proto::metrics::v1::Metric>,
    ) -> proto::collector::metrics::v1::ExportMetricsServiceRequest {
        proto::collector::metrics::v1::ExportMetricsServiceRequest {
            resource_metrics: vec![proto::metrics::v1::ResourceMetrics {
                resource: otlp_resource("checkout"),
                scope_metrics: vec![proto::metrics::v1::ScopeMetrics {
                    scope: Some(proto::common::v1::InstrumentationScope {
                        name: "checkout-lib".to_string(),
                        version: "1.2.0".to_string(),
                        ..Default::default()
                    }),
                    metrics,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    fn span(trace_id: Vec<u8>, span_id: Vec<u8>, name: &str) -> proto::trace::v1::Span {
        proto::trace::v1::Span {
            trace_id,
            span_id,
            name: name.to_string(),
            kind: proto::trace::v1::span::SpanKind::Server as i32,
            start_time_unix_nano: 1_700_000_000_000_000_000,
            end_time_unix_nano: 1_700_000_000_100_000_000,
            status: Some(proto::trace::v1::Status {
                code: proto::trace::v1::status::StatusCode::Error as i32,
                message: "boom".to_string(),
            }),
            ..Default::default()
        }
    }

    fn traces_request(
        spans: Vec<proto::trace::v1::Span>,
    ) -> proto::collector::trace::v1::ExportTraceServiceRequest {
        proto::collector::trace::v1::ExportTraceServiceRequest {
            resource_spans: vec![proto::trace::v1::ResourceSpans {
                resource: otlp_resource("api"),
                scope_spans: vec![proto::trace::v1::ScopeSpans {
                    spans,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_decode_gauge_points() {
        let request = metrics_request(vec![gauge_metric("cpu", &[0.25, 0.5])]);

        let decoded = decode_metrics(&request, &local_resource());

        assert_eq!(decoded.rejected, 0);
        assert_eq!(decoded.records.len(), 2);
        let point = decoded.records[0].as_metric().unwrap();
        assert_eq!(point.name, "cpu");
        assert_eq!(point.kind, MetricKind::Gauge);
        assert_eq!(point.value, PointValue::Double(0.25));
        assert_eq!(decoded.records[0].scope().name, "checkout-lib");
        assert_eq!(
            decoded.records[0].timestamp_unix_nano(),
            1_700_000_000_000_000_000
        );
    }

    #[test]
    fn test_decode_keeps_caller_service_name() {
        let request = metrics_request(vec![gauge_metric("cpu", &[1.0])]);

        let decoded = decode_metrics(&request, &local_resource());

        let resource = decoded.records[0].resource();
        assert_eq!(resource.service_name(), Some("checkout"));
        assert_eq!(
            resource.attributes().get("host.name").and_then(AttributeValue::as_str),
            Some("node-1")
        );
    }

    #[test]
    fn test_decode_records_share_resource() {
        let request = metrics_request(vec![gauge_metric("cpu", &[1.0, 2.0, 3.0])]);

        let decoded = decode_metrics(&request, &local_resource());

        assert!(std::sync::Arc::ptr_eq(
            decoded.records[0].resource(),
            decoded.records[2].resource()
        ));
    }

    #[test]
    fn test_decode_rejects_metric_without_data() {
        let empty = proto::metrics::v1::Metric {
            name: "broken".to_string(),
            ..Default::default()
        };
        let request = metrics_request(vec![empty, gauge_metric("ok", &[1.0])]);

        let decoded = decode_metrics(&request, &local_resource());

        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.rejected, 1);
        assert!(decoded.error_message.unwrap().contains("broken"));
    }

    #[test]
    fn test_exponential_histogram_round_trips() {
        use proto::metrics::v1::exponential_histogram_data_point::Buckets;

        let original = proto::metrics::v1::Metric {
            name: "rpc.latency".to_string(),
            unit: "ms".to_string(),
            data: Some(proto::metrics::v1::metric::Data::ExponentialHistogram(
                proto::metrics::v1::ExponentialHistogram {
                    data_points: vec![proto::metrics::v1::ExponentialHistogramDataPoint {
                        attributes: vec![kv("route", "/checkout")],
                        start_time_unix_nano: 1_699_999_990_000_000_000,
                        time_unix_nano: 1_700_000_000_000_000_000,
                        count: 17,
                        sum: Some(42.5),
                        scale: 3,
                        zero_count: 2,
                        positive: Some(Buckets {
                            offset: -2,
                            bucket_counts: vec![1, 4, 0, 7],
                        }),
                        negative: Some(Buckets {
                            offset: 1,
                            bucket_counts: vec![3],
                        }),
                        min: Some(-3.0),
                        max: Some(9.0),
                        zero_threshold: 0.001,
                        ..Default::default()
                    }],
                    aggregation_temporality: Temporality::Delta.as_otlp(),
                },
            )),
            ..Default::default()
        };

        let decoded = decode_metrics(&metrics_request(vec![original.clone()]), &local_resource());

        assert_eq!(decoded.rejected, 0);
        assert_eq!(decoded.records.len(), 1);
        let point = decoded.records[0].as_metric().unwrap();
        assert_eq!(
            point.kind,
            MetricKind::ExponentialHistogram {
                temporality: Temporality::Delta
            }
        );
        let PointValue::ExponentialHistogram(h) = &point.value else {
            panic!("expected an exponential histogram, got {:?}", point.value);
        };
        assert_eq!(h.scale, 3);
        assert_eq!(h.zero_count, 2);
        assert_eq!(h.positive.as_ref().unwrap().offset, -2);
        assert_eq!(h.negative.as_ref().unwrap().bucket_counts, vec![3]);

        let requests = encode_records(&decoded.records);
        let ExportRequest::Metrics(request) = &requests[0] else {
            panic!("expected a metrics request");
        };
        assert_eq!(request.resource_metrics[0].scope_metrics[0].metrics[0], original);
    }

    #[test]
    fn test_empty_attribute_values_round_trip() {
        use proto::common::v1::{any_value::Value, AnyValue, ArrayValue, KeyValue, KeyValueList};

        let empty = |key: &str| KeyValue {
            key: key.to_string(),
            value: None,
            ..Default::default()
        };
        let nested = KeyValue {
            key: "nested".to_string(),
            value: Some(AnyValue {
                value: Some(Value::KvlistValue(KeyValueList {
                    values: vec![kv("a", "1"), empty("b")],
                })),
            }),
            ..Default::default()
        };
        let list = KeyValue {
            key: "list".to_string(),
            value: Some(AnyValue {
                value: Some(Value::ArrayValue(ArrayValue {
                    values: vec![AnyValue { value: None }, string_value("z").unwrap()],
                })),
            }),
            ..Default::default()
        };
        let mut metric = gauge_metric("cpu", &[1.0]);
        if let Some(proto::metrics::v1::metric::Data::Gauge(g)) = &mut metric.data {
            g.data_points[0].attributes = vec![kv("present", "x"), empty("empty"), nested, list];
        }

        let decoded = decode_metrics(&metrics_request(vec![metric]), &local_resource());
        assert_eq!(
            decoded.records[0].attributes().get("empty"),
            Some(&AttributeValue::Empty)
        );

        let requests = encode_records(&decoded.records);
        let ExportRequest::Metrics(request) = &requests[0] else {
            panic!("expected a metrics request");
        };
        let Some(proto::metrics::v1::metric::Data::Gauge(gauge)) =
            &request.resource_metrics[0].scope_metrics[0].metrics[0].data
        else {
            panic!("expected a gauge");
        };
        let attributes = &gauge.data_points[0].attributes;
        let keys: Vec<_> = attributes.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["present", "empty", "nested", "list"]);
        assert_eq!(attributes[1].value, Some(AnyValue { value: None }));

        let Some(Value::KvlistValue(entries)) =
            attributes[2].value.as_ref().and_then(|v| v.value.as_ref())
        else {
            panic!("expected a kvlist");
        };
        assert_eq!(entries.values.len(), 2);
        assert_eq!(entries.values[1].key, "b");

        let Some(Value::ArrayValue(items)) =
            attributes[3].value.as_ref().and_then(|v| v.value.as_ref())
        else {
            panic!("expected an array");
        };
        assert_eq!(items.values.len(), 2);
        assert_eq!(items.values[0], AnyValue { value: None });
    }

    #[test]
    fn test_decode_sum_temporality() {
        let sum = proto::metrics::v1::Metric {
            name: "requests".to_string(),
            data: Some(proto::metrics::v1::metric::Data::Sum(
                proto::metrics::v1::Sum {
                    data_points: vec![proto::metrics::v1::NumberDataPoint {
                        value: Some(proto::metrics::v1::number_data_point::Value::AsInt(42)),
                        ..Default::default()
                    }],
                    aggregation_temporality: 2,
                    is_monotonic: true,
                },
            )),
            ..Default::default()
        };

        let decoded = decode_metrics(&metrics_request(vec![sum]), &local_resource());

        let point = decoded.records[0].as_metric().unwrap();
        assert_eq!(
            point.kind,
            MetricKind::Sum {
                monotonic: true,
                temporality: Temporality::Cumulative,
            }
        );
        assert_eq!(point.value, PointValue::Int(42));
        // A zero point time is replaced with the receive time.
        assert!(decoded.records[0].timestamp_unix_nano() > 0);
    }

    #[test]
    fn test_decode_log_record() {
        let request = proto::collector::logs::v1::ExportLogsServiceRequest {
            resource_logs: vec![proto::logs::v1::ResourceLogs {
                resource: otlp_resource("auth"),
                scope_logs: vec![proto::logs::v1::ScopeLogs {
                    log_records: vec![proto::logs::v1::LogRecord {
                        time_unix_nano: 1_700_000_000_000_000_000,
                        severity_number: 17,
                        severity_text: "ERROR".to_string(),
                        body: string_value("Test error message"),
                        attributes: vec![kv("user_id", "12345")],
                        trace_id: vec![1; 16],
                        span_id: vec![2; 8],
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };

        let decoded = decode_logs(&request, &local_resource());

        assert_eq!(decoded.records.len(), 1);
        let record = &decoded.records[0];
        assert_eq!(record.signal(), Signal::Logs);
        let log = record.as_log().unwrap();
        assert_eq!(log.severity_label(), "ERROR");
        assert_eq!(
            log.body,
            Some(AttributeValue::String("Test error message".to_string()))
        );
        assert!(record.attributes().contains_key("user_id"));
        assert_eq!(record.resource().service_name(), Some("auth"));
    }

    #[test]
    fn test_decode_span() {
        let mut otlp_span = span(vec![1; 16], vec![2; 8], "GET /api/users");
        otlp_span.parent_span_id = vec![3; 8];

        let decoded = decode_traces(&traces_request(vec![otlp_span]), &local_resource());

        assert_eq!(decoded.rejected, 0);
        let span = decoded.records[0].as_span().unwrap();
        assert_eq!(span.name, "GET /api/users");
        assert_eq!(span.kind, SpanKind::Server);
        assert_eq!(span.parent_span_id, Some([3; 8]));
        assert_eq!(span.status.code, StatusCode::Error);
        assert_eq!(span.trace_id_hex(), "01".repeat(16));
    }

    #[test]
    fn test_decode_rejects_malformed_span_ids() {
        let request = traces_request(vec![
            span(vec![1; 15], vec![2; 8], "short-trace"),
            span(vec![1; 16], vec![2; 4], "short-span"),
            span(vec![0; 16], vec![2; 8], "zero-trace"),
            span(vec![1; 16], vec![2; 8], "valid"),
        ]);

        let decoded = decode_traces(&request, &local_resource());

        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.rejected, 3);
        assert!(decoded.error_message.unwrap().contains("short-trace"));
    }

    #[test]
    fn test_encode_regroups_by_resource_and_stream() {
        let request = metrics_request(vec![
            gauge_metric("cpu", &[0.1, 0.2]),
            gauge_metric("mem", &[0.3]),
        ]);
        let decoded = decode_metrics(&request, &local_resource());

        let requests = encode_records(&decoded.records);

        assert_eq!(requests.len(), 1);
        let ExportRequest::Metrics(encoded) = &requests[0] else {
            panic!("expected metrics request");
        };
        assert_eq!(encoded.resource_metrics.len(), 1);
        let scope_metrics = &encoded.resource_metrics[0].scope_metrics;
        assert_eq!(scope_metrics.len(), 1);
        let names: Vec<_> = scope_metrics[0].metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["cpu", "mem"]);
        assert_eq!(requests[0].item_count(), 3);
    }

    #[test]
    fn test_encode_splits_requests_by_signal() {
        let mut records = decode_traces(
            &traces_request(vec![span(vec![1; 16], vec![2; 8], "op")]),
            &local_resource(),
        )
        .records;
        records.extend(
            decode_metrics(&metrics_request(vec![gauge_metric("cpu", &[1.0])]), &local_resource())
                .records,
        );

        let requests = encode_records(&records);

        let signals: Vec<_> = requests.iter().map(ExportRequest::signal).collect();
        assert_eq!(signals, vec![Signal::Metrics, Signal::Traces]);
    }

    #[test]
    fn test_encoded_span_keeps_ids_and_enriched_attributes() {
        let mut records =
            decode_traces(&traces_request(vec![span(vec![7; 16], vec![8; 8], "op")]), &local_resource())
                .records;
        records[0].insert_attribute_if_absent("deployment.environment", "prod");

        let requests = encode_records(&records);

        let ExportRequest::Traces(encoded) = &requests[0] else {
            panic!("expected traces request");
        };
        let span = &encoded.resource_spans[0].scope_spans[0].spans[0];
        assert_eq!(span.trace_id, vec![7; 16]);
        assert_eq!(span.span_id, vec![8; 8]);
        assert_eq!(span.start_time_unix_nano, 1_700_000_000_000_000_000);
        assert!(span
            .attributes
            .iter()
            .any(|kv| kv.key == "deployment.environment"));
    }

    #[test]
    fn test_encode_empty_records() {
        assert!(encode_records(&[]).is_empty());
    }
}
