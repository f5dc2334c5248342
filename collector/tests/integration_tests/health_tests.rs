//! Integration tests for the health listener.

use super::common::{logs_request, post_protobuf, test_config, MockBackend};
use prost::Message;
use serde_json::Value;
use shared::models::Signal;

#[tokio::test]
async fn test_health_endpoint() {
    let backend = MockBackend::start().await;
    let collector = collector::start(test_config(&backend.url)).await.unwrap();
    let addr = collector.health_addr().unwrap();

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "beacon-collector");

    collector.shutdown().await;
}

#[tokio::test]
async fn test_stats_endpoint_reports_counters() {
    let backend = MockBackend::start().await;
    let collector = collector::start(test_config(&backend.url)).await.unwrap();

    post_protobuf(
        collector.http_addr().unwrap(),
        "/v1/logs",
        logs_request("orders", 4).encode_to_vec(),
    )
    .await;
    backend.wait_for(Signal::Logs, 4).await;

    let addr = collector.health_addr().unwrap();
    let json: Value = reqwest::get(format!("http://{addr}/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(json["records_received"], 4);
    assert_eq!(json["records_accepted"], 4);
    assert_eq!(json["exporters"][0]["name"], "backend");

    collector.shutdown().await;
}

#[tokio::test]
async fn test_disabled_listeners_are_not_bound() {
    let backend = MockBackend::start().await;
    let mut config = test_config(&backend.url);
    config.receivers.otlp_grpc.enabled = false;
    config.health.enabled = false;

    let collector = collector::start(config).await.unwrap();

    assert!(collector.grpc_addr().is_none());
    assert!(collector.health_addr().is_none());
    assert!(collector.http_addr().is_some());

    collector.shutdown().await;
}
