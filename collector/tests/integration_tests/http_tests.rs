//! Integration tests for the OTLP/HTTP receiver.

use super::common::{
    logs_request, metrics_request, post_protobuf, resource_attribute, test_config, MockBackend,
};
use prost::Message;
use shared::models::Signal;

#[tokio::test]
async fn test_http_metrics_reach_backend_with_enriched_resource() {
    let backend = MockBackend::start().await;
    let collector = collector::start(test_config(&backend.url)).await.unwrap();
    let addr = collector.http_addr().unwrap();

    let response = post_protobuf(addr, "/v1/metrics", metrics_request("checkout").encode_to_vec()).await;
    assert_eq!(response.status(), 200);

    assert_eq!(backend.wait_for(Signal::Metrics, 1).await, 1);
    let requests = backend.requests();
    assert_eq!(
        resource_attribute(&requests[0], "service.name").as_deref(),
        Some("checkout")
    );
    assert_eq!(
        resource_attribute(&requests[0], "deployment.environment").as_deref(),
        Some("test")
    );

    collector.shutdown().await;
}

#[tokio::test]
async fn test_http_logs_json_is_accepted() {
    let backend = MockBackend::start().await;
    let collector = collector::start(test_config(&backend.url)).await.unwrap();
    let addr = collector.http_addr().unwrap();

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/v1/logs"))
        .header("content-type", "application/json")
        .body(serde_json::to_vec(&logs_request("billing", 2)).unwrap())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    assert_eq!(backend.wait_for(Signal::Logs, 2).await, 2);

    collector.shutdown().await;
}

#[tokio::test]
async fn test_http_unsupported_content_type_is_rejected() {
    let backend = MockBackend::start().await;
    let collector = collector::start(test_config(&backend.url)).await.unwrap();
    let addr = collector.http_addr().unwrap();

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/v1/logs"))
        .header("content-type", "text/plain")
        .body(logs_request("svc", 1).encode_to_vec())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 415);
    collector.shutdown().await;
    assert_eq!(backend.items(Signal::Logs), 0);
}
