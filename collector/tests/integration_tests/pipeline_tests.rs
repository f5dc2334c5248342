//! Integration tests for batching, retry, and shutdown.

use super::common::{logs_request, post_protobuf, test_config, MockBackend};
use prost::Message;
use shared::models::Signal;

#[tokio::test]
async fn test_shutdown_flushes_partial_batches() {
    let backend = MockBackend::start().await;
    let mut config = test_config(&backend.url);
    config.processors.batch.send_batch_size = 1_000;
    config.processors.batch.timeout_ms = 60_000;
    let collector = collector::start(config).await.unwrap();
    let addr = collector.http_addr().unwrap();

    let response = post_protobuf(addr, "/v1/logs", logs_request("orders", 50).encode_to_vec()).await;
    assert_eq!(response.status(), 200);

    // Neither size nor age has been reached.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(backend.items(Signal::Logs), 0);

    collector.shutdown().await;

    assert_eq!(backend.items(Signal::Logs), 50);
}

#[tokio::test]
async fn test_batch_timeout_flushes_without_shutdown() {
    let backend = MockBackend::start().await;
    let mut config = test_config(&backend.url);
    config.processors.batch.send_batch_size = 1_000;
    config.processors.batch.timeout_ms = 50;
    let collector = collector::start(config).await.unwrap();
    let addr = collector.http_addr().unwrap();

    post_protobuf(addr, "/v1/logs", logs_request("orders", 5).encode_to_vec()).await;

    assert_eq!(backend.wait_for(Signal::Logs, 5).await, 5);
    assert_eq!(backend.requests().len(), 1);

    collector.shutdown().await;
}

#[tokio::test]
async fn test_transient_backend_failure_is_retried() {
    let backend = MockBackend::failing_first(1).await;
    let collector = collector::start(test_config(&backend.url)).await.unwrap();
    let addr = collector.http_addr().unwrap();

    post_protobuf(addr, "/v1/logs", logs_request("orders", 1).encode_to_vec()).await;

    assert_eq!(backend.wait_for(Signal::Logs, 1).await, 1);
    let stats = std::sync::Arc::clone(collector.stats());
    collector.shutdown().await;

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.exporters[0].retries, 1);
    assert_eq!(snapshot.exporters[0].records_exported, 1);
    assert_eq!(snapshot.exporters[0].batches_failed, 0);
}
