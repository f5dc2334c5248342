//! Integration tests for the OTLP/gRPC receiver.
//!
//! The collector's own gRPC sink is used as the client.

use super::common::{logs_request, metrics_request, test_config, MockBackend};
use prost::bytes::BufMut;
use prost::Message;
use shared::config::{ExporterConfig, ExporterKind};
use shared::export::{Exporter, GrpcSink};
use shared::models::Signal;
use shared::otlp::proto::collector::logs::v1::ExportLogsServiceResponse;
use shared::otlp::ExportRequest;
use std::net::SocketAddr;
use std::time::Duration;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Endpoint;
use tonic::{Code, Request, Status};

const LOGS_EXPORT: &str = "/opentelemetry.proto.collector.logs.v1.LogsService/Export";

fn grpc_client(addr: SocketAddr) -> GrpcSink {
    GrpcSink::from_config(&ExporterConfig {
        kind: ExporterKind::OtlpGrpc,
        endpoint: Some(format!("http://{addr}")),
        timeout_ms: 2_000,
        ..ExporterConfig::debug("client")
    })
    .unwrap()
}

/// Sends request bytes unchanged and decodes a logs export response.
struct RawCodec;

struct RawEncoder;

struct LogsResponseDecoder;

impl Codec for RawCodec {
    type Encode = Vec<u8>;
    type Decode = ExportLogsServiceResponse;
    type Encoder = RawEncoder;
    type Decoder = LogsResponseDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        RawEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        LogsResponseDecoder
    }
}

impl Encoder for RawEncoder {
    type Item = Vec<u8>;
    type Error = Status;

    fn encode(&mut self, item: Vec<u8>, dst: &mut EncodeBuf<'_>) -> Result<(), Status> {
        dst.put_slice(&item);
        Ok(())
    }
}

impl Decoder for LogsResponseDecoder {
    type Item = ExportLogsServiceResponse;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Status> {
        ExportLogsServiceResponse::decode(src)
            .map(Some)
            .map_err(|e| Status::internal(e.to_string()))
    }
}

async fn send_raw(
    addr: SocketAddr,
    path: &'static str,
    body: Vec<u8>,
) -> Result<ExportLogsServiceResponse, Status> {
    let channel = Endpoint::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut client = tonic::client::Grpc::new(channel);
    client.ready().await.unwrap();
    client
        .unary(Request::new(body), PathAndQuery::from_static(path), RawCodec)
        .await
        .map(tonic::Response::into_inner)
}

#[tokio::test]
async fn test_grpc_malformed_payload_is_invalid_argument() {
    let backend = MockBackend::start().await;
    let collector = collector::start(test_config(&backend.url)).await.unwrap();
    let addr = collector.grpc_addr().unwrap();

    let status = send_raw(addr, LOGS_EXPORT, vec![0xff, 0xff, 0xff, 0xff, 0x01])
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(collector.stats().records_accepted(), 0);

    // The receiver keeps serving well-formed payloads on the same path.
    let response = send_raw(addr, LOGS_EXPORT, logs_request("inventory", 2).encode_to_vec())
        .await
        .unwrap();
    assert!(response.partial_success.is_none());
    assert_eq!(backend.wait_for(Signal::Logs, 2).await, 2);

    collector.shutdown().await;
}

#[tokio::test]
async fn test_grpc_unknown_method_is_unimplemented() {
    let backend = MockBackend::start().await;
    let collector = collector::start(test_config(&backend.url)).await.unwrap();
    let addr = collector.grpc_addr().unwrap();

    let status = send_raw(
        addr,
        "/opentelemetry.proto.collector.logs.v1.LogsService/Query",
        Vec::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(status.code(), Code::Unimplemented);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(backend.requests().is_empty());

    collector.shutdown().await;
}

#[tokio::test]
async fn test_grpc_logs_reach_backend() {
    let backend = MockBackend::start().await;
    let collector = collector::start(test_config(&backend.url)).await.unwrap();
    let client = grpc_client(collector.grpc_addr().unwrap());

    let ack = client
        .export(&ExportRequest::Logs(logs_request("inventory", 3)))
        .await
        .unwrap();

    assert!(!ack.is_partial());
    assert_eq!(backend.wait_for(Signal::Logs, 3).await, 3);

    collector.shutdown().await;
}

#[tokio::test]
async fn test_grpc_and_http_share_one_pipeline() {
    let backend = MockBackend::start().await;
    let collector = collector::start(test_config(&backend.url)).await.unwrap();
    let client = grpc_client(collector.grpc_addr().unwrap());

    client
        .export(&ExportRequest::Metrics(metrics_request("inventory")))
        .await
        .unwrap();
    client
        .export(&ExportRequest::Logs(logs_request("inventory", 1)))
        .await
        .unwrap();

    assert_eq!(backend.wait_for(Signal::Metrics, 1).await, 1);
    assert_eq!(backend.wait_for(Signal::Logs, 1).await, 1);
    assert_eq!(collector.stats().records_accepted(), 2);

    collector.shutdown().await;
}
