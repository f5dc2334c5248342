//! Integration tests for the Beacon collector.
//!
//! These tests start a complete pipeline on ephemeral ports and verify that
//! telemetry received over OTLP/HTTP and OTLP/gRPC reaches a mock backend.

#[path = "integration_tests/common/mod.rs"]
mod common;
#[path = "integration_tests/grpc_tests.rs"]
mod grpc_tests;
#[path = "integration_tests/health_tests.rs"]
mod health_tests;
#[path = "integration_tests/http_tests.rs"]
mod http_tests;
#[path = "integration_tests/pipeline_tests.rs"]
mod pipeline_tests;
