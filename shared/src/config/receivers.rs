//! Receiver configuration: OTLP listeners and the host metrics sampler.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Default OTLP gRPC port.
pub const DEFAULT_GRPC_PORT: u16 = 4317;

/// Default OTLP HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 4318;

/// Default maximum HTTP request body size (16 MiB).
pub const DEFAULT_MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Default host metrics collection interval in seconds.
pub const DEFAULT_COLLECTION_INTERVAL_SECS: u64 = 10;

/// Default location of the kernel disk statistics table.
pub const DEFAULT_DISKSTATS_PATH: &str = "/proc/diskstats";

/// All receivers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReceiversConfig {
    /// OTLP over gRPC.
    pub otlp_grpc: GrpcReceiverConfig,
    /// OTLP over HTTP.
    pub otlp_http: HttpReceiverConfig,
    /// Host metrics sampler.
    pub hostmetrics: HostMetricsConfig,
}

/// OTLP/gRPC receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct GrpcReceiverConfig {
    /// Whether the listener is started.
    pub enabled: bool,
    /// Bind address.
    pub endpoint: SocketAddr,
    /// Maximum decoded message size in bytes.
    #[validate(range(min = 1024, message = "must be at least 1024 bytes"))]
    pub max_recv_msg_size_bytes: usize,
}

impl Default for GrpcReceiverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: SocketAddr::from(([0, 0, 0, 0], DEFAULT_GRPC_PORT)),
            max_recv_msg_size_bytes: DEFAULT_MAX_REQUEST_BODY_BYTES,
        }
    }
}

/// OTLP/HTTP receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct HttpReceiverConfig {
    /// Whether the listener is started.
    pub enabled: bool,
    /// Bind address.
    pub endpoint: SocketAddr,
    /// Maximum request body size in bytes, after decompression.
    #[validate(range(min = 1024, message = "must be at least 1024 bytes"))]
    pub max_request_body_bytes: usize,
}

impl Default for HttpReceiverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
            max_request_body_bytes: DEFAULT_MAX_REQUEST_BODY_BYTES,
        }
    }
}

/// A group of host metric series produced by one scraper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScraperKind {
    /// CPU utilization per core and aggregate.
    Cpu,
    /// Memory usage and utilization.
    Memory,
    /// Disk I/O bytes and operations.
    Disk,
    /// Filesystem usage per mount point.
    Filesystem,
    /// Network bytes and packets per interface.
    Network,
    /// Load averages.
    Load,
    /// Process count.
    Processes,
}

impl ScraperKind {
    /// Every scraper, in sampling order.
    pub const ALL: [ScraperKind; 7] = [
        ScraperKind::Cpu,
        ScraperKind::Memory,
        ScraperKind::Disk,
        ScraperKind::Filesystem,
        ScraperKind::Network,
        ScraperKind::Load,
        ScraperKind::Processes,
    ];
}

impl std::fmt::Display for ScraperKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Filesystem => "filesystem",
            Self::Network => "network",
            Self::Load => "load",
            Self::Processes => "processes",
        };
        f.write_str(name)
    }
}

/// Host metrics sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct HostMetricsConfig {
    /// Whether the sampler runs.
    pub enabled: bool,
    /// Seconds between ticks.
    #[validate(range(min = 1, max = 3600, message = "must be between 1 and 3600 seconds"))]
    pub collection_interval_secs: u64,
    /// Enabled scrapers.
    #[validate(length(min = 1, message = "at least one scraper must be enabled"))]
    pub scrapers: Vec<ScraperKind>,
    /// Path of the disk statistics table used for operation counts.
    pub diskstats_path: PathBuf,
}

impl HostMetricsConfig {
    /// Tick interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_secs)
    }
}

impl Default for HostMetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            collection_interval_secs: DEFAULT_COLLECTION_INTERVAL_SECS,
            scrapers: ScraperKind::ALL.to_vec(),
            diskstats_path: PathBuf::from(DEFAULT_DISKSTATS_PATH),
        }
    }
}
