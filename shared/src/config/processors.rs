//! Processor configuration: batching, resource detection and enrichment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

/// Default number of records that triggers a batch flush.
pub const DEFAULT_SEND_BATCH_SIZE: usize = 8192;

/// Default maximum age of the oldest record in a batch, in milliseconds.
pub const DEFAULT_BATCH_TIMEOUT_MS: u64 = 5_000;

/// Default bound on the cloud metadata probe, in milliseconds.
pub const DEFAULT_DETECTION_TIMEOUT_MS: u64 = 2_000;

/// Default cloud instance metadata endpoint.
pub const DEFAULT_CLOUD_METADATA_ENDPOINT: &str = "http://169.254.169.254";

/// All processors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorsConfig {
    /// Batching stage.
    pub batch: BatchConfig,
    /// Resource detection, run once at startup.
    pub resource_detection: ResourceDetectionConfig,
    /// Resource enrichment stage.
    pub resource: ResourceConfig,
}

/// Batching stage.
///
/// A batch is flushed when it holds `send_batch_size` records or when its
/// oldest record is `timeout_ms` old, whichever happens first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Maximum records per batch.
    #[validate(range(min = 1, max = 1_000_000, message = "must be between 1 and 1000000"))]
    pub send_batch_size: usize,
    /// Maximum batch age in milliseconds.
    #[validate(range(min = 1, max = 3_600_000, message = "must be between 1 and 3600000 ms"))]
    pub timeout_ms: u64,
}

impl BatchConfig {
    /// Maximum batch age.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            send_batch_size: DEFAULT_SEND_BATCH_SIZE,
            timeout_ms: DEFAULT_BATCH_TIMEOUT_MS,
        }
    }
}

/// A source of resource attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// `OTEL_RESOURCE_ATTRIBUTES` and `OTEL_SERVICE_NAME`.
    Env,
    /// Host name and architecture.
    Host,
    /// Operating system type and version.
    Os,
    /// Process id, start time and executable.
    Process,
    /// Container runtime and id.
    Container,
    /// Cloud instance metadata endpoint.
    Cloud,
}

impl DetectorKind {
    /// Every detector, in precedence order.
    pub const ALL: [DetectorKind; 6] = [
        DetectorKind::Env,
        DetectorKind::Host,
        DetectorKind::Os,
        DetectorKind::Process,
        DetectorKind::Container,
        DetectorKind::Cloud,
    ];
}

/// Resource detection.
///
/// Detectors run in list order; the first detector to set a key wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceDetectionConfig {
    /// Enabled detectors.
    pub detectors: Vec<DetectorKind>,
    /// Bound on the cloud probe in milliseconds.
    #[validate(range(min = 1, max = 60_000, message = "must be between 1 and 60000 ms"))]
    pub timeout_ms: u64,
    /// Base URL of the instance metadata service.
    #[validate(url(message = "must be a valid URL"))]
    pub cloud_metadata_endpoint: String,
}

impl ResourceDetectionConfig {
    /// Bound on the cloud probe.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ResourceDetectionConfig {
    fn default() -> Self {
        Self {
            detectors: DetectorKind::ALL.to_vec(),
            timeout_ms: DEFAULT_DETECTION_TIMEOUT_MS,
            cloud_metadata_endpoint: DEFAULT_CLOUD_METADATA_ENDPOINT.to_string(),
        }
    }
}

/// Resource enrichment stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceConfig {
    /// Whether resource attributes are copied onto records.
    pub enabled: bool,
    /// Static attributes added to the detected resource.
    pub attributes: BTreeMap<String, String>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            attributes: BTreeMap::new(),
        }
    }
}
