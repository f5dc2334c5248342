//! Application state module.
//!
//! Defines the state shared by the OTLP receivers.

use crate::metrics::PipelineStats;
use crate::pipeline::{Ingress, IngressError};
use shared::models::Resource;
use shared::otlp::Decoded;
use std::sync::Arc;

/// Items of a request that were rejected while decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rejections {
    /// Number of rejected items.
    pub count: i64,
    /// Description of the first rejection.
    pub message: Option<String>,
}

/// State shared across all receiver handlers.
///
/// Cloning is cheap: every field is a handle.
#[derive(Debug, Clone)]
pub struct AppState {
    ingress: Ingress,
    resource: Arc<Resource>,
    stats: Arc<PipelineStats>,
}

impl AppState {
    /// Creates the receiver state.
    #[must_use]
    pub fn new(ingress: Ingress, resource: Arc<Resource>, stats: Arc<PipelineStats>) -> Self {
        Self {
            ingress,
            resource,
            stats,
        }
    }

    /// The ingress queue producer.
    #[must_use]
    pub fn ingress(&self) -> &Ingress {
        &self.ingress
    }

    /// The process resource received resources are merged with.
    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Pipeline counters.
    #[must_use]
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Counts a decoded request and enqueues its records as one unit.
    ///
    /// # Errors
    ///
    /// Returns the ingress error if the unit was refused; nothing is
    /// enqueued in that case.
    pub async fn accept(&self, decoded: Decoded) -> Result<Rejections, IngressError> {
        let Decoded {
            records,
            rejected,
            error_message,
        } = decoded;
        self.stats.record_received(records.len(), rejected);
        self.ingress.enqueue(records).await?;
        Ok(Rejections {
            count: rejected,
            message: error_message,
        })
    }
}
