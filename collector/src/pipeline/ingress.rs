//! The bounded ingress queue between producers and the batcher.
//!
//! One enqueue unit is the full set of records decoded from one request (or
//! one sampler tick). Units are enqueued atomically: either every record of
//! the unit enters the queue or none does.

use crate::metrics::PipelineStats;
use shared::models::TelemetryRecord;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

/// Receiving half of the ingress queue, owned by the batcher.
pub type IngressReceiver = mpsc::Receiver<Vec<TelemetryRecord>>;

/// Why an enqueue was refused. Both cases are retryable for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IngressError {
    /// The queue stayed full for the whole enqueue timeout.
    #[error("ingress queue is full, retry later")]
    Backpressure,

    /// The pipeline is shutting down.
    #[error("pipeline is shutting down")]
    Closed,
}

impl IngressError {
    /// Seconds a client should wait before retrying.
    #[must_use]
    pub fn retry_after_secs(self) -> u64 {
        match self {
            Self::Backpressure => 1,
            Self::Closed => 5,
        }
    }
}

/// Producer handle to the ingress queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Ingress {
    tx: mpsc::Sender<Vec<TelemetryRecord>>,
    timeout: Duration,
    stats: Arc<PipelineStats>,
}

impl Ingress {
    /// Creates a queue holding up to `capacity` enqueue units.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn bounded(
        capacity: usize,
        timeout: Duration,
        stats: Arc<PipelineStats>,
    ) -> (Self, IngressReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, timeout, stats }, rx)
    }

    /// Enqueues one unit of records, waiting at most the configured timeout
    /// for queue space.
    ///
    /// # Errors
    ///
    /// Returns [`IngressError::Backpressure`] if the queue stayed full and
    /// [`IngressError::Closed`] if the batcher has stopped.
    pub async fn enqueue(&self, records: Vec<TelemetryRecord>) -> Result<(), IngressError> {
        if records.is_empty() {
            return Ok(());
        }
        let len = records.len();

        match self.tx.send_timeout(records, self.timeout).await {
            Ok(()) => {
                self.stats.record_accepted(len);
                Ok(())
            }
            Err(SendTimeoutError::Timeout(_)) => {
                self.stats.record_refused(len);
                tracing::warn!(
                    records = len,
                    timeout_ms = self.timeout.as_millis(),
                    "Ingress queue full, refusing records"
                );
                Err(IngressError::Backpressure)
            }
            Err(SendTimeoutError::Closed(_)) => {
                self.stats.record_refused(len);
                Err(IngressError::Closed)
            }
        }
    }

    /// Returns true once the batcher has stopped receiving.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
