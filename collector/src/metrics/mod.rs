//! Internal pipeline counters.
//!
//! Every component shares one [`PipelineStats`] through an `Arc` and bumps
//! lock-free counters. `GET /stats` serves a [`StatsSnapshot`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Converts a length to a counter increment.
pub(crate) fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Counters for one export sink.
#[derive(Debug, Default)]
pub struct SinkStats {
    name: String,
    batches_exported: AtomicU64,
    batches_failed: AtomicU64,
    records_exported: AtomicU64,
    records_failed: AtomicU64,
    retries: AtomicU64,
    partial_rejections: AtomicU64,
}

impl SinkStats {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A batch was fully delivered.
    pub fn record_exported(&self, records: usize) {
        self.batches_exported.fetch_add(1, Ordering::Relaxed);
        self.records_exported
            .fetch_add(count(records), Ordering::Relaxed);
    }

    /// A batch was dropped after a permanent failure or exhausted retries.
    pub fn record_failed(&self, records: usize) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.records_failed.fetch_add(count(records), Ordering::Relaxed);
    }

    /// Retries made while delivering one request.
    pub fn record_retries(&self, retries: u32) {
        self.retries
            .fetch_add(u64::from(retries), Ordering::Relaxed);
    }

    /// Items the backend rejected in a partial success.
    pub fn record_partial(&self, rejected: i64) {
        self.partial_rejections
            .fetch_add(u64::try_from(rejected).unwrap_or(0), Ordering::Relaxed);
    }

    /// Batches fully delivered.
    #[must_use]
    pub fn batches_exported(&self) -> u64 {
        self.batches_exported.load(Ordering::Relaxed)
    }

    /// Batches dropped.
    #[must_use]
    pub fn batches_failed(&self) -> u64 {
        self.batches_failed.load(Ordering::Relaxed)
    }

    /// Retries made.
    #[must_use]
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> SinkSnapshot {
        SinkSnapshot {
            name: self.name.clone(),
            batches_exported: self.batches_exported(),
            batches_failed: self.batches_failed(),
            records_exported: self.records_exported.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            retries: self.retries(),
            partial_rejections: self.partial_rejections.load(Ordering::Relaxed),
        }
    }
}

/// Process-wide pipeline counters.
#[derive(Debug, Default)]
pub struct PipelineStats {
    records_received: AtomicU64,
    records_accepted: AtomicU64,
    records_rejected: AtomicU64,
    records_refused: AtomicU64,
    records_unrouted: AtomicU64,
    batches_created: AtomicU64,
    scrape_errors: AtomicU64,
    sinks: Vec<SinkStats>,
}

impl PipelineStats {
    /// Creates counters for the given sink names, in exporter order.
    #[must_use]
    pub fn new<I, S>(sink_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sinks: sink_names.into_iter().map(SinkStats::new).collect(),
            ..Self::default()
        }
    }

    /// A receiver decoded `accepted + rejected` items.
    pub fn record_received(&self, accepted: usize, rejected: i64) {
        let rejected = u64::try_from(rejected).unwrap_or(0);
        self.records_received
            .fetch_add(count(accepted) + rejected, Ordering::Relaxed);
        self.records_rejected.fetch_add(rejected, Ordering::Relaxed);
    }

    /// Records entered the ingress queue.
    pub fn record_accepted(&self, records: usize) {
        self.records_accepted
            .fetch_add(count(records), Ordering::Relaxed);
    }

    /// Records were refused under backpressure or during shutdown.
    pub fn record_refused(&self, records: usize) {
        self.records_refused
            .fetch_add(count(records), Ordering::Relaxed);
    }

    /// Records were dropped because no exporter accepts their signal.
    pub fn record_unrouted(&self, records: usize) {
        self.records_unrouted
            .fetch_add(count(records), Ordering::Relaxed);
    }

    /// The batcher emitted a batch.
    pub fn record_batch(&self) {
        self.batches_created.fetch_add(1, Ordering::Relaxed);
    }

    /// A host metrics scraper failed for one tick.
    pub fn record_scrape_error(&self) {
        self.scrape_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Counters of the sink at `index`, if it exists.
    #[must_use]
    pub fn sink(&self, index: usize) -> Option<&SinkStats> {
        self.sinks.get(index)
    }

    /// Records accepted into the ingress queue.
    #[must_use]
    pub fn records_accepted(&self) -> u64 {
        self.records_accepted.load(Ordering::Relaxed)
    }

    /// Records refused under backpressure.
    #[must_use]
    pub fn records_refused(&self) -> u64 {
        self.records_refused.load(Ordering::Relaxed)
    }

    /// Records dropped for lack of a route.
    #[must_use]
    pub fn records_unrouted(&self) -> u64 {
        self.records_unrouted.load(Ordering::Relaxed)
    }

    /// Batches created.
    #[must_use]
    pub fn batches_created(&self) -> u64 {
        self.batches_created.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_accepted: self.records_accepted(),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            records_refused: self.records_refused(),
            records_unrouted: self.records_unrouted(),
            batches_created: self.batches_created(),
            scrape_errors: self.scrape_errors.load(Ordering::Relaxed),
            exporters: self.sinks.iter().map(SinkStats::snapshot).collect(),
        }
    }
}

/// Serializable copy of one sink's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkSnapshot {
    /// Exporter name.
    pub name: String,
    /// Batches fully delivered.
    pub batches_exported: u64,
    /// Batches dropped.
    pub batches_failed: u64,
    /// Records delivered.
    pub records_exported: u64,
    /// Records dropped.
    pub records_failed: u64,
    /// Retries made.
    pub retries: u64,
    /// Items rejected by the backend in partial successes.
    pub partial_rejections: u64,
}

/// Serializable copy of all counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Items decoded by receivers, including rejected ones.
    pub records_received: u64,
    /// Records that entered the ingress queue.
    pub records_accepted: u64,
    /// Items rejected while decoding.
    pub records_rejected: u64,
    /// Records refused under backpressure.
    pub records_refused: u64,
    /// Records dropped for lack of a route.
    pub records_unrouted: u64,
    /// Batches created.
    pub batches_created: u64,
    /// Host metrics scraper failures.
    pub scrape_errors: u64,
    /// Per-exporter counters.
    pub exporters: Vec<SinkSnapshot>,
}
