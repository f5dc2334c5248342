//! Batching stage.
//!
//! [`BatchAccumulator`] is the pure size/age policy; [`spawn_batcher`] runs it
//! as the single owner of all partial batches, between the ingress queue and
//! the export queue.

use super::enrich::Enricher;
use super::ingress::IngressReceiver;
use crate::metrics::PipelineStats;
use chrono::{DateTime, Utc};
use shared::config::BatchConfig;
use shared::models::{Batch, ExporterSet, TelemetryRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Outcome of adding one record to the accumulator.
#[derive(Debug)]
pub enum Pushed {
    /// The record joined a partial batch.
    Buffered,
    /// The record filled a batch, which is returned.
    Full(Batch),
    /// No exporter accepts the record's signal; it was dropped.
    Unrouted,
}

#[derive(Debug)]
struct PendingBatch {
    destinations: ExporterSet,
    created_at: DateTime<Utc>,
    opened: Instant,
    records: Vec<TelemetryRecord>,
}

/// Groups records by destination set and decides when a group is a batch.
///
/// A group becomes a batch when it holds `max_size` records or when its
/// oldest record has waited `max_wait`, whichever comes first.
#[derive(Debug)]
pub struct BatchAccumulator {
    routes: [ExporterSet; 3],
    max_size: usize,
    max_wait: Duration,
    pending: Vec<PendingBatch>,
    next_id: u64,
}

impl BatchAccumulator {
    /// Creates an accumulator. `routes` maps [`Signal::index`] to the
    /// exporters accepting that signal.
    ///
    /// [`Signal::index`]: shared::models::Signal::index
    #[must_use]
    pub fn new(routes: [ExporterSet; 3], max_size: usize, max_wait: Duration) -> Self {
        Self {
            routes,
            max_size: max_size.max(1),
            max_wait,
            pending: Vec::new(),
            next_id: 1,
        }
    }

    /// Creates an accumulator from `[processors.batch]`.
    #[must_use]
    pub fn from_config(routes: [ExporterSet; 3], config: &BatchConfig) -> Self {
        Self::new(routes, config.send_batch_size, config.timeout())
    }

    /// Adds one record received at `now`.
    pub fn push(&mut self, record: TelemetryRecord, now: Instant) -> Pushed {
        let destinations = self.routes[record.signal().index()];
        if destinations.is_empty() {
            return Pushed::Unrouted;
        }

        let position = match self
            .pending
            .iter()
            .position(|p| p.destinations == destinations)
        {
            Some(position) => position,
            None => {
                self.pending.push(PendingBatch {
                    destinations,
                    created_at: Utc::now(),
                    opened: now,
                    records: Vec::with_capacity(self.max_size.min(1024)),
                });
                self.pending.len() - 1
            }
        };

        self.pending[position].records.push(record);
        if self.pending[position].records.len() >= self.max_size {
            let full = self.pending.remove(position);
            return Pushed::Full(self.seal(full));
        }
        Pushed::Buffered
    }

    /// Removes and returns every partial batch whose age reached the
    /// maximum wait at `now`.
    pub fn expired(&mut self, now: Instant) -> Vec<Batch> {
        let mut expired = Vec::new();
        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].opened + self.max_wait <= now {
                let pending = self.pending.remove(index);
                expired.push(self.seal(pending));
            } else {
                index += 1;
            }
        }
        expired
    }

    /// Earliest instant at which a partial batch expires.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .iter()
            .map(|p| p.opened + self.max_wait)
            .min()
    }

    /// Removes and returns every partial batch, oldest first.
    pub fn drain(&mut self) -> Vec<Batch> {
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(|p| p.opened);
        pending.into_iter().map(|p| self.seal(p)).collect()
    }

    /// Number of buffered records.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.iter().map(|p| p.records.len()).sum()
    }

    fn seal(&mut self, pending: PendingBatch) -> Batch {
        let id = self.next_id;
        self.next_id += 1;
        Batch::new(id, pending.created_at, pending.destinations, pending.records)
    }
}

/// Handle to the batcher task.
pub struct BatcherHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join_handle: JoinHandle<()>,
}

impl BatcherHandle {
    /// Stops the batcher and waits for it to finish.
    ///
    /// The batcher closes the ingress queue, drains units already enqueued,
    /// flushes every partial batch, then closes the export queue.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.join_handle.await {
            tracing::error!(error = %e, "Batcher task failed");
        }
    }

    /// Aborts the batcher without flushing.
    pub fn abort(self) {
        self.join_handle.abort();
    }
}

struct Batcher {
    accumulator: BatchAccumulator,
    enricher: Enricher,
    export_tx: mpsc::Sender<Batch>,
    stats: Arc<PipelineStats>,
}

impl Batcher {
    async fn accept(&mut self, mut records: Vec<TelemetryRecord>) {
        self.enricher.apply(&mut records);
        let now = Instant::now();
        let mut unrouted = 0;
        for record in records {
            match self.accumulator.push(record, now) {
                Pushed::Buffered => {}
                Pushed::Full(batch) => self.emit(batch).await,
                Pushed::Unrouted => unrouted += 1,
            }
        }
        if unrouted > 0 {
            self.stats.record_unrouted(unrouted);
            tracing::debug!(records = unrouted, "Dropped records with no exporter route");
        }
    }

    async fn emit(&mut self, batch: Batch) {
        self.stats.record_batch();
        tracing::debug!(
            batch_id = batch.id(),
            records = batch.len(),
            destinations = batch.destinations().len(),
            "Batch ready"
        );
        if let Err(e) = self.export_tx.send(batch).await {
            let batch = e.0;
            tracing::error!(
                batch_id = batch.id(),
                records = batch.len(),
                "Export queue closed, dropping batch"
            );
        }
    }

    async fn flush_expired(&mut self) {
        for batch in self.accumulator.expired(Instant::now()) {
            self.emit(batch).await;
        }
    }

    async fn flush_all(&mut self) {
        for batch in self.accumulator.drain() {
            self.emit(batch).await;
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Spawns the batcher task.
///
/// Batches go to `export_tx` in creation order. The export queue is closed
/// when the task ends.
pub fn spawn_batcher(
    accumulator: BatchAccumulator,
    enricher: Enricher,
    mut ingress_rx: IngressReceiver,
    export_tx: mpsc::Sender<Batch>,
    stats: Arc<PipelineStats>,
) -> BatcherHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let join_handle = tokio::spawn(async move {
        let mut batcher = Batcher {
            accumulator,
            enricher,
            export_tx,
            stats,
        };
        tracing::info!(
            max_size = batcher.accumulator.max_size,
            max_wait_ms = batcher.accumulator.max_wait.as_millis(),
            "Starting batcher"
        );

        loop {
            let deadline = batcher.accumulator.next_deadline();
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => {
                    tracing::info!("Shutdown signal received, draining ingress queue");
                    break;
                }
                unit = ingress_rx.recv() => match unit {
                    Some(records) => batcher.accept(records).await,
                    None => break,
                },
                () = sleep_until(deadline) => batcher.flush_expired().await,
            }
        }

        ingress_rx.close();
        while let Some(records) = ingress_rx.recv().await {
            batcher.accept(records).await;
        }
        batcher.flush_all().await;

        tracing::info!("Batcher stopped");
    });

    BatcherHandle {
        shutdown_tx: Some(shutdown_tx),
        join_handle,
    }
}
