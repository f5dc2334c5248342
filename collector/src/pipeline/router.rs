//! Exporter router: delivers batches to their destination sinks.

use crate::metrics::PipelineStats;
use shared::config::{ConfigError, PipelineConfig};
use shared::export::{deliver_with_retry, Exporter, RetryPolicy, Sink};
use shared::models::Batch;
use shared::otlp::{encode_records, ExportRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinHandle, JoinSet};

struct Route<E> {
    sink: Arc<E>,
    policy: RetryPolicy,
}

/// Dispatches each batch to every sink in its destination set.
///
/// Sinks are addressed by their position in the exporter list.
pub struct Router<E: Exporter> {
    routes: Vec<Route<E>>,
    stats: Arc<PipelineStats>,
}

impl Router<Sink> {
    /// Builds one sink per `[[exporters]]` entry.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a sink cannot be built from its entry.
    pub fn from_config(
        config: &PipelineConfig,
        stats: Arc<PipelineStats>,
    ) -> Result<Self, ConfigError> {
        let sinks = config
            .exporters
            .iter()
            .map(|exporter| {
                Ok((
                    Sink::from_config(exporter)?,
                    RetryPolicy::from_config(&exporter.retry, exporter.timeout()),
                ))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self::new(sinks, stats))
    }
}

impl<E: Exporter> Router<E> {
    /// Creates a router over `(sink, policy)` pairs in exporter order.
    #[must_use]
    pub fn new(sinks: Vec<(E, RetryPolicy)>, stats: Arc<PipelineStats>) -> Self {
        Self {
            routes: sinks
                .into_iter()
                .map(|(sink, policy)| Route {
                    sink: Arc::new(sink),
                    policy,
                })
                .collect(),
            stats,
        }
    }

    /// Number of sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if the router has no sinks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Delivers `batch` to every destination concurrently and waits until
    /// each destination has a final result.
    ///
    /// Failures are logged and counted per sink; they never propagate.
    pub async fn dispatch(&self, batch: Batch) {
        let batch = Arc::new(batch);
        let requests: Arc<[ExportRequest]> = encode_records(batch.records()).into();
        let mut deliveries = JoinSet::new();

        for index in batch.destinations().iter() {
            let Some(route) = self.routes.get(index) else {
                tracing::error!(
                    batch_id = batch.id(),
                    exporter_index = index,
                    "Batch routed to unknown exporter"
                );
                continue;
            };
            let sink = Arc::clone(&route.sink);
            let policy = route.policy;
            let batch = Arc::clone(&batch);
            let requests = Arc::clone(&requests);
            let stats = Arc::clone(&self.stats);

            deliveries.spawn(async move {
                deliver_batch(index, sink.as_ref(), &policy, &batch, &requests, &stats).await;
            });
        }

        while let Some(joined) = deliveries.join_next().await {
            if let Err(e) = joined {
                tracing::error!(batch_id = batch.id(), error = %e, "Delivery task failed");
            }
        }
    }
}

async fn deliver_batch<E: Exporter>(
    index: usize,
    sink: &E,
    policy: &RetryPolicy,
    batch: &Batch,
    requests: &[ExportRequest],
    stats: &PipelineStats,
) {
    let sink_stats = stats.sink(index);
    let mut failed_items = 0;

    for request in requests {
        let delivery = deliver_with_retry(policy, || sink.export(request)).await;
        if let Some(sink_stats) = sink_stats {
            sink_stats.record_retries(delivery.retries());
        }

        match delivery.result {
            Ok(ack) if ack.is_partial() => {
                tracing::warn!(
                    exporter = sink.name(),
                    batch_id = batch.id(),
                    signal = %request.signal(),
                    rejected = ack.rejected,
                    message = ack.message.as_deref().unwrap_or_default(),
                    "Backend rejected part of the export"
                );
                if let Some(sink_stats) = sink_stats {
                    sink_stats.record_partial(ack.rejected);
                }
            }
            Ok(_) => {}
            Err(e) => {
                failed_items += request.item_count();
                tracing::error!(
                    exporter = sink.name(),
                    batch_id = batch.id(),
                    batch_size = batch.len(),
                    signal = %request.signal(),
                    attempts = delivery.attempts,
                    error = %e,
                    "Dropping export after failure"
                );
            }
        }
    }

    if let Some(sink_stats) = sink_stats {
        if failed_items == 0 {
            sink_stats.record_exported(batch.len());
        } else {
            sink_stats.record_failed(failed_items);
        }
    }
}

/// Export worker tasks consuming the export queue.
pub struct ExportWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl ExportWorkers {
    /// Waits for the workers to deliver everything left in the queue.
    ///
    /// Workers still running after `timeout` are aborted. Returns false if
    /// any had to be aborted.
    pub async fn join(self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut clean = true;
        for mut handle in self.handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Export worker failed");
                    clean = false;
                }
                Err(_) => {
                    handle.abort();
                    clean = false;
                }
            }
        }
        if !clean {
            tracing::warn!(
                timeout_ms = timeout.as_millis(),
                "Export workers did not finish cleanly, pending batches were dropped"
            );
        }
        clean
    }
}

/// Spawns `count` workers that dispatch batches from `export_rx`.
///
/// With a single worker, batches reach each sink in the order they were
/// queued. Workers stop when the queue is closed and empty.
pub fn spawn_export_workers<E: Exporter>(
    router: Arc<Router<E>>,
    export_rx: mpsc::Receiver<Batch>,
    count: usize,
) -> ExportWorkers {
    let export_rx = Arc::new(Mutex::new(export_rx));
    let handles = (0..count.max(1))
        .map(|worker| {
            let router = Arc::clone(&router);
            let export_rx = Arc::clone(&export_rx);
            tokio::spawn(async move {
                tracing::debug!(worker, "Export worker started");
                loop {
                    let next = export_rx.lock().await.recv().await;
                    let Some(batch) = next else { break };
                    router.dispatch(batch).await;
                }
                tracing::debug!(worker, "Export worker stopped");
            })
        })
        .collect();
    ExportWorkers { handles }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::export::{ExportAck, ExportError, ExportResult};
    use shared::models::{Attributes, ExporterSet, MetricRecord, Resource, Scope, TelemetryRecord};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls with `error`, then succeeds.
    struct ScriptedSink {
        name: String,
        failures: u32,
        error: ExportError,
        calls: Arc<AtomicU32>,
    }

    impl Exporter for ScriptedSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn export(&self, _request: &ExportRequest) -> ExportResult {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err(self.error.clone())
            } else {
                Ok(ExportAck::full())
            }
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            attempt_timeout: Duration::from_secs(1),
        }
    }

    fn batch(id: u64, destinations: ExporterSet, records: usize) -> Batch {
        let resource = Arc::new(Resource::default());
        let scope = Arc::new(Scope::default());
        let records = (0..records)
            .map(|i| {
                TelemetryRecord::metric_now(
                    MetricRecord::gauge_int("n", i64::try_from(i).unwrap()),
                    Attributes::new(),
                    Arc::clone(&resource),
                    Arc::clone(&scope),
                )
            })
            .collect();
        Batch::new(id, Utc::now(), destinations, records)
    }

    fn sink(name: &str, failures: u32, error: ExportError) -> (ScriptedSink, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            ScriptedSink {
                name: name.to_string(),
                failures,
                error,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    #[tokio::test]
    async fn test_retryable_failure_is_retried_once() {
        let stats = Arc::new(PipelineStats::new(["primary", "broken"]));
        let (primary, primary_calls) =
            sink("primary", 1, ExportError::Retryable("unavailable".into()));
        let (broken, broken_calls) =
            sink("broken", u32::MAX, ExportError::Permanent("bad request".into()));
        let router = Router::new(vec![(primary, policy()), (broken, policy())], Arc::clone(&stats));

        router
            .dispatch(batch(1, [0, 1].into_iter().collect(), 5))
            .await;

        assert_eq!(primary_calls.load(Ordering::SeqCst), 2);
        assert_eq!(broken_calls.load(Ordering::SeqCst), 1);
        let primary = stats.sink(0).unwrap();
        assert_eq!(primary.batches_exported(), 1);
        assert_eq!(primary.retries(), 1);
        let broken = stats.sink(1).unwrap();
        assert_eq!(broken.batches_failed(), 1);
        assert_eq!(broken.batches_exported(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_drop_batch() {
        let stats = Arc::new(PipelineStats::new(["down"]));
        let (down, calls) = sink("down", u32::MAX, ExportError::Retryable("refused".into()));
        let router = Router::new(vec![(down, policy())], Arc::clone(&stats));

        router.dispatch(batch(1, ExporterSet::empty().with(0), 2)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats.sink(0).unwrap().batches_failed(), 1);
        assert_eq!(stats.sink(0).unwrap().retries(), 2);
    }

    #[tokio::test]
    async fn test_only_destinations_receive_batch() {
        let stats = Arc::new(PipelineStats::new(["a", "b"]));
        let (a, a_calls) = sink("a", 0, ExportError::Permanent(String::new()));
        let (b, b_calls) = sink("b", 0, ExportError::Permanent(String::new()));
        let router = Router::new(vec![(a, policy()), (b, policy())], stats);

        router.dispatch(batch(1, ExporterSet::empty().with(1), 3)).await;

        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_workers_drain_queue_then_stop() {
        let stats = Arc::new(PipelineStats::new(["a"]));
        let (a, calls) = sink("a", 0, ExportError::Permanent(String::new()));
        let router = Arc::new(Router::new(vec![(a, policy())], Arc::clone(&stats)));
        let (tx, rx) = mpsc::channel(4);

        let workers = spawn_export_workers(router, rx, 2);
        for id in 1..=3 {
            tx.send(batch(id, ExporterSet::empty().with(0), 1)).await.unwrap();
        }
        drop(tx);

        assert!(workers.join(Duration::from_secs(5)).await);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats.sink(0).unwrap().batches_exported(), 3);
    }
}
