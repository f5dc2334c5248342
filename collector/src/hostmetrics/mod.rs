//! Host metrics sampler.
//!
//! On every tick each enabled scraper reads one family of host counters. The
//! resulting points are tagged with the process resource and enqueued as one
//! unit. A failing scraper is skipped for that tick; the loop keeps going.

pub mod diskstats;
pub mod scrapers;

use crate::metrics::PipelineStats;
use crate::pipeline::{Ingress, IngressError};
use scrapers::Point;
use shared::config::{HostMetricsConfig, ScraperKind};
use shared::models::{now_unix_nano, RecordBody, Resource, Scope, TelemetryRecord};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Instrumentation scope name of sampled points.
pub const SCOPE_NAME: &str = "beacon/hostmetrics";

/// Why a scraper produced nothing this tick.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The platform does not expose these statistics.
    #[error("{0} not supported on this platform")]
    Unsupported(&'static str),

    /// A statistics file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Samples host counters into metric records.
pub struct HostSampler {
    system: System,
    scrapers: Vec<ScraperKind>,
    diskstats_path: PathBuf,
    resource: Arc<Resource>,
    scope: Arc<Scope>,
    stats: Arc<PipelineStats>,
}

impl HostSampler {
    /// Creates a sampler for the configured scrapers.
    #[must_use]
    pub fn new(
        config: &HostMetricsConfig,
        resource: Arc<Resource>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        let mut system = System::new();
        // CPU usage is a delta between two refreshes; take the baseline now.
        system.refresh_cpu_usage();
        Self {
            system,
            scrapers: config.scrapers.clone(),
            diskstats_path: config.diskstats_path.clone(),
            resource,
            scope: Arc::new(Scope::named(SCOPE_NAME).with_version(env!("CARGO_PKG_VERSION"))),
            stats,
        }
    }

    fn scrape(&mut self, kind: ScraperKind) -> Result<Vec<Point>, ScrapeError> {
        match kind {
            ScraperKind::Cpu => scrapers::cpu(&mut self.system),
            ScraperKind::Memory => scrapers::memory(&mut self.system),
            ScraperKind::Disk => scrapers::disk(&self.diskstats_path),
            ScraperKind::Filesystem => scrapers::filesystem(),
            ScraperKind::Network => scrapers::network(),
            ScraperKind::Load => scrapers::load(),
            ScraperKind::Processes => scrapers::processes(&mut self.system),
        }
    }

    /// Runs every enabled scraper once.
    pub fn sample(&mut self) -> Vec<TelemetryRecord> {
        let timestamp = now_unix_nano();
        let mut records = Vec::new();

        for kind in self.scrapers.clone() {
            match self.scrape(kind) {
                Ok(points) => {
                    records.extend(points.into_iter().map(|(metric, attributes)| {
                        TelemetryRecord::new(
                            timestamp,
                            RecordBody::Metric(metric),
                            attributes,
                            Arc::clone(&self.resource),
                            Arc::clone(&self.scope),
                        )
                    }));
                }
                Err(e) => {
                    self.stats.record_scrape_error();
                    tracing::warn!(scraper = %kind, error = %e, "Scraper failed, skipping this tick");
                }
            }
        }
        records
    }
}

/// Handle to the sampler task.
pub struct SamplerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join_handle: JoinHandle<()>,
}

impl SamplerHandle {
    /// Stops the sampler and waits for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.join_handle.await {
            tracing::error!(error = %e, "Host metrics sampler failed");
        }
    }
}

/// Spawns the sampling loop.
///
/// The first sample is taken one `interval` after start.
pub fn spawn_sampler(
    mut sampler: HostSampler,
    ingress: Ingress,
    interval: Duration,
) -> SamplerHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let join_handle = tokio::spawn(async move {
        tracing::info!(
            interval_secs = interval.as_secs(),
            scrapers = sampler.scrapers.len(),
            "Starting host metrics sampler"
        );
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    let records = sampler.sample();
                    let count = records.len();
                    match ingress.enqueue(records).await {
                        Ok(()) => tracing::debug!(records = count, "Host metrics sampled"),
                        Err(IngressError::Backpressure) => {
                            tracing::warn!(records = count, "Ingress queue full, dropping host metrics tick");
                        }
                        Err(IngressError::Closed) => break,
                    }
                }
            }
        }

        tracing::info!("Host metrics sampler stopped");
    });

    SamplerHandle {
        shutdown_tx: Some(shutdown_tx),
        join_handle,
    }
}
