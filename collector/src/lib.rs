//! Beacon Collector
//!
//! This crate provides the collector process of the Beacon telemetry
//! pipeline. It receives OTLP metrics, logs, and traces, enriches them with
//! host resource attributes, batches them, and routes the batches to the
//! configured OTLP backends.
//!
//! # Architecture
//!
//! The collector is built on Tokio, with Axum for HTTP and Tonic for gRPC:
//! - OTLP/gRPC and OTLP/HTTP receivers decode requests into records
//! - A host metrics sampler produces records on a fixed interval
//! - A bounded ingress queue feeds a single batcher task
//! - Export workers deliver batches to sinks with retry
//!
//! # Example
//!
//! ```no_run
//! use collector::run;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run("beacon.toml").await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod grpc;
pub mod hostmetrics;
pub mod metrics;
pub mod pipeline;
pub mod resource;
pub mod routes;
pub mod state;

pub use metrics::PipelineStats;
pub use state::AppState;

use anyhow::{Context, Result};
use axum::Router;
use grpc::ExportServer;
use hostmetrics::{spawn_sampler, HostSampler, SamplerHandle};
use pipeline::{
    spawn_batcher, spawn_export_workers, BatchAccumulator, BatcherHandle, Enricher,
    ExportWorkers, Ingress,
};
use shared::config::{PipelineConfig, PipelineSettings};
use shared::models::Resource;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tower_http::trace::TraceLayer;

/// Runs the collector with the configuration file at `path` until a shutdown
/// signal arrives.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or a listener cannot be
/// bound.
pub async fn run(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let config = PipelineConfig::from_file(path)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    run_with_config(config).await
}

/// Runs the collector with the provided configuration until a shutdown
/// signal arrives.
///
/// # Errors
///
/// Returns an error if startup fails.
pub async fn run_with_config(config: PipelineConfig) -> Result<()> {
    let collector = start(config).await?;
    shutdown_signal().await;
    collector.shutdown().await;
    Ok(())
}

/// Creates the OTLP/HTTP router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    routes::otlp_routes(state, max_body_bytes).layer(TraceLayer::new_for_http())
}

struct Server {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// A running collector.
pub struct Collector {
    grpc_addr: Option<SocketAddr>,
    http_addr: Option<SocketAddr>,
    health_addr: Option<SocketAddr>,
    resource: Arc<Resource>,
    stats: Arc<PipelineStats>,
    settings: PipelineSettings,
    stop_receivers: watch::Sender<bool>,
    stop_health: watch::Sender<bool>,
    receivers: Vec<Server>,
    health: Option<Server>,
    sampler: Option<SamplerHandle>,
    batcher: BatcherHandle,
    workers: ExportWorkers,
}

/// Starts every component described by `config` and returns once all
/// listeners are bound.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, a sink cannot be built,
/// or a listener cannot be bound.
pub async fn start(config: PipelineConfig) -> Result<Collector> {
    config.validate_config()?;

    let stats = Arc::new(PipelineStats::new(
        config.exporters.iter().map(|e| e.name.clone()),
    ));
    let resource = resource::resolve(
        &config.processors.resource_detection,
        &config.processors.resource,
    )
    .await;

    let router = Arc::new(pipeline::Router::from_config(&config, Arc::clone(&stats))?);
    let (export_tx, export_rx) = mpsc::channel(config.pipeline.export_queue_capacity);
    let workers = spawn_export_workers(router, export_rx, config.pipeline.export_workers);

    let (ingress, ingress_rx) = Ingress::bounded(
        config.pipeline.ingress_capacity,
        config.pipeline.enqueue_timeout(),
        Arc::clone(&stats),
    );
    let batcher = spawn_batcher(
        BatchAccumulator::from_config(config.routes(), &config.processors.batch),
        Enricher::new(Arc::clone(&resource), config.processors.resource.enabled),
        ingress_rx,
        export_tx,
        Arc::clone(&stats),
    );

    let sampler = config.receivers.hostmetrics.enabled.then(|| {
        let sampler = HostSampler::new(
            &config.receivers.hostmetrics,
            Arc::clone(&resource),
            Arc::clone(&stats),
        );
        spawn_sampler(sampler, ingress.clone(), config.receivers.hostmetrics.interval())
    });

    let state = AppState::new(ingress, Arc::clone(&resource), Arc::clone(&stats));
    let (stop_receivers, receivers_stopped) = watch::channel(false);
    let (stop_health, health_stopped) = watch::channel(false);
    let mut receivers = Vec::new();

    let grpc_addr = if config.receivers.otlp_grpc.enabled {
        let (addr, server) = serve_grpc(&config, state.clone(), receivers_stopped.clone()).await?;
        receivers.push(server);
        Some(addr)
    } else {
        None
    };

    let http_addr = if config.receivers.otlp_http.enabled {
        let app = create_router(state.clone(), config.receivers.otlp_http.max_request_body_bytes);
        let (addr, server) = serve_http(
            "otlp_http",
            config.receivers.otlp_http.endpoint,
            app,
            receivers_stopped.clone(),
        )
        .await?;
        receivers.push(server);
        Some(addr)
    } else {
        None
    };

    let (health_addr, health) = if config.health.enabled {
        let app = routes::health_routes(Arc::clone(&stats)).layer(TraceLayer::new_for_http());
        let (addr, server) = serve_http("health", config.health.endpoint, app, health_stopped).await?;
        (Some(addr), Some(server))
    } else {
        (None, None)
    };

    tracing::info!(
        grpc = ?grpc_addr,
        http = ?http_addr,
        health = ?health_addr,
        exporters = config.exporters.len(),
        "Beacon collector started"
    );

    Ok(Collector {
        grpc_addr,
        http_addr,
        health_addr,
        resource,
        stats,
        settings: config.pipeline.clone(),
        stop_receivers,
        stop_health,
        receivers,
        health,
        sampler,
        batcher,
        workers,
    })
}

fn stopped(mut stop: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _ = stop.wait_for(|stop| *stop).await;
    }
}

async fn serve_grpc(
    config: &PipelineConfig,
    state: AppState,
    stop: watch::Receiver<bool>,
) -> Result<(SocketAddr, Server)> {
    let grpc = &config.receivers.otlp_grpc;
    let listener = TcpListener::bind(grpc.endpoint)
        .await
        .with_context(|| format!("failed to bind OTLP/gRPC receiver on {}", grpc.endpoint))?;
    let addr = listener.local_addr()?;
    let max_size = grpc.max_recv_msg_size_bytes;

    let server = tonic::transport::Server::builder()
        .add_service(
            ExportServer::new(grpc::MetricsServiceImpl::new(state.clone()))
                .max_decoding_message_size(max_size),
        )
        .add_service(
            ExportServer::new(grpc::LogsServiceImpl::new(state.clone()))
                .max_decoding_message_size(max_size),
        )
        .add_service(
            ExportServer::new(grpc::TracesServiceImpl::new(state))
                .max_decoding_message_size(max_size),
        )
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), stopped(stop));

    tracing::info!(%addr, "OTLP/gRPC receiver listening");
    let handle = tokio::spawn(async move {
        if let Err(e) = server.await {
            tracing::error!(error = %e, "OTLP/gRPC receiver failed");
        }
    });
    Ok((addr, Server { name: "otlp_grpc", handle }))
}

async fn serve_http(
    name: &'static str,
    endpoint: SocketAddr,
    app: Router,
    stop: watch::Receiver<bool>,
) -> Result<(SocketAddr, Server)> {
    let listener = TcpListener::bind(endpoint)
        .await
        .with_context(|| format!("failed to bind {name} listener on {endpoint}"))?;
    let addr = listener.local_addr()?;

    tracing::info!(%addr, listener = name, "Listening for connections");
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(stopped(stop))
            .await
        {
            tracing::error!(listener = name, error = %e, "HTTP listener failed");
        }
    });
    Ok((addr, Server { name, handle }))
}

async fn stop_servers(servers: Vec<Server>, timeout: std::time::Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    for mut server in servers {
        if tokio::time::timeout_at(deadline, &mut server.handle)
            .await
            .is_err()
        {
            tracing::warn!(
                listener = server.name,
                timeout_ms = timeout.as_millis(),
                "Listener did not drain in time, aborting"
            );
            server.handle.abort();
        }
    }
}

impl Collector {
    /// Bound address of the OTLP/gRPC receiver.
    #[must_use]
    pub fn grpc_addr(&self) -> Option<SocketAddr> {
        self.grpc_addr
    }

    /// Bound address of the OTLP/HTTP receiver.
    #[must_use]
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    /// Bound address of the health listener.
    #[must_use]
    pub fn health_addr(&self) -> Option<SocketAddr> {
        self.health_addr
    }

    /// The process resource.
    #[must_use]
    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    /// Pipeline counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Shuts the pipeline down.
    ///
    /// Receivers stop accepting and drain in-flight requests, the sampler
    /// stops, the batcher flushes every partial batch, and the export workers
    /// deliver what is left within the shutdown timeout.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down collector");

        let _ = self.stop_receivers.send(true);
        stop_servers(self.receivers, self.settings.drain_timeout()).await;

        if let Some(sampler) = self.sampler {
            sampler.shutdown().await;
        }

        let shutdown_timeout = self.settings.shutdown_timeout();
        let deadline = tokio::time::Instant::now() + shutdown_timeout;
        if tokio::time::timeout_at(deadline, self.batcher.shutdown())
            .await
            .is_err()
        {
            tracing::warn!("Batcher did not flush before the shutdown timeout");
        }
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        self.workers.join(remaining).await;

        let _ = self.stop_health.send(true);
        if let Some(health) = self.health {
            stop_servers(vec![health], self.settings.drain_timeout()).await;
        }

        let snapshot = self.stats.snapshot();
        tracing::info!(
            records_accepted = snapshot.records_accepted,
            batches_created = snapshot.batches_created,
            "Collector shutdown complete"
        );
    }
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
