//! Beacon CLI
//!
//! Command-line interface for operating the Beacon collector.
//!
//! # Usage
//!
//! ```bash
//! beacon --help
//! beacon health
//! beacon validate-config beacon.toml
//! OTEL_SERVICE_NAME=demo beacon demo --iterations 5
//! ```

#![deny(unsafe_code)]

mod demo;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use shared::config::PipelineConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Beacon CLI - telemetry collector command-line interface
#[derive(Parser)]
#[command(name = "beacon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Collector health listener URL
    #[arg(
        short = 'u',
        long,
        env = "BEACON_HEALTH_URL",
        default_value = "http://localhost:13133"
    )]
    health_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check collector health
    Health,

    /// Print pipeline counters
    Stats,

    /// Parse and validate a pipeline configuration file
    ValidateConfig {
        /// Path to the configuration file
        path: PathBuf,
    },

    /// Send demo telemetry using the OTEL_* client environment
    Demo {
        /// Number of iterations to send
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: u64,

        /// Milliseconds between iterations
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

async fn check_health(base_url: &str) -> Result<HealthResponse> {
    let url = format!("{}/health", base_url.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("collector unreachable at {url}"))?;
    if !response.status().is_success() {
        bail!("health check returned HTTP {}", response.status());
    }
    Ok(response.json().await?)
}

async fn fetch_stats(base_url: &str) -> Result<serde_json::Value> {
    let url = format!("{}/stats", base_url.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("collector unreachable at {url}"))?
        .error_for_status()?;
    Ok(response.json().await?)
}

fn validate_config(path: &Path) -> Result<String> {
    let config = PipelineConfig::from_file(path)?;
    let receivers = [
        config.receivers.otlp_grpc.enabled.then_some("otlp_grpc"),
        config.receivers.otlp_http.enabled.then_some("otlp_http"),
        config.receivers.hostmetrics.enabled.then_some("hostmetrics"),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ");
    let exporters = config
        .exporters
        .iter()
        .map(|e| format!("{} ({})", e.name, e.kind))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "{} is valid\n  receivers: {receivers}\n  exporters: {exporters}",
        path.display()
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Health) => {
            let health = check_health(&cli.health_url).await?;
            println!("{} {} v{}", health.service, health.status, health.version);
        }
        Some(Commands::Stats) => {
            let stats = fetch_stats(&cli.health_url).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Some(Commands::ValidateConfig { path }) => {
            println!("{}", validate_config(&path)?);
        }
        Some(Commands::Demo {
            iterations,
            interval_ms,
        }) => {
            demo::run(iterations, Duration::from_millis(interval_ms)).await?;
        }
        None => {
            println!("Beacon CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
