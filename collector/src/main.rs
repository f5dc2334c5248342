//! Beacon Collector Binary
//!
//! Entry point for the Beacon telemetry collector.

#![deny(unsafe_code)]

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Beacon telemetry collector
#[derive(Parser, Debug)]
#[command(name = "beacon-collector")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the pipeline configuration file
    #[arg(short, long, env = "BEACON_CONFIG", default_value = "beacon.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, env = "BEACON_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if cli.log_format == LogFormat::Json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    collector::run(&cli.config).await
}
