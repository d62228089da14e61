//! Sweeper daemon
//!
//! Opens the store, wires metrics and logging, and runs the sweep loop.

use anyhow::Context;
use deadline_sweeper::{SweepConfig, Sweeper};
use funding_core::{Config, FundingEngine, Metrics};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match std::env::var("FUNDING_CONFIG") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => Config::from_env().context("loading config from environment")?,
    };

    let sweep_config = match std::env::var("SWEEP_INTERVAL_SECS") {
        Ok(secs) => SweepConfig {
            interval_secs: secs.parse().context("parsing SWEEP_INTERVAL_SECS")?,
            ..Default::default()
        },
        Err(_) => SweepConfig::default(),
    };

    let metrics = Metrics::new().context("creating metrics")?;
    let engine = Arc::new(
        FundingEngine::open(config)
            .context("opening store")?
            .with_metrics(metrics),
    );

    let sweeper = Arc::new(Sweeper::new(engine, sweep_config)?);
    sweeper.run().await;

    Ok(())
}
