//! Sweep loop
//!
//! Ticks on a fixed interval and runs one deadline sweep per tick. A
//! failed pass is logged and the loop keeps going; per-campaign failures
//! are already isolated inside the core's sweep.

use crate::{Result, SweepConfig};
use chrono::Utc;
use funding_core::{FundingEngine, SweepReport};
use std::sync::Arc;
use tracing::{info, warn};

/// Periodic deadline sweeper
#[derive(Debug)]
pub struct Sweeper {
    engine: Arc<FundingEngine>,
    config: SweepConfig,
}

impl Sweeper {
    /// Build a sweeper over an engine.
    pub fn new(engine: Arc<FundingEngine>, config: SweepConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { engine, config })
    }

    /// Run one sweep pass now.
    pub fn sweep_once(&self) -> Result<SweepReport> {
        let report = self.engine.deadline_sweep_at(Utc::now())?;
        if report.examined > 0 {
            info!(
                examined = report.examined,
                locked = report.locked,
                refunded = report.refunded,
                failures = report.failures.len(),
                "sweep pass complete"
            );
        }
        Ok(report)
    }

    /// Run the loop until the task is dropped.
    pub async fn run(self: Arc<Self>) {
        if !self.config.enabled {
            info!("sweeper disabled, not starting");
            return;
        }

        info!(interval_secs = self.config.interval_secs, "starting deadline sweeper");
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(self.config.interval_secs));

        loop {
            interval.tick().await;

            let sweeper = self.clone();
            let result = tokio::task::spawn_blocking(move || sweeper.sweep_once()).await;
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!(error = %err, "sweep pass failed"),
                Err(err) => warn!(error = %err, "sweep task panicked"),
            }
        }
    }
}
