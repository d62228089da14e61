//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the funding engine.
//!
//! # Metrics
//!
//! - `funding_transfers_total` - Wallet/escrow transfers committed
//! - `funding_contributions_total` - Contributions recorded
//! - `funding_campaigns_funded_total` - Campaigns locked as funded
//! - `funding_campaigns_refunded_total` - Campaigns refunded
//! - `funding_royalty_payouts_total` - Royalty payouts credited
//! - `funding_ingest_duplicates_total` - Duplicate payment deliveries
//! - `funding_sweep_duration_seconds` - Histogram of sweep latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::fmt;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Wallet/escrow transfers committed
    pub transfers_total: IntCounter,

    /// Contributions recorded
    pub contributions_total: IntCounter,

    /// Campaigns locked as funded
    pub campaigns_funded_total: IntCounter,

    /// Campaigns refunded
    pub campaigns_refunded_total: IntCounter,

    /// Royalty payouts credited
    pub royalty_payouts_total: IntCounter,

    /// Duplicate payment deliveries observed
    pub ingest_duplicates_total: IntCounter,

    /// Sweep latency histogram
    pub sweep_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create a collector with its own registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transfers_total = IntCounter::with_opts(Opts::new(
            "funding_transfers_total",
            "Wallet/escrow transfers committed",
        ))?;
        registry.register(Box::new(transfers_total.clone()))?;

        let contributions_total = IntCounter::with_opts(Opts::new(
            "funding_contributions_total",
            "Contributions recorded",
        ))?;
        registry.register(Box::new(contributions_total.clone()))?;

        let campaigns_funded_total = IntCounter::with_opts(Opts::new(
            "funding_campaigns_funded_total",
            "Campaigns locked as funded",
        ))?;
        registry.register(Box::new(campaigns_funded_total.clone()))?;

        let campaigns_refunded_total = IntCounter::with_opts(Opts::new(
            "funding_campaigns_refunded_total",
            "Campaigns refunded",
        ))?;
        registry.register(Box::new(campaigns_refunded_total.clone()))?;

        let royalty_payouts_total = IntCounter::with_opts(Opts::new(
            "funding_royalty_payouts_total",
            "Royalty payouts credited",
        ))?;
        registry.register(Box::new(royalty_payouts_total.clone()))?;

        let ingest_duplicates_total = IntCounter::with_opts(Opts::new(
            "funding_ingest_duplicates_total",
            "Duplicate payment deliveries observed",
        ))?;
        registry.register(Box::new(ingest_duplicates_total.clone()))?;

        let sweep_duration = Histogram::with_opts(
            HistogramOpts::new(
                "funding_sweep_duration_seconds",
                "Histogram of sweep latencies",
            )
            .buckets(vec![0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5]),
        )?;
        registry.register(Box::new(sweep_duration.clone()))?;

        Ok(Self {
            transfers_total,
            contributions_total,
            campaigns_funded_total,
            campaigns_refunded_total,
            royalty_payouts_total,
            ingest_duplicates_total,
            sweep_duration,
            registry,
        })
    }

    /// Record a committed transfer.
    pub fn record_transfer(&self) {
        self.transfers_total.inc();
    }

    /// Record a recorded contribution.
    pub fn record_contribution(&self) {
        self.contributions_total.inc();
        self.transfers_total.inc();
    }

    /// Record a campaign locking as funded.
    pub fn record_campaign_funded(&self) {
        self.campaigns_funded_total.inc();
    }

    /// Record a campaign refund.
    pub fn record_campaign_refunded(&self) {
        self.campaigns_refunded_total.inc();
    }

    /// Record credited royalty payouts.
    pub fn record_royalty_payouts(&self, count: usize) {
        self.royalty_payouts_total.inc_by(count as u64);
    }

    /// Record a duplicate payment delivery.
    pub fn record_ingest_duplicate(&self) {
        self.ingest_duplicates_total.inc();
    }

    /// Record a sweep duration.
    pub fn record_sweep_duration(&self, duration_seconds: f64) {
        self.sweep_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.transfers_total.get(), 0);
        assert_eq!(metrics.contributions_total.get(), 0);
    }

    #[test]
    fn test_record_contribution_counts_transfer() {
        let metrics = Metrics::new().unwrap();
        metrics.record_contribution();
        assert_eq!(metrics.contributions_total.get(), 1);
        assert_eq!(metrics.transfers_total.get(), 1);
    }

    #[test]
    fn test_record_royalty_payouts() {
        let metrics = Metrics::new().unwrap();
        metrics.record_royalty_payouts(3);
        assert_eq!(metrics.royalty_payouts_total.get(), 3);
    }

    #[test]
    fn test_independent_registries() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.record_transfer();
        assert_eq!(second.transfers_total.get(), 0);
    }
}
