//! Engine facade
//!
//! `FundingEngine` owns the store handle and wraps every operation in one
//! atomic unit: commit on success, full rollback on any error. The
//! transaction-level functions in the operation modules remain available
//! to callers (payment ingestion) that compose several effects into one
//! unit of their own.

use crate::{
    campaign::{self, CreateCampaignParams, SweepReport},
    escrow, queries, royalty,
    types::{
        Account, Campaign, Contribution, ContributionStatus, EntryRef, Escrow, RoyaltyPayout,
        RoyaltyReport, Wallet,
    },
    wallet, Amount, Config, Metrics, Result, Store,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// High-level interface over the accounting core
#[derive(Debug, Clone)]
pub struct FundingEngine {
    store: Arc<Store>,
    metrics: Option<Metrics>,
}

impl FundingEngine {
    /// Open the store and build an engine.
    pub fn open(config: Config) -> Result<Self> {
        let store = Arc::new(Store::open(&config)?);
        Ok(Self::with_store(store))
    }

    /// Build an engine over an already-open store.
    pub fn with_store(store: Arc<Store>) -> Self {
        Self {
            store,
            metrics: None,
        }
    }

    /// Attach a metrics collector.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The underlying store handle.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    // Wallet operations

    /// Provision a wallet for a user.
    pub fn create_wallet(&self, user_id: &str) -> Result<Wallet> {
        self.store.with_txn(|txn| wallet::create_wallet(txn, user_id))
    }

    /// Credit a wallet from a boundary or escrow account.
    pub fn credit_wallet(
        &self,
        user_id: &str,
        amount: Amount,
        source: Account,
        reference: EntryRef,
    ) -> Result<Wallet> {
        let wallet = self
            .store
            .with_txn(|txn| wallet::credit_wallet(txn, user_id, amount, source, reference))?;
        if let Some(metrics) = &self.metrics {
            metrics.record_transfer();
        }
        Ok(wallet)
    }

    /// Current wallet balance.
    pub fn wallet_balance(&self, user_id: &str) -> Result<Amount> {
        queries::wallet_balance(&self.store, user_id)
    }

    // Campaign operations

    /// Create a DRAFT campaign with its escrow (and slices, when capped).
    pub fn create_campaign(&self, params: CreateCampaignParams) -> Result<Campaign> {
        self.store.with_txn(|txn| campaign::create_campaign(txn, params))
    }

    /// `DRAFT → LIVE`.
    pub fn publish_campaign(&self, campaign_id: Uuid) -> Result<Campaign> {
        self.store
            .with_txn(|txn| campaign::publish_campaign(txn, campaign_id, Utc::now()))
    }

    /// Pledge to a LIVE campaign.
    pub fn contribute(
        &self,
        campaign_id: Uuid,
        user_id: &str,
        amount: Amount,
    ) -> Result<Contribution> {
        let contribution = self
            .store
            .with_txn(|txn| campaign::contribute(txn, campaign_id, user_id, amount))?;
        if let Some(metrics) = &self.metrics {
            metrics.record_contribution();
        }
        Ok(contribution)
    }

    /// Lock funding if the goal is met; `false` when already funded.
    pub fn check_and_lock_funding(&self, campaign_id: Uuid) -> Result<bool> {
        let locked = self
            .store
            .with_txn(|txn| campaign::check_and_lock_funding(txn, campaign_id))?;
        if locked {
            if let Some(metrics) = &self.metrics {
                metrics.record_campaign_funded();
            }
        }
        Ok(locked)
    }

    /// Refund a LIVE campaign whose deadline has passed.
    pub fn refund_campaign(&self, campaign_id: Uuid) -> Result<usize> {
        self.refund_campaign_at(campaign_id, Utc::now())
    }

    /// Refund relative to an explicit clock.
    pub fn refund_campaign_at(&self, campaign_id: Uuid, now: DateTime<Utc>) -> Result<usize> {
        let refunded = self
            .store
            .with_txn(|txn| campaign::refund_campaign(txn, campaign_id, now))?;
        if let Some(metrics) = &self.metrics {
            metrics.record_campaign_refunded();
        }
        Ok(refunded)
    }

    /// Pay the locked escrow out to the campaign owner.
    pub fn release_campaign_funds(&self, campaign_id: Uuid) -> Result<Amount> {
        self.store
            .with_txn(|txn| campaign::release_campaign_funds(txn, campaign_id))
    }

    /// `FUNDED → COMPLETED`.
    pub fn complete_campaign(&self, campaign_id: Uuid) -> Result<Campaign> {
        self.store
            .with_txn(|txn| campaign::complete_campaign(txn, campaign_id))
    }

    /// Whether deletion is currently permitted.
    pub fn can_delete_campaign(&self, campaign_id: Uuid) -> Result<bool> {
        self.store
            .with_txn(|txn| campaign::can_delete_campaign(txn, campaign_id))
    }

    /// Delete a DRAFT campaign with an empty escrow.
    pub fn delete_campaign(&self, campaign_id: Uuid) -> Result<()> {
        self.store
            .with_txn(|txn| campaign::delete_campaign(txn, campaign_id))
    }

    /// Resolve every LIVE campaign whose deadline has passed.
    pub fn deadline_sweep(&self) -> Result<SweepReport> {
        self.deadline_sweep_at(Utc::now())
    }

    /// Sweep relative to an explicit clock.
    pub fn deadline_sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let started = Instant::now();
        let report = campaign::deadline_sweep(&self.store, now)?;
        if let Some(metrics) = &self.metrics {
            metrics.record_sweep_duration(started.elapsed().as_secs_f64());
            for _ in 0..report.locked {
                metrics.record_campaign_funded();
            }
            for _ in 0..report.refunded {
                metrics.record_campaign_refunded();
            }
        }
        Ok(report)
    }

    // Escrow lifecycle

    /// `RELEASED → SETTLED` after a release paid out.
    pub fn settle_escrow(&self, escrow_id: Uuid) -> Result<Escrow> {
        self.store.with_txn(|txn| escrow::settle_escrow(txn, escrow_id))
    }

    /// Reconcile an escrow's stored amount against the ledger.
    pub fn verify_escrow_backing(&self, escrow_id: Uuid) -> Result<Escrow> {
        self.store
            .with_txn(|txn| escrow::verify_escrow_backing(txn, escrow_id))
    }

    // Royalty operations

    /// Create a PENDING royalty report.
    pub fn create_royalty_report(
        &self,
        campaign_id: Uuid,
        total_revenue: Amount,
    ) -> Result<RoyaltyReport> {
        self.store
            .with_txn(|txn| royalty::create_report(txn, campaign_id, total_revenue))
    }

    /// Run the payouts for a PENDING report.
    pub fn payout_royalties(&self, report_id: Uuid) -> Result<Vec<RoyaltyPayout>> {
        let payouts = self.store.with_txn(|txn| royalty::payout(txn, report_id))?;
        if let Some(metrics) = &self.metrics {
            metrics.record_royalty_payouts(payouts.len());
        }
        Ok(payouts)
    }

    // Read-side views

    /// Campaign joined with funding and slice state.
    pub fn campaign_overview(&self, campaign_id: Uuid) -> Result<Option<queries::CampaignOverview>> {
        queries::campaign_overview(&self.store, campaign_id)
    }

    /// List campaigns, filtered and paged.
    pub fn list_campaigns(&self, filter: &queries::CampaignFilter) -> Result<Vec<Campaign>> {
        queries::list_campaigns(&self.store, filter)
    }

    /// Per-contributor totals for a campaign.
    pub fn campaign_contributors(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<queries::ContributorTotal>> {
        queries::campaign_contributors(&self.store, campaign_id)
    }

    /// A user's contributions, newest first.
    pub fn user_contributions(
        &self,
        user_id: &str,
        status: Option<ContributionStatus>,
    ) -> Result<Vec<Contribution>> {
        queries::user_contributions(&self.store, user_id, status)
    }

    /// Sum of a user's live pledges to one campaign.
    pub fn user_contribution_total(&self, user_id: &str, campaign_id: Uuid) -> Result<Amount> {
        queries::user_contribution_total(&self.store, user_id, campaign_id)
    }

    /// Slice configuration for a campaign.
    pub fn campaign_slice_stats(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<crate::types::CampaignSlices>> {
        queries::campaign_slice_stats(&self.store, campaign_id)
    }

    /// A user's slice positions across campaigns.
    pub fn user_portfolio(&self, user_id: &str) -> Result<Vec<queries::OwnershipSummary>> {
        queries::user_portfolio(&self.store, user_id)
    }

    /// A user's slice position in one campaign.
    pub fn user_campaign_ownership(
        &self,
        user_id: &str,
        campaign_id: Uuid,
    ) -> Result<queries::OwnershipSummary> {
        queries::user_campaign_ownership(&self.store, user_id, campaign_id)
    }

    /// Royalty reports for a campaign.
    pub fn royalty_reports(&self, campaign_id: Uuid) -> Result<Vec<RoyaltyReport>> {
        queries::royalty_reports(&self.store, campaign_id)
    }

    /// Payouts for one report.
    pub fn report_payouts(&self, report_id: Uuid) -> Result<Vec<RoyaltyPayout>> {
        queries::report_payouts(&self.store, report_id)
    }

    /// A user's royalty payouts with their lifetime total.
    pub fn user_royalty_history(&self, user_id: &str) -> Result<queries::RoyaltyHistory> {
        queries::user_royalty_history(&self.store, user_id)
    }

    /// Whether a payment event was already applied.
    pub fn is_payment_processed(&self, payment_id: &str) -> Result<bool> {
        queries::is_payment_processed(&self.store, payment_id)
    }
}
