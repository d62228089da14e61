//! Idempotent ingestion protocol
//!
//! For each event: validate, take the TTL lock, then in one store
//! transaction insert the write-once dedup row and apply the business
//! effect. On commit the lock is left to expire — releasing it early
//! would open a window between the commit becoming visible and a racing
//! duplicate probing the dedup row. On any failure the transaction rolls
//! back and the lock is released so a legitimate retry can proceed.

use crate::{
    event::{PaymentEvent, PaymentKind},
    locks::LockService,
    Result,
};
use chrono::Utc;
use funding_core::{
    campaign, payments, types::ProcessedPayment, wallet, Account, EntryRef, Metrics,
    ReferenceKind, Store,
};
use std::fmt;
use std::sync::Arc;

/// Default dedup-lock TTL, matching the original gateway's five minutes.
pub const DEFAULT_LOCK_TTL_SECONDS: u64 = 300;

/// What handling an event amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Side effects applied by this delivery
    Processed,
    /// Another delivery already applied this payment; no-op
    Duplicate,
    /// Another handler holds the lock (or the lock service is down);
    /// silently declined
    InFlight,
}

/// Idempotent payment-event handler
pub struct Ingestor {
    store: Arc<Store>,
    locks: Arc<dyn LockService>,
    lock_ttl_seconds: u64,
    metrics: Option<Metrics>,
}

impl fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ingestor")
            .field("lock_ttl_seconds", &self.lock_ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl Ingestor {
    /// Build a handler over the store and a lock service.
    pub fn new(store: Arc<Store>, locks: Arc<dyn LockService>) -> Self {
        Self {
            store,
            locks,
            lock_ttl_seconds: DEFAULT_LOCK_TTL_SECONDS,
            metrics: None,
        }
    }

    /// Override the dedup-lock TTL.
    pub fn with_lock_ttl(mut self, ttl_seconds: u64) -> Self {
        self.lock_ttl_seconds = ttl_seconds;
        self
    }

    /// Attach a metrics collector.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Handle one delivery of one event, exactly once per payment id.
    pub fn handle(&self, event: &PaymentEvent) -> Result<IngestOutcome> {
        event.validate()?;

        let lock_key = event.lock_key();
        if !self.locks.acquire(&lock_key, self.lock_ttl_seconds) {
            tracing::debug!(
                payment_id = %event.payment_id,
                "payment already being handled, declining"
            );
            return Ok(IngestOutcome::InFlight);
        }

        let txn = self.store.begin();
        match self.apply(&txn, event) {
            Ok(IngestOutcome::Processed) => {
                if let Err(err) = txn.commit() {
                    self.locks.release(&lock_key);
                    return Err(err.into());
                }
                tracing::info!(
                    payment_id = %event.payment_id,
                    user_id = %event.user_id,
                    amount = event.amount.minor(),
                    "payment processed"
                );
                Ok(IngestOutcome::Processed)
            }
            Ok(outcome) => {
                self.abort(&txn, &lock_key);
                if let Some(metrics) = &self.metrics {
                    metrics.record_ingest_duplicate();
                }
                tracing::debug!(
                    payment_id = %event.payment_id,
                    "duplicate payment delivery ignored"
                );
                Ok(outcome)
            }
            Err(err) => {
                self.abort(&txn, &lock_key);
                tracing::warn!(
                    payment_id = %event.payment_id,
                    error = %err,
                    code = err.code(),
                    "payment ingestion failed"
                );
                Err(err)
            }
        }
    }

    fn apply(&self, txn: &funding_core::Txn<'_>, event: &PaymentEvent) -> Result<IngestOutcome> {
        let dedup = ProcessedPayment {
            payment_id: event.payment_id.clone(),
            campaign_id: event.campaign_id,
            user_id: event.user_id.clone(),
            amount: event.amount,
            provider: event.provider.clone(),
            processed_at: Utc::now(),
        };
        if !payments::record_processed(txn, &dedup)? {
            return Ok(IngestOutcome::Duplicate);
        }

        match event.kind {
            PaymentKind::CampaignContribution => {
                let campaign_id = event
                    .campaign_id
                    .ok_or(funding_core::Error::InvalidCampaignId)?;
                campaign::contribute(txn, campaign_id, &event.user_id, event.amount)?;
            }
            PaymentKind::WalletTopup => {
                wallet::credit_wallet(
                    txn,
                    &event.user_id,
                    event.amount,
                    Account::system("topup"),
                    EntryRef::new(ReferenceKind::Topup, event.payment_id.clone()),
                )?;
            }
        }
        Ok(IngestOutcome::Processed)
    }

    fn abort(&self, txn: &funding_core::Txn<'_>, lock_key: &str) {
        if let Err(err) = txn.rollback() {
            tracing::warn!(error = %err, "rollback failed");
        }
        self.locks.release(lock_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::InMemoryLockService;
    use chrono::Duration;
    use funding_core::{
        Amount, CampaignStatus, Config, CreateCampaignParams, FundingEngine,
    };
    use tempfile::TempDir;
    use uuid::Uuid;

    fn setup() -> (FundingEngine, Ingestor, Arc<InMemoryLockService>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        let engine = FundingEngine::open(config).unwrap();
        let locks = Arc::new(InMemoryLockService::new());
        let ingestor = Ingestor::new(engine.store().clone(), locks.clone())
            .with_metrics(Metrics::new().unwrap());
        (engine, ingestor, locks, temp_dir)
    }

    fn live_campaign(engine: &FundingEngine) -> Uuid {
        let campaign = engine
            .create_campaign(CreateCampaignParams {
                owner_id: "artist1".to_string(),
                title: "EP".to_string(),
                description: String::new(),
                min_goal: Amount::from_minor(10_000),
                deadline: Utc::now() + Duration::days(7),
                percent_cap: None,
            })
            .unwrap();
        engine.publish_campaign(campaign.id).unwrap();
        campaign.id
    }

    fn topup_event(payment_id: &str, minor: i64) -> PaymentEvent {
        PaymentEvent {
            payment_id: payment_id.to_string(),
            user_id: "u1".to_string(),
            campaign_id: None,
            amount: Amount::from_minor(minor),
            provider: "razorpay".to_string(),
            kind: PaymentKind::WalletTopup,
        }
    }

    #[test]
    fn test_topup_credits_wallet_once() {
        let (engine, ingestor, _locks, _temp) = setup();
        engine.create_wallet("u1").unwrap();

        let event = topup_event("pay_1", 5_000);
        assert_eq!(ingestor.handle(&event).unwrap(), IngestOutcome::Processed);
        assert_eq!(engine.wallet_balance("u1").unwrap().minor(), 5_000);
        assert!(engine.is_payment_processed("pay_1").unwrap());
    }

    #[test]
    fn test_redelivery_is_noop() {
        let (engine, ingestor, locks, _temp) = setup();
        engine.create_wallet("u1").unwrap();

        let event = topup_event("pay_1", 5_000);
        assert_eq!(ingestor.handle(&event).unwrap(), IngestOutcome::Processed);

        // the winning delivery leaves its lock to expire; a redelivery
        // after expiry must still dedup on the processed row
        locks.release(&event.lock_key());
        for _ in 0..3 {
            assert_eq!(ingestor.handle(&event).unwrap(), IngestOutcome::Duplicate);
            locks.release(&event.lock_key());
        }
        assert_eq!(engine.wallet_balance("u1").unwrap().minor(), 5_000);
        let metrics = ingestor.metrics.as_ref().unwrap();
        assert_eq!(metrics.ingest_duplicates_total.get(), 3);
    }

    #[test]
    fn test_concurrent_delivery_declined_while_locked() {
        let (engine, ingestor, locks, _temp) = setup();
        engine.create_wallet("u1").unwrap();

        let event = topup_event("pay_1", 5_000);
        assert!(locks.acquire(&event.lock_key(), 300));

        assert_eq!(ingestor.handle(&event).unwrap(), IngestOutcome::InFlight);
        assert_eq!(engine.wallet_balance("u1").unwrap().minor(), 0);
    }

    #[test]
    fn test_campaign_payment_contributes() {
        let (engine, ingestor, _locks, _temp) = setup();
        engine.create_wallet("u1").unwrap();
        let campaign_id = live_campaign(&engine);

        // seed the wallet through a topup event, then pledge through a
        // campaign event
        ingestor.handle(&topup_event("pay_seed", 8_000)).unwrap();
        let event = PaymentEvent {
            payment_id: "pay_pledge".to_string(),
            user_id: "u1".to_string(),
            campaign_id: Some(campaign_id),
            amount: Amount::from_minor(6_000),
            provider: "razorpay".to_string(),
            kind: PaymentKind::CampaignContribution,
        };
        assert_eq!(ingestor.handle(&event).unwrap(), IngestOutcome::Processed);

        let overview = engine.campaign_overview(campaign_id).unwrap().unwrap();
        assert_eq!(overview.funded_amount.minor(), 6_000);
        assert_eq!(overview.campaign.status, CampaignStatus::Live);
        assert_eq!(engine.wallet_balance("u1").unwrap().minor(), 2_000);
    }

    #[test]
    fn test_failed_effect_releases_lock_and_rolls_back() {
        let (engine, ingestor, locks, _temp) = setup();
        engine.create_wallet("u1").unwrap();
        let campaign_id = live_campaign(&engine);

        // no funds in the wallet: the contribution fails
        let event = PaymentEvent {
            payment_id: "pay_1".to_string(),
            user_id: "u1".to_string(),
            campaign_id: Some(campaign_id),
            amount: Amount::from_minor(6_000),
            provider: "razorpay".to_string(),
            kind: PaymentKind::CampaignContribution,
        };
        let err = ingestor.handle(&event).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_WALLET_BALANCE");

        // no dedup row left behind, and the lock was released for a retry
        assert!(!engine.is_payment_processed("pay_1").unwrap());
        assert!(locks.acquire(&event.lock_key(), 300));
    }

    #[test]
    fn test_retry_after_failure_succeeds() {
        let (engine, ingestor, _locks, _temp) = setup();
        engine.create_wallet("u1").unwrap();
        let campaign_id = live_campaign(&engine);

        let pledge = PaymentEvent {
            payment_id: "pay_pledge".to_string(),
            user_id: "u1".to_string(),
            campaign_id: Some(campaign_id),
            amount: Amount::from_minor(6_000),
            provider: "razorpay".to_string(),
            kind: PaymentKind::CampaignContribution,
        };
        assert!(ingestor.handle(&pledge).is_err());

        // top up, then retry the same payment id
        ingestor.handle(&topup_event("pay_seed", 8_000)).unwrap();
        assert_eq!(ingestor.handle(&pledge).unwrap(), IngestOutcome::Processed);
        assert_eq!(engine.wallet_balance("u1").unwrap().minor(), 2_000);
    }

    #[test]
    fn test_invalid_event_rejected_before_lock() {
        let (_engine, ingestor, locks, _temp) = setup();

        let mut bad = topup_event("pay_1", 5_000);
        bad.user_id = String::new();
        assert!(ingestor.handle(&bad).is_err());

        // validation failed before the lock was ever taken
        assert!(locks.acquire("topup:pay_1", 300));
    }
}
