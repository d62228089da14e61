//! Normalized payment events
//!
//! The only shape the core consumes. Provider-specific payloads
//! (webhook envelopes, signature headers) are unpacked by the adapter
//! before reaching this crate.

use funding_core::{Amount, Error as CoreError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the payment pays for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// Pledge to a campaign
    CampaignContribution,
    /// Wallet top-up
    WalletTopup,
}

/// One externally delivered payment event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Provider payment id; the idempotency key
    pub payment_id: String,
    /// Paying user
    pub user_id: String,
    /// Target campaign, required for contribution payments
    pub campaign_id: Option<Uuid>,
    /// Paid amount in minor units
    pub amount: Amount,
    /// Provider name (e.g. `razorpay`)
    pub provider: String,
    /// What the payment pays for
    pub kind: PaymentKind,
}

impl PaymentEvent {
    /// Reject malformed events before any mutation.
    pub fn validate(&self) -> crate::Result<()> {
        if self.payment_id.is_empty() {
            return Err(CoreError::InvalidPaymentId.into());
        }
        if self.user_id.is_empty() {
            return Err(CoreError::InvalidUserId.into());
        }
        if self.provider.is_empty() {
            return Err(CoreError::InvalidProvider.into());
        }
        self.amount.require_positive()?;
        if self.kind == PaymentKind::CampaignContribution && self.campaign_id.is_none() {
            return Err(CoreError::InvalidCampaignId.into());
        }
        Ok(())
    }

    /// Dedup-lock key for this event.
    pub fn lock_key(&self) -> String {
        match self.kind {
            PaymentKind::CampaignContribution => format!("payment:{}", self.payment_id),
            PaymentKind::WalletTopup => format!("topup:{}", self.payment_id),
        }
    }
}
