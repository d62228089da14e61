//! Core entity records
//!
//! All records are explicit typed structs returned by the persistence
//! layer; no schema-less maps cross a module boundary. Monetary fields are
//! [`Amount`] minor units.

use crate::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ledger account identifier
///
/// Rendered as `wallet:<user>`, `escrow:<uuid>`, or `system:<name>`.
/// `system:*` accounts model value crossing the platform boundary
/// (top-ups, royalty revenue).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Account {
    /// A user's spendable wallet
    Wallet(String),
    /// A campaign escrow holding account
    Escrow(Uuid),
    /// A platform boundary account
    System(String),
}

impl Account {
    /// Wallet account for a user.
    pub fn wallet(user_id: impl Into<String>) -> Self {
        Account::Wallet(user_id.into())
    }

    /// Escrow account by id.
    pub fn escrow(escrow_id: Uuid) -> Self {
        Account::Escrow(escrow_id)
    }

    /// System boundary account by name.
    pub fn system(name: impl Into<String>) -> Self {
        Account::System(name.into())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Account::Wallet(user_id) => write!(f, "wallet:{}", user_id),
            Account::Escrow(id) => write!(f, "escrow:{}", id),
            Account::System(name) => write!(f, "system:{}", name),
        }
    }
}

/// What a ledger entry refers back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// External wallet top-up
    Topup,
    /// Campaign contribution
    Campaign,
    /// Contribution refund
    Refund,
    /// Escrow release to the campaign owner
    EscrowRelease,
    /// Royalty payout
    Royalty,
}

/// Reference attached to a ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRef {
    /// Reference kind
    pub kind: ReferenceKind,
    /// Identifier of the referenced record or external event
    pub id: String,
    /// Provider metadata (gateway ids, etc.)
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

impl EntryRef {
    /// Reference without metadata.
    pub fn new(kind: ReferenceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            metadata: std::collections::HashMap::new(),
        }
    }

    /// Attach one provider metadata pair.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Immutable double-entry ledger record
///
/// Exactly one entry exists per value movement; entries are never updated
/// or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry id (UUIDv7 for time-ordering)
    pub id: Uuid,
    /// Account losing value
    pub debit_account: Account,
    /// Account gaining value
    pub credit_account: Account,
    /// Moved amount, always positive
    pub amount: Amount,
    /// What this movement refers back to
    pub reference: EntryRef,
    /// Entry timestamp
    pub created_at: DateTime<Utc>,
}

/// Per-user spendable balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// Owning user
    pub user_id: String,
    /// Spendable balance, never negative
    pub available_balance: Amount,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

/// Escrow lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EscrowState {
    /// Collecting funds
    Pending = 1,
    /// Goal met, funds locked
    Locked = 2,
    /// Paid out to the owner
    Released = 3,
    /// Closed
    Settled = 4,
}

impl EscrowState {
    /// Whether balance changes are admitted in this state.
    pub fn accepts_funds(self) -> bool {
        matches!(self, EscrowState::Pending | EscrowState::Locked)
    }
}

/// Per-purpose holding account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escrow {
    /// Unique escrow id
    pub id: Uuid,
    /// Holding purpose (currently always `campaign`)
    pub purpose: String,
    /// Id of the purpose aggregate
    pub purpose_id: Uuid,
    /// Held amount, never negative
    pub amount: Amount,
    /// Lifecycle state
    pub state: EscrowState,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CampaignStatus {
    /// Being drafted, not yet visible
    Draft = 1,
    /// Published and collecting pledges
    Live = 2,
    /// Goal met, funds locked
    Funded = 3,
    /// Deadline passed short of goal, contributions refunded
    Failed = 4,
    /// Delivered; eligible for royalty distribution
    Completed = 5,
}

impl CampaignStatus {
    /// Whether the campaign can still change funding state.
    pub fn is_terminal(self) -> bool {
        matches!(self, CampaignStatus::Failed | CampaignStatus::Completed)
    }
}

/// Funding-drive aggregate owning one escrow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique campaign id
    pub id: Uuid,
    /// Owning user (the artist)
    pub owner_id: String,
    /// Display title
    pub title: String,
    /// Display description
    pub description: String,
    /// Funding goal in minor units
    pub min_goal: Amount,
    /// Funding deadline
    pub deadline: DateTime<Utc>,
    /// Lifecycle status
    pub status: CampaignStatus,
    /// Escrow holding this campaign's pledges
    pub escrow_id: Uuid,
    /// Set when the campaign went live
    pub published_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

/// Contribution lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ContributionStatus {
    /// Pledged, campaign outcome open
    Pending = 1,
    /// Campaign funded, pledge locked in
    Locked = 2,
    /// Campaign failed, pledge returned
    Refunded = 3,
}

/// A single pledge to a campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    /// Unique contribution id
    pub id: Uuid,
    /// Target campaign
    pub campaign_id: Uuid,
    /// Pledging user
    pub contributor_id: String,
    /// Pledged amount, always positive
    pub amount: Amount,
    /// Lifecycle status
    pub status: ContributionStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

/// Fractional-ownership configuration and running allocation for a campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSlices {
    /// Owning campaign
    pub campaign_id: Uuid,
    /// Maximum percent of revenue sold, within (0, 100]
    pub total_percent_cap: u32,
    /// Percent allocated so far; monotonically non-decreasing
    pub allocated_percent: u32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl CampaignSlices {
    /// Percent still available for sale.
    pub fn remaining_percent(&self) -> u32 {
        self.total_percent_cap.saturating_sub(self.allocated_percent)
    }
}

/// Immutable record of slice ownership bought with one contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlicePurchase {
    /// Unique purchase id
    pub id: Uuid,
    /// Owning campaign
    pub campaign_id: Uuid,
    /// Buying user
    pub user_id: String,
    /// Contribution that paid for this slice
    pub contribution_id: Uuid,
    /// Percent owned, always positive
    pub percent_owned: u32,
    /// Minor units paid
    pub amount_paid: Amount,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Royalty report status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RoyaltyReportStatus {
    /// Created, payouts not yet run
    Pending = 1,
    /// Payouts distributed
    Completed = 2,
}

/// One revenue-distribution event for a funded campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoyaltyReport {
    /// Unique report id
    pub id: Uuid,
    /// Campaign whose revenue is distributed
    pub campaign_id: Uuid,
    /// Revenue to distribute, minor units, always positive
    pub total_revenue: Amount,
    /// Lifecycle status
    pub status: RoyaltyReportStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Set when payouts completed
    pub processed_at: Option<DateTime<Utc>>,
}

/// Payout status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PayoutStatus {
    /// Credited to the holder's wallet
    Paid = 1,
}

/// One holder's share of one royalty report; write-once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoyaltyPayout {
    /// Unique payout id
    pub id: Uuid,
    /// Owning report
    pub report_id: Uuid,
    /// Receiving slice holder
    pub user_id: String,
    /// Holder's aggregate percent at payout time
    pub slice_percent: u32,
    /// Paid amount, minor units
    pub amount: Amount,
    /// Always `Paid`
    pub status: PayoutStatus,
    /// Credit timestamp
    pub paid_at: DateTime<Utc>,
}

/// Write-once deduplication record for external payment events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedPayment {
    /// Provider payment id; the uniqueness key
    pub payment_id: String,
    /// Target campaign for contribution payments
    pub campaign_id: Option<Uuid>,
    /// Paying user
    pub user_id: String,
    /// Paid amount, minor units
    pub amount: Amount,
    /// Payment provider name
    pub provider: String,
    /// Processing timestamp
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_display() {
        assert_eq!(Account::wallet("u1").to_string(), "wallet:u1");
        let id = Uuid::nil();
        assert_eq!(
            Account::escrow(id).to_string(),
            format!("escrow:{}", Uuid::nil())
        );
        assert_eq!(Account::system("topup").to_string(), "system:topup");
    }

    #[test]
    fn test_escrow_state_accepts_funds() {
        assert!(EscrowState::Pending.accepts_funds());
        assert!(EscrowState::Locked.accepts_funds());
        assert!(!EscrowState::Released.accepts_funds());
        assert!(!EscrowState::Settled.accepts_funds());
    }

    #[test]
    fn test_campaign_status_terminal() {
        assert!(!CampaignStatus::Draft.is_terminal());
        assert!(!CampaignStatus::Live.is_terminal());
        assert!(!CampaignStatus::Funded.is_terminal());
        assert!(CampaignStatus::Failed.is_terminal());
        assert!(CampaignStatus::Completed.is_terminal());
    }

    #[test]
    fn test_slices_remaining_percent() {
        let slices = CampaignSlices {
            campaign_id: Uuid::new_v4(),
            total_percent_cap: 20,
            allocated_percent: 15,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(slices.remaining_percent(), 5);
    }
}
