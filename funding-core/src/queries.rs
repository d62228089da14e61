//! Read-side projections
//!
//! Typed, read-only views over the stored records for reporting/UI
//! layers. No write path exists here; mutations go through the operation
//! modules only.

use crate::{
    storage::{cf, index},
    types::{
        Campaign, CampaignSlices, CampaignStatus, Contribution, ContributionStatus, EscrowState,
        RoyaltyPayout, RoyaltyReport, SlicePurchase, Wallet,
    },
    Amount, Error, Result, Store,
};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Filter for campaign listings
#[derive(Debug, Clone)]
pub struct CampaignFilter {
    /// Restrict to one status
    pub status: Option<CampaignStatus>,
    /// Restrict to one owner
    pub owner_id: Option<String>,
    /// Page size
    pub limit: usize,
    /// Page offset
    pub offset: usize,
}

impl Default for CampaignFilter {
    fn default() -> Self {
        Self {
            status: None,
            owner_id: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Campaign joined with its funding and slice state
#[derive(Debug, Clone)]
pub struct CampaignOverview {
    /// The campaign row
    pub campaign: Campaign,
    /// Current escrow amount
    pub funded_amount: Amount,
    /// Current escrow state
    pub escrow_state: EscrowState,
    /// Slice configuration, when fractional ownership is enabled
    pub slices: Option<CampaignSlices>,
}

/// Aggregate of one contributor's pledges to a campaign
#[derive(Debug, Clone)]
pub struct ContributorTotal {
    /// Contributing user
    pub contributor_id: String,
    /// Sum over PENDING and LOCKED contributions
    pub total_amount: Amount,
    /// Number of contributions counted
    pub contribution_count: usize,
}

/// One user's slice position in one campaign
#[derive(Debug, Clone)]
pub struct OwnershipSummary {
    /// The campaign
    pub campaign_id: Uuid,
    /// Aggregate percent across all purchases
    pub total_percent_owned: u32,
    /// Aggregate minor units paid
    pub total_invested: Amount,
    /// Number of purchases
    pub purchase_count: usize,
}

/// A user's royalty payouts with their lifetime total
#[derive(Debug, Clone)]
pub struct RoyaltyHistory {
    /// Payouts, oldest first
    pub payouts: Vec<RoyaltyPayout>,
    /// Lifetime total received
    pub total: Amount,
}

/// Campaign with funding and slice state, `None` when missing.
pub fn campaign_overview(store: &Store, campaign_id: Uuid) -> Result<Option<CampaignOverview>> {
    let campaign = match store.read::<Campaign>(cf::CAMPAIGNS, campaign_id.as_bytes())? {
        Some(campaign) => campaign,
        None => return Ok(None),
    };
    let held = store
        .read::<crate::types::Escrow>(cf::ESCROWS, campaign.escrow_id.as_bytes())?
        .ok_or(Error::EscrowNotFound(campaign.escrow_id))?;
    let slices = store.read::<CampaignSlices>(cf::CAMPAIGN_SLICES, campaign_id.as_bytes())?;
    Ok(Some(CampaignOverview {
        funded_amount: held.amount,
        escrow_state: held.state,
        campaign,
        slices,
    }))
}

/// List campaigns newest first, filtered and paged.
pub fn list_campaigns(store: &Store, filter: &CampaignFilter) -> Result<Vec<Campaign>> {
    let mut campaigns: Vec<Campaign> = match filter.status {
        Some(status) => {
            let mut rows = Vec::new();
            for (key, _) in
                store.scan_prefix(cf::INDICES, &index::campaign_status(status, None))?
            {
                let campaign_id = index::trailing_uuid(&key)?;
                if let Some(campaign) =
                    store.read::<Campaign>(cf::CAMPAIGNS, campaign_id.as_bytes())?
                {
                    rows.push(campaign);
                }
            }
            rows
        }
        None => store
            .scan_all(cf::CAMPAIGNS)?
            .into_iter()
            .map(|(_, value)| bincode::deserialize(&value).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?,
    };

    if let Some(owner_id) = &filter.owner_id {
        campaigns.retain(|campaign| &campaign.owner_id == owner_id);
    }
    campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(campaigns
        .into_iter()
        .skip(filter.offset)
        .take(filter.limit)
        .collect())
}

fn contributions_by_index(store: &Store, prefix: &[u8]) -> Result<Vec<Contribution>> {
    let mut contributions = Vec::new();
    for (key, _) in store.scan_prefix(cf::INDICES, prefix)? {
        let contribution_id = index::trailing_uuid(&key)?;
        if let Some(contribution) =
            store.read::<Contribution>(cf::CONTRIBUTIONS, contribution_id.as_bytes())?
        {
            contributions.push(contribution);
        }
    }
    Ok(contributions)
}

/// Per-contributor totals over live pledges, largest first.
pub fn campaign_contributors(store: &Store, campaign_id: Uuid) -> Result<Vec<ContributorTotal>> {
    let mut totals: BTreeMap<String, (i64, usize)> = BTreeMap::new();
    for contribution in
        contributions_by_index(store, &index::campaign_contribution(campaign_id, None))?
    {
        if !matches!(
            contribution.status,
            ContributionStatus::Pending | ContributionStatus::Locked
        ) {
            continue;
        }
        let slot = totals.entry(contribution.contributor_id).or_insert((0, 0));
        slot.0 += contribution.amount.minor();
        slot.1 += 1;
    }
    let mut contributors: Vec<ContributorTotal> = totals
        .into_iter()
        .map(|(contributor_id, (total, count))| ContributorTotal {
            contributor_id,
            total_amount: Amount::from_minor(total),
            contribution_count: count,
        })
        .collect();
    contributors.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
    Ok(contributors)
}

/// A user's contributions, newest first.
pub fn user_contributions(
    store: &Store,
    user_id: &str,
    status: Option<ContributionStatus>,
) -> Result<Vec<Contribution>> {
    let mut contributions =
        contributions_by_index(store, &index::contributor_contribution(user_id, None))?;
    if let Some(status) = status {
        contributions.retain(|contribution| contribution.status == status);
    }
    contributions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(contributions)
}

/// Sum of a user's live pledges to one campaign.
pub fn user_contribution_total(store: &Store, user_id: &str, campaign_id: Uuid) -> Result<Amount> {
    let mut total = 0i64;
    for contribution in
        contributions_by_index(store, &index::contributor_contribution(user_id, None))?
    {
        if contribution.campaign_id == campaign_id
            && matches!(
                contribution.status,
                ContributionStatus::Pending | ContributionStatus::Locked
            )
        {
            total += contribution.amount.minor();
        }
    }
    Ok(Amount::from_minor(total))
}

/// Slice configuration for a campaign, `None` when slices are disabled.
pub fn campaign_slice_stats(store: &Store, campaign_id: Uuid) -> Result<Option<CampaignSlices>> {
    store.read(cf::CAMPAIGN_SLICES, campaign_id.as_bytes())
}

fn purchases_by_index(store: &Store, prefix: &[u8]) -> Result<Vec<SlicePurchase>> {
    let mut purchases = Vec::new();
    for (key, _) in store.scan_prefix(cf::INDICES, prefix)? {
        let purchase_id = index::trailing_uuid(&key)?;
        if let Some(purchase) =
            store.read::<SlicePurchase>(cf::SLICE_PURCHASES, purchase_id.as_bytes())?
        {
            purchases.push(purchase);
        }
    }
    Ok(purchases)
}

/// A user's slice positions across all campaigns.
pub fn user_portfolio(store: &Store, user_id: &str) -> Result<Vec<OwnershipSummary>> {
    let mut by_campaign: BTreeMap<Uuid, (u32, i64, usize)> = BTreeMap::new();
    for purchase in purchases_by_index(store, &index::user_purchase(user_id, None))? {
        let slot = by_campaign.entry(purchase.campaign_id).or_insert((0, 0, 0));
        slot.0 += purchase.percent_owned;
        slot.1 += purchase.amount_paid.minor();
        slot.2 += 1;
    }
    Ok(by_campaign
        .into_iter()
        .map(|(campaign_id, (percent, invested, count))| OwnershipSummary {
            campaign_id,
            total_percent_owned: percent,
            total_invested: Amount::from_minor(invested),
            purchase_count: count,
        })
        .collect())
}

/// A user's slice position in one campaign (zeroed when none).
pub fn user_campaign_ownership(
    store: &Store,
    user_id: &str,
    campaign_id: Uuid,
) -> Result<OwnershipSummary> {
    Ok(user_portfolio(store, user_id)?
        .into_iter()
        .find(|summary| summary.campaign_id == campaign_id)
        .unwrap_or(OwnershipSummary {
            campaign_id,
            total_percent_owned: 0,
            total_invested: Amount::ZERO,
            purchase_count: 0,
        }))
}

/// Royalty reports for a campaign, oldest first.
pub fn royalty_reports(store: &Store, campaign_id: Uuid) -> Result<Vec<RoyaltyReport>> {
    let mut reports = Vec::new();
    for (key, _) in store.scan_prefix(cf::INDICES, &index::campaign_report(campaign_id, None))? {
        let report_id = index::trailing_uuid(&key)?;
        if let Some(report) = store.read::<RoyaltyReport>(cf::ROYALTY_REPORTS, report_id.as_bytes())?
        {
            reports.push(report);
        }
    }
    Ok(reports)
}

/// Payouts for one report, oldest first.
pub fn report_payouts(store: &Store, report_id: Uuid) -> Result<Vec<RoyaltyPayout>> {
    let mut payouts = Vec::new();
    for (key, _) in store.scan_prefix(cf::INDICES, &index::report_payout(report_id, None))? {
        let payout_id = index::trailing_uuid(&key)?;
        if let Some(payout) = store.read::<RoyaltyPayout>(cf::ROYALTY_PAYOUTS, payout_id.as_bytes())?
        {
            payouts.push(payout);
        }
    }
    Ok(payouts)
}

/// A user's royalty payouts with their lifetime total.
pub fn user_royalty_history(store: &Store, user_id: &str) -> Result<RoyaltyHistory> {
    let mut payouts = Vec::new();
    let mut total = 0i64;
    for (key, _) in store.scan_prefix(cf::INDICES, &index::user_payout(user_id, None))? {
        let payout_id = index::trailing_uuid(&key)?;
        if let Some(payout) = store.read::<RoyaltyPayout>(cf::ROYALTY_PAYOUTS, payout_id.as_bytes())?
        {
            total += payout.amount.minor();
            payouts.push(payout);
        }
    }
    Ok(RoyaltyHistory {
        payouts,
        total: Amount::from_minor(total),
    })
}

/// Current wallet balance.
pub fn wallet_balance(store: &Store, user_id: &str) -> Result<Amount> {
    let wallet = store
        .read::<Wallet>(cf::WALLETS, user_id.as_bytes())?
        .ok_or_else(|| Error::WalletNotFound(user_id.to_string()))?;
    Ok(wallet.available_balance)
}

/// Whether a payment event was already applied.
pub fn is_payment_processed(store: &Store, payment_id: &str) -> Result<bool> {
    Ok(store
        .read::<crate::types::ProcessedPayment>(cf::PROCESSED_PAYMENTS, payment_id.as_bytes())?
        .is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::{contribute, create_campaign, publish_campaign, CreateCampaignParams};
    use crate::types::{Account, EntryRef, ReferenceKind};
    use crate::{wallet, Config};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn test_store() -> (Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Store::open(&config).unwrap(), temp_dir)
    }

    fn seeded_campaign(store: &Store, cap: Option<u32>) -> Campaign {
        for (user, minor) in [("backer1", 8_000i64), ("backer2", 4_000)] {
            store
                .with_txn(|txn| {
                    wallet::create_wallet(txn, user)?;
                    wallet::credit_wallet(
                        txn,
                        user,
                        Amount::from_minor(minor),
                        Account::system("topup"),
                        EntryRef::new(ReferenceKind::Topup, format!("seed_{}", user)),
                    )
                })
                .unwrap();
        }
        let campaign = store
            .with_txn(|txn| {
                let campaign = create_campaign(
                    txn,
                    CreateCampaignParams {
                        owner_id: "artist1".to_string(),
                        title: "EP".to_string(),
                        description: "".to_string(),
                        min_goal: Amount::from_minor(10_000),
                        deadline: Utc::now() + Duration::days(7),
                        percent_cap: cap,
                    },
                )?;
                publish_campaign(txn, campaign.id, Utc::now())
            })
            .unwrap();
        store
            .with_txn(|txn| contribute(txn, campaign.id, "backer1", Amount::from_minor(6_000)))
            .unwrap();
        store
            .with_txn(|txn| contribute(txn, campaign.id, "backer1", Amount::from_minor(2_000)))
            .unwrap();
        store
            .with_txn(|txn| contribute(txn, campaign.id, "backer2", Amount::from_minor(4_000)))
            .unwrap();
        campaign
    }

    #[test]
    fn test_campaign_overview_joins_escrow() {
        let (store, _temp) = test_store();
        let campaign = seeded_campaign(&store, Some(20));

        let overview = campaign_overview(&store, campaign.id).unwrap().unwrap();
        assert_eq!(overview.funded_amount.minor(), 12_000);
        assert_eq!(overview.escrow_state, EscrowState::Pending);
        assert_eq!(overview.slices.unwrap().total_percent_cap, 20);

        assert!(campaign_overview(&store, Uuid::now_v7()).unwrap().is_none());
    }

    #[test]
    fn test_list_campaigns_filters() {
        let (store, _temp) = test_store();
        let campaign = seeded_campaign(&store, None);

        let live = list_campaigns(
            &store,
            &CampaignFilter {
                status: Some(CampaignStatus::Live),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, campaign.id);

        let drafts = list_campaigns(
            &store,
            &CampaignFilter {
                status: Some(CampaignStatus::Draft),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(drafts.is_empty());

        let by_owner = list_campaigns(
            &store,
            &CampaignFilter {
                owner_id: Some("artist1".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_owner.len(), 1);
    }

    #[test]
    fn test_campaign_contributors_aggregates_descending() {
        let (store, _temp) = test_store();
        let campaign = seeded_campaign(&store, None);

        let contributors = campaign_contributors(&store, campaign.id).unwrap();
        assert_eq!(contributors.len(), 2);
        assert_eq!(contributors[0].contributor_id, "backer1");
        assert_eq!(contributors[0].total_amount.minor(), 8_000);
        assert_eq!(contributors[0].contribution_count, 2);
        assert_eq!(contributors[1].total_amount.minor(), 4_000);
    }

    #[test]
    fn test_user_contribution_total() {
        let (store, _temp) = test_store();
        let campaign = seeded_campaign(&store, None);

        let total = user_contribution_total(&store, "backer1", campaign.id).unwrap();
        assert_eq!(total.minor(), 8_000);

        let none = user_contribution_total(&store, "stranger", campaign.id).unwrap();
        assert!(none.is_zero());
    }

    #[test]
    fn test_user_portfolio_and_ownership() {
        let (store, _temp) = test_store();
        let campaign = seeded_campaign(&store, Some(20));

        // backer1: floor(6000*20/10000)=12 then floor(2000*20/10000)=4
        let portfolio = user_portfolio(&store, "backer1").unwrap();
        assert_eq!(portfolio.len(), 1);
        assert_eq!(portfolio[0].total_percent_owned, 16);
        assert_eq!(portfolio[0].total_invested.minor(), 8_000);
        assert_eq!(portfolio[0].purchase_count, 2);

        let ownership = user_campaign_ownership(&store, "stranger", campaign.id).unwrap();
        assert_eq!(ownership.total_percent_owned, 0);
        assert_eq!(ownership.purchase_count, 0);
    }

    #[test]
    fn test_wallet_balance_missing() {
        let (store, _temp) = test_store();
        let result = wallet_balance(&store, "ghost");
        assert!(matches!(result, Err(Error::WalletNotFound(_))));
    }
}
