//! Fractional-ownership slice allocation
//!
//! Percent sold is goal-relative: `floor(amount × cap ÷ min_goal)`,
//! clamped to whatever remains under the cap. Integer floor division
//! throughout; a contribution that floors to 0% buys nothing and does not
//! advance the allocation.

use crate::{
    storage::{cf, index, Txn},
    types::{CampaignSlices, SlicePurchase},
    Amount, Error, Result,
};
use chrono::Utc;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Create the slice configuration for a campaign; write-once.
pub fn create_campaign_slices(
    txn: &Txn<'_>,
    campaign_id: Uuid,
    total_percent_cap: u32,
) -> Result<CampaignSlices> {
    if total_percent_cap == 0 || total_percent_cap > 100 {
        return Err(Error::InvalidPercentCap(total_percent_cap));
    }
    let now = Utc::now();
    let slices = CampaignSlices {
        campaign_id,
        total_percent_cap,
        allocated_percent: 0,
        created_at: now,
        updated_at: now,
    };
    if !txn.insert_unique(cf::CAMPAIGN_SLICES, campaign_id.as_bytes(), &slices)? {
        return Err(Error::CampaignSlicesAlreadyExist(campaign_id));
    }
    Ok(slices)
}

/// Slice configuration, if the campaign sells slices.
pub fn get_slices(txn: &Txn<'_>, campaign_id: Uuid) -> Result<Option<CampaignSlices>> {
    txn.get(cf::CAMPAIGN_SLICES, campaign_id.as_bytes())
}

/// Slice configuration under an exclusive row lock.
pub fn get_slices_locked(txn: &Txn<'_>, campaign_id: Uuid) -> Result<Option<CampaignSlices>> {
    txn.get_locked(cf::CAMPAIGN_SLICES, campaign_id.as_bytes())
}

/// Percent earned by `amount_paid` against the funding goal, clamped to
/// the unallocated remainder of the cap.
pub fn calculate_percent(min_goal: Amount, slices: &CampaignSlices, amount_paid: Amount) -> u32 {
    if !min_goal.is_positive() || !amount_paid.is_positive() {
        return 0;
    }
    let percent_of_goal = (amount_paid.minor() as i128 * slices.total_percent_cap as i128)
        / min_goal.minor() as i128;
    percent_of_goal.clamp(0, slices.remaining_percent() as i128) as u32
}

/// Inputs for one slice purchase
#[derive(Debug, Clone)]
pub struct PurchaseParams<'a> {
    /// Owning campaign
    pub campaign_id: Uuid,
    /// Buying user
    pub user_id: &'a str,
    /// Contribution paying for the slice
    pub contribution_id: Uuid,
    /// Percent bought, already clamped, strictly positive
    pub percent_owned: u32,
    /// Minor units paid
    pub amount_paid: Amount,
}

/// Record a purchase and advance the allocation; the caller holds the
/// slices row lock and commits both with the contribution.
pub fn record_purchase(
    txn: &Txn<'_>,
    mut slices: CampaignSlices,
    params: PurchaseParams<'_>,
) -> Result<SlicePurchase> {
    if params.percent_owned == 0 || params.percent_owned > slices.remaining_percent() {
        return Err(Error::InvalidPercentCap(params.percent_owned));
    }

    let purchase = SlicePurchase {
        id: Uuid::now_v7(),
        campaign_id: params.campaign_id,
        user_id: params.user_id.to_string(),
        contribution_id: params.contribution_id,
        percent_owned: params.percent_owned,
        amount_paid: params.amount_paid,
        created_at: Utc::now(),
    };
    txn.put(cf::SLICE_PURCHASES, purchase.id.as_bytes(), &purchase)?;
    txn.put_raw(
        cf::INDICES,
        &index::campaign_purchase(params.campaign_id, Some(purchase.id)),
        &[],
    )?;
    txn.put_raw(
        cf::INDICES,
        &index::user_purchase(params.user_id, Some(purchase.id)),
        &[],
    )?;

    slices.allocated_percent += params.percent_owned;
    slices.updated_at = Utc::now();
    txn.put(cf::CAMPAIGN_SLICES, slices.campaign_id.as_bytes(), &slices)?;

    Ok(purchase)
}

/// All purchases for a campaign, oldest first.
pub fn purchases_for_campaign(txn: &Txn<'_>, campaign_id: Uuid) -> Result<Vec<SlicePurchase>> {
    let mut purchases = Vec::new();
    for (key, _) in txn.scan_prefix(cf::INDICES, &index::campaign_purchase(campaign_id, None))? {
        let purchase_id = index::trailing_uuid(&key)?;
        let purchase: SlicePurchase = txn
            .get(cf::SLICE_PURCHASES, purchase_id.as_bytes())?
            .ok_or_else(|| {
                Error::Storage(format!("slice purchase {} missing from index", purchase_id))
            })?;
        purchases.push(purchase);
    }
    Ok(purchases)
}

/// Each holder's aggregate percent across all their purchases for a
/// campaign, in stable user-id order.
pub fn holder_percents(txn: &Txn<'_>, campaign_id: Uuid) -> Result<Vec<(String, u32)>> {
    let mut totals: BTreeMap<String, u32> = BTreeMap::new();
    for purchase in purchases_for_campaign(txn, campaign_id)? {
        *totals.entry(purchase.user_id).or_insert(0) += purchase.percent_owned;
    }
    Ok(totals.into_iter().collect())
}
