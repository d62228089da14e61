//! Campaign state machine
//!
//! `DRAFT → LIVE → {FUNDED, FAILED}`; FUNDED may later be marked
//! COMPLETED for royalty eligibility. Every transition locks the campaign
//! row (and the escrow row where funds are involved) before reading, so
//! concurrent contributors, lockers, and refunders serialize per campaign.

use crate::{
    escrow, slices,
    storage::{cf, index, Txn},
    types::{
        Campaign, CampaignStatus, Contribution, ContributionStatus, EntryRef, ReferenceKind,
    },
    wallet, Amount, Error, Result, Store,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Escrow purpose tag for campaigns.
const ESCROW_PURPOSE: &str = "campaign";

/// Inputs for campaign creation
#[derive(Debug, Clone)]
pub struct CreateCampaignParams {
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
    /// Slice cap, when fractional ownership is enabled
    pub percent_cap: Option<u32>,
}

/// Outcome of one sweep pass
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Campaigns whose deadline had passed
    pub examined: usize,
    /// Campaigns locked as funded
    pub locked: usize,
    /// Campaigns refunded and failed
    pub refunded: usize,
    /// Per-campaign failures, isolated from the rest of the sweep
    pub failures: Vec<SweepFailure>,
}

/// One campaign the sweep could not resolve
#[derive(Debug, Clone)]
pub struct SweepFailure {
    /// Campaign that failed to resolve
    pub campaign_id: Uuid,
    /// Stable error code
    pub code: &'static str,
    /// Human-readable detail
    pub message: String,
}

enum SweepOutcome {
    Locked,
    Refunded,
    Skipped,
}

/// Plain read.
pub fn get_campaign(txn: &Txn<'_>, campaign_id: Uuid) -> Result<Campaign> {
    txn.get(cf::CAMPAIGNS, campaign_id.as_bytes())?
        .ok_or(Error::CampaignNotFound(campaign_id))
}

/// Read under an exclusive row lock.
pub fn get_campaign_locked(txn: &Txn<'_>, campaign_id: Uuid) -> Result<Campaign> {
    txn.get_locked(cf::CAMPAIGNS, campaign_id.as_bytes())?
        .ok_or(Error::CampaignNotFound(campaign_id))
}

/// Move the status index entry together with the row.
///
/// The flip is conditional on the stored row still carrying the status
/// the caller decided on; a mismatch under the held lock means the unit
/// raced itself and aborts.
fn set_status(txn: &Txn<'_>, campaign: &mut Campaign, to: CampaignStatus) -> Result<()> {
    let current: Campaign = txn
        .get(cf::CAMPAIGNS, campaign.id.as_bytes())?
        .ok_or(Error::CampaignNotFound(campaign.id))?;
    if current.status != campaign.status {
        return Err(Error::CampaignStatusUpdateFailed(campaign.id));
    }
    txn.delete(
        cf::INDICES,
        &index::campaign_status(campaign.status, Some(campaign.id)),
    )?;
    campaign.status = to;
    campaign.updated_at = Utc::now();
    txn.put_raw(
        cf::INDICES,
        &index::campaign_status(to, Some(campaign.id)),
        &[],
    )?;
    txn.put(cf::CAMPAIGNS, campaign.id.as_bytes(), campaign)
}

/// Create a DRAFT campaign with its escrow and optional slice
/// configuration, all in one unit.
pub fn create_campaign(txn: &Txn<'_>, params: CreateCampaignParams) -> Result<Campaign> {
    if params.owner_id.is_empty() {
        return Err(Error::InvalidUserId);
    }
    params.min_goal.require_positive()?;

    let campaign_id = Uuid::now_v7();
    let held = escrow::create_escrow(txn, ESCROW_PURPOSE, campaign_id)?;

    let now = Utc::now();
    let campaign = Campaign {
        id: campaign_id,
        owner_id: params.owner_id,
        title: params.title,
        description: params.description,
        min_goal: params.min_goal,
        deadline: params.deadline,
        status: CampaignStatus::Draft,
        escrow_id: held.id,
        published_at: None,
        created_at: now,
        updated_at: now,
    };
    txn.put(cf::CAMPAIGNS, campaign_id.as_bytes(), &campaign)?;
    txn.put_raw(
        cf::INDICES,
        &index::campaign_status(CampaignStatus::Draft, Some(campaign_id)),
        &[],
    )?;

    if let Some(cap) = params.percent_cap {
        slices::create_campaign_slices(txn, campaign_id, cap)?;
    }

    tracing::info!(campaign_id = %campaign_id, "campaign created");
    Ok(campaign)
}

/// `DRAFT → LIVE`, guarded by a future deadline.
pub fn publish_campaign(txn: &Txn<'_>, campaign_id: Uuid, now: DateTime<Utc>) -> Result<Campaign> {
    let mut campaign = get_campaign_locked(txn, campaign_id)?;
    if campaign.status != CampaignStatus::Draft || campaign.deadline <= now {
        return Err(Error::CampaignCannotPublish(campaign_id));
    }
    campaign.published_at = Some(now);
    set_status(txn, &mut campaign, CampaignStatus::Live)?;
    tracing::info!(campaign_id = %campaign_id, "campaign published");
    Ok(campaign)
}

/// Pledge to a LIVE campaign.
///
/// One unit: the wallet→escrow transfer, the PENDING contribution row,
/// and — when slices are enabled and the percent is non-zero — the slice
/// purchase. A funds movement never exists without its contribution row.
pub fn contribute(
    txn: &Txn<'_>,
    campaign_id: Uuid,
    user_id: &str,
    amount: Amount,
) -> Result<Contribution> {
    if user_id.is_empty() {
        return Err(Error::InvalidUserId);
    }
    let amount = amount.require_positive()?;

    let campaign = get_campaign_locked(txn, campaign_id)?;
    if campaign.status != CampaignStatus::Live {
        return Err(Error::CampaignNotLive(campaign_id));
    }

    wallet::wallet_to_escrow(
        txn,
        user_id,
        amount,
        campaign.escrow_id,
        EntryRef::new(ReferenceKind::Campaign, campaign_id.to_string()),
    )?;

    let now = Utc::now();
    let contribution = Contribution {
        id: Uuid::now_v7(),
        campaign_id,
        contributor_id: user_id.to_string(),
        amount,
        status: ContributionStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    txn.put(cf::CONTRIBUTIONS, contribution.id.as_bytes(), &contribution)?;
    txn.put_raw(
        cf::INDICES,
        &index::campaign_contribution(campaign_id, Some(contribution.id)),
        &[],
    )?;
    txn.put_raw(
        cf::INDICES,
        &index::contributor_contribution(user_id, Some(contribution.id)),
        &[],
    )?;

    if let Some(slice_config) = slices::get_slices_locked(txn, campaign_id)? {
        let percent = slices::calculate_percent(campaign.min_goal, &slice_config, amount);
        if percent > 0 {
            slices::record_purchase(
                txn,
                slice_config,
                slices::PurchaseParams {
                    campaign_id,
                    user_id,
                    contribution_id: contribution.id,
                    percent_owned: percent,
                    amount_paid: amount,
                },
            )?;
        }
    }

    tracing::debug!(
        campaign_id = %campaign_id,
        user_id,
        amount = amount.minor(),
        "contribution recorded"
    );
    Ok(contribution)
}

fn contributions_for_campaign(txn: &Txn<'_>, campaign_id: Uuid) -> Result<Vec<Contribution>> {
    let mut contributions = Vec::new();
    for (key, _) in txn.scan_prefix(
        cf::INDICES,
        &index::campaign_contribution(campaign_id, None),
    )? {
        let contribution_id = index::trailing_uuid(&key)?;
        let contribution: Contribution = txn
            .get(cf::CONTRIBUTIONS, contribution_id.as_bytes())?
            .ok_or_else(|| {
                Error::Storage(format!("contribution {} missing from index", contribution_id))
            })?;
        contributions.push(contribution);
    }
    Ok(contributions)
}

/// Lock funding once the goal is met.
///
/// No-op (`Ok(false)`) when already FUNDED. Otherwise requires LIVE, a
/// PENDING escrow, and `escrow.amount ≥ min_goal`; then locks the escrow,
/// flips the campaign to FUNDED, and bulk-transitions PENDING
/// contributions to LOCKED in the same unit.
pub fn check_and_lock_funding(txn: &Txn<'_>, campaign_id: Uuid) -> Result<bool> {
    let mut campaign = get_campaign_locked(txn, campaign_id)?;
    if campaign.status == CampaignStatus::Funded {
        return Ok(false);
    }
    if campaign.status != CampaignStatus::Live {
        return Err(Error::CampaignNotLive(campaign_id));
    }

    let held = escrow::get_escrow_locked(txn, campaign.escrow_id)?;
    if held.state != crate::types::EscrowState::Pending {
        return Err(Error::EscrowCannotLock(held.id));
    }
    if held.amount < campaign.min_goal {
        return Err(Error::GoalNotReached(campaign_id));
    }

    escrow::lock_escrow(txn, campaign.escrow_id)?;
    set_status(txn, &mut campaign, CampaignStatus::Funded)?;

    for mut contribution in contributions_for_campaign(txn, campaign_id)? {
        if contribution.status != ContributionStatus::Pending {
            continue;
        }
        contribution.status = ContributionStatus::Locked;
        contribution.updated_at = Utc::now();
        txn.put(cf::CONTRIBUTIONS, contribution.id.as_bytes(), &contribution)?;
    }

    tracing::info!(
        campaign_id = %campaign_id,
        raised = held.amount.minor(),
        goal = campaign.min_goal.minor(),
        "campaign funded"
    );
    Ok(true)
}

/// Refund a LIVE campaign whose deadline has passed.
///
/// Returns every PENDING contribution to its wallet, verifies the escrow
/// drained to exactly zero, settles it, and flips the campaign to FAILED.
/// Any single failed transfer aborts the whole unit.
pub fn refund_campaign(txn: &Txn<'_>, campaign_id: Uuid, now: DateTime<Utc>) -> Result<usize> {
    let mut campaign = get_campaign_locked(txn, campaign_id)?;
    if campaign.status != CampaignStatus::Live {
        return Err(Error::CampaignNotLive(campaign_id));
    }
    if campaign.deadline > now {
        return Err(Error::CampaignDeadlineNotReached(campaign_id));
    }

    let escrow_id = campaign.escrow_id;
    escrow::get_escrow_locked(txn, escrow_id)?;

    let mut refunded = 0usize;
    for mut contribution in contributions_for_campaign(txn, campaign_id)? {
        if contribution.status != ContributionStatus::Pending {
            continue;
        }
        wallet::escrow_to_wallet(
            txn,
            &contribution.contributor_id,
            contribution.amount,
            escrow_id,
            EntryRef::new(ReferenceKind::Refund, contribution.id.to_string()),
        )?;
        contribution.status = ContributionStatus::Refunded;
        contribution.updated_at = Utc::now();
        txn.put(cf::CONTRIBUTIONS, contribution.id.as_bytes(), &contribution)?;
        refunded += 1;
    }

    let drained = escrow::get_escrow(txn, escrow_id)?;
    if !drained.amount.is_zero() {
        return Err(Error::EscrowNotEmptyAfterRefunds {
            escrow_id,
            remaining: drained.amount.minor(),
        });
    }
    escrow::settle_escrow_after_refund(txn, escrow_id)?;
    set_status(txn, &mut campaign, CampaignStatus::Failed)?;

    tracing::info!(campaign_id = %campaign_id, refunded, "campaign refunded");
    Ok(refunded)
}

/// Pay the locked escrow out to the campaign owner.
///
/// Requires FUNDED or COMPLETED and a LOCKED escrow; transfers the full
/// balance to the owner's wallet and marks the escrow RELEASED.
pub fn release_campaign_funds(txn: &Txn<'_>, campaign_id: Uuid) -> Result<Amount> {
    let campaign = get_campaign_locked(txn, campaign_id)?;
    if !matches!(
        campaign.status,
        CampaignStatus::Funded | CampaignStatus::Completed
    ) {
        return Err(Error::CampaignNotFunded(campaign_id));
    }

    let held = escrow::get_escrow_locked(txn, campaign.escrow_id)?;
    if held.state != crate::types::EscrowState::Locked {
        return Err(Error::EscrowCannotRelease(held.id));
    }

    let amount = held.amount;
    if amount.is_positive() {
        wallet::escrow_to_wallet(
            txn,
            &campaign.owner_id,
            amount,
            held.id,
            EntryRef::new(ReferenceKind::EscrowRelease, campaign_id.to_string()),
        )?;
    }
    escrow::mark_escrow_released(txn, held.id)?;

    tracing::info!(
        campaign_id = %campaign_id,
        amount = amount.minor(),
        "campaign funds released"
    );
    Ok(amount)
}

/// `FUNDED → COMPLETED`; marks the campaign royalty-eligible.
pub fn complete_campaign(txn: &Txn<'_>, campaign_id: Uuid) -> Result<Campaign> {
    let mut campaign = get_campaign_locked(txn, campaign_id)?;
    if campaign.status != CampaignStatus::Funded {
        return Err(Error::CampaignCannotComplete(campaign_id));
    }
    set_status(txn, &mut campaign, CampaignStatus::Completed)?;
    Ok(campaign)
}

/// Whether deletion is currently permitted.
pub fn can_delete_campaign(txn: &Txn<'_>, campaign_id: Uuid) -> Result<bool> {
    let campaign = get_campaign(txn, campaign_id)?;
    if campaign.status != CampaignStatus::Draft {
        return Ok(false);
    }
    let held = escrow::get_escrow(txn, campaign.escrow_id)?;
    Ok(held.amount.is_zero())
}

/// Delete a DRAFT campaign with an empty escrow, removing the campaign,
/// escrow, slice configuration, and indices in one unit.
pub fn delete_campaign(txn: &Txn<'_>, campaign_id: Uuid) -> Result<()> {
    let campaign = get_campaign_locked(txn, campaign_id)?;
    if campaign.status != CampaignStatus::Draft {
        return Err(Error::CampaignCannotDelete(campaign_id));
    }
    let held = escrow::get_escrow_locked(txn, campaign.escrow_id)?;
    if !held.amount.is_zero() {
        return Err(Error::CampaignCannotDelete(campaign_id));
    }

    txn.delete(cf::CAMPAIGNS, campaign_id.as_bytes())?;
    txn.delete(cf::ESCROWS, held.id.as_bytes())?;
    txn.delete(cf::CAMPAIGN_SLICES, campaign_id.as_bytes())?;
    txn.delete(
        cf::INDICES,
        &index::campaign_status(campaign.status, Some(campaign_id)),
    )?;

    tracing::info!(campaign_id = %campaign_id, "campaign deleted");
    Ok(())
}

/// Resolve every LIVE campaign whose deadline has passed.
///
/// Each campaign runs in its own transaction; a failure is recorded and
/// the sweep moves on.
pub fn deadline_sweep(store: &Store, now: DateTime<Utc>) -> Result<SweepReport> {
    let mut due = Vec::new();
    for (key, _) in store.scan_prefix(
        cf::INDICES,
        &index::campaign_status(CampaignStatus::Live, None),
    )? {
        let campaign_id = index::trailing_uuid(&key)?;
        if let Some(campaign) = store.read::<Campaign>(cf::CAMPAIGNS, campaign_id.as_bytes())? {
            if campaign.deadline <= now {
                due.push(campaign_id);
            }
        }
    }

    let mut report = SweepReport::default();
    for campaign_id in due {
        report.examined += 1;
        match sweep_one(store, campaign_id, now) {
            Ok(SweepOutcome::Locked) => report.locked += 1,
            Ok(SweepOutcome::Refunded) => report.refunded += 1,
            Ok(SweepOutcome::Skipped) => {}
            Err(err) => {
                tracing::warn!(
                    campaign_id = %campaign_id,
                    error = %err,
                    code = err.code(),
                    "sweep failed for campaign"
                );
                report.failures.push(SweepFailure {
                    campaign_id,
                    code: err.code(),
                    message: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        examined = report.examined,
        locked = report.locked,
        refunded = report.refunded,
        failures = report.failures.len(),
        "deadline sweep complete"
    );
    Ok(report)
}

fn sweep_one(store: &Store, campaign_id: Uuid, now: DateTime<Utc>) -> Result<SweepOutcome> {
    store.with_txn(|txn| {
        let campaign = get_campaign_locked(txn, campaign_id)?;
        if campaign.status != CampaignStatus::Live || campaign.deadline > now {
            return Ok(SweepOutcome::Skipped);
        }
        let held = escrow::get_escrow_locked(txn, campaign.escrow_id)?;
        if held.amount >= campaign.min_goal {
            check_and_lock_funding(txn, campaign_id)?;
            Ok(SweepOutcome::Locked)
        } else {
            refund_campaign(txn, campaign_id, now)?;
            Ok(SweepOutcome::Refunded)
        }
    })
}
