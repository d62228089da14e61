//! Royalty distribution
//!
//! A report captures one revenue figure for a funded campaign; the payout
//! run pays each slice holder `floor(revenue × percent ÷ 100)` into their
//! wallet. The whole run is one transaction guarded by the report row
//! lock, so a partial payout set is never observable. The floor remainder
//! stays undistributed.

use crate::{
    campaign, slices,
    storage::{cf, index, Txn},
    types::{
        Account, CampaignStatus, EntryRef, PayoutStatus, ReferenceKind, RoyaltyPayout,
        RoyaltyReport, RoyaltyReportStatus,
    },
    wallet, Amount, Error, Result,
};
use chrono::Utc;
use uuid::Uuid;

/// Create a PENDING report for a FUNDED or COMPLETED campaign.
pub fn create_report(txn: &Txn<'_>, campaign_id: Uuid, total_revenue: Amount) -> Result<RoyaltyReport> {
    let total_revenue = total_revenue.require_positive()?;

    let target = campaign::get_campaign(txn, campaign_id)?;
    if !matches!(
        target.status,
        CampaignStatus::Funded | CampaignStatus::Completed
    ) {
        return Err(Error::CampaignNotFunded(campaign_id));
    }

    let report = RoyaltyReport {
        id: Uuid::now_v7(),
        campaign_id,
        total_revenue,
        status: RoyaltyReportStatus::Pending,
        created_at: Utc::now(),
        processed_at: None,
    };
    txn.put(cf::ROYALTY_REPORTS, report.id.as_bytes(), &report)?;
    txn.put_raw(
        cf::INDICES,
        &index::campaign_report(campaign_id, Some(report.id)),
        &[],
    )?;

    tracing::info!(
        report_id = %report.id,
        campaign_id = %campaign_id,
        total_revenue = total_revenue.minor(),
        "royalty report created"
    );
    Ok(report)
}

/// Plain read.
pub fn get_report(txn: &Txn<'_>, report_id: Uuid) -> Result<RoyaltyReport> {
    txn.get(cf::ROYALTY_REPORTS, report_id.as_bytes())?
        .ok_or(Error::ReportNotFound(report_id))
}

/// Per-holder amounts the report would pay, without paying them.
pub fn compute_payout_amounts(txn: &Txn<'_>, report: &RoyaltyReport) -> Result<Vec<(String, u32, Amount)>> {
    let mut amounts = Vec::new();
    for (user_id, percent) in slices::holder_percents(txn, report.campaign_id)? {
        let minor = (report.total_revenue.minor() as i128 * percent as i128 / 100) as i64;
        if minor == 0 {
            continue;
        }
        amounts.push((user_id, percent, Amount::from_minor(minor)));
    }
    Ok(amounts)
}

/// Pay every slice holder of a PENDING report and flip it COMPLETED.
///
/// Double-invocation defenses: the report row lock, the PENDING status
/// check, and a probe for pre-existing payout rows.
pub fn payout(txn: &Txn<'_>, report_id: Uuid) -> Result<Vec<RoyaltyPayout>> {
    let mut report: RoyaltyReport = txn
        .get_locked(cf::ROYALTY_REPORTS, report_id.as_bytes())?
        .ok_or(Error::ReportNotFound(report_id))?;
    if report.status != RoyaltyReportStatus::Pending {
        return Err(Error::ReportAlreadyProcessed(report_id));
    }
    if !txn
        .scan_prefix(cf::INDICES, &index::report_payout(report_id, None))?
        .is_empty()
    {
        return Err(Error::ReportAlreadyHasPayouts(report_id));
    }

    let mut payouts = Vec::new();
    for (user_id, percent, amount) in compute_payout_amounts(txn, &report)? {
        let paid = RoyaltyPayout {
            id: Uuid::now_v7(),
            report_id,
            user_id: user_id.clone(),
            slice_percent: percent,
            amount,
            status: PayoutStatus::Paid,
            paid_at: Utc::now(),
        };
        txn.put(cf::ROYALTY_PAYOUTS, paid.id.as_bytes(), &paid)?;
        txn.put_raw(
            cf::INDICES,
            &index::report_payout(report_id, Some(paid.id)),
            &[],
        )?;
        txn.put_raw(cf::INDICES, &index::user_payout(&user_id, Some(paid.id)), &[])?;

        wallet::credit_wallet(
            txn,
            &user_id,
            amount,
            Account::system("royalty"),
            EntryRef::new(ReferenceKind::Royalty, paid.id.to_string()),
        )?;

        payouts.push(paid);
    }

    let current: RoyaltyReport = txn
        .get(cf::ROYALTY_REPORTS, report_id.as_bytes())?
        .ok_or(Error::ReportNotFound(report_id))?;
    if current.status != RoyaltyReportStatus::Pending {
        return Err(Error::ReportStatusUpdateFailed(report_id));
    }
    report.status = RoyaltyReportStatus::Completed;
    report.processed_at = Some(Utc::now());
    txn.put(cf::ROYALTY_REPORTS, report_id.as_bytes(), &report)?;

    tracing::info!(
        report_id = %report_id,
        payouts = payouts.len(),
        "royalty payouts completed"
    );
    Ok(payouts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::{
        check_and_lock_funding, contribute, create_campaign, publish_campaign,
        CreateCampaignParams,
    };
    use crate::{Config, Store};
    use chrono::Duration;
    use tempfile::TempDir;

    fn test_store() -> (Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Store::open(&config).unwrap(), temp_dir)
    }

    fn funded_wallet(store: &Store, user_id: &str, minor: i64) {
        store
            .with_txn(|txn| {
                wallet::create_wallet(txn, user_id)?;
                if minor > 0 {
                    wallet::credit_wallet(
                        txn,
                        user_id,
                        Amount::from_minor(minor),
                        Account::system("topup"),
                        EntryRef::new(ReferenceKind::Topup, format!("seed_{}", user_id)),
                    )?;
                }
                Ok(())
            })
            .unwrap();
    }

    /// Funded campaign with holders at 30% and 10% (goal 100_000, cap 40).
    fn funded_campaign_with_holders(store: &Store) -> Uuid {
        funded_wallet(store, "holder30", 75_000);
        funded_wallet(store, "holder10", 25_000);

        let campaign = store
            .with_txn(|txn| {
                let campaign = create_campaign(
                    txn,
                    CreateCampaignParams {
                        owner_id: "artist1".to_string(),
                        title: "LP".to_string(),
                        description: "".to_string(),
                        min_goal: Amount::from_minor(100_000),
                        deadline: Utc::now() + Duration::days(7),
                        percent_cap: Some(40),
                    },
                )?;
                publish_campaign(txn, campaign.id, Utc::now())
            })
            .unwrap();

        // 75000/100000 * 40 = 30%, 25000/100000 * 40 = 10%
        store
            .with_txn(|txn| contribute(txn, campaign.id, "holder30", Amount::from_minor(75_000)))
            .unwrap();
        store
            .with_txn(|txn| contribute(txn, campaign.id, "holder10", Amount::from_minor(25_000)))
            .unwrap();

        store
            .with_txn(|txn| check_and_lock_funding(txn, campaign.id))
            .unwrap();
        campaign.id
    }

    #[test]
    fn test_report_requires_funded_campaign() {
        let (store, _temp) = test_store();
        funded_wallet(&store, "backer1", 1_000);

        let campaign = store
            .with_txn(|txn| {
                let campaign = create_campaign(
                    txn,
                    CreateCampaignParams {
                        owner_id: "artist1".to_string(),
                        title: "LP".to_string(),
                        description: "".to_string(),
                        min_goal: Amount::from_minor(10_000),
                        deadline: Utc::now() + Duration::days(7),
                        percent_cap: None,
                    },
                )?;
                publish_campaign(txn, campaign.id, Utc::now())
            })
            .unwrap();

        let result =
            store.with_txn(|txn| create_report(txn, campaign.id, Amount::from_minor(1_000)));
        assert!(matches!(result, Err(Error::CampaignNotFunded(_))));
    }

    #[test]
    fn test_payout_scenario() {
        // Scenario D: revenue 100000; holders at 30% and 10%
        let (store, _temp) = test_store();
        let campaign_id = funded_campaign_with_holders(&store);

        let report = store
            .with_txn(|txn| create_report(txn, campaign_id, Amount::from_minor(100_000)))
            .unwrap();

        let payouts = store.with_txn(|txn| payout(txn, report.id)).unwrap();
        assert_eq!(payouts.len(), 2);

        let by_user: std::collections::HashMap<_, _> = payouts
            .iter()
            .map(|p| (p.user_id.as_str(), p.amount.minor()))
            .collect();
        assert_eq!(by_user["holder30"], 30_000);
        assert_eq!(by_user["holder10"], 10_000);

        let completed = store.with_txn(|txn| get_report(txn, report.id)).unwrap();
        assert_eq!(completed.status, RoyaltyReportStatus::Completed);
        assert!(completed.processed_at.is_some());

        // wallets got credited on top of what was left after pledging
        let (b30, b10) = store
            .with_txn(|txn| {
                Ok((
                    wallet::get_wallet(txn, "holder30")?.available_balance.minor(),
                    wallet::get_wallet(txn, "holder10")?.available_balance.minor(),
                ))
            })
            .unwrap();
        assert_eq!(b30, 30_000);
        assert_eq!(b10, 10_000);
    }

    #[test]
    fn test_payout_rejects_second_invocation() {
        let (store, _temp) = test_store();
        let campaign_id = funded_campaign_with_holders(&store);

        let report = store
            .with_txn(|txn| create_report(txn, campaign_id, Amount::from_minor(100_000)))
            .unwrap();
        store.with_txn(|txn| payout(txn, report.id)).unwrap();

        let result = store.with_txn(|txn| payout(txn, report.id));
        assert!(matches!(result, Err(Error::ReportAlreadyProcessed(_))));
    }

    #[test]
    fn test_zero_amount_holders_skipped() {
        let (store, _temp) = test_store();
        let campaign_id = funded_campaign_with_holders(&store);

        // revenue 3: floor(3*30/100) = 0 and floor(3*10/100) = 0
        let report = store
            .with_txn(|txn| create_report(txn, campaign_id, Amount::from_minor(3)))
            .unwrap();

        let payouts = store.with_txn(|txn| payout(txn, report.id)).unwrap();
        assert_eq!(payouts.len(), 0);

        let completed = store.with_txn(|txn| get_report(txn, report.id)).unwrap();
        assert_eq!(completed.status, RoyaltyReportStatus::Completed);
    }

    #[test]
    fn test_floor_remainder_undistributed() {
        let (store, _temp) = test_store();
        let campaign_id = funded_campaign_with_holders(&store);

        // 101 at 30% => 30, at 10% => 10; 61 minor units stay behind
        let report = store
            .with_txn(|txn| create_report(txn, campaign_id, Amount::from_minor(101)))
            .unwrap();
        let payouts = store.with_txn(|txn| payout(txn, report.id)).unwrap();
        let paid: i64 = payouts.iter().map(|p| p.amount.minor()).sum();
        assert_eq!(paid, 40);
    }

    #[test]
    fn test_invalid_revenue_rejected() {
        let (store, _temp) = test_store();
        let campaign_id = funded_campaign_with_holders(&store);

        let result = store.with_txn(|txn| create_report(txn, campaign_id, Amount::ZERO));
        assert!(matches!(result, Err(Error::InvalidAmount)));
    }
}
