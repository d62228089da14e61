//! Append-only double-entry ledger
//!
//! Every balance mutation in the system pairs with exactly one entry
//! written here, inside the same transaction, so an account's stored
//! balance always reconciles with its net ledger flow.

use crate::{
    storage::{cf, index, Txn},
    types::{Account, EntryRef, LedgerEntry},
    Amount, Error, Result,
};
use chrono::Utc;
use uuid::Uuid;

/// Append one entry for a value movement.
///
/// Entries are immutable; nothing in the crate updates or deletes them.
pub fn append_entry(
    txn: &Txn<'_>,
    debit: Account,
    credit: Account,
    amount: Amount,
    reference: EntryRef,
) -> Result<LedgerEntry> {
    let amount = amount.require_positive()?;
    let entry = LedgerEntry {
        id: Uuid::now_v7(),
        debit_account: debit,
        credit_account: credit,
        amount,
        reference,
        created_at: Utc::now(),
    };

    txn.put(cf::LEDGER_ENTRIES, entry.id.as_bytes(), &entry)?;
    txn.put_raw(
        cf::INDICES,
        &index::account_entry(&entry.debit_account, Some(entry.id)),
        &[],
    )?;
    txn.put_raw(
        cf::INDICES,
        &index::account_entry(&entry.credit_account, Some(entry.id)),
        &[],
    )?;

    tracing::debug!(
        entry_id = %entry.id,
        debit = %entry.debit_account,
        credit = %entry.credit_account,
        amount = entry.amount.minor(),
        "ledger entry appended"
    );

    Ok(entry)
}

/// Net minor-unit flow into an account across all its entries.
///
/// Credits add, debits subtract; the result backs the escrow
/// reconciliation check.
pub fn account_net_flow(txn: &Txn<'_>, account: &Account) -> Result<i64> {
    let prefix = index::account_entry(account, None);
    let mut net = 0i64;
    for (key, _) in txn.scan_prefix(cf::INDICES, &prefix)? {
        let entry_id = index::trailing_uuid(&key)?;
        let entry: LedgerEntry = txn
            .get(cf::LEDGER_ENTRIES, entry_id.as_bytes())?
            .ok_or_else(|| Error::Storage(format!("ledger entry {} missing from index", entry_id)))?;
        if &entry.credit_account == account {
            net += entry.amount.minor();
        }
        if &entry.debit_account == account {
            net -= entry.amount.minor();
        }
    }
    Ok(net)
}

/// All entries touching an account, oldest first.
pub fn entries_for_account(txn: &Txn<'_>, account: &Account) -> Result<Vec<LedgerEntry>> {
    let prefix = index::account_entry(account, None);
    let mut entries = Vec::new();
    for (key, _) in txn.scan_prefix(cf::INDICES, &prefix)? {
        let entry_id = index::trailing_uuid(&key)?;
        let entry: LedgerEntry = txn
            .get(cf::LEDGER_ENTRIES, entry_id.as_bytes())?
            .ok_or_else(|| Error::Storage(format!("ledger entry {} missing from index", entry_id)))?;
        entries.push(entry);
    }
    Ok(entries)
}
