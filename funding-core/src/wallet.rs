//! Wallet primitives and wallet↔escrow transfers
//!
//! Balance mutations happen only here, always under the wallet row lock,
//! always paired with one ledger entry in the same transaction. The
//! balance check and the decrement share a single locked read, so no
//! interleaving can drive a wallet negative.

use crate::{
    escrow, ledger,
    storage::{cf, Txn},
    types::{Account, EntryRef, Wallet},
    Amount, Error, Result,
};
use chrono::Utc;
use uuid::Uuid;

fn require_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() {
        return Err(Error::InvalidUserId);
    }
    Ok(())
}

/// Provision a wallet; write-once per user.
pub fn create_wallet(txn: &Txn<'_>, user_id: &str) -> Result<Wallet> {
    require_user_id(user_id)?;
    let now = Utc::now();
    let wallet = Wallet {
        user_id: user_id.to_string(),
        available_balance: Amount::ZERO,
        created_at: now,
        updated_at: now,
    };
    if !txn.insert_unique(cf::WALLETS, user_id.as_bytes(), &wallet)? {
        return Err(Error::WalletAlreadyExists(user_id.to_string()));
    }
    Ok(wallet)
}

/// Current wallet row.
pub fn get_wallet(txn: &Txn<'_>, user_id: &str) -> Result<Wallet> {
    txn.get(cf::WALLETS, user_id.as_bytes())?
        .ok_or_else(|| Error::WalletNotFound(user_id.to_string()))
}

/// Credit a wallet from `source`, writing the paired ledger entry.
///
/// Fails with `WALLET_CREDIT_FAILED` when there is no wallet row to
/// update.
pub fn credit_wallet(
    txn: &Txn<'_>,
    user_id: &str,
    amount: Amount,
    source: Account,
    reference: EntryRef,
) -> Result<Wallet> {
    require_user_id(user_id)?;
    let amount = amount.require_positive()?;

    let mut wallet: Wallet = txn
        .get_locked(cf::WALLETS, user_id.as_bytes())?
        .ok_or_else(|| Error::WalletCreditFailed(user_id.to_string()))?;

    ledger::append_entry(txn, source, Account::wallet(user_id), amount, reference)?;

    wallet.available_balance = wallet.available_balance.checked_add(amount)?;
    wallet.updated_at = Utc::now();
    txn.put(cf::WALLETS, user_id.as_bytes(), &wallet)?;

    Ok(wallet)
}

/// Move funds from a wallet into an escrow.
///
/// One unit: the guarded wallet decrement, the escrow increment (state
/// permitting), and the `wallet → escrow` ledger entry.
pub fn wallet_to_escrow(
    txn: &Txn<'_>,
    user_id: &str,
    amount: Amount,
    escrow_id: Uuid,
    reference: EntryRef,
) -> Result<()> {
    require_user_id(user_id)?;
    let amount = amount.require_positive()?;

    let mut wallet: Wallet = txn
        .get_locked(cf::WALLETS, user_id.as_bytes())?
        .ok_or_else(|| Error::InsufficientWalletBalance(user_id.to_string()))?;
    if wallet.available_balance < amount {
        return Err(Error::InsufficientWalletBalance(user_id.to_string()));
    }
    wallet.available_balance = wallet.available_balance.checked_sub(amount)?;
    wallet.updated_at = Utc::now();
    txn.put(cf::WALLETS, user_id.as_bytes(), &wallet)?;

    escrow::increment_amount(txn, escrow_id, amount)?;

    ledger::append_entry(
        txn,
        Account::wallet(user_id),
        Account::escrow(escrow_id),
        amount,
        reference,
    )?;

    tracing::debug!(
        user_id,
        escrow_id = %escrow_id,
        amount = amount.minor(),
        "wallet to escrow transfer"
    );

    Ok(())
}

/// Move funds from an escrow back to a wallet (refunds, releases).
///
/// Mirror of [`wallet_to_escrow`]: guarded escrow decrement, wallet
/// credit, one `escrow → wallet` ledger entry.
pub fn escrow_to_wallet(
    txn: &Txn<'_>,
    user_id: &str,
    amount: Amount,
    escrow_id: Uuid,
    reference: EntryRef,
) -> Result<()> {
    require_user_id(user_id)?;
    let amount = amount.require_positive()?;

    escrow::decrement_amount(txn, escrow_id, amount)?;
    credit_wallet(txn, user_id, amount, Account::escrow(escrow_id), reference)?;

    tracing::debug!(
        user_id,
        escrow_id = %escrow_id,
        amount = amount.minor(),
        "escrow to wallet transfer"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReferenceKind;
    use crate::{Config, Store};
    use tempfile::TempDir;

    fn test_store() -> (Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Store::open(&config).unwrap(), temp_dir)
    }

    fn topup_ref() -> EntryRef {
        EntryRef::new(ReferenceKind::Topup, "pay_1")
    }

    fn funded_wallet(store: &Store, user_id: &str, minor: i64) {
        store
            .with_txn(|txn| {
                create_wallet(txn, user_id)?;
                credit_wallet(
                    txn,
                    user_id,
                    Amount::from_minor(minor),
                    Account::system("topup"),
                    topup_ref(),
                )
            })
            .unwrap();
    }

    #[test]
    fn test_create_wallet_write_once() {
        let (store, _temp) = test_store();
        store.with_txn(|txn| create_wallet(txn, "u1")).unwrap();
        let result = store.with_txn(|txn| create_wallet(txn, "u1"));
        assert!(matches!(result, Err(Error::WalletAlreadyExists(_))));
    }

    #[test]
    fn test_credit_missing_wallet_fails() {
        let (store, _temp) = test_store();
        let result = store.with_txn(|txn| {
            credit_wallet(
                txn,
                "ghost",
                Amount::from_minor(100),
                Account::system("topup"),
                topup_ref(),
            )
        });
        assert!(matches!(result, Err(Error::WalletCreditFailed(_))));
    }

    #[test]
    fn test_credit_writes_ledger_entry() {
        let (store, _temp) = test_store();
        funded_wallet(&store, "u1", 2_500);

        let (balance, net) = store
            .with_txn(|txn| {
                let wallet = get_wallet(txn, "u1")?;
                let net = ledger::account_net_flow(txn, &Account::wallet("u1"))?;
                Ok((wallet.available_balance.minor(), net))
            })
            .unwrap();
        assert_eq!(balance, 2_500);
        assert_eq!(net, 2_500);
    }

    #[test]
    fn test_wallet_to_escrow_moves_funds() {
        let (store, _temp) = test_store();
        funded_wallet(&store, "u1", 5_000);
        let escrow = store
            .with_txn(|txn| escrow::create_escrow(txn, "campaign", Uuid::now_v7()))
            .unwrap();

        store
            .with_txn(|txn| {
                wallet_to_escrow(
                    txn,
                    "u1",
                    Amount::from_minor(3_000),
                    escrow.id,
                    EntryRef::new(ReferenceKind::Campaign, "c1"),
                )
            })
            .unwrap();

        let (balance, escrow_amount) = store
            .with_txn(|txn| {
                Ok((
                    get_wallet(txn, "u1")?.available_balance.minor(),
                    escrow::get_escrow(txn, escrow.id)?.amount.minor(),
                ))
            })
            .unwrap();
        assert_eq!(balance, 2_000);
        assert_eq!(escrow_amount, 3_000);

        store
            .with_txn(|txn| escrow::verify_escrow_backing(txn, escrow.id))
            .unwrap();
    }

    #[test]
    fn test_insufficient_balance_leaves_nothing_behind() {
        let (store, _temp) = test_store();
        funded_wallet(&store, "u1", 100);
        let escrow = store
            .with_txn(|txn| escrow::create_escrow(txn, "campaign", Uuid::now_v7()))
            .unwrap();

        let result = store.with_txn(|txn| {
            wallet_to_escrow(
                txn,
                "u1",
                Amount::from_minor(101),
                escrow.id,
                EntryRef::new(ReferenceKind::Campaign, "c1"),
            )
        });
        assert!(matches!(result, Err(Error::InsufficientWalletBalance(_))));

        let (balance, escrow_amount) = store
            .with_txn(|txn| {
                Ok((
                    get_wallet(txn, "u1")?.available_balance.minor(),
                    escrow::get_escrow(txn, escrow.id)?.amount.minor(),
                ))
            })
            .unwrap();
        assert_eq!(balance, 100);
        assert_eq!(escrow_amount, 0);
    }

    #[test]
    fn test_escrow_to_wallet_roundtrip() {
        let (store, _temp) = test_store();
        funded_wallet(&store, "u1", 1_000);
        let escrow = store
            .with_txn(|txn| escrow::create_escrow(txn, "campaign", Uuid::now_v7()))
            .unwrap();

        store
            .with_txn(|txn| {
                wallet_to_escrow(
                    txn,
                    "u1",
                    Amount::from_minor(1_000),
                    escrow.id,
                    EntryRef::new(ReferenceKind::Campaign, "c1"),
                )
            })
            .unwrap();
        store
            .with_txn(|txn| {
                escrow_to_wallet(
                    txn,
                    "u1",
                    Amount::from_minor(1_000),
                    escrow.id,
                    EntryRef::new(ReferenceKind::Refund, "c1"),
                )
            })
            .unwrap();

        let balance = store
            .with_txn(|txn| Ok(get_wallet(txn, "u1")?.available_balance.minor()))
            .unwrap();
        assert_eq!(balance, 1_000);

        store
            .with_txn(|txn| escrow::verify_escrow_backing(txn, escrow.id))
            .unwrap();
    }
}
