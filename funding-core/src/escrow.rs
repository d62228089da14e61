//! Escrow lifecycle primitives
//!
//! `PENDING → LOCKED → RELEASED → SETTLED`, plus the terminal shortcut
//! `PENDING → SETTLED` for the refund path when the balance is zero. Every
//! transition reads its row under an exclusive lock and rechecks the
//! source state, so a failed guard is the zero-rows-affected outcome of a
//! conditional update.

use crate::{
    storage::{cf, Txn},
    types::{Account, Escrow, EscrowState},
    Amount, Error, Result,
};
use chrono::Utc;
use uuid::Uuid;

/// Create an empty PENDING escrow for a purpose aggregate.
pub fn create_escrow(txn: &Txn<'_>, purpose: &str, purpose_id: Uuid) -> Result<Escrow> {
    let now = Utc::now();
    let escrow = Escrow {
        id: Uuid::now_v7(),
        purpose: purpose.to_string(),
        purpose_id,
        amount: Amount::ZERO,
        state: EscrowState::Pending,
        created_at: now,
        updated_at: now,
    };
    txn.put(cf::ESCROWS, escrow.id.as_bytes(), &escrow)?;
    Ok(escrow)
}

/// Plain read.
pub fn get_escrow(txn: &Txn<'_>, escrow_id: Uuid) -> Result<Escrow> {
    txn.get(cf::ESCROWS, escrow_id.as_bytes())?
        .ok_or(Error::EscrowNotFound(escrow_id))
}

/// Read under an exclusive row lock.
pub fn get_escrow_locked(txn: &Txn<'_>, escrow_id: Uuid) -> Result<Escrow> {
    txn.get_locked(cf::ESCROWS, escrow_id.as_bytes())?
        .ok_or(Error::EscrowNotFound(escrow_id))
}

fn store_escrow(txn: &Txn<'_>, escrow: &mut Escrow) -> Result<()> {
    escrow.updated_at = Utc::now();
    txn.put(cf::ESCROWS, escrow.id.as_bytes(), escrow)
}

/// Add funds; only PENDING and LOCKED escrows accept them.
pub fn increment_amount(txn: &Txn<'_>, escrow_id: Uuid, amount: Amount) -> Result<Escrow> {
    let amount = amount.require_positive()?;
    let mut escrow = get_escrow_locked(txn, escrow_id)?;
    if !escrow.state.accepts_funds() {
        return Err(Error::EscrowNotAcceptingFunds(escrow_id));
    }
    escrow.amount = escrow.amount.checked_add(amount)?;
    store_escrow(txn, &mut escrow)?;
    Ok(escrow)
}

/// Remove funds, guarded by state and sufficiency in the same locked read.
pub fn decrement_amount(txn: &Txn<'_>, escrow_id: Uuid, amount: Amount) -> Result<Escrow> {
    let amount = amount.require_positive()?;
    let mut escrow = get_escrow_locked(txn, escrow_id)?;
    if !escrow.state.accepts_funds() {
        return Err(Error::EscrowNotAcceptingFunds(escrow_id));
    }
    if escrow.amount < amount {
        return Err(Error::InsufficientEscrowBalance(escrow_id));
    }
    escrow.amount = escrow.amount.checked_sub(amount)?;
    store_escrow(txn, &mut escrow)?;
    Ok(escrow)
}

/// `PENDING → LOCKED`.
pub fn lock_escrow(txn: &Txn<'_>, escrow_id: Uuid) -> Result<Escrow> {
    let mut escrow = get_escrow_locked(txn, escrow_id)?;
    if escrow.state != EscrowState::Pending {
        return Err(Error::EscrowCannotLock(escrow_id));
    }
    escrow.state = EscrowState::Locked;
    store_escrow(txn, &mut escrow)?;
    Ok(escrow)
}

/// `LOCKED → RELEASED`.
pub fn mark_escrow_released(txn: &Txn<'_>, escrow_id: Uuid) -> Result<Escrow> {
    let mut escrow = get_escrow_locked(txn, escrow_id)?;
    if escrow.state != EscrowState::Locked {
        return Err(Error::EscrowCannotRelease(escrow_id));
    }
    escrow.state = EscrowState::Released;
    store_escrow(txn, &mut escrow)?;
    Ok(escrow)
}

/// `RELEASED → SETTLED`.
pub fn settle_escrow(txn: &Txn<'_>, escrow_id: Uuid) -> Result<Escrow> {
    let mut escrow = get_escrow_locked(txn, escrow_id)?;
    if escrow.state != EscrowState::Released {
        return Err(Error::EscrowCannotSettle(escrow_id));
    }
    escrow.state = EscrowState::Settled;
    store_escrow(txn, &mut escrow)?;
    Ok(escrow)
}

/// Terminal shortcut `PENDING → SETTLED`, permitted only on a drained
/// escrow (the refund path).
pub fn settle_escrow_after_refund(txn: &Txn<'_>, escrow_id: Uuid) -> Result<Escrow> {
    let mut escrow = get_escrow_locked(txn, escrow_id)?;
    if escrow.state != EscrowState::Pending || !escrow.amount.is_zero() {
        return Err(Error::EscrowCannotSettle(escrow_id));
    }
    escrow.state = EscrowState::Settled;
    store_escrow(txn, &mut escrow)?;
    Ok(escrow)
}

/// Reconcile the stored amount against the ledger's net flow for this
/// escrow account.
pub fn verify_escrow_backing(txn: &Txn<'_>, escrow_id: Uuid) -> Result<Escrow> {
    let escrow = get_escrow(txn, escrow_id)?;
    let ledger_net = crate::ledger::account_net_flow(txn, &Account::escrow(escrow_id))?;
    if ledger_net != escrow.amount.minor() {
        return Err(Error::EscrowBackingMismatch {
            escrow_id,
            stored: escrow.amount.minor(),
            ledger: ledger_net,
        });
    }
    Ok(escrow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Store};
    use tempfile::TempDir;

    fn test_store() -> (Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Store::open(&config).unwrap(), temp_dir)
    }

    fn new_escrow(store: &Store) -> Escrow {
        store
            .with_txn(|txn| create_escrow(txn, "campaign", Uuid::now_v7()))
            .unwrap()
    }

    #[test]
    fn test_create_starts_pending_and_empty() {
        let (store, _temp) = test_store();
        let escrow = new_escrow(&store);
        assert_eq!(escrow.state, EscrowState::Pending);
        assert!(escrow.amount.is_zero());
    }

    #[test]
    fn test_increment_and_decrement() {
        let (store, _temp) = test_store();
        let escrow = new_escrow(&store);

        let updated = store
            .with_txn(|txn| increment_amount(txn, escrow.id, Amount::from_minor(5_000)))
            .unwrap();
        assert_eq!(updated.amount.minor(), 5_000);

        let updated = store
            .with_txn(|txn| decrement_amount(txn, escrow.id, Amount::from_minor(2_000)))
            .unwrap();
        assert_eq!(updated.amount.minor(), 3_000);
    }

    #[test]
    fn test_decrement_guards_balance() {
        let (store, _temp) = test_store();
        let escrow = new_escrow(&store);

        store
            .with_txn(|txn| increment_amount(txn, escrow.id, Amount::from_minor(100)))
            .unwrap();

        let result = store.with_txn(|txn| decrement_amount(txn, escrow.id, Amount::from_minor(101)));
        assert!(matches!(result, Err(Error::InsufficientEscrowBalance(_))));
    }

    #[test]
    fn test_settled_escrow_rejects_funds() {
        let (store, _temp) = test_store();
        let escrow = new_escrow(&store);

        store
            .with_txn(|txn| settle_escrow_after_refund(txn, escrow.id))
            .unwrap();

        let result = store.with_txn(|txn| increment_amount(txn, escrow.id, Amount::from_minor(1)));
        assert!(matches!(result, Err(Error::EscrowNotAcceptingFunds(_))));
    }

    #[test]
    fn test_linear_lifecycle() {
        let (store, _temp) = test_store();
        let escrow = new_escrow(&store);

        store.with_txn(|txn| lock_escrow(txn, escrow.id)).unwrap();
        store
            .with_txn(|txn| mark_escrow_released(txn, escrow.id))
            .unwrap();
        let settled = store.with_txn(|txn| settle_escrow(txn, escrow.id)).unwrap();
        assert_eq!(settled.state, EscrowState::Settled);
    }

    #[test]
    fn test_lock_only_from_pending() {
        let (store, _temp) = test_store();
        let escrow = new_escrow(&store);

        store.with_txn(|txn| lock_escrow(txn, escrow.id)).unwrap();
        let result = store.with_txn(|txn| lock_escrow(txn, escrow.id));
        assert!(matches!(result, Err(Error::EscrowCannotLock(_))));
    }

    #[test]
    fn test_release_requires_locked() {
        let (store, _temp) = test_store();
        let escrow = new_escrow(&store);

        let result = store.with_txn(|txn| mark_escrow_released(txn, escrow.id));
        assert!(matches!(result, Err(Error::EscrowCannotRelease(_))));
    }

    #[test]
    fn test_refund_settle_requires_empty_pending() {
        let (store, _temp) = test_store();
        let escrow = new_escrow(&store);

        store
            .with_txn(|txn| increment_amount(txn, escrow.id, Amount::from_minor(10)))
            .unwrap();
        let result = store.with_txn(|txn| settle_escrow_after_refund(txn, escrow.id));
        assert!(matches!(result, Err(Error::EscrowCannotSettle(_))));
    }
}
