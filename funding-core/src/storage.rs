//! Storage layer using RocksDB pessimistic transactions
//!
//! Every multi-row operation runs inside one [`Txn`]: reads that feed a
//! decision go through [`Txn::get_locked`] (an exclusive row lock held
//! until commit or rollback, the `SELECT … FOR UPDATE` of this store),
//! writes are staged in the transaction and become visible atomically at
//! commit. Write-once rows use [`Txn::insert_unique`], whose conflict
//! answer stands in for a unique-constraint violation.
//!
//! # Column Families
//!
//! - `wallets` - per-user balances (key: user id)
//! - `escrows` - holding accounts (key: escrow id)
//! - `campaigns` - funding drives (key: campaign id)
//! - `contributions` - pledges (key: contribution id)
//! - `campaign_slices` - fractional-ownership config (key: campaign id)
//! - `slice_purchases` - slice ownership records (key: purchase id)
//! - `royalty_reports` - distribution events (key: report id)
//! - `royalty_payouts` - per-holder payouts (key: payout id)
//! - `ledger_entries` - append-only double-entry log (key: entry id)
//! - `processed_payments` - payment dedup records (key: payment id)
//! - `indices` - secondary indices for fast lookups

use crate::{
    error::{Error, Result},
    types::{Account, CampaignStatus},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, Transaction,
    TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Column family names
pub(crate) mod cf {
    pub const WALLETS: &str = "wallets";
    pub const ESCROWS: &str = "escrows";
    pub const CAMPAIGNS: &str = "campaigns";
    pub const CONTRIBUTIONS: &str = "contributions";
    pub const CAMPAIGN_SLICES: &str = "campaign_slices";
    pub const SLICE_PURCHASES: &str = "slice_purchases";
    pub const ROYALTY_REPORTS: &str = "royalty_reports";
    pub const ROYALTY_PAYOUTS: &str = "royalty_payouts";
    pub const LEDGER_ENTRIES: &str = "ledger_entries";
    pub const PROCESSED_PAYMENTS: &str = "processed_payments";
    pub const INDICES: &str = "indices";

    pub const ALL: &[&str] = &[
        WALLETS,
        ESCROWS,
        CAMPAIGNS,
        CONTRIBUTIONS,
        CAMPAIGN_SLICES,
        SLICE_PURCHASES,
        ROYALTY_REPORTS,
        ROYALTY_PAYOUTS,
        LEDGER_ENTRIES,
        PROCESSED_PAYMENTS,
        INDICES,
    ];
}

/// Secondary-index key builders
///
/// All index rows live in the `indices` family under a two-letter
/// namespace prefix; values are empty, the key is the data. Passing
/// `None` for the trailing id yields the scan prefix for that namespace.
pub(crate) mod index {
    use super::*;

    fn keyed(prefix: &[u8], head: &[u8], tail: Option<Uuid>) -> Vec<u8> {
        let mut key = prefix.to_vec();
        key.extend_from_slice(head);
        key.push(b'|');
        if let Some(id) = tail {
            key.extend_from_slice(id.as_bytes());
        }
        key
    }

    pub fn campaign_status(status: CampaignStatus, campaign_id: Option<Uuid>) -> Vec<u8> {
        keyed(b"cs|", &[status as u8], campaign_id)
    }

    pub fn campaign_contribution(campaign_id: Uuid, contribution_id: Option<Uuid>) -> Vec<u8> {
        keyed(b"cc|", campaign_id.as_bytes(), contribution_id)
    }

    pub fn contributor_contribution(user_id: &str, contribution_id: Option<Uuid>) -> Vec<u8> {
        keyed(b"uc|", user_id.as_bytes(), contribution_id)
    }

    pub fn campaign_purchase(campaign_id: Uuid, purchase_id: Option<Uuid>) -> Vec<u8> {
        keyed(b"cp|", campaign_id.as_bytes(), purchase_id)
    }

    pub fn user_purchase(user_id: &str, purchase_id: Option<Uuid>) -> Vec<u8> {
        keyed(b"up|", user_id.as_bytes(), purchase_id)
    }

    pub fn campaign_report(campaign_id: Uuid, report_id: Option<Uuid>) -> Vec<u8> {
        keyed(b"cr|", campaign_id.as_bytes(), report_id)
    }

    pub fn report_payout(report_id: Uuid, payout_id: Option<Uuid>) -> Vec<u8> {
        keyed(b"rp|", report_id.as_bytes(), payout_id)
    }

    pub fn user_payout(user_id: &str, payout_id: Option<Uuid>) -> Vec<u8> {
        keyed(b"uy|", user_id.as_bytes(), payout_id)
    }

    pub fn account_entry(account: &Account, entry_id: Option<Uuid>) -> Vec<u8> {
        keyed(b"ae|", account.to_string().as_bytes(), entry_id)
    }

    /// Extract the trailing UUID from an index key.
    pub fn trailing_uuid(key: &[u8]) -> Result<Uuid> {
        if key.len() < 16 {
            return Err(Error::Storage(format!(
                "index key too short for trailing uuid: {} bytes",
                key.len()
            )));
        }
        let bytes: [u8; 16] = key[key.len() - 16..]
            .try_into()
            .expect("slice length checked above");
        Ok(Uuid::from_bytes(bytes))
    }
}

/// Storage handle over a pessimistic-transaction RocksDB
///
/// Constructed once at process start and passed in explicitly; there is no
/// process-wide singleton.
pub struct Store {
    db: TransactionDB,
    deadlock_detect: bool,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create the database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(config.txn.lock_timeout_ms);
        txn_db_opts.set_default_lock_timeout(config.txn.lock_timeout_ms);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = cf::ALL
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = TransactionDB::open_cf_descriptors(&db_opts, &txn_db_opts, path, cf_descriptors)?;

        tracing::info!(path = %path.display(), column_families = cf::ALL.len(), "store opened");

        Ok(Self {
            db,
            deadlock_detect: config.txn.deadlock_detect,
        })
    }

    /// Begin a pessimistic transaction
    pub fn begin(&self) -> Txn<'_> {
        let write_opts = WriteOptions::default();
        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_deadlock_detect(self.deadlock_detect);
        Txn {
            inner: self.db.transaction_opt(&write_opts, &txn_opts),
            db: &self.db,
        }
    }

    /// Run one atomic unit: commit on `Ok`, roll back on `Err`
    pub fn with_txn<T>(&self, f: impl FnOnce(&Txn<'_>) -> Result<T>) -> Result<T> {
        let txn = self.begin();
        match f(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("column family {} not found", name)))
    }

    /// Point read outside any transaction (reporting views)
    pub(crate) fn read<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let handle = self.cf_handle(cf)?;
        match self.db.get_cf(handle, key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Prefix scan outside any transaction (reporting views)
    pub(crate) fn scan_prefix(&self, cf: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let handle = self.cf_handle(cf)?;
        let iter = self
            .db
            .iterator_cf(handle, IteratorMode::From(prefix, Direction::Forward));
        collect_prefix(iter, prefix)
    }

    /// Full scan of one column family (reporting views)
    pub(crate) fn scan_all(&self, cf: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let handle = self.cf_handle(cf)?;
        let iter = self.db.iterator_cf(handle, IteratorMode::Start);
        collect_prefix(iter, &[])
    }
}

fn collect_prefix<I>(iter: I, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>
where
    I: Iterator<Item = std::result::Result<(Box<[u8]>, Box<[u8]>), rocksdb::Error>>,
{
    let mut rows = Vec::new();
    for item in iter {
        let (key, value) = item?;
        if !key.starts_with(prefix) {
            break;
        }
        rows.push((key.to_vec(), value.to_vec()));
    }
    Ok(rows)
}

/// One atomic unit of work with pessimistic row locks
pub struct Txn<'db> {
    inner: Transaction<'db, TransactionDB>,
    db: &'db TransactionDB,
}

impl fmt::Debug for Txn<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Txn").finish_non_exhaustive()
    }
}

impl<'db> Txn<'db> {
    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("column family {} not found", name)))
    }

    /// Plain read; sees this transaction's own staged writes.
    pub(crate) fn get<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let handle = self.cf(cf)?;
        match self.inner.get_cf(handle, key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read under an exclusive row lock held until commit or rollback.
    pub(crate) fn get_locked<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let handle = self.cf(cf)?;
        match self.inner.get_for_update_cf(handle, key, true)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stage a typed write.
    pub(crate) fn put<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let handle = self.cf(cf)?;
        self.inner.put_cf(handle, key, bincode::serialize(value)?)?;
        Ok(())
    }

    /// Stage a raw write (index rows carry empty values).
    pub(crate) fn put_raw(&self, cf: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let handle = self.cf(cf)?;
        self.inner.put_cf(handle, key, value)?;
        Ok(())
    }

    /// Stage a delete.
    pub(crate) fn delete(&self, cf: &str, key: &[u8]) -> Result<()> {
        let handle = self.cf(cf)?;
        self.inner.delete_cf(handle, key)?;
        Ok(())
    }

    /// Insert a write-once row. `Ok(false)` when the key already exists;
    /// the probe takes the row lock, so two racing inserters serialize.
    pub(crate) fn insert_unique<T: Serialize>(
        &self,
        cf: &str,
        key: &[u8],
        value: &T,
    ) -> Result<bool> {
        let handle = self.cf(cf)?;
        if self.inner.get_for_update_cf(handle, key, true)?.is_some() {
            return Ok(false);
        }
        self.inner.put_cf(handle, key, bincode::serialize(value)?)?;
        Ok(true)
    }

    /// Collect rows under a prefix; sees this transaction's staged writes.
    pub(crate) fn scan_prefix(&self, cf: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let handle = self.cf(cf)?;
        let iter = self
            .inner
            .iterator_cf(handle, IteratorMode::From(prefix, Direction::Forward));
        collect_prefix(iter, prefix)
    }

    /// Commit the unit; all staged writes become visible atomically.
    pub fn commit(self) -> Result<()> {
        self.inner.commit().map_err(Into::into)
    }

    /// Discard all staged writes and release row locks.
    pub fn rollback(&self) -> Result<()> {
        self.inner.rollback().map_err(Into::into)
    }
}
