//! FanVault Funding Core
//!
//! The accounting core of a crowdfunding/royalty platform: double-entry
//! ledger, wallet/escrow transfer primitives, campaign funding lifecycle,
//! fractional-slice allocation, and royalty distribution.
//!
//! # Architecture
//!
//! - **Typed records**: every entity is an explicit struct (`types`)
//! - **One store**: a pessimistic-transaction RocksDB (`storage`); every
//!   operation is one atomic unit with exclusive row locks on its
//!   decision reads
//! - **Paired ledger entries**: no balance moves without its entry
//! - **Minor units**: all arithmetic in integer paise (`money`)
//!
//! # Invariants
//!
//! - Money conservation: wallet and escrow balances reconcile with the
//!   net of their ledger entries at all times
//! - No negative balances: decrements are guarded compare-and-set under
//!   the row lock
//! - Atomicity: operations roll back completely on any error; partial
//!   effects are never observable
//!
//! # Example
//!
//! ```no_run
//! use funding_core::{Config, FundingEngine};
//!
//! fn main() -> funding_core::Result<()> {
//!     let engine = FundingEngine::open(Config::default())?;
//!     let report = engine.deadline_sweep()?;
//!     println!("locked {}, refunded {}", report.locked, report.refunded);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod campaign;
pub mod config;
pub mod engine;
pub mod error;
pub mod escrow;
pub mod ledger;
pub mod metrics;
pub mod money;
pub mod payments;
pub mod queries;
pub mod royalty;
pub mod slices;
pub mod storage;
pub mod types;
pub mod wallet;

// Re-exports
pub use campaign::{CreateCampaignParams, SweepReport};
pub use config::Config;
pub use engine::FundingEngine;
pub use error::{Error, ErrorKind, Result};
pub use metrics::Metrics;
pub use money::Amount;
pub use storage::{Store, Txn};
pub use types::{
    Account, Campaign, CampaignSlices, CampaignStatus, Contribution, ContributionStatus,
    EntryRef, Escrow, EscrowState, LedgerEntry, PayoutStatus, ProcessedPayment, ReferenceKind,
    RoyaltyPayout, RoyaltyReport, RoyaltyReportStatus, SlicePurchase, Wallet,
};
