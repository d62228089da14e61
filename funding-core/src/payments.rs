//! Write-once dedup records for external payment events
//!
//! The unique `payment_id` key is the idempotency backstop: the insert
//! probe takes the row lock, so two racing deliveries of the same event
//! serialize and exactly one sees a fresh insert.

use crate::{
    storage::{cf, Txn},
    types::ProcessedPayment,
    Result,
};

/// Insert the dedup row; `Ok(false)` when the payment was already
/// recorded.
pub fn record_processed(txn: &Txn<'_>, payment: &ProcessedPayment) -> Result<bool> {
    txn.insert_unique(
        cf::PROCESSED_PAYMENTS,
        payment.payment_id.as_bytes(),
        payment,
    )
}

/// Dedup row for a payment id, if one exists.
pub fn get_processed(txn: &Txn<'_>, payment_id: &str) -> Result<Option<ProcessedPayment>> {
    txn.get(cf::PROCESSED_PAYMENTS, payment_id.as_bytes())
}
