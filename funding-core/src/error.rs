//! Error types for the funding core
//!
//! Every failure carries a stable machine code (`Error::code`) so callers
//! can branch on outcomes without matching on message text.

use thiserror::Error;
use uuid::Uuid;

/// Result type for funding-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure class, mirroring the retry semantics of each code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input rejected before any mutation; retry after correcting.
    Validation,
    /// Aggregate not in the required state; needs an external state change.
    StateConflict,
    /// Guarded operation found insufficient funds; retryable later.
    ResourceExhaustion,
    /// Internal consistency check failed; fatal for the operation.
    InvariantViolation,
    /// Externally retried event already applied; a successful no-op.
    DuplicateDelivery,
    /// Storage/serialization/config failure.
    Infrastructure,
}

/// Funding core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Amount is zero, negative, or not a whole minor-unit count
    #[error("amount must be a positive whole number of minor units")]
    InvalidAmount,

    /// Amount arithmetic would overflow
    #[error("amount arithmetic overflow")]
    AmountOverflow,

    /// User identifier is empty
    #[error("user id must be non-empty")]
    InvalidUserId,

    /// Payment identifier is empty
    #[error("payment id must be non-empty")]
    InvalidPaymentId,

    /// Campaign identifier missing where required
    #[error("campaign id is required for campaign payments")]
    InvalidCampaignId,

    /// Provider identifier is empty
    #[error("payment provider must be non-empty")]
    InvalidProvider,

    /// Percent cap outside (0, 100]
    #[error("percent cap must be within 1..=100, got {0}")]
    InvalidPercentCap(u32),

    /// Campaign row missing
    #[error("campaign not found: {0}")]
    CampaignNotFound(Uuid),

    /// Campaign is not accepting contributions
    #[error("campaign {0} is not live")]
    CampaignNotLive(Uuid),

    /// Campaign has not reached the funded stage
    #[error("campaign {0} is not funded")]
    CampaignNotFunded(Uuid),

    /// Publish guard failed (not draft, or deadline already passed)
    #[error("campaign {0} cannot be published")]
    CampaignCannotPublish(Uuid),

    /// Delete guard failed (not draft, or escrow holds funds)
    #[error("campaign {0} cannot be deleted")]
    CampaignCannotDelete(Uuid),

    /// Completion guard failed (not funded)
    #[error("campaign {0} cannot be completed")]
    CampaignCannotComplete(Uuid),

    /// Refund requested before the campaign deadline
    #[error("campaign {0} deadline has not been reached")]
    CampaignDeadlineNotReached(Uuid),

    /// Slice configuration already exists for the campaign
    #[error("campaign {0} already has a slice configuration")]
    CampaignSlicesAlreadyExist(Uuid),

    /// Escrow row missing
    #[error("escrow not found: {0}")]
    EscrowNotFound(Uuid),

    /// Escrow state does not admit balance changes
    #[error("escrow {0} is not accepting funds")]
    EscrowNotAcceptingFunds(Uuid),

    /// Lock transition guard failed (escrow not PENDING)
    #[error("escrow {0} cannot be locked")]
    EscrowCannotLock(Uuid),

    /// Release transition guard failed (escrow not LOCKED)
    #[error("escrow {0} cannot be released")]
    EscrowCannotRelease(Uuid),

    /// Settle transition guard failed
    #[error("escrow {0} cannot be settled")]
    EscrowCannotSettle(Uuid),

    /// Wallet row missing on a read
    #[error("wallet not found for user {0}")]
    WalletNotFound(String),

    /// Wallet provisioning conflict
    #[error("wallet already exists for user {0}")]
    WalletAlreadyExists(String),

    /// Credit found no wallet row to update
    #[error("wallet credit failed for user {0}")]
    WalletCreditFailed(String),

    /// Royalty report row missing
    #[error("royalty report not found: {0}")]
    ReportNotFound(Uuid),

    /// Payout invoked on a non-PENDING report
    #[error("royalty report {0} already processed")]
    ReportAlreadyProcessed(Uuid),

    /// Payout rows already exist for the report
    #[error("royalty report {0} already has payouts")]
    ReportAlreadyHasPayouts(Uuid),

    /// Guarded wallet decrement found insufficient balance
    #[error("insufficient wallet balance for user {0}")]
    InsufficientWalletBalance(String),

    /// Guarded escrow decrement found insufficient balance
    #[error("insufficient escrow balance in escrow {0}")]
    InsufficientEscrowBalance(Uuid),

    /// Funding goal not met at lock time
    #[error("campaign {0} has not reached its funding goal")]
    GoalNotReached(Uuid),

    /// Refund loop left a nonzero escrow balance
    #[error("escrow {escrow_id} holds {remaining} minor units after refunds")]
    EscrowNotEmptyAfterRefunds {
        /// Escrow whose refunds did not drain it
        escrow_id: Uuid,
        /// Minor units left behind
        remaining: i64,
    },

    /// Stored escrow amount diverges from the ledger's net flow
    #[error("escrow {escrow_id} amount {stored} diverges from ledger net {ledger}")]
    EscrowBackingMismatch {
        /// Escrow under reconciliation
        escrow_id: Uuid,
        /// Amount recorded on the escrow row
        stored: i64,
        /// Net inflow recomputed from ledger entries
        ledger: i64,
    },

    /// Campaign status flip found an unexpected state mid-unit
    #[error("campaign {0} status update failed")]
    CampaignStatusUpdateFailed(Uuid),

    /// Report status flip found an unexpected state mid-unit
    #[error("royalty report {0} status update failed")]
    ReportStatusUpdateFailed(Uuid),

    /// Payment event already applied (detected via write-once conflict)
    #[error("payment {0} already processed")]
    PaymentAlreadyProcessed(String),

    /// Row-lock contention or transaction conflict; safe to retry
    #[error("store contention: {0}")]
    StoreContention(String),

    /// Storage error (RocksDB)
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidAmount => "INVALID_AMOUNT",
            Error::AmountOverflow => "AMOUNT_OVERFLOW",
            Error::InvalidUserId => "INVALID_USER_ID",
            Error::InvalidPaymentId => "INVALID_PAYMENT_ID",
            Error::InvalidCampaignId => "INVALID_CAMPAIGN_ID",
            Error::InvalidProvider => "INVALID_PROVIDER",
            Error::InvalidPercentCap(_) => "INVALID_PERCENT_CAP",
            Error::CampaignNotFound(_) => "CAMPAIGN_NOT_FOUND",
            Error::CampaignNotLive(_) => "CAMPAIGN_NOT_LIVE",
            Error::CampaignNotFunded(_) => "CAMPAIGN_NOT_FUNDED",
            Error::CampaignCannotPublish(_) => "CAMPAIGN_CANNOT_PUBLISH",
            Error::CampaignCannotDelete(_) => "CAMPAIGN_CANNOT_DELETE",
            Error::CampaignCannotComplete(_) => "CAMPAIGN_CANNOT_COMPLETE",
            Error::CampaignDeadlineNotReached(_) => "CAMPAIGN_DEADLINE_NOT_REACHED",
            Error::CampaignSlicesAlreadyExist(_) => "CAMPAIGN_SLICES_ALREADY_EXIST",
            Error::EscrowNotFound(_) => "ESCROW_NOT_FOUND",
            Error::EscrowNotAcceptingFunds(_) => "ESCROW_NOT_ACCEPTING_FUNDS",
            Error::EscrowCannotLock(_) => "ESCROW_CANNOT_LOCK",
            Error::EscrowCannotRelease(_) => "ESCROW_CANNOT_RELEASE",
            Error::EscrowCannotSettle(_) => "ESCROW_CANNOT_SETTLE",
            Error::WalletNotFound(_) => "WALLET_NOT_FOUND",
            Error::WalletAlreadyExists(_) => "WALLET_ALREADY_EXISTS",
            Error::WalletCreditFailed(_) => "WALLET_CREDIT_FAILED",
            Error::ReportNotFound(_) => "REPORT_NOT_FOUND",
            Error::ReportAlreadyProcessed(_) => "REPORT_ALREADY_PROCESSED",
            Error::ReportAlreadyHasPayouts(_) => "REPORT_ALREADY_HAS_PAYOUTS",
            Error::InsufficientWalletBalance(_) => "INSUFFICIENT_WALLET_BALANCE",
            Error::InsufficientEscrowBalance(_) => "INSUFFICIENT_ESCROW_BALANCE",
            Error::GoalNotReached(_) => "GOAL_NOT_REACHED",
            Error::EscrowNotEmptyAfterRefunds { .. } => "ESCROW_NOT_EMPTY_AFTER_REFUNDS",
            Error::EscrowBackingMismatch { .. } => "ESCROW_BACKING_MISMATCH",
            Error::CampaignStatusUpdateFailed(_) => "CAMPAIGN_STATUS_UPDATE_FAILED",
            Error::ReportStatusUpdateFailed(_) => "REPORT_STATUS_UPDATE_FAILED",
            Error::PaymentAlreadyProcessed(_) => "PAYMENT_ALREADY_PROCESSED",
            Error::StoreContention(_) => "STORE_CONTENTION",
            Error::Storage(_) => "STORAGE",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Config(_) => "CONFIG",
            Error::Io(_) => "IO",
        }
    }

    /// Failure class governing retry semantics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAmount
            | Error::AmountOverflow
            | Error::InvalidUserId
            | Error::InvalidPaymentId
            | Error::InvalidCampaignId
            | Error::InvalidProvider
            | Error::InvalidPercentCap(_) => ErrorKind::Validation,

            Error::CampaignNotFound(_)
            | Error::CampaignNotLive(_)
            | Error::CampaignNotFunded(_)
            | Error::CampaignCannotPublish(_)
            | Error::CampaignCannotDelete(_)
            | Error::CampaignCannotComplete(_)
            | Error::CampaignDeadlineNotReached(_)
            | Error::CampaignSlicesAlreadyExist(_)
            | Error::EscrowNotFound(_)
            | Error::EscrowNotAcceptingFunds(_)
            | Error::EscrowCannotLock(_)
            | Error::EscrowCannotRelease(_)
            | Error::EscrowCannotSettle(_)
            | Error::WalletNotFound(_)
            | Error::WalletAlreadyExists(_)
            | Error::WalletCreditFailed(_)
            | Error::ReportNotFound(_)
            | Error::ReportAlreadyProcessed(_)
            | Error::ReportAlreadyHasPayouts(_) => ErrorKind::StateConflict,

            Error::InsufficientWalletBalance(_)
            | Error::InsufficientEscrowBalance(_)
            | Error::GoalNotReached(_) => ErrorKind::ResourceExhaustion,

            Error::EscrowNotEmptyAfterRefunds { .. }
            | Error::EscrowBackingMismatch { .. }
            | Error::CampaignStatusUpdateFailed(_)
            | Error::ReportStatusUpdateFailed(_) => ErrorKind::InvariantViolation,

            Error::PaymentAlreadyProcessed(_) => ErrorKind::DuplicateDelivery,

            Error::StoreContention(_)
            | Error::Storage(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Io(_) => ErrorKind::Infrastructure,
        }
    }

    /// True for transient failures a caller may retry unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreContention(_))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        use rocksdb::ErrorKind as Rk;
        match err.kind() {
            Rk::Busy | Rk::TimedOut | Rk::TryAgain => Error::StoreContention(err.to_string()),
            _ => Error::Storage(err.to_string()),
        }
    }
}
