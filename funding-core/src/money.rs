//! Minor-unit money arithmetic
//!
//! All balances and movements are integer counts of the currency's minor
//! unit (paise). Major-unit decimals exist only at the system boundary and
//! convert here, in one place.

use crate::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minor units per major unit (rupees to paise).
pub const MINOR_PER_MAJOR: i64 = 100;

/// A monetary amount as a count of minor units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Wrap a raw minor-unit count.
    pub const fn from_minor(minor: i64) -> Self {
        Amount(minor)
    }

    /// Convert a major-unit decimal crossing the system boundary.
    ///
    /// Rejects negative values and values that are not whole in minor
    /// units (no sub-paisa amounts).
    pub fn from_major(major: Decimal) -> Result<Self> {
        let scaled = major * Decimal::from(MINOR_PER_MAJOR);
        if scaled.is_sign_negative() || !scaled.fract().is_zero() {
            return Err(Error::InvalidAmount);
        }
        scaled.to_i64().map(Amount).ok_or(Error::InvalidAmount)
    }

    /// Major-unit decimal for boundary output.
    pub fn to_major(self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(MINOR_PER_MAJOR)
    }

    /// Raw minor-unit count.
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// True when strictly greater than zero.
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// True when exactly zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, rhs: Amount) -> Result<Amount> {
        self.0
            .checked_add(rhs.0)
            .map(Amount)
            .ok_or(Error::AmountOverflow)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, rhs: Amount) -> Result<Amount> {
        self.0
            .checked_sub(rhs.0)
            .map(Amount)
            .ok_or(Error::AmountOverflow)
    }

    /// Validate this amount as a movement (strictly positive).
    pub fn require_positive(self) -> Result<Amount> {
        if self.is_positive() {
            Ok(self)
        } else {
            Err(Error::InvalidAmount)
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
