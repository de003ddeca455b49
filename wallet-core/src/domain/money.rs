//! Major/minor unit conversion
//!
//! Callers pass whole major units (dollars); balances and ledger amounts are
//! kept in minor units (cents).

use rust_decimal::Decimal;

use super::result::{Error, Result};

pub const MINOR_PER_MAJOR: i64 = 100;

/// Convert a positive major-unit amount to minor units
pub fn to_minor(amount_major: i64) -> Result<i64> {
    if amount_major <= 0 {
        return Err(Error::validation(format!(
            "amount must be positive, got {}",
            amount_major
        )));
    }
    amount_major
        .checked_mul(MINOR_PER_MAJOR)
        .ok_or_else(|| Error::validation(format!("amount {} is too large", amount_major)))
}

/// Minor units expressed as whole major units, truncated toward zero
pub fn truncated_major(minor: i64) -> i64 {
    minor / MINOR_PER_MAJOR
}

/// Render minor units as a two-decimal major amount
pub fn format_major(minor: i64) -> String {
    Decimal::new(minor, 2).to_string()
}
