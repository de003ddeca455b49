//! Transaction recorder - appends ledger entries
//!
//! Pure append: existing entries are never read or modified here. The
//! entry joins the caller's unit of work and commits with the balance change
//! it describes.

use tracing::debug;

use crate::domain::result::{Error, Result};
use crate::domain::{Direction, WalletId, WalletTransaction};
use crate::ports::UnitOfWork;

/// Append `record` to the ledger within `unit`
pub fn record<U: UnitOfWork>(unit: &mut U, record: WalletTransaction) -> Result<WalletTransaction> {
    if !record.is_consistent() {
        return Err(Error::validation(format!(
            "ledger entry for wallet {} does not balance: {} -> {} ({} {})",
            record.wallet_id, record.balance_before, record.balance_after, record.direction,
            record.amount
        )));
    }

    unit.append_transaction(&record)?;
    debug!(
        wallet_id = %record.wallet_id,
        transaction_id = %record.id,
        direction = %record.direction,
        status = %record.status,
        amount_minor = record.amount,
        "ledger entry appended"
    );
    Ok(record)
}

/// Successful posting
pub fn record_posting<U: UnitOfWork>(
    unit: &mut U,
    wallet_id: WalletId,
    direction: Direction,
    amount_minor: i64,
    balance_before: i64,
    balance_after: i64,
) -> Result<WalletTransaction> {
    record(
        unit,
        WalletTransaction::posted(wallet_id, direction, amount_minor, balance_before, balance_after),
    )
}

/// Attempt refused for insufficient balance
pub fn record_cancelled<U: UnitOfWork>(
    unit: &mut U,
    wallet_id: WalletId,
    amount_minor: i64,
    balance: i64,
) -> Result<WalletTransaction> {
    record(unit, WalletTransaction::cancelled(wallet_id, amount_minor, balance))
}
