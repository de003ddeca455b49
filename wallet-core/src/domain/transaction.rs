//! Wallet transaction (ledger entry) domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::Error;
use super::WalletId;

pub const CREDIT_DESCRIPTION: &str = "Wallet credited";
pub const DEBIT_DESCRIPTION: &str = "Wallet debited";
pub const INSUFFICIENT_BALANCE_DESCRIPTION: &str = "Insufficient Balance";

/// Which way a ledger entry moved the balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
    /// Nothing moved (cancelled attempts)
    None,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
            Direction::None => "none",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(Direction::Credit),
            "debit" => Ok(Direction::Debit),
            "none" => Ok(Direction::None),
            other => Err(Error::storage(format!("unknown direction '{}'", other))),
        }
    }
}

/// Terminal status of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Cancelled,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Success => "success",
            TxStatus::Cancelled => "cancelled",
            TxStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(TxStatus::Success),
            "cancelled" => Ok(TxStatus::Cancelled),
            "failed" => Ok(TxStatus::Failed),
            other => Err(Error::storage(format!("unknown status '{}'", other))),
        }
    }
}

/// Immutable record of one balance-changing event (or a refused attempt)
///
/// `amount` is the unsigned magnitude in minor units; `direction` carries
/// the sign. Entries are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: WalletId,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub direction: Direction,
    pub status: TxStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn new(
        wallet_id: WalletId,
        amount: i64,
        balance_before: i64,
        balance_after: i64,
        direction: Direction,
        status: TxStatus,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            amount,
            balance_before,
            balance_after,
            direction,
            status,
            description: description.into(),
            created_at: Utc::now(),
        }
    }

    /// Successful posting in the given direction
    pub fn posted(
        wallet_id: WalletId,
        direction: Direction,
        amount: i64,
        balance_before: i64,
        balance_after: i64,
    ) -> Self {
        let description = match direction {
            Direction::Debit => DEBIT_DESCRIPTION,
            _ => CREDIT_DESCRIPTION,
        };
        Self::new(
            wallet_id,
            amount,
            balance_before,
            balance_after,
            direction,
            TxStatus::Success,
            description,
        )
    }

    /// Attempt refused for lack of funds; the balance is left as is
    pub fn cancelled(wallet_id: WalletId, amount: i64, balance: i64) -> Self {
        Self::new(
            wallet_id,
            amount,
            balance,
            balance,
            Direction::None,
            TxStatus::Cancelled,
            INSUFFICIENT_BALANCE_DESCRIPTION,
        )
    }

    /// Amount with the sign implied by `direction`
    pub fn signed_amount(&self) -> i64 {
        match self.direction {
            Direction::Credit => self.amount,
            Direction::Debit => -self.amount,
            Direction::None => 0,
        }
    }

    /// Whether before/after balances agree with amount, direction and status
    pub fn is_consistent(&self) -> bool {
        match self.status {
            TxStatus::Success => self.balance_after - self.balance_before == self.signed_amount(),
            TxStatus::Cancelled => {
                self.balance_before == self.balance_after && self.direction == Direction::None
            }
            TxStatus::Failed => self.balance_before == self.balance_after,
        }
    }
}
