//! Wallet domain model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::money;

/// Balance every new wallet starts with, in minor units (100.00)
pub const DEFAULT_INITIAL_BALANCE: i64 = 10_000;

/// Surrogate wallet identifier, assigned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(pub i64);

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the user owning a wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's wallet
///
/// Each user has at most one wallet that is not soft-deleted. The balance is
/// stored in minor units and only changes through credit/debit postings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    /// Balance in minor units (cents)
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the wallet is closed; rows are never hard-deleted
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Wallet {
    /// Create a wallet value with a store-assigned ID
    pub fn new(id: WalletId, user_id: UserId, balance: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            balance,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Transfer sufficiency check.
    ///
    /// Compares the balance truncated to whole major units against the
    /// requested major-unit amount: 150 minor units covers 1 but not 2.
    pub fn covers(&self, amount_major: i64) -> bool {
        money::truncated_major(self.balance) >= amount_major
    }

    /// Balance rendered in major units, e.g. "100.00"
    pub fn display_balance(&self) -> String {
        money::format_major(self.balance)
    }
}
