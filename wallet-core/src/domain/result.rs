//! Result and error types for the core library

use thiserror::Error;

use super::{UserId, WalletId};

/// Core library error type
///
/// `InsufficientBalance` is a business outcome: whenever it is returned a
/// cancelled ledger record has already been committed for the wallet.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Wallet not found for user {user_id}")]
    WalletNotFound { user_id: UserId },

    #[error("Wallet not found: {wallet_id}")]
    WalletIdNotFound { wallet_id: WalletId },

    #[error("User {user_id} already has a wallet")]
    WalletAlreadyExists { user_id: UserId },

    #[error(
        "Insufficient balance in wallet {wallet_id}: balance {balance}, requested {requested_minor}"
    )]
    InsufficientBalance {
        wallet_id: WalletId,
        balance: i64,
        requested_minor: i64,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    /// A transfer's debit was applied but neither the credit nor a rollback
    /// could be completed. The ledger needs manual reconciliation.
    #[error(
        "Partial transfer of {amount_minor} from wallet {sender_wallet_id} to wallet {recipient_wallet_id}: {cause}"
    )]
    PartialApply {
        sender_wallet_id: WalletId,
        recipient_wallet_id: WalletId,
        amount_minor: i64,
        cause: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No password reset pending for {0}")]
    ResetTokenNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True when the failed call left no trace in the store and may be
    /// repeated as-is.
    pub fn is_side_effect_free(&self) -> bool {
        matches!(
            self,
            Self::WalletNotFound { .. }
                | Self::WalletIdNotFound { .. }
                | Self::WalletAlreadyExists { .. }
                | Self::Validation(_)
                | Self::ResetTokenNotFound(_)
        )
    }

    /// Ledger corruption that must be surfaced to an operator
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PartialApply { .. })
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_failures_are_side_effect_free() {
        assert!(Error::WalletNotFound { user_id: UserId(7) }.is_side_effect_free());
        assert!(Error::validation("bad amount").is_side_effect_free());

        let cancelled = Error::InsufficientBalance {
            wallet_id: WalletId(1),
            balance: 0,
            requested_minor: 100,
        };
        assert!(!cancelled.is_side_effect_free());
        assert!(!Error::storage("disk full").is_side_effect_free());
    }

    #[test]
    fn test_partial_apply_is_fatal() {
        let err = Error::PartialApply {
            sender_wallet_id: WalletId(1),
            recipient_wallet_id: WalletId(2),
            amount_minor: 500,
            cause: "rollback failed".to_string(),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("wallet 1 to wallet 2"));
        assert!(!Error::storage("x").is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::WalletNotFound { user_id: UserId(42) };
        assert_eq!(err.to_string(), "Wallet not found for user 42");

        let err = Error::validation("amount must be positive");
        assert!(err.to_string().contains("Validation error"));
    }
}
