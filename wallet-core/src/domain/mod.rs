//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

pub mod money;
mod password_reset;
mod transaction;
mod wallet;
pub mod result;

pub use password_reset::PasswordReset;
pub use transaction::{
    Direction, TxStatus, WalletTransaction, CREDIT_DESCRIPTION, DEBIT_DESCRIPTION,
    INSUFFICIENT_BALANCE_DESCRIPTION,
};
pub use wallet::{UserId, Wallet, WalletId, DEFAULT_INITIAL_BALANCE};
