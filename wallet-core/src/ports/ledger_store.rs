//! Ledger store port - durable wallet and ledger storage
//!
//! Every balance mutation happens inside a [`UnitOfWork`]: reads, the
//! conditional balance update and the ledger append either all commit or
//! none of them do.

use crate::domain::result::Result;
use crate::domain::{UserId, Wallet, WalletId, WalletTransaction};

/// Storage backend for wallets and their ledger
///
/// The non-transactional reads default to a short-lived unit of work that is
/// rolled back. They see committed state only and carry no guarantee with
/// respect to concurrent writers.
pub trait LedgerStore: Send + Sync {
    type Unit<'a>: UnitOfWork
    where
        Self: 'a;

    /// Start a unit of work
    fn begin(&self) -> Result<Self::Unit<'_>>;

    /// Active wallet owned by `user_id`
    fn wallet_by_owner(&self, user_id: UserId) -> Result<Option<Wallet>> {
        let mut unit = self.begin()?;
        let wallet = unit.wallet_by_owner(user_id)?;
        unit.rollback()?;
        Ok(wallet)
    }

    /// Wallet by ID, including closed wallets
    fn wallet_by_id(&self, wallet_id: WalletId) -> Result<Option<Wallet>> {
        let mut unit = self.begin()?;
        let wallet = unit.wallet_by_id(wallet_id)?;
        unit.rollback()?;
        Ok(wallet)
    }

    /// Ledger entries of a wallet, oldest first
    fn transactions_for_wallet(&self, wallet_id: WalletId) -> Result<Vec<WalletTransaction>> {
        let mut unit = self.begin()?;
        let records = unit.transactions_for_wallet(wallet_id)?;
        unit.rollback()?;
        Ok(records)
    }
}

/// A scoped, atomic unit of work against the store
///
/// Dropping a unit without calling [`UnitOfWork::commit`] discards every
/// change made through it.
pub trait UnitOfWork {
    // === Wallets ===

    /// Active (not soft-deleted) wallet owned by `user_id`
    fn wallet_by_owner(&mut self, user_id: UserId) -> Result<Option<Wallet>>;

    /// Wallet by ID, including closed wallets
    fn wallet_by_id(&mut self, wallet_id: WalletId) -> Result<Option<Wallet>>;

    /// Read an active wallet with the intent to update it in this unit.
    ///
    /// Callers touching several wallets must call this in ascending
    /// wallet-ID order.
    fn wallet_for_update(&mut self, wallet_id: WalletId) -> Result<Option<Wallet>>;

    /// Create a wallet with a store-assigned ID
    fn insert_wallet(&mut self, user_id: UserId, balance: i64) -> Result<Wallet>;

    /// Mark a wallet as deleted. Returns false if it was not active.
    fn soft_delete_wallet(&mut self, wallet_id: WalletId) -> Result<bool>;

    /// Compare-and-set the balance of an active wallet.
    ///
    /// Returns false, changing nothing, when no active wallet with that ID
    /// currently holds `expected`.
    fn update_balance(&mut self, wallet_id: WalletId, expected: i64, new_balance: i64)
        -> Result<bool>;

    // === Ledger ===

    /// Append an immutable ledger entry
    fn append_transaction(&mut self, record: &WalletTransaction) -> Result<()>;

    /// Ledger entries of a wallet, oldest first
    fn transactions_for_wallet(&mut self, wallet_id: WalletId) -> Result<Vec<WalletTransaction>>;

    // === Scope ===

    fn commit(self) -> Result<()>;

    fn rollback(self) -> Result<()>;
}
