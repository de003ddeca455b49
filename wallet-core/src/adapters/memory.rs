//! In-memory ledger store for tests and embedding
//!
//! A unit of work holds the state lock, stages its writes on a copy of the
//! state and publishes the copy on commit. Faults can be injected to
//! exercise failure paths of the services.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::domain::result::{Error, Result};
use crate::domain::{PasswordReset, UserId, Wallet, WalletId, WalletTransaction};
use crate::ports::{LedgerStore, ResetTokenStore, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    wallets: BTreeMap<WalletId, Wallet>,
    transactions: Vec<WalletTransaction>,
    last_wallet_id: i64,
}

/// One-shot failures to inject into the next units of work
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Let this many appends succeed, then fail the next one
    pub fail_append_after: Option<usize>,
    /// Report this many balance updates as conflicting
    pub conflicting_updates: usize,
    pub fail_commit: bool,
    pub fail_rollback: bool,
}

/// `HashMap`/`BTreeMap`-based ledger store
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<MemoryState>,
    resets: Mutex<HashMap<String, PasswordReset>>,
    faults: Mutex<FaultPlan>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending fault plan
    pub fn inject(&self, plan: FaultPlan) -> Result<()> {
        *lock(&self.faults)? = plan;
        Ok(())
    }

    /// Sum of all balances, including closed wallets
    pub fn total_balance(&self) -> Result<i64> {
        Ok(lock(&self.state)?.wallets.values().map(|w| w.balance).sum())
    }

    /// Number of ledger entries across all wallets
    pub fn transaction_count(&self) -> Result<usize> {
        Ok(lock(&self.state)?.transactions.len())
    }

    fn take_fault(&self, pick: impl FnOnce(&mut FaultPlan) -> bool) -> Result<bool> {
        let mut faults = lock(&self.faults)?;
        Ok(pick(&mut faults))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| Error::storage(format!("memory store lock poisoned: {}", e)))
}

impl LedgerStore for InMemoryLedgerStore {
    type Unit<'a> = MemoryUnit<'a>;

    fn begin(&self) -> Result<MemoryUnit<'_>> {
        let guard = lock(&self.state)?;
        let staged = guard.clone();
        Ok(MemoryUnit {
            store: self,
            guard,
            staged,
        })
    }
}

/// Staged changes over a locked snapshot of the store
pub struct MemoryUnit<'a> {
    store: &'a InMemoryLedgerStore,
    guard: MutexGuard<'a, MemoryState>,
    staged: MemoryState,
}

impl UnitOfWork for MemoryUnit<'_> {
    fn wallet_by_owner(&mut self, user_id: UserId) -> Result<Option<Wallet>> {
        Ok(self
            .staged
            .wallets
            .values()
            .find(|w| w.user_id == user_id && w.is_active())
            .cloned())
    }

    fn wallet_by_id(&mut self, wallet_id: WalletId) -> Result<Option<Wallet>> {
        Ok(self.staged.wallets.get(&wallet_id).cloned())
    }

    fn wallet_for_update(&mut self, wallet_id: WalletId) -> Result<Option<Wallet>> {
        Ok(self
            .staged
            .wallets
            .get(&wallet_id)
            .filter(|w| w.is_active())
            .cloned())
    }

    fn insert_wallet(&mut self, user_id: UserId, balance: i64) -> Result<Wallet> {
        self.staged.last_wallet_id += 1;
        let wallet = Wallet::new(WalletId(self.staged.last_wallet_id), user_id, balance);
        self.staged.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    fn soft_delete_wallet(&mut self, wallet_id: WalletId) -> Result<bool> {
        match self.staged.wallets.get_mut(&wallet_id) {
            Some(wallet) if wallet.is_active() => {
                let now = Utc::now();
                wallet.deleted_at = Some(now);
                wallet.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn update_balance(
        &mut self,
        wallet_id: WalletId,
        expected: i64,
        new_balance: i64,
    ) -> Result<bool> {
        let conflict = self.store.take_fault(|f| {
            if f.conflicting_updates > 0 {
                f.conflicting_updates -= 1;
                true
            } else {
                false
            }
        })?;
        if conflict {
            return Ok(false);
        }

        match self.staged.wallets.get_mut(&wallet_id) {
            Some(wallet) if wallet.is_active() && wallet.balance == expected => {
                wallet.balance = new_balance;
                wallet.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn append_transaction(&mut self, record: &WalletTransaction) -> Result<()> {
        let fail = self.store.take_fault(|f| match f.fail_append_after {
            Some(0) => {
                f.fail_append_after = None;
                true
            }
            Some(n) => {
                f.fail_append_after = Some(n - 1);
                false
            }
            None => false,
        })?;
        if fail {
            return Err(Error::storage("injected append failure"));
        }
        self.staged.transactions.push(record.clone());
        Ok(())
    }

    fn transactions_for_wallet(&mut self, wallet_id: WalletId) -> Result<Vec<WalletTransaction>> {
        Ok(self
            .staged
            .transactions
            .iter()
            .filter(|t| t.wallet_id == wallet_id)
            .cloned()
            .collect())
    }

    fn commit(mut self) -> Result<()> {
        if self.store.take_fault(|f| std::mem::take(&mut f.fail_commit))? {
            return Err(Error::storage("injected commit failure"));
        }
        *self.guard = std::mem::take(&mut self.staged);
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        if self.store.take_fault(|f| std::mem::take(&mut f.fail_rollback))? {
            return Err(Error::storage("injected rollback failure"));
        }
        Ok(())
    }
}

impl ResetTokenStore for InMemoryLedgerStore {
    fn save_reset(&self, reset: &PasswordReset) -> Result<()> {
        lock(&self.resets)?.insert(reset.email.clone(), reset.clone());
        Ok(())
    }

    fn reset_by_email(&self, email: &str) -> Result<Option<PasswordReset>> {
        Ok(lock(&self.resets)?.get(email).cloned())
    }

    fn delete_reset(&self, email: &str) -> Result<u64> {
        Ok(lock(&self.resets)?.remove(email).map_or(0, |_| 1))
    }
}
