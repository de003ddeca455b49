//! Wallet service - wallet lifecycle and credit/debit postings

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::domain::money;
use crate::domain::result::{Error, Result};
use crate::domain::{Direction, UserId, Wallet, WalletId, WalletTransaction};
use crate::ports::{LedgerStore, UnitOfWork};
use crate::services::recorder;

/// Business rules applied by the wallet and transfer services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletPolicy {
    /// Balance of a newly opened wallet, in minor units
    pub initial_balance: i64,
    /// Whether a direct debit may drive a balance below zero
    pub allow_overdraft: bool,
    /// How many times a conflicting unit of work is retried
    pub max_conflict_retries: u32,
    /// Base delay between conflict retries (doubles each time)
    pub retry_delay: Duration,
}

impl Default for WalletPolicy {
    fn default() -> Self {
        Self {
            initial_balance: crate::domain::DEFAULT_INITIAL_BALANCE,
            allow_overdraft: false,
            max_conflict_retries: 5,
            retry_delay: Duration::from_millis(10),
        }
    }
}

impl From<&Config> for WalletPolicy {
    fn from(config: &Config) -> Self {
        Self {
            initial_balance: config.wallet.initial_balance,
            allow_overdraft: config.wallet.allow_overdraft,
            max_conflict_retries: config.store.max_conflict_retries,
            retry_delay: Duration::from_millis(config.store.retry_delay_ms),
        }
    }
}

/// Outcome of one attempt at a unit of work
pub(crate) enum Attempt<T> {
    Done(T),
    /// A compare-and-set lost against a concurrent writer; nothing was kept
    Conflict,
}

/// Run `attempt` until it completes, retrying conflicts with backoff
pub(crate) fn with_conflict_retry<T>(
    policy: &WalletPolicy,
    operation: &str,
    mut attempt: impl FnMut() -> Result<Attempt<T>>,
) -> Result<T> {
    for n in 0..=policy.max_conflict_retries {
        match attempt()? {
            Attempt::Done(value) => return Ok(value),
            Attempt::Conflict => {
                warn!(operation, attempt = n + 1, "balance update conflicted");
                if n < policy.max_conflict_retries {
                    thread::sleep(backoff_delay(policy, n));
                }
            }
        }
    }
    Err(Error::storage(format!(
        "{} kept conflicting after {} retries",
        operation, policy.max_conflict_retries
    )))
}

/// Delay before retry `n` (0-based), doubling each time and saturating
fn backoff_delay(policy: &WalletPolicy, n: u32) -> Duration {
    policy
        .retry_delay
        .checked_mul(2u32.saturating_pow(n.min(16)))
        .unwrap_or(Duration::MAX)
}

/// Move `wallet`'s balance by `amount_minor` and record it, inside `unit`.
///
/// Before/after balances come from the `wallet` snapshot the caller read in
/// the same unit; the update only lands if the stored balance still matches.
pub(crate) fn post<U: UnitOfWork>(
    unit: &mut U,
    wallet: &Wallet,
    direction: Direction,
    amount_minor: i64,
) -> Result<Attempt<WalletTransaction>> {
    let before = wallet.balance;
    let after = match direction {
        Direction::Credit => before.checked_add(amount_minor),
        Direction::Debit => before.checked_sub(amount_minor),
        Direction::None => Some(before),
    }
    .ok_or_else(|| Error::validation(format!("balance of wallet {} would overflow", wallet.id)))?;

    if !unit.update_balance(wallet.id, before, after)? {
        return Ok(Attempt::Conflict);
    }

    let entry = recorder::record_posting(unit, wallet.id, direction, amount_minor, before, after)?;
    Ok(Attempt::Done(entry))
}

/// Wallet account operations
///
/// Every mutation runs in its own unit of work: the balance read, the
/// conditional update and the ledger append commit together.
pub struct WalletService<S> {
    store: Arc<S>,
    policy: WalletPolicy,
}

impl<S: LedgerStore> WalletService<S> {
    pub fn new(store: Arc<S>, policy: WalletPolicy) -> Self {
        Self { store, policy }
    }

    /// Active wallet of `user_id`
    pub fn find_by_owner(&self, user_id: UserId) -> Result<Wallet> {
        self.store
            .wallet_by_owner(user_id)?
            .ok_or(Error::WalletNotFound { user_id })
    }

    /// Wallet by ID, including closed wallets
    pub fn find_by_id(&self, wallet_id: WalletId) -> Result<Wallet> {
        self.store
            .wallet_by_id(wallet_id)?
            .ok_or(Error::WalletIdNotFound { wallet_id })
    }

    /// Ledger of a wallet, oldest entry first
    pub fn history(&self, wallet_id: WalletId) -> Result<Vec<WalletTransaction>> {
        self.find_by_id(wallet_id)?;
        self.store.transactions_for_wallet(wallet_id)
    }

    /// Create the wallet for a new user with the configured opening balance
    pub fn open_wallet(&self, user_id: UserId) -> Result<Wallet> {
        if self.policy.initial_balance < 0 {
            return Err(Error::validation(format!(
                "initial balance must not be negative, got {}",
                self.policy.initial_balance
            )));
        }

        let mut unit = self.store.begin()?;
        if unit.wallet_by_owner(user_id)?.is_some() {
            return Err(Error::WalletAlreadyExists { user_id });
        }
        let wallet = unit.insert_wallet(user_id, self.policy.initial_balance)?;
        unit.commit()?;

        info!(user_id = %user_id, wallet_id = %wallet.id, balance = wallet.balance, "wallet opened");
        Ok(wallet)
    }

    /// Soft-delete the wallet of `user_id`; its ledger is kept
    pub fn close_wallet(&self, user_id: UserId) -> Result<Wallet> {
        let mut unit = self.store.begin()?;
        let wallet = unit
            .wallet_by_owner(user_id)?
            .ok_or(Error::WalletNotFound { user_id })?;
        if !unit.soft_delete_wallet(wallet.id)? {
            return Err(Error::WalletNotFound { user_id });
        }
        let closed = unit
            .wallet_by_id(wallet.id)?
            .ok_or(Error::WalletIdNotFound { wallet_id: wallet.id })?;
        unit.commit()?;

        info!(user_id = %user_id, wallet_id = %wallet.id, "wallet closed");
        Ok(closed)
    }

    /// Add `amount_major` whole units to a wallet
    pub fn credit(&self, wallet_id: WalletId, amount_major: i64) -> Result<WalletTransaction> {
        let amount_minor = money::to_minor(amount_major)?;
        let entry = with_conflict_retry(&self.policy, "credit", || {
            self.try_post(wallet_id, Direction::Credit, amount_minor)
        })?;

        info!(
            wallet_id = %wallet_id,
            amount_minor,
            balance_before = entry.balance_before,
            balance_after = entry.balance_after,
            "wallet credited"
        );
        Ok(entry)
    }

    /// Remove `amount_major` whole units from a wallet
    ///
    /// Unless the policy allows overdrafts, a debit that would leave the
    /// balance negative is refused: a cancelled entry is recorded and
    /// `InsufficientBalance` is returned.
    pub fn debit(&self, wallet_id: WalletId, amount_major: i64) -> Result<WalletTransaction> {
        let amount_minor = money::to_minor(amount_major)?;
        let entry = with_conflict_retry(&self.policy, "debit", || {
            self.try_post(wallet_id, Direction::Debit, amount_minor)
        })?;

        info!(
            wallet_id = %wallet_id,
            amount_minor,
            balance_before = entry.balance_before,
            balance_after = entry.balance_after,
            "wallet debited"
        );
        Ok(entry)
    }

    fn try_post(
        &self,
        wallet_id: WalletId,
        direction: Direction,
        amount_minor: i64,
    ) -> Result<Attempt<WalletTransaction>> {
        let mut unit = self.store.begin()?;
        let wallet = unit
            .wallet_for_update(wallet_id)?
            .ok_or(Error::WalletIdNotFound { wallet_id })?;

        if direction == Direction::Debit
            && !self.policy.allow_overdraft
            && wallet.balance < amount_minor
        {
            recorder::record_cancelled(&mut unit, wallet.id, amount_minor, wallet.balance)?;
            unit.commit()?;
            warn!(
                wallet_id = %wallet.id,
                balance = wallet.balance,
                amount_minor,
                "debit refused: insufficient balance"
            );
            return Err(Error::InsufficientBalance {
                wallet_id: wallet.id,
                balance: wallet.balance,
                requested_minor: amount_minor,
            });
        }

        match post(&mut unit, &wallet, direction, amount_minor)? {
            Attempt::Done(entry) => {
                unit.commit()?;
                Ok(Attempt::Done(entry))
            }
            Attempt::Conflict => {
                unit.rollback()?;
                Ok(Attempt::Conflict)
            }
        }
    }
}
