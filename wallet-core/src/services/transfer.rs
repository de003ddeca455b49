//! Transfer service - moves funds between two users' wallets

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::money;
use crate::domain::result::{Error, Result};
use crate::domain::{Direction, UserId, Wallet, WalletId, WalletTransaction};
use crate::ports::{LedgerStore, UnitOfWork};
use crate::services::recorder;
use crate::services::wallet::{post, with_conflict_retry, Attempt, WalletPolicy};

/// Both ledger legs of a completed transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub sender: WalletTransaction,
    pub recipient: WalletTransaction,
}

impl TransferReceipt {
    pub fn amount_minor(&self) -> i64 {
        self.sender.amount
    }
}

/// Transfer orchestrator
///
/// A transfer resolves both wallets, checks the sender's funds in whole
/// units (`balance / 100 >= amount`, truncating) and then posts the debit
/// and the credit in one unit of work. Wallet rows are always taken in
/// ascending ID order so crossing transfers cannot deadlock.
pub struct TransferService<S> {
    store: Arc<S>,
    policy: WalletPolicy,
}

impl<S: LedgerStore> TransferService<S> {
    pub fn new(store: Arc<S>, policy: WalletPolicy) -> Self {
        Self { store, policy }
    }

    /// Transfer `amount_major` whole units from `sender` to `recipient`
    ///
    /// When the sender cannot cover the amount, a cancelled entry is recorded
    /// on the sender's wallet and `InsufficientBalance` is returned.
    pub fn transfer(
        &self,
        sender: UserId,
        recipient: UserId,
        amount_major: i64,
    ) -> Result<TransferReceipt> {
        let amount_minor = money::to_minor(amount_major)?;
        if sender == recipient {
            return Err(Error::validation(format!(
                "user {} cannot transfer to their own wallet",
                sender
            )));
        }

        let receipt = with_conflict_retry(&self.policy, "transfer", || {
            self.try_transfer(sender, recipient, amount_major, amount_minor)
        })?;

        info!(
            sender_user_id = %sender,
            recipient_user_id = %recipient,
            sender_wallet_id = %receipt.sender.wallet_id,
            recipient_wallet_id = %receipt.recipient.wallet_id,
            amount_minor,
            "transfer completed"
        );
        Ok(receipt)
    }

    fn try_transfer(
        &self,
        sender: UserId,
        recipient: UserId,
        amount_major: i64,
        amount_minor: i64,
    ) -> Result<Attempt<TransferReceipt>> {
        let mut unit = self.store.begin()?;

        let sender_id = unit
            .wallet_by_owner(sender)?
            .ok_or(Error::WalletNotFound { user_id: sender })?
            .id;
        let recipient_id = unit
            .wallet_by_owner(recipient)?
            .ok_or(Error::WalletNotFound { user_id: recipient })?
            .id;

        let (from, to) = lock_pair(&mut unit, sender_id, recipient_id)?;
        debug!(
            sender_wallet_id = %from.id,
            recipient_wallet_id = %to.id,
            balance = from.balance,
            amount_major,
            "transfer wallets locked"
        );

        if !from.covers(amount_major) {
            recorder::record_cancelled(&mut unit, from.id, amount_minor, from.balance)?;
            unit.commit()?;
            warn!(
                wallet_id = %from.id,
                balance = from.balance,
                amount_minor,
                "transfer cancelled: insufficient balance"
            );
            return Err(Error::InsufficientBalance {
                wallet_id: from.id,
                balance: from.balance,
                requested_minor: amount_minor,
            });
        }

        let debit = match post(&mut unit, &from, Direction::Debit, amount_minor)? {
            Attempt::Done(entry) => entry,
            Attempt::Conflict => {
                unit.rollback()?;
                return Ok(Attempt::Conflict);
            }
        };

        // From here on the debit is staged: a failure must be undone
        // explicitly, and an undo that fails leaves the ledger suspect.
        let credit = match post(&mut unit, &to, Direction::Credit, amount_minor) {
            Ok(Attempt::Done(entry)) => entry,
            Ok(Attempt::Conflict) => {
                undo_debit(unit, &from, &to, amount_minor, "credit leg conflicted")?;
                return Ok(Attempt::Conflict);
            }
            Err(err) => {
                undo_debit(unit, &from, &to, amount_minor, &err.to_string())?;
                return Err(err);
            }
        };

        unit.commit()?;
        Ok(Attempt::Done(TransferReceipt {
            sender: debit,
            recipient: credit,
        }))
    }
}

/// Read both wallets for update, lower wallet ID first.
///
/// Returns `(sender, recipient)` regardless of the order they were locked in.
fn lock_pair<U: UnitOfWork>(
    unit: &mut U,
    sender_id: WalletId,
    recipient_id: WalletId,
) -> Result<(Wallet, Wallet)> {
    let (first, second) = if sender_id < recipient_id {
        (sender_id, recipient_id)
    } else {
        (recipient_id, sender_id)
    };

    let first = unit
        .wallet_for_update(first)?
        .ok_or(Error::WalletIdNotFound { wallet_id: first })?;
    let second = unit
        .wallet_for_update(second)?
        .ok_or(Error::WalletIdNotFound { wallet_id: second })?;

    if first.id == sender_id {
        Ok((first, second))
    } else {
        Ok((second, first))
    }
}

/// Roll back a unit whose debit leg is staged
fn undo_debit<U: UnitOfWork>(
    unit: U,
    from: &Wallet,
    to: &Wallet,
    amount_minor: i64,
    cause: &str,
) -> Result<()> {
    match unit.rollback() {
        Ok(()) => {
            warn!(
                sender_wallet_id = %from.id,
                recipient_wallet_id = %to.id,
                amount_minor,
                cause,
                "transfer rolled back"
            );
            Ok(())
        }
        Err(rollback_err) => {
            error!(
                sender_wallet_id = %from.id,
                recipient_wallet_id = %to.id,
                amount_minor,
                cause,
                rollback_error = %rollback_err,
                "transfer partially applied"
            );
            Err(Error::PartialApply {
                sender_wallet_id: from.id,
                recipient_wallet_id: to.id,
                amount_minor,
                cause: format!("{}; rollback failed: {}", cause, rollback_err),
            })
        }
    }
}
