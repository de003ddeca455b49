//! Integration tests for wallet-core services
//!
//! These tests exercise the wallet, transfer and password reset flows
//! against a real DuckDB file.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use wallet_core::adapters::duckdb::DuckDbStore;
use wallet_core::config::Config;
use wallet_core::domain::{money, INSUFFICIENT_BALANCE_DESCRIPTION};
use wallet_core::ports::{LedgerStore, UnitOfWork};
use wallet_core::services::{TransferService, WalletPolicy, WalletService};
use wallet_core::{Direction, Error, TxStatus, UserId, WalletContext};

// ============================================================================
// Test Helpers
// ============================================================================

/// Create a test store with schema initialized
fn create_test_store(temp_dir: &TempDir) -> Arc<DuckDbStore> {
    let db_path = temp_dir.path().join("test.duckdb");
    let store = DuckDbStore::open(&db_path).expect("Failed to open store");
    store.ensure_schema().expect("Failed to initialize schema");
    Arc::new(store)
}

fn test_policy() -> WalletPolicy {
    WalletPolicy {
        retry_delay: Duration::ZERO,
        ..WalletPolicy::default()
    }
}

fn services(
    store: &Arc<DuckDbStore>,
    policy: WalletPolicy,
) -> (WalletService<DuckDbStore>, TransferService<DuckDbStore>) {
    (
        WalletService::new(Arc::clone(store), policy),
        TransferService::new(Arc::clone(store), policy),
    )
}

// ============================================================================
// Transfer Tests
// ============================================================================

/// Transfer of 50 from a fresh wallet: 10000 -> 5000 and 10000 -> 15000,
/// one debit and one credit entry.
#[test]
fn test_transfer_between_fresh_wallets() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_test_store(&temp_dir);
    let (wallets, transfers) = services(&store, test_policy());

    let a = wallets.open_wallet(UserId(1)).unwrap();
    let b = wallets.open_wallet(UserId(2)).unwrap();

    let receipt = transfers.transfer(UserId(1), UserId(2), 50).unwrap();
    assert_eq!(receipt.sender.balance_before, 10_000);
    assert_eq!(receipt.sender.balance_after, 5_000);
    assert_eq!(receipt.recipient.balance_before, 10_000);
    assert_eq!(receipt.recipient.balance_after, 15_000);

    assert_eq!(wallets.find_by_owner(UserId(1)).unwrap().balance, 5_000);
    assert_eq!(wallets.find_by_owner(UserId(2)).unwrap().balance, 15_000);

    let sender_history = wallets.history(a.id).unwrap();
    assert_eq!(sender_history, vec![receipt.sender.clone()]);
    assert_eq!(sender_history[0].direction, Direction::Debit);
    assert_eq!(sender_history[0].amount, 5_000);

    let recipient_history = wallets.history(b.id).unwrap();
    assert_eq!(recipient_history, vec![receipt.recipient]);
}

/// Transfer of 50 from a fresh wallet to a recipient holding 500:
/// 10000 -> 5000 and 500 -> 5500.
#[test]
fn test_transfer_to_low_balance_recipient() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_test_store(&temp_dir);
    let (wallets, transfers) = services(&store, test_policy());

    let a = wallets.open_wallet(UserId(1)).unwrap();
    let mut unit = store.begin().unwrap();
    let b = unit.insert_wallet(UserId(2), 500).unwrap();
    unit.commit().unwrap();

    let receipt = transfers.transfer(UserId(1), UserId(2), 50).unwrap();
    assert_eq!(receipt.sender.balance_after, 5_000);
    assert_eq!(receipt.recipient.balance_before, 500);
    assert_eq!(receipt.recipient.balance_after, 5_500);

    assert_eq!(wallets.find_by_id(a.id).unwrap().balance, 5_000);
    assert_eq!(wallets.find_by_id(b.id).unwrap().balance, 5_500);
    assert_eq!(wallets.history(b.id).unwrap(), vec![receipt.recipient]);
}

/// Whole-unit sufficiency: 150 minor units truncate to 1, which covers a
/// transfer of 1 and leaves 50.
#[test]
fn test_transfer_truncated_balance_edge() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_test_store(&temp_dir);
    let (wallets, transfers) = services(&store, test_policy());

    let mut unit = store.begin().unwrap();
    let a = unit.insert_wallet(UserId(1), 150).unwrap();
    unit.commit().unwrap();
    wallets.open_wallet(UserId(2)).unwrap();

    assert_eq!(money::truncated_major(150), 1);
    transfers.transfer(UserId(1), UserId(2), 1).unwrap();
    assert_eq!(wallets.find_by_id(a.id).unwrap().balance, 50);
}

/// A sender at zero gets a cancelled entry and no balance moves
#[test]
fn test_transfer_from_empty_wallet_is_cancelled() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_test_store(&temp_dir);
    let (wallets, transfers) = services(&store, test_policy());

    let mut unit = store.begin().unwrap();
    let a = unit.insert_wallet(UserId(1), 0).unwrap();
    unit.commit().unwrap();
    let b = wallets.open_wallet(UserId(2)).unwrap();

    let err = transfers.transfer(UserId(1), UserId(2), 1).unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { balance: 0, .. }));

    let history = wallets.history(a.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TxStatus::Cancelled);
    assert_eq!(history[0].description, INSUFFICIENT_BALANCE_DESCRIPTION);
    assert_eq!(history[0].amount, 100);

    assert!(wallets.history(b.id).unwrap().is_empty());
    assert_eq!(wallets.find_by_id(b.id).unwrap().balance, 10_000);
}

/// Unknown users fail before anything is written
#[test]
fn test_transfer_unknown_users() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_test_store(&temp_dir);
    let (wallets, transfers) = services(&store, test_policy());
    let a = wallets.open_wallet(UserId(1)).unwrap();

    let err = transfers.transfer(UserId(1), UserId(99), 1).unwrap_err();
    assert!(matches!(err, Error::WalletNotFound { user_id: UserId(99) }));
    assert!(err.is_side_effect_free());

    assert!(wallets.history(a.id).unwrap().is_empty());
    assert_eq!(wallets.find_by_id(a.id).unwrap().balance, 10_000);
}

// ============================================================================
// Credit / Debit Tests
// ============================================================================

#[test]
fn test_credit_and_debit_history_order() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_test_store(&temp_dir);
    let (wallets, _) = services(&store, test_policy());
    let wallet = wallets.open_wallet(UserId(1)).unwrap();

    wallets.credit(wallet.id, 5).unwrap();
    wallets.debit(wallet.id, 20).unwrap();
    wallets.credit(wallet.id, 1).unwrap();

    let history = wallets.history(wallet.id).unwrap();
    let directions: Vec<_> = history.iter().map(|t| t.direction).collect();
    assert_eq!(
        directions,
        vec![Direction::Credit, Direction::Debit, Direction::Credit]
    );
    // Each entry picks up where the previous one left off
    for pair in history.windows(2) {
        assert_eq!(pair[0].balance_after, pair[1].balance_before);
    }
    assert_eq!(history.last().unwrap().balance_after, 8_600);
    assert!(history.iter().all(|t| t.is_consistent()));
}

#[test]
fn test_overdraft_policy() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_test_store(&temp_dir);

    let (strict, _) = services(&store, test_policy());
    let wallet = strict.open_wallet(UserId(1)).unwrap();
    assert!(matches!(
        strict.debit(wallet.id, 200),
        Err(Error::InsufficientBalance { .. })
    ));
    assert_eq!(strict.find_by_id(wallet.id).unwrap().balance, 10_000);

    let (lenient, _) = services(
        &store,
        WalletPolicy {
            allow_overdraft: true,
            ..test_policy()
        },
    );
    let entry = lenient.debit(wallet.id, 200).unwrap();
    assert_eq!(entry.balance_after, -10_000);

    let statuses: Vec<_> = lenient
        .history(wallet.id)
        .unwrap()
        .iter()
        .map(|t| t.status)
        .collect();
    assert_eq!(statuses, vec![TxStatus::Cancelled, TxStatus::Success]);
}

#[test]
fn test_closed_wallet_rejects_postings() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_test_store(&temp_dir);
    let (wallets, transfers) = services(&store, test_policy());
    let wallet = wallets.open_wallet(UserId(1)).unwrap();
    wallets.open_wallet(UserId(2)).unwrap();
    wallets.credit(wallet.id, 1).unwrap();

    let closed = wallets.close_wallet(UserId(1)).unwrap();
    assert!(closed.deleted_at.is_some());

    assert!(matches!(
        wallets.debit(wallet.id, 1),
        Err(Error::WalletIdNotFound { .. })
    ));
    assert!(matches!(
        transfers.transfer(UserId(2), UserId(1), 1),
        Err(Error::WalletNotFound { .. })
    ));
    assert_eq!(wallets.history(wallet.id).unwrap().len(), 1);
}

// ============================================================================
// Context and Persistence Tests
// ============================================================================

/// Data written through one context is visible after reopening the file
#[test]
fn test_context_persists_across_reopen() {
    let temp_dir = TempDir::new().unwrap();

    let wallet_id = {
        let ctx = WalletContext::new(temp_dir.path()).unwrap();
        let wallet = ctx.wallet_service.open_wallet(UserId(1)).unwrap();
        ctx.wallet_service.open_wallet(UserId(2)).unwrap();
        ctx.transfer_service.transfer(UserId(1), UserId(2), 10).unwrap();
        wallet.id
    };

    let ctx = WalletContext::new(temp_dir.path()).unwrap();
    assert_eq!(ctx.wallet_service.find_by_id(wallet_id).unwrap().balance, 9_000);
    assert_eq!(ctx.wallet_service.history(wallet_id).unwrap().len(), 1);

    // Migrations are not re-applied
    let result = ctx.store.run_migrations().unwrap();
    assert!(result.applied.is_empty());
}

/// Settings file drives the opening balance and database file name
#[test]
fn test_context_reads_settings() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.wallet.initial_balance = 2_500;
    config.store.database_file = "custom.duckdb".to_string();
    config.save(temp_dir.path()).unwrap();

    let ctx = WalletContext::new(temp_dir.path()).unwrap();
    let wallet = ctx.wallet_service.open_wallet(UserId(1)).unwrap();
    assert_eq!(wallet.balance, 2_500);
    assert!(temp_dir.path().join("custom.duckdb").exists());
}

// ============================================================================
// Password Reset Tests
// ============================================================================

#[test]
fn test_password_reset_flow() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = WalletContext::new(temp_dir.path()).unwrap();
    let resets = &ctx.password_reset_service;

    let first = resets.request("user@example.com").unwrap();
    let second = resets.request("USER@example.com").unwrap();
    assert_ne!(first.token, second.token);

    let pending = resets.find_by_email("user@example.com").unwrap().unwrap();
    assert_eq!(pending.token, second.token);

    assert!(matches!(
        resets.consume("user@example.com", &first.token),
        Err(Error::ResetTokenNotFound(_))
    ));
    resets.consume("user@example.com", &second.token).unwrap();
    assert!(resets.find_by_email("user@example.com").unwrap().is_none());
    assert_eq!(resets.delete("user@example.com").unwrap(), 0);
}
