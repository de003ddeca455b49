//! Wallet Core - wallet ledger engine
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Wallet, WalletTransaction, PasswordReset)
//! - **ports**: Trait definitions for external dependencies (LedgerStore, ResetTokenStore)
//! - **services**: Business logic orchestration (credit/debit, transfers, resets)
//! - **adapters**: Concrete implementations (DuckDB, in-memory)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use adapters::duckdb::DuckDbStore;
use config::Config;
use services::*;

// Re-export commonly used types at crate root
pub use domain::{
    Direction, PasswordReset, TxStatus, UserId, Wallet, WalletId, WalletTransaction,
};
pub use domain::result::Error;
pub use services::{TransferReceipt, WalletPolicy};

/// Main context for wallet operations
///
/// This is the primary entry point for all business logic. It holds
/// the database connection, configuration, and all services.
pub struct WalletContext {
    pub config: Config,
    pub store: Arc<DuckDbStore>,
    pub wallet_service: WalletService<DuckDbStore>,
    pub transfer_service: TransferService<DuckDbStore>,
    pub password_reset_service: PasswordResetService<DuckDbStore>,
}

impl WalletContext {
    /// Open (or create) the wallet database in `data_dir`
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;

        let db_path = data_dir.join(&config.store.database_file);
        let store = Arc::new(DuckDbStore::open(&db_path)?);

        // Initialize schema
        store.ensure_schema()?;

        let policy = WalletPolicy::from(&config);
        let wallet_service = WalletService::new(Arc::clone(&store), policy);
        let transfer_service = TransferService::new(Arc::clone(&store), policy);
        let password_reset_service = PasswordResetService::new(Arc::clone(&store));

        info!(
            db_path = %db_path.display(),
            allow_overdraft = policy.allow_overdraft,
            "wallet context ready"
        );

        Ok(Self {
            config,
            store,
            wallet_service,
            transfer_service,
            password_reset_service,
        })
    }
}
