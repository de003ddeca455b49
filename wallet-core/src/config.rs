//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "wallet": { "initialBalance": 10000, "allowOverdraft": false },
//!   "store": { "databaseFile": "wallet.duckdb", "maxConflictRetries": 5, "retryDelayMs": 10 }
//! }
//! ```
//! Keys this crate does not manage are preserved when saving.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::domain::DEFAULT_INITIAL_BALANCE;

const SETTINGS_FILE: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    wallet: WalletSettings,
    #[serde(default)]
    store: StoreSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Wallet business settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletSettings {
    /// Opening balance of new wallets, in minor units
    pub initial_balance: i64,
    pub allow_overdraft: bool,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            initial_balance: DEFAULT_INITIAL_BALANCE,
            allow_overdraft: false,
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    pub database_file: String,
    pub max_conflict_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_file: "wallet.duckdb".to_string(),
            max_conflict_retries: 5,
            retry_delay_ms: 10,
        }
    }
}

/// Wallet engine configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub wallet: WalletSettings,
    pub store: StoreSettings,
}

impl Config {
    /// Load config from the data directory
    ///
    /// A missing or unreadable settings file yields defaults. Environment
    /// variables `WALLET_ALLOW_OVERDRAFT` and `WALLET_INITIAL_BALANCE`
    /// override the file. A negative opening balance is an error.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join(SETTINGS_FILE);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let mut config = Self {
            wallet: raw.wallet,
            store: raw.store,
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides looked up by variable name
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("WALLET_ALLOW_OVERDRAFT") {
            self.wallet.allow_overdraft = match value.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(Error::Config(format!(
                        "WALLET_ALLOW_OVERDRAFT must be true/false/1/0/yes/no, got '{}'",
                        value
                    ))
                    .into())
                }
            };
        }

        if let Some(value) = lookup("WALLET_INITIAL_BALANCE") {
            self.wallet.initial_balance = value.trim().parse().map_err(|_| {
                Error::Config(format!("WALLET_INITIAL_BALANCE is not an integer: '{}'", value))
            })?;
        }

        self.validate()
    }

    /// Reject settings the services cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.wallet.initial_balance < 0 {
            return Err(Error::Config(format!(
                "initial balance must not be negative, got {}",
                self.wallet.initial_balance
            ))
            .into());
        }
        Ok(())
    }

    /// Save config to the data directory
    /// Preserves other settings that this crate doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join(SETTINGS_FILE);

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        settings.wallet = self.wallet.clone();
        settings.store = self.store.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}
