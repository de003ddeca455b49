//! DuckDB ledger store implementation
//!
//! A single connection sits behind a mutex. A unit of work holds the lock
//! for its whole lifetime and wraps its statements in a SQL transaction, so
//! units are serialized and each one commits or rolls back as a whole.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{PasswordReset, UserId, Wallet, WalletId, WalletTransaction};
use crate::ports::{LedgerStore, ResetTokenStore, UnitOfWork};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const WALLET_COLUMNS: &str = "wallet_id, user_id, balance, created_at, updated_at, deleted_at";

const TRANSACTION_COLUMNS: &str = "transaction_id, wallet_id, amount, balance_before, balance_after, \
     direction, status, description, created_at";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// DuckDB-backed ledger store
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl DuckDbStore {
    /// Open (or create) the database file at `db_path`
    ///
    /// Retries with exponential backoff while another process holds the
    /// file lock.
    pub fn open(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(Some(db_path)) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            path = %db_path.display(),
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            error = %err_msg,
                            "database busy, retrying in {}ms",
                            delay.as_millis()
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error.map(Error::from).unwrap_or_else(|| {
            Error::storage(format!("failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Self::try_open_connection(None)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn try_open_connection(db_path: Option<&Path>) -> duckdb::Result<Connection> {
        // Cached extensions are never needed; keep autoload off
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        match db_path {
            Some(path) => Connection::open_with_flags(path, config),
            None => Connection::open_in_memory_with_flags(config),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::storage(format!("connection lock poisoned: {}", e)))
    }

    /// Run database migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }
}

impl LedgerStore for DuckDbStore {
    type Unit<'a> = DuckDbUnit<'a>;

    fn begin(&self) -> Result<DuckDbUnit<'_>> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(DuckDbUnit {
            conn,
            finished: false,
        })
    }
}

/// An open SQL transaction holding the connection lock
pub struct DuckDbUnit<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl DuckDbUnit<'_> {
    fn query_wallet(&self, sql: &str, key: i64) -> Result<Option<Wallet>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query_map(params![key], row_to_wallet)?;
        let wallet = rows.next().transpose()?;
        Ok(wallet)
    }
}

impl UnitOfWork for DuckDbUnit<'_> {
    fn wallet_by_owner(&mut self, user_id: UserId) -> Result<Option<Wallet>> {
        let sql = format!(
            "SELECT {} FROM wallets WHERE user_id = ? AND deleted_at IS NULL LIMIT 1",
            WALLET_COLUMNS
        );
        self.query_wallet(&sql, user_id.0)
    }

    fn wallet_by_id(&mut self, wallet_id: WalletId) -> Result<Option<Wallet>> {
        let sql = format!("SELECT {} FROM wallets WHERE wallet_id = ?", WALLET_COLUMNS);
        self.query_wallet(&sql, wallet_id.0)
    }

    fn wallet_for_update(&mut self, wallet_id: WalletId) -> Result<Option<Wallet>> {
        // The unit already owns the only connection, which is an exclusive
        // lock on every row.
        let sql = format!(
            "SELECT {} FROM wallets WHERE wallet_id = ? AND deleted_at IS NULL",
            WALLET_COLUMNS
        );
        self.query_wallet(&sql, wallet_id.0)
    }

    fn insert_wallet(&mut self, user_id: UserId, balance: i64) -> Result<Wallet> {
        let id: i64 = self
            .conn
            .query_row("SELECT nextval('seq_wallet_id')", [], |row| row.get(0))?;
        let wallet = Wallet::new(WalletId(id), user_id, balance);

        self.conn.execute(
            "INSERT INTO wallets (wallet_id, user_id, balance, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                wallet.id.0,
                wallet.user_id.0,
                wallet.balance,
                wallet.created_at.to_rfc3339(),
                wallet.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(wallet)
    }

    fn soft_delete_wallet(&mut self, wallet_id: WalletId) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE wallets SET deleted_at = ?, updated_at = ?
             WHERE wallet_id = ? AND deleted_at IS NULL",
            params![now, now, wallet_id.0],
        )?;
        Ok(rows == 1)
    }

    fn update_balance(
        &mut self,
        wallet_id: WalletId,
        expected: i64,
        new_balance: i64,
    ) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE wallets SET balance = ?, updated_at = ?
             WHERE wallet_id = ? AND balance = ? AND deleted_at IS NULL",
            params![new_balance, Utc::now().to_rfc3339(), wallet_id.0, expected],
        )?;
        Ok(rows == 1)
    }

    fn append_transaction(&mut self, record: &WalletTransaction) -> Result<()> {
        self.conn.execute(
            "INSERT INTO wallet_transactions (transaction_id, wallet_id, amount, balance_before,
                                              balance_after, direction, status, description, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id.to_string(),
                record.wallet_id.0,
                record.amount,
                record.balance_before,
                record.balance_after,
                record.direction.as_str(),
                record.status.as_str(),
                record.description,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn transactions_for_wallet(&mut self, wallet_id: WalletId) -> Result<Vec<WalletTransaction>> {
        let sql = format!(
            "SELECT {} FROM wallet_transactions WHERE wallet_id = ? ORDER BY entry_seq",
            TRANSACTION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params![wallet_id.0], RawTransaction::from_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        raw.into_iter().map(RawTransaction::into_domain).collect()
    }

    fn commit(mut self) -> Result<()> {
        if let Err(e) = self.conn.execute_batch("COMMIT") {
            // Leave the connection outside any transaction for the next unit
            self.finished = self.abort("commit failed");
            return Err(e.into());
        }
        self.finished = true;
        debug!("unit of work committed");
        Ok(())
    }

    fn rollback(mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        self.finished = true;
        Ok(())
    }
}

impl DuckDbUnit<'_> {
    /// Roll back after a failure, logging rather than returning the error.
    /// Returns whether the connection left the transaction.
    fn abort(&mut self, reason: &str) -> bool {
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => true,
            Err(e) => {
                warn!(reason, error = %e, "rollback of unit of work failed");
                false
            }
        }
    }
}

impl Drop for DuckDbUnit<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.abort("unit of work abandoned");
        }
    }
}

impl ResetTokenStore for DuckDbStore {
    fn save_reset(&self, reset: &PasswordReset) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO password_resets (email, token, created_at) VALUES (?, ?, ?)
             ON CONFLICT (email) DO UPDATE SET
                token = EXCLUDED.token,
                created_at = EXCLUDED.created_at",
            params![reset.email, reset.token, reset.created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn reset_by_email(&self, email: &str) -> Result<Option<PasswordReset>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT email, token, created_at FROM password_resets WHERE email = ?")?;
        let mut rows = stmt.query_map(params![email], |row| {
            let created: String = row.get(2)?;
            Ok(PasswordReset {
                email: row.get(0)?,
                token: row.get(1)?,
                created_at: parse_timestamp(&created),
            })
        })?;
        let reset = rows.next().transpose()?;
        Ok(reset)
    }

    fn delete_reset(&self, email: &str) -> Result<u64> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM password_resets WHERE email = ?", params![email])?;
        Ok(rows as u64)
    }
}

fn row_to_wallet(row: &duckdb::Row<'_>) -> duckdb::Result<Wallet> {
    // 0: wallet_id, 1: user_id, 2: balance, 3: created_at, 4: updated_at, 5: deleted_at
    let created: String = row.get(3)?;
    let updated: String = row.get(4)?;
    let deleted: Option<String> = row.get(5)?;

    Ok(Wallet {
        id: WalletId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        balance: row.get(2)?,
        created_at: parse_timestamp(&created),
        updated_at: parse_timestamp(&updated),
        deleted_at: deleted.as_deref().map(parse_timestamp),
    })
}

/// Ledger row before its enum columns are validated
struct RawTransaction {
    id: String,
    wallet_id: i64,
    amount: i64,
    balance_before: i64,
    balance_after: i64,
    direction: String,
    status: String,
    description: String,
    created_at: String,
}

impl RawTransaction {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            wallet_id: row.get(1)?,
            amount: row.get(2)?,
            balance_before: row.get(3)?,
            balance_after: row.get(4)?,
            direction: row.get(5)?,
            status: row.get(6)?,
            description: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_domain(self) -> Result<WalletTransaction> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| Error::storage(format!("bad transaction id '{}': {}", self.id, e)))?;
        Ok(WalletTransaction {
            id,
            wallet_id: WalletId(self.wallet_id),
            amount: self.amount,
            balance_before: self.balance_before,
            balance_after: self.balance_after,
            direction: self.direction.parse()?,
            status: self.status.parse()?,
            description: self.description,
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
