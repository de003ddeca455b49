//! Database migrations - embedded SQL files
//!
//! Migrations are compiled into the binary at build time using include_str!.
//! Each migration is a tuple of (name, sql_content).
//! Migrations are sorted by name and applied in order.

/// All migrations, embedded at compile time.
/// Format: (filename, sql_content)
///
/// When adding a new migration, create `NNN_description.sql` and append an
/// entry here in order. Applied migrations must never be edited.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_wallets.sql", include_str!("001_wallets.sql")),
    ("002_wallet_transactions.sql", include_str!("002_wallet_transactions.sql")),
    ("003_password_resets.sql", include_str!("003_password_resets.sql")),
];
