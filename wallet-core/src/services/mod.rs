//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod migration;
mod password_reset;
pub mod recorder;
mod transfer;
mod wallet;

pub use migration::{MigrationResult, MigrationService};
pub use password_reset::PasswordResetService;
pub use transfer::{TransferReceipt, TransferService};
pub use wallet::{WalletPolicy, WalletService};
