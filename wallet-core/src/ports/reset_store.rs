//! Password reset token storage port

use crate::domain::result::Result;
use crate::domain::PasswordReset;

/// Keyed storage for reset tokens, one live token per email
pub trait ResetTokenStore: Send + Sync {
    /// Store a token, replacing any previous token for the same email
    fn save_reset(&self, reset: &PasswordReset) -> Result<()>;

    fn reset_by_email(&self, email: &str) -> Result<Option<PasswordReset>>;

    /// Remove the token for `email`, returning the number of rows deleted
    fn delete_reset(&self, email: &str) -> Result<u64>;
}
