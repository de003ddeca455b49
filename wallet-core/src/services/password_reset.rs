//! Password reset service - issues and redeems single-use reset tokens

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::result::{Error, Result};
use crate::domain::PasswordReset;
use crate::ports::ResetTokenStore;

/// Password reset token lifecycle
///
/// Tokens come from [`PasswordReset::issue`]; there is at most one live token
/// per email and issuing a new one replaces the old.
pub struct PasswordResetService<S> {
    store: Arc<S>,
}

impl<S: ResetTokenStore> PasswordResetService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Issue a fresh token for `email`, superseding any pending one
    pub fn request(&self, email: &str) -> Result<PasswordReset> {
        let reset = PasswordReset::issue(email)?;
        self.store.save_reset(&reset)?;
        info!(email = %reset.email, "password reset requested");
        Ok(reset)
    }

    /// Pending reset for `email`, if any
    pub fn find_by_email(&self, email: &str) -> Result<Option<PasswordReset>> {
        let email = PasswordReset::normalize_email(email)?;
        self.store.reset_by_email(&email)
    }

    /// Redeem `token` for `email`. The token is deleted on success.
    pub fn consume(&self, email: &str, token: &str) -> Result<PasswordReset> {
        let email = PasswordReset::normalize_email(email)?;
        let reset = self
            .store
            .reset_by_email(&email)?
            .filter(|r| r.matches(token))
            .ok_or_else(|| Error::ResetTokenNotFound(email.clone()))?;

        self.store.delete_reset(&email)?;
        info!(email = %email, "password reset consumed");
        Ok(reset)
    }

    /// Drop any pending reset for `email`; returns the number removed
    pub fn delete(&self, email: &str) -> Result<u64> {
        let email = PasswordReset::normalize_email(email)?;
        let removed = self.store.delete_reset(&email)?;
        debug!(email = %email, removed, "password reset deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryLedgerStore;

    fn service() -> PasswordResetService<InMemoryLedgerStore> {
        PasswordResetService::new(Arc::new(InMemoryLedgerStore::new()))
    }

    #[test]
    fn test_request_and_find() {
        let service = service();
        let reset = service.request("Ada@Example.com").unwrap();
        assert_eq!(reset.email, "ada@example.com");

        let found = service.find_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(found, reset);
    }

    #[test]
    fn test_new_request_supersedes_old_token() {
        let service = service();
        let first = service.request("ada@example.com").unwrap();
        let second = service.request("ada@example.com").unwrap();
        assert_ne!(first.token, second.token);

        assert!(matches!(
            service.consume("ada@example.com", &first.token),
            Err(Error::ResetTokenNotFound(_))
        ));
        assert!(service.consume("ada@example.com", &second.token).is_ok());
    }

    #[test]
    fn test_consume_is_single_use() {
        let service = service();
        let reset = service.request("ada@example.com").unwrap();

        service.consume("ada@example.com", &reset.token).unwrap();
        assert!(service.find_by_email("ada@example.com").unwrap().is_none());
        assert!(service.consume("ada@example.com", &reset.token).is_err());
    }

    #[test]
    fn test_delete_reports_rows() {
        let service = service();
        service.request("ada@example.com").unwrap();
        assert_eq!(service.delete("ada@example.com").unwrap(), 1);
        assert_eq!(service.delete("ada@example.com").unwrap(), 0);
    }

    #[test]
    fn test_invalid_email_rejected() {
        let service = service();
        assert!(matches!(service.request("not-an-email"), Err(Error::Validation(_))));
    }
}
