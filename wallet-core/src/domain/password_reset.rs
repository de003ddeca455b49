//! Password reset token domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::{Error, Result};

const MAX_EMAIL_LEN: usize = 100;

/// A single-use reset token keyed by email
///
/// A newer request for the same email replaces the previous token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordReset {
    pub email: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    /// Issue a fresh token for `email`
    pub fn issue(email: &str) -> Result<Self> {
        let email = Self::normalize_email(email)?;
        Ok(Self {
            email,
            token: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        })
    }

    /// Trim and lowercase, rejecting obviously invalid addresses
    pub fn normalize_email(email: &str) -> Result<String> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::validation(format!("invalid email '{}'", email)));
        }
        if email.len() > MAX_EMAIL_LEN {
            return Err(Error::validation("email is too long"));
        }
        Ok(email)
    }

    pub fn matches(&self, token: &str) -> bool {
        self.token == token
    }
}
