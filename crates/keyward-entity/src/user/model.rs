//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered user account.
///
/// Users are never hard-deleted; deactivation flips `is_active` to false.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Unique, lower-cased email address used to log in.
    pub email: String,
    /// Argon2 password digest.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Full name.
    pub name: Option<String>,
    /// Whether the email address has been verified.
    pub email_verified: bool,
    /// When the email address was verified.
    pub email_verified_at: Option<DateTime<Utc>>,
    /// Whether the account is active (soft-delete flag).
    pub is_active: bool,
    /// Whether the account is blocked by an administrator.
    pub is_blocked: bool,
    /// Last successful login time.
    pub last_login_at: Option<DateTime<Utc>>,
    /// SHA-256 digest of the pending password reset token.
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    /// When the pending reset token stops being accepted.
    #[serde(skip_serializing)]
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the account may authenticate at all.
    pub fn can_login(&self) -> bool {
        self.is_active && !self.is_blocked
    }

    /// Whether a reset token is pending and unexpired at `now`.
    pub fn has_pending_reset(&self, now: DateTime<Utc>) -> bool {
        self.reset_token.is_some() && self.reset_token_expires_at.is_some_and(|exp| exp > now)
    }
}

/// Data required to create a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Email address; normalized to lower case by the caller.
    pub email: String,
    /// Pre-hashed password.
    pub password_hash: String,
    /// Full name.
    pub name: Option<String>,
    /// Whether the email starts out verified (seeded/admin-created accounts).
    pub email_verified: bool,
}

/// An administrative change to account flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatusChange {
    /// Clear the blocked flag.
    Unblock,
    /// Set the blocked flag.
    Block,
    /// Soft-delete the account.
    Deactivate,
    /// Undo a soft delete.
    Reactivate,
}

impl UserStatusChange {
    /// Audit action recorded for this change.
    pub fn audit_action(&self) -> &'static str {
        match self {
            Self::Unblock => "user.unblocked",
            Self::Block => "user.blocked",
            Self::Deactivate => "user.deactivated",
            Self::Reactivate => "user.reactivated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            password_hash: "digest".into(),
            name: None,
            email_verified: false,
            email_verified_at: None,
            is_active: true,
            is_blocked: false,
            last_login_at: None,
            reset_token: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_can_login() {
        let mut u = user();
        assert!(u.can_login());
        u.is_blocked = true;
        assert!(!u.can_login());
        u.is_blocked = false;
        u.is_active = false;
        assert!(!u.can_login());
    }

    #[test]
    fn test_pending_reset_respects_deadline() {
        let now = Utc::now();
        let mut u = user();
        u.reset_token = Some("abc".into());
        u.reset_token_expires_at = Some(now + Duration::minutes(5));
        assert!(u.has_pending_reset(now));
        assert!(!u.has_pending_reset(now + Duration::minutes(10)));
    }

    #[test]
    fn test_serialization_hides_secrets() {
        let mut u = user();
        u.reset_token = Some("abc".into());
        let json = serde_json::to_value(&u).expect("serialize");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("reset_token").is_none());
        assert_eq!(json["email"], "a@x.com");
    }
}
