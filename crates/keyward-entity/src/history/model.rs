//! Login history entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// One login attempt, successful or not. Never updated after insert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoginHistory {
    /// Unique row identifier.
    pub id: Uuid,
    /// The matched user, if the email was known.
    pub user_id: Option<Uuid>,
    /// Email as submitted.
    pub email: String,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Failure reason for unsuccessful attempts.
    pub failure_reason: Option<String>,
    /// Device row resolved for successful attempts.
    pub device_id: Option<Uuid>,
    /// Client fingerprint.
    pub fingerprint: Option<String>,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Flagged as suspicious.
    pub is_suspicious: bool,
    /// Optional risk score.
    pub risk_score: Option<i32>,
    /// Session opened by the attempt.
    pub session_id: Option<Uuid>,
    /// Refresh token issued by the attempt.
    pub refresh_token_id: Option<Uuid>,
    /// When the attempt happened.
    pub attempted_at: DateTime<Utc>,
}

/// Data recorded for a login attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewLoginHistory {
    /// The matched user.
    pub user_id: Option<Uuid>,
    /// Email as submitted.
    pub email: String,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Failure reason.
    pub failure_reason: Option<String>,
    /// Device row.
    pub device_id: Option<Uuid>,
    /// Client fingerprint.
    pub fingerprint: Option<String>,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Flagged as suspicious.
    pub is_suspicious: bool,
    /// Optional risk score.
    pub risk_score: Option<i32>,
    /// Session opened.
    pub session_id: Option<Uuid>,
    /// Refresh token issued.
    pub refresh_token_id: Option<Uuid>,
}

/// Why a login attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginFailureReason {
    /// No account with this email.
    UserNotFound,
    /// The account is deactivated.
    UserInactive,
    /// The account is blocked.
    UserBlocked,
    /// The password did not match.
    InvalidPassword,
}

impl LoginFailureReason {
    /// Return the reason as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserNotFound => "user_not_found",
            Self::UserInactive => "user_inactive",
            Self::UserBlocked => "user_blocked",
            Self::InvalidPassword => "invalid_password",
        }
    }
}

impl fmt::Display for LoginFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
