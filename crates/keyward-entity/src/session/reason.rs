//! Revocation reasons.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a session or refresh token was revoked.
///
/// Stored as text; administrative callers may also pass free-form reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevokeReason {
    /// The user logged out of one session.
    UserLogout,
    /// The user logged out everywhere.
    UserLogoutAll,
    /// A single session was revoked from the session list.
    SessionRevoked,
    /// An administrator forced a logout everywhere.
    AllSessionsRevoked,
    /// A refresh token was exchanged for its successor.
    Rotated,
    /// A revoked refresh token was presented again.
    ReuseDetected,
    /// The session outlived its absolute expiry.
    Expired,
}

impl RevokeReason {
    /// Return the reason as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserLogout => "user_logout",
            Self::UserLogoutAll => "user_logout_all",
            Self::SessionRevoked => "session_revoked",
            Self::AllSessionsRevoked => "all_sessions_revoked",
            Self::Rotated => "rotated",
            Self::ReuseDetected => "reuse_detected",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for RevokeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for RevokeReason {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
