//! Refresh token entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored refresh token. Only the SHA-256 digest of the raw token is kept.
///
/// Tokens produced by successive rotations share a `family_id`; at most
/// one token per family is active at any time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    /// Unique row identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// SHA-256 digest of the raw token.
    #[serde(skip_serializing)]
    pub token_hash: String,
    /// Rotation lineage identifier.
    pub family_id: Uuid,
    /// Token this one replaced.
    pub parent_token_id: Option<Uuid>,
    /// Session the token is bound to.
    pub session_id: Option<Uuid>,
    /// Device row the token was issued to.
    pub device_id: Option<Uuid>,
    /// Client IP at issue.
    pub ip_address: Option<String>,
    /// Client user agent at issue.
    pub user_agent: Option<String>,
    /// Active flag.
    pub is_active: bool,
    /// Revoked flag.
    pub is_revoked: bool,
    /// When the token was revoked.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Who revoked the token.
    pub revoked_by: Option<Uuid>,
    /// Why the token was revoked.
    pub revoked_reason: Option<String>,
    /// When the token was exchanged for its successor.
    pub rotated_at: Option<DateTime<Utc>>,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
    /// When the token was issued.
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Whether the token is still the live member of its family.
    pub fn is_usable(&self) -> bool {
        self.is_active && !self.is_revoked
    }

    /// Whether the token is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Data required to store a newly issued refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRefreshToken {
    /// Owning user.
    pub user_id: Uuid,
    /// SHA-256 digest of the raw token.
    pub token_hash: String,
    /// Rotation lineage identifier.
    pub family_id: Uuid,
    /// Token this one replaces.
    pub parent_token_id: Option<Uuid>,
    /// Bound session.
    pub session_id: Option<Uuid>,
    /// Device row.
    pub device_id: Option<Uuid>,
    /// Client IP.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
}
