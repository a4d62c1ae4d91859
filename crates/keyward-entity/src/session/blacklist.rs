//! Access token blacklist entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An access token invalidated before its natural expiry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlacklistEntry {
    /// Unique row identifier.
    pub id: Uuid,
    /// SHA-256 digest of the access token.
    pub token_hash: String,
    /// Owner of the token.
    pub user_id: Option<Uuid>,
    /// Why the token was blacklisted.
    pub reason: Option<String>,
    /// The token's own expiry; the row can be purged after this.
    pub expires_at: DateTime<Utc>,
    /// When the token was blacklisted.
    pub created_at: DateTime<Utc>,
}

/// Data required to blacklist an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBlacklistEntry {
    /// SHA-256 digest of the access token.
    pub token_hash: String,
    /// Owner of the token.
    pub user_id: Option<Uuid>,
    /// Why the token was blacklisted.
    pub reason: Option<String>,
    /// The token's own expiry.
    pub expires_at: DateTime<Utc>,
}
