//! Session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One authenticated, device-bound login.
///
/// Sessions move from active to revoked exactly once and are never
/// reactivated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    /// Unique session identifier.
    pub id: Uuid,
    /// The user this session belongs to.
    pub user_id: Uuid,
    /// The device row this session was opened from.
    pub device_id: Option<Uuid>,
    /// Opaque random session token.
    #[serde(skip_serializing)]
    pub session_token: String,
    /// IP address the session was created from.
    pub ip_address: Option<String>,
    /// User-Agent header at creation.
    pub user_agent: Option<String>,
    /// Display label of the device.
    pub device_name: Option<String>,
    /// Last authenticated request.
    pub last_activity_at: DateTime<Utc>,
    /// IP address of the last authenticated request.
    pub last_activity_ip: Option<String>,
    /// Number of authenticated requests.
    pub activity_count: i32,
    /// Active flag.
    pub is_active: bool,
    /// Revoked flag.
    pub is_revoked: bool,
    /// When the session was revoked.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Who revoked the session.
    pub revoked_by: Option<Uuid>,
    /// Why the session was revoked.
    pub revoked_reason: Option<String>,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session can still authenticate requests at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_revoked && self.expires_at > now
    }
}

/// Data required to create a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    /// Owning user.
    pub user_id: Uuid,
    /// Device row.
    pub device_id: Option<Uuid>,
    /// Opaque random session token.
    pub session_token: String,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Device display label.
    pub device_name: Option<String>,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
}
