//! Request-scoped identity types shared by the auth components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Network metadata of the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client IP address, if known.
    pub ip_address: Option<String>,
    /// Raw `User-Agent` header, if sent.
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Creates client info from optional parts.
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent,
        }
    }
}

/// The authenticated identity attached to a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// The authenticated user.
    pub user_id: Uuid,
    /// Email carried by the access token.
    pub email: String,
    /// Session the access token is bound to.
    pub session_id: Option<Uuid>,
    /// The access token's `jti`.
    pub token_id: Uuid,
    /// The access token's expiry.
    pub expires_at: DateTime<Utc>,
    /// Caller network metadata.
    pub client: ClientInfo,
}

/// Who performed an administrative action, for audit attribution.
#[derive(Debug, Clone, Default)]
pub struct Actor {
    /// Acting user, `None` for system-initiated actions.
    pub user_id: Option<Uuid>,
    /// Acting user's email.
    pub email: Option<String>,
    /// Caller network metadata.
    pub client: ClientInfo,
}

impl Actor {
    /// An actor for maintenance jobs and the CLI.
    pub fn system() -> Self {
        Self::default()
    }

    /// An actor identified by user ID only.
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }
}

impl From<&AuthContext> for Actor {
    fn from(ctx: &AuthContext) -> Self {
        Self {
            user_id: Some(ctx.user_id),
            email: Some(ctx.email.clone()),
            client: ctx.client.clone(),
        }
    }
}
