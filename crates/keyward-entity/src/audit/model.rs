//! Audit log entry entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An immutable record of a state-changing action.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    /// Unique audit entry identifier.
    pub id: Uuid,
    /// Dotted action name, e.g. `"role.updated"`.
    pub action: String,
    /// Affected entity type, e.g. `"Role"`.
    pub entity: String,
    /// Affected entity id.
    pub entity_id: Option<Uuid>,
    /// Acting user.
    pub user_id: Option<Uuid>,
    /// Acting user's email at the time.
    pub user_email: Option<String>,
    /// Field values before the change.
    pub old_values: Option<serde_json::Value>,
    /// Field values after the change.
    pub new_values: Option<serde_json::Value>,
    /// Actor's IP address.
    pub ip_address: Option<String>,
    /// Actor's user agent.
    pub user_agent: Option<String>,
    /// When the action occurred.
    pub created_at: DateTime<Utc>,
}

/// Data required to record an audit entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAuditLog {
    /// Action name.
    pub action: String,
    /// Entity type.
    pub entity: String,
    /// Entity id.
    pub entity_id: Option<Uuid>,
    /// Acting user.
    pub user_id: Option<Uuid>,
    /// Acting user's email.
    pub user_email: Option<String>,
    /// Values before.
    pub old_values: Option<serde_json::Value>,
    /// Values after.
    pub new_values: Option<serde_json::Value>,
    /// Actor IP.
    pub ip_address: Option<String>,
    /// Actor user agent.
    pub user_agent: Option<String>,
}

impl NewAuditLog {
    /// Start an entry for `action` on `entity`.
    pub fn new(action: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            entity: entity.into(),
            ..Self::default()
        }
    }

    /// Set the affected entity id.
    pub fn entity_id(mut self, id: Uuid) -> Self {
        self.entity_id = Some(id);
        self
    }

    /// Set the acting user.
    pub fn actor(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Set the acting user's email.
    pub fn actor_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    /// Set the before/after values.
    pub fn values(
        mut self,
        old_values: Option<serde_json::Value>,
        new_values: Option<serde_json::Value>,
    ) -> Self {
        self.old_values = old_values;
        self.new_values = new_values;
        self
    }

    /// Set the client metadata.
    pub fn client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}
