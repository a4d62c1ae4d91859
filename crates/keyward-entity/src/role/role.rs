//! Role entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A named bundle of permissions that can be granted to users.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    /// Unique role identifier.
    pub id: Uuid,
    /// Unique display name.
    pub name: String,
    /// Unique machine name, e.g. `"super-admin"`.
    pub slug: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Display priority; higher sorts first.
    pub level: i32,
    /// Inactive roles grant nothing.
    pub is_active: bool,
    /// System roles cannot be changed through the administration API.
    pub is_system: bool,
    /// UI badge colour.
    pub color: Option<String>,
    /// Arbitrary JSON metadata.
    pub metadata: Option<serde_json::Value>,
    /// Creating user.
    pub created_by: Option<Uuid>,
    /// Last updating user.
    pub updated_by: Option<Uuid>,
    /// When the role was created.
    pub created_at: DateTime<Utc>,
    /// When the role was last updated.
    pub updated_at: DateTime<Utc>,
}
