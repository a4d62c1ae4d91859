//! Permission entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single capability, e.g. `"user.read"`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    /// Unique permission identifier.
    pub id: Uuid,
    /// Unique display name.
    pub name: String,
    /// Unique machine name.
    pub slug: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Grouping used for listing, e.g. `"user"`.
    pub category: Option<String>,
    /// Inactive permissions are never effective.
    pub is_active: bool,
    /// System permissions cannot be changed through the administration API.
    pub is_system: bool,
    /// Arbitrary JSON metadata.
    pub metadata: Option<serde_json::Value>,
    /// Creating user.
    pub created_by: Option<Uuid>,
    /// Last updating user.
    pub updated_by: Option<Uuid>,
    /// When the permission was created.
    pub created_at: DateTime<Utc>,
    /// When the permission was last updated.
    pub updated_at: DateTime<Utc>,
}
