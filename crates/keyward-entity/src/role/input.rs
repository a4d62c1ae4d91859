//! Administrative inputs for roles, permissions, and grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Slugs are lower-case ASCII letters, digits, `-`, `_` and `.`.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let valid = !slug.is_empty()
        && slug.len() <= 100
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("slug"))
    }
}

/// Input for creating a role.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateRole {
    /// Display name.
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Machine name.
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
    /// Description.
    #[validate(length(max = 500))]
    pub description: Option<String>,
    /// Display priority.
    #[serde(default)]
    #[validate(range(min = 0, max = 1000))]
    pub level: i32,
    /// Badge colour.
    #[validate(length(max = 32))]
    pub color: Option<String>,
    /// Metadata.
    pub metadata: Option<serde_json::Value>,
    /// Requests a system row; always refused by the administration API.
    #[serde(default)]
    pub is_system: bool,
}

/// Partial update of a role. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateRole {
    /// Display name.
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    /// Machine name.
    #[validate(length(min = 1, max = 100))]
    pub slug: Option<String>,
    /// Description.
    #[validate(length(max = 500))]
    pub description: Option<String>,
    /// Display priority.
    #[validate(range(min = 0, max = 1000))]
    pub level: Option<i32>,
    /// Badge colour.
    #[validate(length(max = 32))]
    pub color: Option<String>,
    /// Metadata.
    pub metadata: Option<serde_json::Value>,
    /// Active flag.
    pub is_active: Option<bool>,
}

/// Input for creating a permission.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePermission {
    /// Display name.
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Machine name.
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
    /// Description.
    #[validate(length(max = 500))]
    pub description: Option<String>,
    /// Grouping.
    #[validate(length(max = 50))]
    pub category: Option<String>,
    /// Metadata.
    pub metadata: Option<serde_json::Value>,
    /// Requests a system row; always refused by the administration API.
    #[serde(default)]
    pub is_system: bool,
}

/// Partial update of a permission. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePermission {
    /// Display name.
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    /// Machine name.
    #[validate(length(min = 1, max = 100))]
    pub slug: Option<String>,
    /// Description.
    #[validate(length(max = 500))]
    pub description: Option<String>,
    /// Grouping.
    #[validate(length(max = 50))]
    pub category: Option<String>,
    /// Metadata.
    pub metadata: Option<serde_json::Value>,
    /// Active flag.
    pub is_active: Option<bool>,
}

/// Grant a role to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRole {
    /// Grantee.
    pub user_id: Uuid,
    /// Role.
    pub role_id: Uuid,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Grant (or explicitly not grant) a permission to a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignPermission {
    /// Role.
    pub role_id: Uuid,
    /// Permission.
    pub permission_id: Uuid,
    /// Grant flag.
    #[serde(default = "default_granted")]
    pub granted: bool,
}

fn default_granted() -> bool {
    true
}
