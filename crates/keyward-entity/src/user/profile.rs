//! User profile entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Display details for a user. One row per user, created empty on register.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    /// Unique profile identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Preferred display name.
    pub display_name: Option<String>,
    /// Avatar URL.
    pub avatar: Option<String>,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
    /// When the profile was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(max = 100, message = "First name must be at most 100 characters"))]
    pub first_name: Option<String>,
    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Display name must be 1 to 100 characters"))]
    pub display_name: Option<String>,
    #[validate(url(message = "Avatar must be a URL"))]
    pub avatar: Option<String>,
}

impl UpdateProfile {
    /// Whether the update sets no field.
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.display_name.is_none()
            && self.avatar.is_none()
    }

    /// Copies the set fields onto `profile`.
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(v) = &self.first_name {
            profile.first_name = Some(v.clone());
        }
        if let Some(v) = &self.last_name {
            profile.last_name = Some(v.clone());
        }
        if let Some(v) = &self.display_name {
            profile.display_name = Some(v.clone());
        }
        if let Some(v) = &self.avatar {
            profile.avatar = Some(v.clone());
        }
    }
}
