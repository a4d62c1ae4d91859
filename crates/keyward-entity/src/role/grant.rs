//! Grant rows linking users to roles and roles to permissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A role granted to a user. `(user_id, role_id)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRole {
    /// Unique row identifier.
    pub id: Uuid,
    /// Grantee.
    pub user_id: Uuid,
    /// Granted role.
    pub role_id: Uuid,
    /// Soft-revocation flag.
    pub is_active: bool,
    /// Optional expiry; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Granting user.
    pub assigned_by: Option<Uuid>,
    /// When the grant was first made.
    pub created_at: DateTime<Utc>,
}

/// A permission granted to a role. `(role_id, permission_id)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RolePermission {
    /// Unique row identifier.
    pub id: Uuid,
    /// Role.
    pub role_id: Uuid,
    /// Permission.
    pub permission_id: Uuid,
    /// `false` is the same as no grant.
    pub granted: bool,
    /// Granting user.
    pub assigned_by: Option<Uuid>,
    /// When the grant was made.
    pub created_at: DateTime<Utc>,
}

/// A user's role grant joined with the role's own state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssignedRole {
    /// Role.
    pub role_id: Uuid,
    /// Role slug.
    pub slug: String,
    /// Role level.
    pub level: i32,
    /// `Role.is_active`.
    pub role_is_active: bool,
    /// `UserRole.is_active`.
    pub grant_is_active: bool,
    /// `UserRole.expires_at`.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AssignedRole {
    /// Whether this grant is effective at `now`.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.role_is_active && self.grant_is_active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// A role's permission grant joined with the permission's own state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionGrant {
    /// Granting role.
    pub role_id: Uuid,
    /// Permission slug.
    pub slug: String,
    /// `RolePermission.granted`.
    pub granted: bool,
    /// `Permission.is_active`.
    pub permission_is_active: bool,
}

impl PermissionGrant {
    /// Whether this grant is effective.
    pub fn is_effective(&self) -> bool {
        self.granted && self.permission_is_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn assigned(expires_at: Option<DateTime<Utc>>) -> AssignedRole {
        AssignedRole {
            role_id: Uuid::new_v4(),
            slug: "ops".into(),
            level: 40,
            role_is_active: true,
            grant_is_active: true,
            expires_at,
        }
    }

    #[test]
    fn test_effective_role_grant() {
        let now = Utc::now();
        assert!(assigned(None).is_effective(now));
        assert!(assigned(Some(now + Duration::hours(1))).is_effective(now));
        assert!(!assigned(Some(now - Duration::seconds(1))).is_effective(now));

        let mut inactive_role = assigned(None);
        inactive_role.role_is_active = false;
        assert!(!inactive_role.is_effective(now));

        let mut revoked = assigned(None);
        revoked.grant_is_active = false;
        assert!(!revoked.is_effective(now));
    }

    #[test]
    fn test_effective_permission_grant() {
        let grant = PermissionGrant {
            role_id: Uuid::new_v4(),
            slug: "user.read".into(),
            granted: true,
            permission_is_active: true,
        };
        assert!(grant.is_effective());
        assert!(!PermissionGrant { granted: false, ..grant.clone() }.is_effective());
        assert!(!PermissionGrant { permission_is_active: false, ..grant }.is_effective());
    }
}
