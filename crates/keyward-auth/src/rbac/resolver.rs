//! Effective role and permission resolution.
//!
//! A role grant counts when the grant is active, unexpired, and the role
//! itself is active. A permission counts when it is granted to one of those
//! roles and is itself active. Resolution is a plain union; there are no
//! deny overrides.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use keyward_core::error::AppError;
use keyward_database::CredentialStore;
use keyward_entity::role::AssignedRole;

/// A user's effective roles and permissions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserAccess {
    /// Role slugs, highest level first.
    pub roles: Vec<String>,
    /// Permission slugs, sorted.
    pub permissions: BTreeSet<String>,
}

/// Answers authorization questions for a user.
#[derive(Clone)]
pub struct RbacResolver {
    store: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for RbacResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RbacResolver").finish()
    }
}

impl RbacResolver {
    /// Creates a resolver over a store.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    async fn effective_roles(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<AssignedRole>, AppError> {
        let mut roles: Vec<AssignedRole> = self
            .store
            .list_assigned_roles(user_id)
            .await?
            .into_iter()
            .filter(|r| r.is_effective(now))
            .collect();

        roles.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.slug.cmp(&b.slug)));
        let mut seen = HashSet::new();
        roles.retain(|r| seen.insert(r.role_id));
        Ok(roles)
    }

    async fn permissions_of(&self, roles: &[AssignedRole]) -> Result<BTreeSet<String>, AppError> {
        if roles.is_empty() {
            return Ok(BTreeSet::new());
        }
        let role_ids: Vec<Uuid> = roles.iter().map(|r| r.role_id).collect();
        Ok(self
            .store
            .list_permission_grants(&role_ids)
            .await?
            .into_iter()
            .filter(|g| g.is_effective())
            .map(|g| g.slug)
            .collect())
    }

    /// Roles and permissions in one pass.
    pub async fn get_user_access(&self, user_id: Uuid) -> Result<UserAccess, AppError> {
        let roles = self.effective_roles(user_id, Utc::now()).await?;
        let permissions = self.permissions_of(&roles).await?;
        debug!(
            user_id = %user_id,
            roles = roles.len(),
            permissions = permissions.len(),
            "Resolved user access"
        );
        Ok(UserAccess {
            roles: roles.into_iter().map(|r| r.slug).collect(),
            permissions,
        })
    }

    /// Effective role slugs, highest level first, then by slug.
    pub async fn get_user_roles(&self, user_id: Uuid) -> Result<Vec<String>, AppError> {
        Ok(self
            .effective_roles(user_id, Utc::now())
            .await?
            .into_iter()
            .map(|r| r.slug)
            .collect())
    }

    /// Effective permission slugs.
    pub async fn get_user_permissions(&self, user_id: Uuid) -> Result<BTreeSet<String>, AppError> {
        let roles = self.effective_roles(user_id, Utc::now()).await?;
        self.permissions_of(&roles).await
    }

    /// Whether the user holds the role.
    pub async fn has_role(&self, user_id: Uuid, slug: &str) -> Result<bool, AppError> {
        Ok(self.get_user_roles(user_id).await?.iter().any(|r| r == slug))
    }

    /// Whether the user holds at least one of the roles.
    pub async fn has_any_role(&self, user_id: Uuid, slugs: &[&str]) -> Result<bool, AppError> {
        let roles = self.get_user_roles(user_id).await?;
        Ok(roles.iter().any(|r| slugs.contains(&r.as_str())))
    }

    /// Whether the user holds the permission through any effective role.
    pub async fn has_permission(&self, user_id: Uuid, slug: &str) -> Result<bool, AppError> {
        Ok(self.get_user_permissions(user_id).await?.contains(slug))
    }

    /// Fails with `Forbidden` unless the user holds the role.
    pub async fn require_role(&self, user_id: Uuid, slug: &str) -> Result<(), AppError> {
        if self.has_role(user_id, slug).await? {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("Role '{slug}' is required")))
        }
    }

    /// Fails with `Forbidden` unless the user holds the permission.
    pub async fn require_permission(&self, user_id: Uuid, slug: &str) -> Result<(), AppError> {
        if self.has_permission(user_id, slug).await? {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("Permission '{slug}' is required")))
        }
    }
}
