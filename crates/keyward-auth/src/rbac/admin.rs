//! Administration of roles, permissions, and grants.
//!
//! System rows are immutable through this interface, and every mutation
//! emits an audit event.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use keyward_core::error::AppError;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_database::CredentialStore;
use keyward_entity::role::{
    AssignPermission, AssignRole, CreatePermission, CreateRole, Permission, Role, RolePermission,
    UpdatePermission, UpdateRole, UserRole, validate_slug,
};

use crate::audit::{self, AuditSink, diff_values};
use crate::context::Actor;

/// A role with its effective permissions and holder count.
#[derive(Debug, Clone, Serialize)]
pub struct RoleDetails {
    #[serde(flatten)]
    pub role: Role,
    /// Slugs of granted, active permissions.
    pub permissions: Vec<String>,
    /// Users holding an active grant.
    pub user_count: u64,
}

/// Role and permission management.
#[derive(Clone)]
pub struct RbacAdmin {
    store: Arc<dyn CredentialStore>,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for RbacAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RbacAdmin").finish()
    }
}

fn check_slug(slug: Option<&String>) -> Result<(), AppError> {
    match slug {
        Some(slug) if validate_slug(slug).is_err() => Err(AppError::validation(format!(
            "Invalid slug '{slug}': use lowercase letters, digits, '-', '_' or '.'"
        ))),
        _ => Ok(()),
    }
}

impl RbacAdmin {
    /// Creates the admin facade.
    pub fn new(store: Arc<dyn CredentialStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    async fn require_role_row(&self, id: Uuid) -> Result<Role, AppError> {
        self.store
            .find_role(id)
            .await?
            .ok_or_else(|| AppError::not_found("Role not found"))
    }

    async fn require_permission_row(&self, id: Uuid) -> Result<Permission, AppError> {
        self.store
            .find_permission(id)
            .await?
            .ok_or_else(|| AppError::not_found("Permission not found"))
    }

    // -- Roles --------------------------------------------------------------

    /// Create a custom role.
    pub async fn create_role(&self, input: CreateRole, actor: &Actor) -> Result<Role, AppError> {
        input.validate()?;
        if input.is_system {
            return Err(AppError::forbidden("System roles cannot be created"));
        }

        let role = self
            .store
            .create_role(&input, actor.user_id, Utc::now())
            .await?;

        self.audit
            .record(
                audit::event("role.created", "role", actor)
                    .entity_id(role.id)
                    .values(None, Some(serde_json::to_value(&role)?)),
            )
            .await;
        info!(role_id = %role.id, slug = %role.slug, "Role created");
        Ok(role)
    }

    /// Apply a partial update to a custom role.
    pub async fn update_role(
        &self,
        id: Uuid,
        input: UpdateRole,
        actor: &Actor,
    ) -> Result<Role, AppError> {
        input.validate()?;
        check_slug(input.slug.as_ref())?;

        let existing = self.require_role_row(id).await?;
        if existing.is_system {
            return Err(AppError::forbidden("System roles cannot be modified"));
        }

        let role = self
            .store
            .update_role(id, &input, actor.user_id, Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found("Role not found"))?;

        let (old_values, new_values) =
            diff_values(&serde_json::to_value(&existing)?, &serde_json::to_value(&role)?);
        self.audit
            .record(
                audit::event("role.updated", "role", actor)
                    .entity_id(id)
                    .values(old_values, new_values),
            )
            .await;
        Ok(role)
    }

    /// Delete a custom role and its grants.
    pub async fn delete_role(&self, id: Uuid, actor: &Actor) -> Result<(), AppError> {
        let existing = self.require_role_row(id).await?;
        if existing.is_system {
            return Err(AppError::forbidden("System roles cannot be deleted"));
        }

        if !self.store.delete_role(id).await? {
            return Err(AppError::not_found("Role not found"));
        }

        self.audit
            .record(
                audit::event("role.deleted", "role", actor)
                    .entity_id(id)
                    .values(Some(serde_json::to_value(&existing)?), None),
            )
            .await;
        info!(role_id = %id, slug = %existing.slug, "Role deleted");
        Ok(())
    }

    /// A role with its effective permissions and user count.
    pub async fn get_role(&self, id: Uuid) -> Result<RoleDetails, AppError> {
        let role = self.require_role_row(id).await?;

        let mut permissions: Vec<String> = self
            .store
            .list_permission_grants(&[id])
            .await?
            .into_iter()
            .filter(|g| g.is_effective())
            .map(|g| g.slug)
            .collect();
        permissions.sort();

        let user_count = self.store.count_role_users(id).await?;
        Ok(RoleDetails {
            role,
            permissions,
            user_count,
        })
    }

    /// Roles by level descending.
    pub async fn list_roles(&self, page: PageRequest) -> Result<PageResponse<Role>, AppError> {
        self.store.list_roles(page).await
    }

    // -- Permissions --------------------------------------------------------

    /// Create a custom permission.
    pub async fn create_permission(
        &self,
        input: CreatePermission,
        actor: &Actor,
    ) -> Result<Permission, AppError> {
        input.validate()?;
        if input.is_system {
            return Err(AppError::forbidden("System permissions cannot be created"));
        }

        let permission = self
            .store
            .create_permission(&input, actor.user_id, Utc::now())
            .await?;

        self.audit
            .record(
                audit::event("permission.created", "permission", actor)
                    .entity_id(permission.id)
                    .values(None, Some(serde_json::to_value(&permission)?)),
            )
            .await;
        info!(permission_id = %permission.id, slug = %permission.slug, "Permission created");
        Ok(permission)
    }

    /// Apply a partial update to a custom permission.
    pub async fn update_permission(
        &self,
        id: Uuid,
        input: UpdatePermission,
        actor: &Actor,
    ) -> Result<Permission, AppError> {
        input.validate()?;
        check_slug(input.slug.as_ref())?;

        let existing = self.require_permission_row(id).await?;
        if existing.is_system {
            return Err(AppError::forbidden("System permissions cannot be modified"));
        }

        let permission = self
            .store
            .update_permission(id, &input, actor.user_id, Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found("Permission not found"))?;

        let (old_values, new_values) = diff_values(
            &serde_json::to_value(&existing)?,
            &serde_json::to_value(&permission)?,
        );
        self.audit
            .record(
                audit::event("permission.updated", "permission", actor)
                    .entity_id(id)
                    .values(old_values, new_values),
            )
            .await;
        Ok(permission)
    }

    /// Delete a custom permission and its grants.
    pub async fn delete_permission(&self, id: Uuid, actor: &Actor) -> Result<(), AppError> {
        let existing = self.require_permission_row(id).await?;
        if existing.is_system {
            return Err(AppError::forbidden("System permissions cannot be deleted"));
        }

        if !self.store.delete_permission(id).await? {
            return Err(AppError::not_found("Permission not found"));
        }

        self.audit
            .record(
                audit::event("permission.deleted", "permission", actor)
                    .entity_id(id)
                    .values(Some(serde_json::to_value(&existing)?), None),
            )
            .await;
        info!(permission_id = %id, slug = %existing.slug, "Permission deleted");
        Ok(())
    }

    /// Find a permission by id.
    pub async fn get_permission(&self, id: Uuid) -> Result<Permission, AppError> {
        self.require_permission_row(id).await
    }

    /// Permissions, optionally restricted to one category.
    pub async fn list_permissions(
        &self,
        category: Option<&str>,
        page: PageRequest,
    ) -> Result<PageResponse<Permission>, AppError> {
        self.store.list_permissions(category, page).await
    }

    // -- Grants -------------------------------------------------------------

    /// Grant a role to a user, re-activating an earlier grant if present.
    pub async fn assign_role(&self, input: AssignRole, actor: &Actor) -> Result<UserRole, AppError> {
        if self.store.find_user_by_id(input.user_id).await?.is_none() {
            return Err(AppError::not_found("User not found"));
        }
        let role = self
            .store
            .find_role(input.role_id)
            .await?
            .filter(|r| r.is_active)
            .ok_or_else(|| AppError::not_found("Role not found or inactive"))?;

        let grant = self
            .store
            .upsert_user_role(&input, actor.user_id, Utc::now())
            .await?;

        self.audit
            .record(
                audit::event("role.assigned", "user_role", actor)
                    .entity_id(input.user_id)
                    .values(
                        None,
                        Some(serde_json::json!({
                            "role_id": role.id,
                            "role": role.slug,
                            "expires_at": input.expires_at,
                        })),
                    ),
            )
            .await;
        info!(user_id = %input.user_id, role = %role.slug, "Role assigned");
        Ok(grant)
    }

    /// Deactivate a user's role grant. The row is kept.
    pub async fn revoke_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        actor: &Actor,
    ) -> Result<(), AppError> {
        if !self.store.deactivate_user_role(user_id, role_id).await? {
            return Err(AppError::not_found("Role assignment not found"));
        }

        self.audit
            .record(
                audit::event("role.revoked", "user_role", actor)
                    .entity_id(user_id)
                    .values(Some(serde_json::json!({ "role_id": role_id })), None),
            )
            .await;
        info!(user_id = %user_id, role_id = %role_id, "Role revoked");
        Ok(())
    }

    /// Grant (or explicitly withhold) a permission on a role.
    pub async fn assign_permission(
        &self,
        input: AssignPermission,
        actor: &Actor,
    ) -> Result<RolePermission, AppError> {
        let role = self.require_role_row(input.role_id).await?;
        let permission = self
            .store
            .find_permission(input.permission_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::not_found("Permission not found or inactive"))?;

        let grant = self
            .store
            .upsert_role_permission(&input, actor.user_id, Utc::now())
            .await?;

        self.audit
            .record(
                audit::event("permission.assigned", "role_permission", actor)
                    .entity_id(role.id)
                    .values(
                        None,
                        Some(serde_json::json!({
                            "permission_id": permission.id,
                            "permission": permission.slug,
                            "granted": input.granted,
                        })),
                    ),
            )
            .await;
        Ok(grant)
    }

    /// Remove a role's permission grant.
    pub async fn revoke_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
        actor: &Actor,
    ) -> Result<(), AppError> {
        if !self
            .store
            .delete_role_permission(role_id, permission_id)
            .await?
        {
            return Err(AppError::not_found("Permission assignment not found"));
        }

        self.audit
            .record(
                audit::event("permission.revoked", "role_permission", actor)
                    .entity_id(role_id)
                    .values(
                        Some(serde_json::json!({ "permission_id": permission_id })),
                        None,
                    ),
            )
            .await;
        Ok(())
    }
}
