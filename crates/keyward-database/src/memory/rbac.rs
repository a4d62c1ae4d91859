//! Roles, permissions, and grants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keyward_core::error::AppError;
use keyward_core::result::AppResult;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_entity::role::{
    AssignPermission, AssignRole, AssignedRole, CreatePermission, CreateRole, Permission,
    PermissionGrant, Role, RolePermission, UpdatePermission, UpdateRole, UserRole,
};

use super::{MemoryStore, State, paginate};
use crate::store::RbacStore;

impl State {
    fn role_conflict(&self, except: Option<Uuid>, name: Option<&str>, slug: Option<&str>) -> bool {
        self.roles.values().any(|r| {
            Some(r.id) != except
                && (name.is_some_and(|n| r.name == n) || slug.is_some_and(|s| r.slug == s))
        })
    }

    fn permission_conflict(
        &self,
        except: Option<Uuid>,
        name: Option<&str>,
        slug: Option<&str>,
    ) -> bool {
        self.permissions.values().any(|p| {
            Some(p.id) != except
                && (name.is_some_and(|n| p.name == n) || slug.is_some_and(|s| p.slug == s))
        })
    }
}

#[async_trait]
impl RbacStore for MemoryStore {
    async fn create_role(
        &self,
        data: &CreateRole,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        if state.role_conflict(None, Some(&data.name), Some(&data.slug)) {
            return Err(AppError::already_exists(format!(
                "Role '{}' already exists",
                data.slug
            )));
        }
        let role = Role {
            id: Uuid::now_v7(),
            name: data.name.clone(),
            slug: data.slug.clone(),
            description: data.description.clone(),
            level: data.level,
            is_active: true,
            is_system: data.is_system,
            color: data.color.clone(),
            metadata: data.metadata.clone(),
            created_by: actor,
            updated_by: actor,
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update_role(
        &self,
        id: Uuid,
        data: &UpdateRole,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Role>> {
        let mut state = self.state.lock().await;
        if state.role_conflict(Some(id), data.name.as_deref(), data.slug.as_deref()) {
            return Err(AppError::already_exists("Role name or slug already exists"));
        }
        let Some(role) = state.roles.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &data.name {
            role.name = name.clone();
        }
        if let Some(slug) = &data.slug {
            role.slug = slug.clone();
        }
        if let Some(description) = &data.description {
            role.description = Some(description.clone());
        }
        if let Some(level) = data.level {
            role.level = level;
        }
        if let Some(color) = &data.color {
            role.color = Some(color.clone());
        }
        if let Some(metadata) = &data.metadata {
            role.metadata = Some(metadata.clone());
        }
        if let Some(is_active) = data.is_active {
            role.is_active = is_active;
        }
        role.updated_by = actor;
        role.updated_at = now;
        Ok(Some(role.clone()))
    }

    async fn delete_role(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if state.roles.remove(&id).is_none() {
            return Ok(false);
        }
        state.user_roles.retain(|_, g| g.role_id != id);
        state.role_permissions.retain(|_, g| g.role_id != id);
        Ok(true)
    }

    async fn find_role(&self, id: Uuid) -> AppResult<Option<Role>> {
        Ok(self.state.lock().await.roles.get(&id).cloned())
    }

    async fn find_role_by_slug(&self, slug: &str) -> AppResult<Option<Role>> {
        let state = self.state.lock().await;
        Ok(state.roles.values().find(|r| r.slug == slug).cloned())
    }

    async fn list_roles(&self, page: PageRequest) -> AppResult<PageResponse<Role>> {
        let state = self.state.lock().await;
        let mut roles: Vec<Role> = state.roles.values().cloned().collect();
        roles.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.slug.cmp(&b.slug)));
        Ok(paginate(roles, page))
    }

    async fn count_role_users(&self, role_id: Uuid) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .user_roles
            .values()
            .filter(|g| g.role_id == role_id && g.is_active)
            .count() as u64)
    }

    async fn create_permission(
        &self,
        data: &CreatePermission,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<Permission> {
        let mut state = self.state.lock().await;
        if state.permission_conflict(None, Some(&data.name), Some(&data.slug)) {
            return Err(AppError::already_exists(format!(
                "Permission '{}' already exists",
                data.slug
            )));
        }
        let permission = Permission {
            id: Uuid::now_v7(),
            name: data.name.clone(),
            slug: data.slug.clone(),
            description: data.description.clone(),
            category: data.category.clone(),
            is_active: true,
            is_system: data.is_system,
            metadata: data.metadata.clone(),
            created_by: actor,
            updated_by: actor,
            created_at: now,
            updated_at: now,
        };
        state.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn update_permission(
        &self,
        id: Uuid,
        data: &UpdatePermission,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Permission>> {
        let mut state = self.state.lock().await;
        if state.permission_conflict(Some(id), data.name.as_deref(), data.slug.as_deref()) {
            return Err(AppError::already_exists(
                "Permission name or slug already exists",
            ));
        }
        let Some(permission) = state.permissions.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &data.name {
            permission.name = name.clone();
        }
        if let Some(slug) = &data.slug {
            permission.slug = slug.clone();
        }
        if let Some(description) = &data.description {
            permission.description = Some(description.clone());
        }
        if let Some(category) = &data.category {
            permission.category = Some(category.clone());
        }
        if let Some(metadata) = &data.metadata {
            permission.metadata = Some(metadata.clone());
        }
        if let Some(is_active) = data.is_active {
            permission.is_active = is_active;
        }
        permission.updated_by = actor;
        permission.updated_at = now;
        Ok(Some(permission.clone()))
    }

    async fn delete_permission(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if state.permissions.remove(&id).is_none() {
            return Ok(false);
        }
        state.role_permissions.retain(|_, g| g.permission_id != id);
        Ok(true)
    }

    async fn find_permission(&self, id: Uuid) -> AppResult<Option<Permission>> {
        Ok(self.state.lock().await.permissions.get(&id).cloned())
    }

    async fn find_permission_by_slug(&self, slug: &str) -> AppResult<Option<Permission>> {
        let state = self.state.lock().await;
        Ok(state.permissions.values().find(|p| p.slug == slug).cloned())
    }

    async fn list_permissions(
        &self,
        category: Option<&str>,
        page: PageRequest,
    ) -> AppResult<PageResponse<Permission>> {
        let state = self.state.lock().await;
        let mut permissions: Vec<Permission> = state
            .permissions
            .values()
            .filter(|p| category.is_none_or(|c| p.category.as_deref() == Some(c)))
            .cloned()
            .collect();
        permissions.sort_by(|a, b| {
            (a.category.is_none(), &a.category, &a.slug).cmp(&(
                b.category.is_none(),
                &b.category,
                &b.slug,
            ))
        });
        Ok(paginate(permissions, page))
    }

    async fn find_user_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<Option<UserRole>> {
        let state = self.state.lock().await;
        Ok(state
            .user_roles
            .values()
            .find(|g| g.user_id == user_id && g.role_id == role_id)
            .cloned())
    }

    async fn upsert_user_role(
        &self,
        data: &AssignRole,
        assigned_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<UserRole> {
        let mut state = self.state.lock().await;
        if let Some(grant) = state
            .user_roles
            .values_mut()
            .find(|g| g.user_id == data.user_id && g.role_id == data.role_id)
        {
            grant.is_active = true;
            grant.expires_at = data.expires_at;
            grant.assigned_by = assigned_by;
            return Ok(grant.clone());
        }
        let grant = UserRole {
            id: Uuid::now_v7(),
            user_id: data.user_id,
            role_id: data.role_id,
            is_active: true,
            expires_at: data.expires_at,
            assigned_by,
            created_at: now,
        };
        state.user_roles.insert(grant.id, grant.clone());
        Ok(grant)
    }

    async fn deactivate_user_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .user_roles
            .values_mut()
            .find(|g| g.user_id == user_id && g.role_id == role_id)
        {
            Some(grant) => {
                grant.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert_role_permission(
        &self,
        data: &AssignPermission,
        assigned_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<RolePermission> {
        let mut state = self.state.lock().await;
        if let Some(grant) = state
            .role_permissions
            .values_mut()
            .find(|g| g.role_id == data.role_id && g.permission_id == data.permission_id)
        {
            grant.granted = data.granted;
            grant.assigned_by = assigned_by;
            return Ok(grant.clone());
        }
        let grant = RolePermission {
            id: Uuid::now_v7(),
            role_id: data.role_id,
            permission_id: data.permission_id,
            granted: data.granted,
            assigned_by,
            created_at: now,
        };
        state.role_permissions.insert(grant.id, grant.clone());
        Ok(grant)
    }

    async fn delete_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.role_permissions.len();
        state
            .role_permissions
            .retain(|_, g| !(g.role_id == role_id && g.permission_id == permission_id));
        Ok(state.role_permissions.len() < before)
    }

    async fn list_assigned_roles(&self, user_id: Uuid) -> AppResult<Vec<AssignedRole>> {
        let state = self.state.lock().await;
        Ok(state
            .user_roles
            .values()
            .filter(|g| g.user_id == user_id)
            .filter_map(|g| {
                state.roles.get(&g.role_id).map(|role| AssignedRole {
                    role_id: role.id,
                    slug: role.slug.clone(),
                    level: role.level,
                    role_is_active: role.is_active,
                    grant_is_active: g.is_active,
                    expires_at: g.expires_at,
                })
            })
            .collect())
    }

    async fn list_permission_grants(&self, role_ids: &[Uuid]) -> AppResult<Vec<PermissionGrant>> {
        let state = self.state.lock().await;
        Ok(state
            .role_permissions
            .values()
            .filter(|g| role_ids.contains(&g.role_id))
            .filter_map(|g| {
                state
                    .permissions
                    .get(&g.permission_id)
                    .map(|permission| PermissionGrant {
                        role_id: g.role_id,
                        slug: permission.slug.clone(),
                        granted: g.granted,
                        permission_is_active: permission.is_active,
                    })
            })
            .collect())
    }
}
