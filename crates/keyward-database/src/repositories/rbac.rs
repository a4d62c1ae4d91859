//! Role, permission, and grant repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keyward_core::result::AppResult;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_entity::role::{
    AssignPermission, AssignRole, AssignedRole, CreatePermission, CreateRole, Permission,
    PermissionGrant, Role, RolePermission, UpdatePermission, UpdateRole, UserRole,
};

use super::{PgStore, read_error, write_error};
use crate::store::RbacStore;

#[async_trait]
impl RbacStore for PgStore {
    async fn create_role(
        &self,
        data: &CreateRole,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<Role> {
        sqlx::query_as::<_, Role>(
            "INSERT INTO roles (id, name, slug, description, level, is_system, color, metadata, \
             created_by, updated_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, $10, $10) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.name)
        .bind(&data.slug)
        .bind(&data.description)
        .bind(data.level)
        .bind(data.is_system)
        .bind(&data.color)
        .bind(&data.metadata)
        .bind(actor)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Failed to create role"))
    }

    async fn update_role(
        &self,
        id: Uuid,
        data: &UpdateRole,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, Role>(
            "UPDATE roles SET \
                 name = COALESCE($2, name), \
                 slug = COALESCE($3, slug), \
                 description = COALESCE($4, description), \
                 level = COALESCE($5, level), \
                 color = COALESCE($6, color), \
                 metadata = COALESCE($7, metadata), \
                 is_active = COALESCE($8, is_active), \
                 updated_by = $9, updated_at = $10 \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.slug)
        .bind(&data.description)
        .bind(data.level)
        .bind(&data.color)
        .bind(&data.metadata)
        .bind(data.is_active)
        .bind(actor)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error("Failed to update role"))
    }

    async fn delete_role(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(write_error("Failed to delete role"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_role(&self, id: Uuid) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("Failed to find role"))
    }

    async fn find_role_by_slug(&self, slug: &str) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("Failed to find role by slug"))
    }

    async fn list_roles(&self, page: PageRequest) -> AppResult<PageResponse<Role>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles")
            .fetch_one(&self.pool)
            .await
            .map_err(read_error("Failed to count roles"))?;

        let roles = sqlx::query_as::<_, Role>(
            "SELECT * FROM roles ORDER BY level DESC, slug LIMIT $1 OFFSET $2",
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("Failed to list roles"))?;

        Ok(PageResponse::new(roles, page, total as u64))
    }

    async fn count_role_users(&self, role_id: Uuid) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_roles WHERE role_id = $1 AND is_active",
        )
        .bind(role_id)
        .fetch_one(&self.pool)
        .await
        .map_err(read_error("Failed to count role users"))?;
        Ok(count as u64)
    }

    async fn create_permission(
        &self,
        data: &CreatePermission,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<Permission> {
        sqlx::query_as::<_, Permission>(
            "INSERT INTO permissions (id, name, slug, description, category, is_system, metadata, \
             created_by, updated_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9, $9) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.name)
        .bind(&data.slug)
        .bind(&data.description)
        .bind(&data.category)
        .bind(data.is_system)
        .bind(&data.metadata)
        .bind(actor)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Failed to create permission"))
    }

    async fn update_permission(
        &self,
        id: Uuid,
        data: &UpdatePermission,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Permission>> {
        sqlx::query_as::<_, Permission>(
            "UPDATE permissions SET \
                 name = COALESCE($2, name), \
                 slug = COALESCE($3, slug), \
                 description = COALESCE($4, description), \
                 category = COALESCE($5, category), \
                 metadata = COALESCE($6, metadata), \
                 is_active = COALESCE($7, is_active), \
                 updated_by = $8, updated_at = $9 \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.slug)
        .bind(&data.description)
        .bind(&data.category)
        .bind(&data.metadata)
        .bind(data.is_active)
        .bind(actor)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error("Failed to update permission"))
    }

    async fn delete_permission(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(write_error("Failed to delete permission"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_permission(&self, id: Uuid) -> AppResult<Option<Permission>> {
        sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("Failed to find permission"))
    }

    async fn find_permission_by_slug(&self, slug: &str) -> AppResult<Option<Permission>> {
        sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("Failed to find permission by slug"))
    }

    async fn list_permissions(
        &self,
        category: Option<&str>,
        page: PageRequest,
    ) -> AppResult<PageResponse<Permission>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM permissions WHERE $1::text IS NULL OR category = $1",
        )
        .bind(category)
        .fetch_one(&self.pool)
        .await
        .map_err(read_error("Failed to count permissions"))?;

        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE $1::text IS NULL OR category = $1 \
             ORDER BY category NULLS LAST, slug LIMIT $2 OFFSET $3",
        )
        .bind(category)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("Failed to list permissions"))?;

        Ok(PageResponse::new(permissions, page, total as u64))
    }

    async fn find_user_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<Option<UserRole>> {
        sqlx::query_as::<_, UserRole>(
            "SELECT * FROM user_roles WHERE user_id = $1 AND role_id = $2",
        )
        .bind(user_id)
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_error("Failed to find user role"))
    }

    async fn upsert_user_role(
        &self,
        data: &AssignRole,
        assigned_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<UserRole> {
        sqlx::query_as::<_, UserRole>(
            "INSERT INTO user_roles (id, user_id, role_id, is_active, expires_at, assigned_by, \
             created_at) \
             VALUES ($1, $2, $3, TRUE, $4, $5, $6) \
             ON CONFLICT (user_id, role_id) DO UPDATE SET \
                 is_active = TRUE, \
                 expires_at = EXCLUDED.expires_at, \
                 assigned_by = EXCLUDED.assigned_by \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(data.user_id)
        .bind(data.role_id)
        .bind(data.expires_at)
        .bind(assigned_by)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Failed to assign role"))
    }

    async fn deactivate_user_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE user_roles SET is_active = FALSE WHERE user_id = $1 AND role_id = $2",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await
        .map_err(write_error("Failed to revoke role"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_role_permission(
        &self,
        data: &AssignPermission,
        assigned_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<RolePermission> {
        sqlx::query_as::<_, RolePermission>(
            "INSERT INTO role_permissions (id, role_id, permission_id, granted, assigned_by, \
             created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (role_id, permission_id) DO UPDATE SET \
                 granted = EXCLUDED.granted, \
                 assigned_by = EXCLUDED.assigned_by \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(data.role_id)
        .bind(data.permission_id)
        .bind(data.granted)
        .bind(assigned_by)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Failed to assign permission"))
    }

    async fn delete_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2",
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await
        .map_err(write_error("Failed to revoke permission"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_assigned_roles(&self, user_id: Uuid) -> AppResult<Vec<AssignedRole>> {
        sqlx::query_as::<_, AssignedRole>(
            "SELECT r.id AS role_id, r.slug, r.level, r.is_active AS role_is_active, \
             ur.is_active AS grant_is_active, ur.expires_at \
             FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("Failed to list user roles"))
    }

    async fn list_permission_grants(&self, role_ids: &[Uuid]) -> AppResult<Vec<PermissionGrant>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, PermissionGrant>(
            "SELECT rp.role_id, p.slug, rp.granted, p.is_active AS permission_is_active \
             FROM role_permissions rp JOIN permissions p ON p.id = rp.permission_id \
             WHERE rp.role_id = ANY($1)",
        )
        .bind(role_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("Failed to list permission grants"))
    }
}
