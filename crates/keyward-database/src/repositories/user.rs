//! User and profile repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keyward_core::result::AppResult;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_entity::user::{CreateUser, Profile, UpdateProfile, User, UserStatusChange};

use super::{PgStore, read_error, write_error};
use crate::store::UserStore;

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("Failed to find user"))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("Failed to find user by email"))
    }

    async fn create_user(&self, data: &CreateUser, now: DateTime<Utc>) -> AppResult<User> {
        let verified_at = data.email_verified.then_some(now);
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, password_hash, name, email_verified, email_verified_at, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(&data.name)
        .bind(data.email_verified)
        .bind(verified_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Failed to create user"))
    }

    async fn create_profile(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<Profile> {
        sqlx::query_as::<_, Profile>(
            "INSERT INTO profiles (id, user_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $3) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Failed to create profile"))
    }

    async fn find_profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("Failed to find profile"))
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        data: &UpdateProfile,
        now: DateTime<Utc>,
    ) -> AppResult<Profile> {
        sqlx::query_as::<_, Profile>(
            "INSERT INTO profiles \
                (id, user_id, first_name, last_name, display_name, avatar, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             ON CONFLICT (user_id) DO UPDATE SET \
                first_name = COALESCE(EXCLUDED.first_name, profiles.first_name), \
                last_name = COALESCE(EXCLUDED.last_name, profiles.last_name), \
                display_name = COALESCE(EXCLUDED.display_name, profiles.display_name), \
                avatar = COALESCE(EXCLUDED.avatar, profiles.avatar), \
                updated_at = EXCLUDED.updated_at \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.display_name)
        .bind(&data.avatar)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Failed to update profile"))
    }

    async fn update_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_login_at = $2, updated_at = $2 WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(write_error("Failed to update last login"))?;
        Ok(())
    }

    async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(write_error("Failed to update password"))?;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_digest: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE users SET reset_token = $2, reset_token_expires_at = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(user_id)
        .bind(token_digest)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(write_error("Failed to store reset token"))?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_digest: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET password_hash = $2, reset_token = NULL, \
             reset_token_expires_at = NULL, updated_at = $3 \
             WHERE reset_token = $1 AND reset_token_expires_at > $3 RETURNING *",
        )
        .bind(token_digest)
        .bind(new_password_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error("Failed to consume reset token"))
    }

    async fn set_user_status(
        &self,
        user_id: Uuid,
        change: UserStatusChange,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        let sql = match change {
            UserStatusChange::Block => {
                "UPDATE users SET is_blocked = TRUE, updated_at = $2 WHERE id = $1 RETURNING *"
            }
            UserStatusChange::Unblock => {
                "UPDATE users SET is_blocked = FALSE, updated_at = $2 WHERE id = $1 RETURNING *"
            }
            UserStatusChange::Deactivate => {
                "UPDATE users SET is_active = FALSE, updated_at = $2 WHERE id = $1 RETURNING *"
            }
            UserStatusChange::Reactivate => {
                "UPDATE users SET is_active = TRUE, updated_at = $2 WHERE id = $1 RETURNING *"
            }
        };
        sqlx::query_as::<_, User>(sql)
            .bind(user_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error("Failed to update user status"))
    }

    async fn list_users(&self, page: PageRequest) -> AppResult<PageResponse<User>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(read_error("Failed to count users"))?;

        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("Failed to list users"))?;

        Ok(PageResponse::new(users, page, total as u64))
    }
}
