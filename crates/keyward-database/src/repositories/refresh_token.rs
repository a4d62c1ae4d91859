//! Refresh token repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keyward_core::result::AppResult;
use keyward_entity::session::{NewRefreshToken, RefreshToken, RevokeReason};

use super::{PgStore, read_error, write_error};
use crate::store::RefreshTokenStore;

const INSERT_TOKEN: &str = "INSERT INTO refresh_tokens (id, user_id, token_hash, family_id, \
     parent_token_id, session_id, device_id, ip_address, user_agent, expires_at, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *";

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn create_refresh_token(
        &self,
        data: &NewRefreshToken,
        now: DateTime<Utc>,
    ) -> AppResult<RefreshToken> {
        sqlx::query_as::<_, RefreshToken>(INSERT_TOKEN)
            .bind(Uuid::now_v7())
            .bind(data.user_id)
            .bind(&data.token_hash)
            .bind(data.family_id)
            .bind(data.parent_token_id)
            .bind(data.session_id)
            .bind(data.device_id)
            .bind(&data.ip_address)
            .bind(&data.user_agent)
            .bind(data.expires_at)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error("Failed to create refresh token"))
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> AppResult<Option<RefreshToken>> {
        sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("Failed to find refresh token"))
    }

    async fn rotate_refresh_token(
        &self,
        old_id: Uuid,
        next: &NewRefreshToken,
        now: DateTime<Utc>,
    ) -> AppResult<Option<RefreshToken>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(write_error("Failed to begin transaction"))?;

        // The row lock taken by this UPDATE makes a concurrent rotation of the
        // same token wait, then see is_active = FALSE and match nothing.
        let claimed: Option<Uuid> = sqlx::query_scalar(
            "UPDATE refresh_tokens SET is_active = FALSE, is_revoked = TRUE, rotated_at = $2, \
             revoked_at = $2, revoked_reason = $3 \
             WHERE id = $1 AND is_active AND NOT is_revoked RETURNING id",
        )
        .bind(old_id)
        .bind(now)
        .bind(RevokeReason::Rotated.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(write_error("Failed to rotate refresh token"))?;

        if claimed.is_none() {
            tx.rollback()
                .await
                .map_err(write_error("Failed to roll back rotation"))?;
            return Ok(None);
        }

        let token = sqlx::query_as::<_, RefreshToken>(INSERT_TOKEN)
            .bind(Uuid::now_v7())
            .bind(next.user_id)
            .bind(&next.token_hash)
            .bind(next.family_id)
            .bind(next.parent_token_id)
            .bind(next.session_id)
            .bind(next.device_id)
            .bind(&next.ip_address)
            .bind(&next.user_agent)
            .bind(next.expires_at)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(write_error("Failed to insert rotated refresh token"))?;

        tx.commit()
            .await
            .map_err(write_error("Failed to commit rotation"))?;
        Ok(Some(token))
    }

    async fn revoke_token_family(
        &self,
        family_id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET is_active = FALSE, is_revoked = TRUE, revoked_at = $2, \
             revoked_reason = $3 \
             WHERE family_id = $1 AND is_active",
        )
        .bind(family_id)
        .bind(at)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(write_error("Failed to revoke token family"))?;
        Ok(result.rows_affected())
    }

    async fn list_token_family(&self, family_id: Uuid) -> AppResult<Vec<RefreshToken>> {
        sqlx::query_as::<_, RefreshToken>(
            "SELECT * FROM refresh_tokens WHERE family_id = $1 ORDER BY created_at, id",
        )
        .bind(family_id)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("Failed to list token family"))
    }
}
