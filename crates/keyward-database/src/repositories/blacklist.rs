//! Access token blacklist repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keyward_core::result::AppResult;
use keyward_entity::session::{BlacklistEntry, NewBlacklistEntry};

use super::{PgStore, read_error, write_error};
use crate::store::BlacklistStore;

#[async_trait]
impl BlacklistStore for PgStore {
    async fn blacklist_token(
        &self,
        data: &NewBlacklistEntry,
        now: DateTime<Utc>,
    ) -> AppResult<BlacklistEntry> {
        sqlx::query_as::<_, BlacklistEntry>(
            "INSERT INTO token_blacklist (id, token_hash, user_id, reason, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (token_hash) DO UPDATE SET token_hash = EXCLUDED.token_hash \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.token_hash)
        .bind(data.user_id)
        .bind(&data.reason)
        .bind(data.expires_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Failed to blacklist token"))
    }

    async fn is_token_blacklisted(&self, token_hash: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM token_blacklist WHERE token_hash = $1)",
        )
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(read_error("Failed to check token blacklist"))
    }

    async fn purge_expired_blacklist(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(write_error("Failed to purge token blacklist"))?;
        Ok(result.rows_affected())
    }
}
