//! Login history repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keyward_core::result::AppResult;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_entity::history::{LoginHistory, NewLoginHistory};

use super::{PgStore, read_error, write_error};
use crate::store::LoginHistoryStore;

#[async_trait]
impl LoginHistoryStore for PgStore {
    async fn record_login(
        &self,
        data: &NewLoginHistory,
        now: DateTime<Utc>,
    ) -> AppResult<LoginHistory> {
        sqlx::query_as::<_, LoginHistory>(
            "INSERT INTO login_history (id, user_id, email, success, failure_reason, device_id, \
             fingerprint, ip_address, user_agent, is_suspicious, risk_score, session_id, \
             refresh_token_id, attempted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(data.user_id)
        .bind(&data.email)
        .bind(data.success)
        .bind(&data.failure_reason)
        .bind(data.device_id)
        .bind(&data.fingerprint)
        .bind(&data.ip_address)
        .bind(&data.user_agent)
        .bind(data.is_suspicious)
        .bind(data.risk_score)
        .bind(data.session_id)
        .bind(data.refresh_token_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Failed to record login history"))
    }

    async fn list_login_history(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> AppResult<PageResponse<LoginHistory>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM login_history WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(read_error("Failed to count login history"))?;

        let rows = sqlx::query_as::<_, LoginHistory>(
            "SELECT * FROM login_history WHERE user_id = $1 \
             ORDER BY attempted_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("Failed to list login history"))?;

        Ok(PageResponse::new(rows, page, total as u64))
    }

    async fn list_login_history_by_email(
        &self,
        email: &str,
        page: PageRequest,
    ) -> AppResult<PageResponse<LoginHistory>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM login_history WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(read_error("Failed to count login history"))?;

        let rows = sqlx::query_as::<_, LoginHistory>(
            "SELECT * FROM login_history WHERE email = $1 \
             ORDER BY attempted_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(email)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("Failed to list login history"))?;

        Ok(PageResponse::new(rows, page, total as u64))
    }
}
