//! Session repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use keyward_core::result::AppResult;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_entity::session::{NewSession, RevokeReason, Session};

use super::{PgStore, read_error, write_error};
use crate::store::SessionStore;

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, data: &NewSession, now: DateTime<Utc>) -> AppResult<Session> {
        sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (id, user_id, device_id, session_token, ip_address, user_agent, \
             device_name, last_activity_at, last_activity_ip, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $5, $9, $8) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(data.user_id)
        .bind(data.device_id)
        .bind(&data.session_token)
        .bind(&data.ip_address)
        .bind(&data.user_agent)
        .bind(&data.device_name)
        .bind(now)
        .bind(data.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Failed to create session"))
    }

    async fn find_session(&self, id: Uuid) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("Failed to find session"))
    }

    async fn touch_session(
        &self,
        id: Uuid,
        ip_address: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET last_activity_at = $2, \
             last_activity_ip = COALESCE($3, last_activity_ip), \
             activity_count = activity_count + 1 \
             WHERE id = $1 AND is_active AND NOT is_revoked",
        )
        .bind(id)
        .bind(at)
        .bind(ip_address)
        .execute(&self.pool)
        .await
        .map_err(write_error("Failed to touch session"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_session(
        &self,
        id: Uuid,
        revoked_by: Option<Uuid>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(write_error("Failed to begin transaction"))?;

        let revoked = sqlx::query(
            "UPDATE sessions SET is_active = FALSE, is_revoked = TRUE, revoked_at = $2, \
             revoked_by = $3, revoked_reason = $4 \
             WHERE id = $1 AND is_active",
        )
        .bind(id)
        .bind(at)
        .bind(revoked_by)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(write_error("Failed to revoke session"))?
        .rows_affected();

        if revoked > 0 {
            revoke_session_tokens(&mut tx, &[id], revoked_by, reason, at).await?;
        }

        tx.commit()
            .await
            .map_err(write_error("Failed to commit session revocation"))?;
        Ok(revoked > 0)
    }

    async fn revoke_user_sessions(
        &self,
        user_id: Uuid,
        revoked_by: Option<Uuid>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(write_error("Failed to begin transaction"))?;

        let revoked = sqlx::query(
            "UPDATE sessions SET is_active = FALSE, is_revoked = TRUE, revoked_at = $2, \
             revoked_by = $3, revoked_reason = $4 \
             WHERE user_id = $1 AND is_active",
        )
        .bind(user_id)
        .bind(at)
        .bind(revoked_by)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(write_error("Failed to revoke user sessions"))?
        .rows_affected();

        sqlx::query(
            "UPDATE refresh_tokens SET is_active = FALSE, is_revoked = TRUE, revoked_at = $2, \
             revoked_by = $3, revoked_reason = $4 \
             WHERE user_id = $1 AND is_active",
        )
        .bind(user_id)
        .bind(at)
        .bind(revoked_by)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(write_error("Failed to revoke user refresh tokens"))?;

        tx.commit()
            .await
            .map_err(write_error("Failed to commit session revocation"))?;
        Ok(revoked)
    }

    async fn list_sessions(
        &self,
        user_id: Option<Uuid>,
        active_only: bool,
        page: PageRequest,
    ) -> AppResult<PageResponse<Session>> {
        let filter = "($1::uuid IS NULL OR user_id = $1) AND (NOT $2 OR is_active)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM sessions WHERE {filter}"))
            .bind(user_id)
            .bind(active_only)
            .fetch_one(&self.pool)
            .await
            .map_err(read_error("Failed to count sessions"))?;

        let sessions = sqlx::query_as::<_, Session>(&format!(
            "SELECT * FROM sessions WHERE {filter} ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(active_only)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("Failed to list sessions"))?;

        Ok(PageResponse::new(sessions, page, total as u64))
    }

    async fn expire_sessions(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let reason = RevokeReason::Expired.as_str();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(write_error("Failed to begin transaction"))?;

        let expired: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE sessions SET is_active = FALSE, is_revoked = TRUE, revoked_at = $1, \
             revoked_reason = $2 \
             WHERE is_active AND expires_at <= $1 RETURNING id",
        )
        .bind(now)
        .bind(reason)
        .fetch_all(&mut *tx)
        .await
        .map_err(write_error("Failed to expire sessions"))?;

        if !expired.is_empty() {
            revoke_session_tokens(&mut tx, &expired, None, reason, now).await?;
        }

        tx.commit()
            .await
            .map_err(write_error("Failed to commit session expiry"))?;
        Ok(expired.len() as u64)
    }
}

/// Revoke every active refresh token bound to any of `session_ids`.
async fn revoke_session_tokens(
    tx: &mut Transaction<'_, Postgres>,
    session_ids: &[Uuid],
    revoked_by: Option<Uuid>,
    reason: &str,
    at: DateTime<Utc>,
) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE refresh_tokens SET is_active = FALSE, is_revoked = TRUE, revoked_at = $2, \
         revoked_by = $3, revoked_reason = $4 \
         WHERE session_id = ANY($1) AND is_active",
    )
    .bind(session_ids)
    .bind(at)
    .bind(revoked_by)
    .bind(reason)
    .execute(&mut **tx)
    .await
    .map_err(write_error("Failed to revoke session refresh tokens"))?;
    Ok(result.rows_affected())
}
