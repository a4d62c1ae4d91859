//! Audit log repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keyward_core::result::AppResult;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_entity::audit::{AuditLog, NewAuditLog};

use super::{PgStore, read_error, write_error};
use crate::store::AuditStore;

#[async_trait]
impl AuditStore for PgStore {
    async fn record_audit(&self, data: &NewAuditLog, now: DateTime<Utc>) -> AppResult<AuditLog> {
        sqlx::query_as::<_, AuditLog>(
            "INSERT INTO audit_logs (id, action, entity, entity_id, user_id, user_email, \
             old_values, new_values, ip_address, user_agent, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(&data.action)
        .bind(&data.entity)
        .bind(data.entity_id)
        .bind(data.user_id)
        .bind(&data.user_email)
        .bind(&data.old_values)
        .bind(&data.new_values)
        .bind(&data.ip_address)
        .bind(&data.user_agent)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Failed to record audit entry"))
    }

    async fn list_audit(
        &self,
        action: Option<&str>,
        page: PageRequest,
    ) -> AppResult<PageResponse<AuditLog>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_logs WHERE $1::text IS NULL OR action = $1",
        )
        .bind(action)
        .fetch_one(&self.pool)
        .await
        .map_err(read_error("Failed to count audit entries"))?;

        let rows = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs WHERE $1::text IS NULL OR action = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(action)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("Failed to list audit entries"))?;

        Ok(PageResponse::new(rows, page, total as u64))
    }
}
