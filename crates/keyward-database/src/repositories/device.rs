//! Device repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keyward_core::result::AppResult;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_entity::device::{Device, NewDevice};

use super::{PgStore, read_error, write_error};
use crate::store::DeviceStore;

#[async_trait]
impl DeviceStore for PgStore {
    async fn record_device_login(&self, data: &NewDevice, now: DateTime<Utc>) -> AppResult<Device> {
        sqlx::query_as::<_, Device>(
            "INSERT INTO devices (id, user_id, device_id, device_name, device_type, browser, os, \
             ip_address, login_count, first_seen_at, last_seen_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1, $9, $9) \
             ON CONFLICT (user_id, device_id) DO UPDATE SET \
                 login_count = devices.login_count + 1, \
                 last_seen_at = EXCLUDED.last_seen_at, \
                 ip_address = EXCLUDED.ip_address \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(data.user_id)
        .bind(&data.device_id)
        .bind(&data.device_name)
        .bind(&data.device_type)
        .bind(&data.browser)
        .bind(&data.os)
        .bind(&data.ip_address)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("Failed to record device login"))
    }

    async fn find_device(&self, id: Uuid) -> AppResult<Option<Device>> {
        sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error("Failed to find device"))
    }

    async fn list_devices(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> AppResult<PageResponse<Device>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devices WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(read_error("Failed to count devices"))?;

        let devices = sqlx::query_as::<_, Device>(
            "SELECT * FROM devices WHERE user_id = $1 \
             ORDER BY last_seen_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(read_error("Failed to list devices"))?;

        Ok(PageResponse::new(devices, page, total as u64))
    }

    async fn set_device_trusted(&self, id: Uuid, trusted: bool) -> AppResult<Option<Device>> {
        sqlx::query_as::<_, Device>("UPDATE devices SET is_trusted = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(trusted)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error("Failed to update device"))
    }
}
