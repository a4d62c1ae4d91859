//! Per-user device registry keyed by fingerprint.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use keyward_core::error::AppError;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_database::CredentialStore;
use keyward_entity::device::{Device, NewDevice};

use crate::audit::{self, AuditSink};
use crate::context::{Actor, ClientInfo};

use super::agent::{fingerprint, parse_user_agent};

/// Resolves login clients to device rows.
#[derive(Clone)]
pub struct DeviceResolver {
    store: Arc<dyn CredentialStore>,
    audit: Arc<dyn AuditSink>,
}

impl DeviceResolver {
    /// Creates a resolver.
    pub fn new(store: Arc<dyn CredentialStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Upsert the device for `(user_id, fingerprint(client))`.
    ///
    /// A first sighting starts at `login_count = 1`; later sightings bump the
    /// counter, `last_seen_at`, and the IP.
    pub async fn find_or_create(
        &self,
        user_id: Uuid,
        client: &ClientInfo,
    ) -> Result<Device, AppError> {
        let ua = client.user_agent.as_deref();
        let ip = client.ip_address.as_deref();
        let parsed = parse_user_agent(ua);

        let data = NewDevice {
            user_id,
            device_id: fingerprint(ua, ip),
            device_name: parsed.device_name,
            device_type: parsed.device_type.map(|t| t.as_str().to_string()),
            browser: parsed.browser.map(str::to_string),
            os: parsed.os.map(str::to_string),
            ip_address: client.ip_address.clone(),
        };

        let device = self.store.record_device_login(&data, Utc::now()).await?;
        debug!(
            user_id = %user_id,
            device_id = %device.id,
            login_count = device.login_count,
            "Device resolved"
        );
        Ok(device)
    }

    /// A user's devices, most recently seen first.
    pub async fn list_devices(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<PageResponse<Device>, AppError> {
        self.store.list_devices(user_id, page).await
    }

    /// Fetch a device owned by `user_id`.
    pub async fn get_device(&self, id: Uuid, user_id: Uuid) -> Result<Device, AppError> {
        let device = self
            .store
            .find_device(id)
            .await?
            .ok_or_else(|| AppError::not_found("Device not found"))?;

        if device.user_id != user_id {
            return Err(AppError::forbidden("Device belongs to another user"));
        }
        Ok(device)
    }

    /// Mark a device owned by `user_id` as trusted.
    pub async fn trust_device(&self, id: Uuid, user_id: Uuid) -> Result<Device, AppError> {
        let before = self.get_device(id, user_id).await?;

        let device = self
            .store
            .set_device_trusted(id, true)
            .await?
            .ok_or_else(|| AppError::not_found("Device not found"))?;

        self.audit
            .record(
                audit::event("device.trusted", "device", &Actor::user(user_id))
                    .entity_id(id)
                    .values(
                        Some(serde_json::json!({ "is_trusted": before.is_trusted })),
                        Some(serde_json::json!({ "is_trusted": true })),
                    ),
            )
            .await;

        info!(user_id = %user_id, device_id = %id, "Device trusted");
        Ok(device)
    }
}
