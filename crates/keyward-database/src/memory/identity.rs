//! Users, profiles, and devices.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keyward_core::error::AppError;
use keyward_core::result::AppResult;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_entity::device::{Device, NewDevice};
use keyward_entity::user::{CreateUser, Profile, UpdateProfile, User, UserStatusChange};

use super::{MemoryStore, paginate};
use crate::store::{DeviceStore, UserStore};

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, data: &CreateUser, now: DateTime<Utc>) -> AppResult<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == data.email) {
            return Err(AppError::already_exists(format!(
                "User with email '{}' already exists",
                data.email
            )));
        }
        let user = User {
            id: Uuid::now_v7(),
            email: data.email.clone(),
            password_hash: data.password_hash.clone(),
            name: data.name.clone(),
            email_verified: data.email_verified,
            email_verified_at: data.email_verified.then_some(now),
            is_active: true,
            is_blocked: false,
            last_login_at: None,
            reset_token: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn create_profile(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<Profile> {
        let mut state = self.state.lock().await;
        if state.profiles.contains_key(&user_id) {
            return Err(AppError::already_exists("Profile already exists"));
        }
        let profile = Profile {
            id: Uuid::now_v7(),
            user_id,
            first_name: None,
            last_name: None,
            display_name: None,
            avatar: None,
            created_at: now,
            updated_at: now,
        };
        state.profiles.insert(user_id, profile.clone());
        Ok(profile)
    }

    async fn find_profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        Ok(self.state.lock().await.profiles.get(&user_id).cloned())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        data: &UpdateProfile,
        now: DateTime<Utc>,
    ) -> AppResult<Profile> {
        let mut state = self.state.lock().await;
        let profile = state.profiles.entry(user_id).or_insert_with(|| Profile {
            id: Uuid::now_v7(),
            user_id,
            first_name: None,
            last_name: None,
            display_name: None,
            avatar: None,
            created_at: now,
            updated_at: now,
        });
        data.apply(profile);
        profile.updated_at = now;
        Ok(profile.clone())
    }

    async fn update_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.last_login_at = Some(at);
            user.updated_at = at;
        }
        Ok(())
    }

    async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = now;
        }
        Ok(())
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_digest: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.get_mut(&user_id) {
            user.reset_token = Some(token_digest.to_string());
            user.reset_token_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_digest: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        let mut state = self.state.lock().await;
        let Some(user) = state.users.values_mut().find(|u| {
            u.reset_token.as_deref() == Some(token_digest)
                && u.reset_token_expires_at.is_some_and(|exp| exp > now)
        }) else {
            return Ok(None);
        };
        user.password_hash = new_password_hash.to_string();
        user.reset_token = None;
        user.reset_token_expires_at = None;
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn set_user_status(
        &self,
        user_id: Uuid,
        change: UserStatusChange,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        let mut state = self.state.lock().await;
        let Some(user) = state.users.get_mut(&user_id) else {
            return Ok(None);
        };
        match change {
            UserStatusChange::Block => user.is_blocked = true,
            UserStatusChange::Unblock => user.is_blocked = false,
            UserStatusChange::Deactivate => user.is_active = false,
            UserStatusChange::Reactivate => user.is_active = true,
        }
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn list_users(&self, page: PageRequest) -> AppResult<PageResponse<User>> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(users, page))
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn record_device_login(&self, data: &NewDevice, now: DateTime<Utc>) -> AppResult<Device> {
        let mut state = self.state.lock().await;
        if let Some(device) = state
            .devices
            .values_mut()
            .find(|d| d.user_id == data.user_id && d.device_id == data.device_id)
        {
            device.login_count += 1;
            device.last_seen_at = now;
            device.ip_address = data.ip_address.clone();
            return Ok(device.clone());
        }

        let device = Device {
            id: Uuid::now_v7(),
            user_id: data.user_id,
            device_id: data.device_id.clone(),
            device_name: data.device_name.clone(),
            device_type: data.device_type.clone(),
            browser: data.browser.clone(),
            os: data.os.clone(),
            ip_address: data.ip_address.clone(),
            is_trusted: false,
            is_blocked: false,
            login_count: 1,
            first_seen_at: now,
            last_seen_at: now,
        };
        state.devices.insert(device.id, device.clone());
        Ok(device)
    }

    async fn find_device(&self, id: Uuid) -> AppResult<Option<Device>> {
        Ok(self.state.lock().await.devices.get(&id).cloned())
    }

    async fn list_devices(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> AppResult<PageResponse<Device>> {
        let state = self.state.lock().await;
        let mut devices: Vec<Device> = state
            .devices
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        devices.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at).then(b.id.cmp(&a.id)));
        Ok(paginate(devices, page))
    }

    async fn set_device_trusted(&self, id: Uuid, trusted: bool) -> AppResult<Option<Device>> {
        let mut state = self.state.lock().await;
        Ok(state.devices.get_mut(&id).map(|device| {
            device.is_trusted = trusted;
            device.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> CreateUser {
        CreateUser {
            email: email.to_string(),
            password_hash: "digest".to_string(),
            name: None,
            email_verified: false,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create_user(&new_user("a@x.com"), now).await.unwrap();
        let err = store
            .create_user(&new_user("a@x.com"), now)
            .await
            .unwrap_err();
        assert_eq!(err.kind, keyward_core::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_device_upsert_counts_logins() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = store.create_user(&new_user("a@x.com"), now).await.unwrap();
        let device = NewDevice {
            user_id: user.id,
            device_id: "fp".into(),
            device_name: None,
            device_type: None,
            browser: None,
            os: None,
            ip_address: Some("10.0.0.1".into()),
        };
        let first = store.record_device_login(&device, now).await.unwrap();
        let second = store
            .record_device_login(
                &NewDevice {
                    ip_address: Some("10.0.0.2".into()),
                    ..device
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.login_count, 2);
        assert_eq!(second.ip_address.as_deref(), Some("10.0.0.2"));
    }

    #[tokio::test]
    async fn test_reset_token_is_single_use() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = store.create_user(&new_user("a@x.com"), now).await.unwrap();
        store
            .set_reset_token(user.id, "d1", now + chrono::Duration::hours(1))
            .await
            .unwrap();

        let consumed = store.consume_reset_token("d1", "new", now).await.unwrap();
        assert!(consumed.is_some());
        let again = store.consume_reset_token("d1", "newer", now).await.unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_profile_update_keeps_unset_fields() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = store.create_user(&new_user("a@x.com"), now).await.unwrap();

        let created = store
            .update_profile(
                user.id,
                &UpdateProfile {
                    first_name: Some("Ada".into()),
                    display_name: Some("ada".into()),
                    ..UpdateProfile::default()
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(created.first_name.as_deref(), Some("Ada"));

        let later = now + chrono::Duration::minutes(1);
        let updated = store
            .update_profile(
                user.id,
                &UpdateProfile {
                    display_name: Some("countess".into()),
                    ..UpdateProfile::default()
                },
                later,
            )
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.first_name.as_deref(), Some("Ada"));
        assert_eq!(updated.display_name.as_deref(), Some("countess"));
        assert_eq!(updated.updated_at, later);
    }
}
