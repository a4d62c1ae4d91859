//! Shared fixtures for the credential flow tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use keyward_auth::context::ClientInfo;
use keyward_auth::service::{LoginInput, RegisterInput, ResetTokenDelivery};
use keyward_auth::{AuthService, PasswordHasher};
use keyward_core::config::{Argon2Config, AuthConfig, SessionConfig};
use keyward_core::error::AppError;
use keyward_database::{CredentialStore, MemoryStore, UserStore};
use keyward_entity::user::{CreateUser, User};

pub const PASSWORD: &str = "Secret1!";

pub const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Auth config with a cheap Argon2 cost.
pub fn auth_config() -> AuthConfig {
    AuthConfig {
        argon2: Argon2Config {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        ..AuthConfig::default()
    }
}

pub fn client() -> ClientInfo {
    ClientInfo::new(Some("203.0.113.7".into()), Some(CHROME_UA.into()))
}

pub fn login_input(email: &str, password: &str) -> LoginInput {
    LoginInput {
        email: email.into(),
        password: password.into(),
    }
}

pub fn register_input(email: &str) -> RegisterInput {
    RegisterInput {
        email: email.into(),
        password: PASSWORD.into(),
        name: Some("Ada Lovelace".into()),
    }
}

/// Captures delivered reset tokens.
#[derive(Debug, Default)]
pub struct CapturingDelivery {
    pub tokens: Mutex<Vec<String>>,
}

impl CapturingDelivery {
    pub async fn last(&self) -> String {
        self.tokens.lock().await.last().cloned().expect("a delivered token")
    }
}

#[async_trait]
impl ResetTokenDelivery for CapturingDelivery {
    async fn deliver(
        &self,
        _user: &User,
        token: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.tokens.lock().await.push(token.to_string());
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub service: AuthService,
    pub delivery: Arc<CapturingDelivery>,
}

pub fn harness() -> Harness {
    harness_with(auth_config())
}

pub fn harness_with(config: AuthConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let delivery = Arc::new(CapturingDelivery::default());
    let dyn_store: Arc<dyn CredentialStore> = store.clone();
    let service = AuthService::new(dyn_store, config, SessionConfig::default())
        .expect("valid config")
        .with_reset_delivery(delivery.clone());
    Harness {
        store,
        service,
        delivery,
    }
}

impl Harness {
    /// Insert a user with [`PASSWORD`] directly into the store.
    pub async fn seed_user(&self, email: &str) -> User {
        let hasher = PasswordHasher::new(&auth_config()).expect("argon2 params");
        let password_hash = hasher.hash_password(PASSWORD).expect("hash");
        self.store
            .create_user(
                &CreateUser {
                    email: email.into(),
                    password_hash,
                    name: None,
                    email_verified: true,
                },
                Utc::now(),
            )
            .await
            .expect("create user")
    }
}
