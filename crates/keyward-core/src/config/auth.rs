//! Authentication configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Token, password and reset-token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC-SHA256 secret for access tokens.
    #[serde(default = "default_access_secret")]
    pub access_token_secret: String,
    /// HMAC-SHA256 secret for refresh tokens. Must differ from the access secret.
    #[serde(default = "default_refresh_secret")]
    pub refresh_token_secret: String,
    /// Access token TTL in minutes.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_minutes: u64,
    /// Refresh token TTL in days.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_days: u64,
    /// Clock skew tolerated when checking `exp`, in seconds.
    #[serde(default)]
    pub leeway_seconds: u64,
    /// Minimum password length.
    #[serde(default = "default_password_min")]
    pub password_min_length: usize,
    /// Password reset token TTL in minutes.
    #[serde(default = "default_reset_ttl")]
    pub reset_token_ttl_minutes: u64,
    /// Revoke the whole refresh family when a revoked token is presented.
    #[serde(default)]
    pub revoke_family_on_reuse: bool,
    /// Argon2id cost parameters.
    #[serde(default)]
    pub argon2: Argon2Config,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Argon2Config {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Number of passes.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Degree of parallelism.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl AuthConfig {
    /// Check invariants serde defaults cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.access_token_secret.is_empty() || self.refresh_token_secret.is_empty() {
            return Err(AppError::configuration("Token secrets must not be empty"));
        }
        if self.access_token_secret == self.refresh_token_secret {
            return Err(AppError::configuration(
                "Access and refresh token secrets must differ",
            ));
        }
        if self.access_ttl_minutes == 0 || self.refresh_ttl_days == 0 {
            return Err(AppError::configuration("Token lifetimes must be positive"));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: default_access_secret(),
            refresh_token_secret: default_refresh_secret(),
            access_ttl_minutes: default_access_ttl(),
            refresh_ttl_days: default_refresh_ttl(),
            leeway_seconds: 0,
            password_min_length: default_password_min(),
            reset_token_ttl_minutes: default_reset_ttl(),
            revoke_family_on_reuse: false,
            argon2: Argon2Config::default(),
        }
    }
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

fn default_access_secret() -> String {
    "CHANGE_ME_ACCESS_SECRET".to_string()
}

fn default_refresh_secret() -> String {
    "CHANGE_ME_REFRESH_SECRET".to_string()
}

fn default_access_ttl() -> u64 {
    15
}

fn default_refresh_ttl() -> u64 {
    7
}

fn default_password_min() -> usize {
    8
}

fn default_reset_ttl() -> u64 {
    60
}

fn default_memory_kib() -> u32 {
    19_456
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}
