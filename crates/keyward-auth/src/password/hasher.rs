//! Argon2id password hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher as ArgonHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;

use keyward_core::config::AuthConfig;
use keyward_core::error::AppError;

/// Handles password hashing and verification using Argon2id.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// Creates a hasher with the configured cost parameters.
    pub fn new(config: &AuthConfig) -> Result<Self, AppError> {
        let cost = config.argon2;
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| AppError::configuration(format!("Invalid Argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes a plaintext password using Argon2id with a random salt.
    pub fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))?;

        Ok(hash.to_string())
    }

    /// Verifies a plaintext password against a stored Argon2id hash.
    ///
    /// Returns `Ok(true)` if the password matches, `Ok(false)` if not.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::internal(format!("Invalid password hash format: {e}")))?;

        match self.argon2().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::internal(format!(
                "Password verification failed: {e}"
            ))),
        }
    }

    /// Hashes on the blocking pool.
    pub async fn hash(&self, password: String) -> Result<String, AppError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|e| AppError::internal(format!("Password hashing task failed: {e}")))?
    }

    /// Verifies on the blocking pool.
    pub async fn verify(&self, password: String, hash: String) -> Result<bool, AppError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::internal(format!("Password verification task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::config::Argon2Config;

    fn hasher() -> PasswordHasher {
        let config = AuthConfig {
            argon2: Argon2Config {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            ..AuthConfig::default()
        };
        PasswordHasher::new(&config).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash_password("Secret1!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify_password("Secret1!", &hash).unwrap());
        assert!(!hasher.verify_password("Secret2!", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let hasher = hasher();
        let a = hasher.hash_password("Secret1!").unwrap();
        let b = hasher.hash_password("Secret1!").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_internal() {
        let err = hasher().verify_password("x", "not-a-hash").unwrap_err();
        assert!(err.kind.is_internal());
    }

    #[tokio::test]
    async fn test_async_helpers() {
        let hasher = hasher();
        let hash = hasher.hash("Secret1!".into()).await.unwrap();
        assert!(hasher.verify("Secret1!".into(), hash).await.unwrap());
    }

    #[test]
    fn test_rejects_zero_parallelism() {
        let config = AuthConfig {
            argon2: Argon2Config {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 0,
            },
            ..AuthConfig::default()
        };
        assert!(PasswordHasher::new(&config).is_err());
    }
}
