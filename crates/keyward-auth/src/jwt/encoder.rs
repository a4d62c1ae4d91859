//! JWT token creation with per-type secrets and lifetimes.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use keyward_core::config::AuthConfig;
use keyward_core::error::AppError;

use super::claims::{Claims, TokenSubject, TokenType};

/// Creates signed access and refresh tokens.
#[derive(Clone)]
pub struct JwtEncoder {
    access_key: EncodingKey,
    refresh_key: EncodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The compact JWT.
    pub token: String,
    /// Its `jti` claim.
    pub jti: Uuid,
    /// Its `exp` claim.
    pub expires_at: DateTime<Utc>,
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_key: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_key: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            access_ttl: Duration::minutes(config.access_ttl_minutes as i64),
            refresh_ttl: Duration::days(config.refresh_ttl_days as i64),
        }
    }

    /// Access token lifetime.
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Refresh token lifetime.
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Signs a token of the given type as if issued at `now`.
    pub fn issue_at(
        &self,
        subject: &TokenSubject,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        let (key, ttl) = match token_type {
            TokenType::Access => (&self.access_key, self.access_ttl),
            TokenType::Refresh => (&self.refresh_key, self.refresh_ttl),
        };
        let expires_at = now + ttl;
        let claims = Claims {
            sub: subject.user_id,
            email: subject.email.clone(),
            sid: subject.session_id,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            token_type,
        };

        let token = encode(&Header::default(), &claims, key)
            .map_err(|e| AppError::internal(format!("Failed to encode token: {e}")))?;

        Ok(IssuedToken {
            token,
            jti: claims.jti,
            expires_at,
        })
    }
}
