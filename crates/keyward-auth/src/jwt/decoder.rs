//! JWT token validation.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use keyward_core::config::AuthConfig;
use keyward_core::error::AppError;

use super::claims::{Claims, TokenType};

/// Validates access and refresh tokens against their own secrets.
#[derive(Clone)]
pub struct JwtDecoder {
    access_key: DecodingKey,
    refresh_key: DecodingKey,
    validation: Validation,
    leeway_seconds: i64,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("validation", &self.validation)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        // `exp` is still required, but judged in `decode_at` against the
        // caller's clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        Self {
            access_key: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_key: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            validation,
            leeway_seconds: i64::try_from(config.leeway_seconds).unwrap_or(i64::MAX),
        }
    }

    /// Decodes and validates a token of the expected type against the wall clock.
    pub fn decode(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        self.decode_at(token, expected, Utc::now())
    }

    /// Decodes and validates a token of the expected type, judging expiry at `now`.
    ///
    /// A token whose signature and type check out but whose `exp` has passed
    /// is `TokenExpired`; every other failure is `InvalidToken`.
    pub fn decode_at(
        &self,
        token: &str,
        expected: TokenType,
        now: DateTime<Utc>,
    ) -> Result<Claims, AppError> {
        let key = match expected {
            TokenType::Access => &self.access_key,
            TokenType::Refresh => &self.refresh_key,
        };

        let token_data = decode::<Claims>(token, key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::invalid_token("Invalid token signature")
                }
                _ => AppError::invalid_token(format!("Token validation failed: {e}")),
            }
        })?;
        let claims = token_data.claims;

        if claims.token_type != expected {
            return Err(AppError::invalid_token(format!(
                "Invalid token type: expected {expected:?} token"
            )));
        }
        if claims.exp.saturating_add(self.leeway_seconds) < now.timestamp() {
            return Err(AppError::token_expired("Token has expired"));
        }

        Ok(claims)
    }
}
