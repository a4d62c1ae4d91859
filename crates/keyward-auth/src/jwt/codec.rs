//! Token codec combining signing, verification, and digesting.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use keyward_core::config::AuthConfig;
use keyward_core::error::AppError;

use super::claims::{Claims, TokenSubject, TokenType};
use super::decoder::JwtDecoder;
use super::encoder::{IssuedToken, JwtEncoder};

/// SHA-256 of a raw token, lower-case hex. Only digests are persisted.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Random opaque token of `bytes` bytes, lower-case hex.
pub fn generate_opaque_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

/// Issues and verifies access and refresh tokens.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    encoder: JwtEncoder,
    decoder: JwtDecoder,
}

impl TokenCodec {
    /// Creates a codec from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoder: JwtEncoder::new(config),
            decoder: JwtDecoder::new(config),
        }
    }

    /// Signs an access token valid from now.
    pub fn issue_access(&self, subject: &TokenSubject) -> Result<IssuedToken, AppError> {
        self.encoder.issue_at(subject, TokenType::Access, Utc::now())
    }

    /// Signs a refresh token valid from now.
    pub fn issue_refresh(&self, subject: &TokenSubject) -> Result<IssuedToken, AppError> {
        self.encoder.issue_at(subject, TokenType::Refresh, Utc::now())
    }

    /// Signs a token as if issued at `now`.
    pub fn issue_at(
        &self,
        subject: &TokenSubject,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        self.encoder.issue_at(subject, token_type, now)
    }

    /// Verifies an access token.
    pub fn verify_access(&self, token: &str) -> Result<Claims, AppError> {
        self.decoder.decode(token, TokenType::Access)
    }

    /// Verifies a refresh token.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AppError> {
        self.decoder.decode(token, TokenType::Refresh)
    }

    /// Verifies a refresh token, judging expiry at `now`.
    pub fn verify_refresh_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AppError> {
        self.decoder.decode_at(token, TokenType::Refresh, now)
    }

    /// Access token lifetime.
    pub fn access_ttl(&self) -> Duration {
        self.encoder.access_ttl()
    }

    /// Refresh token lifetime.
    pub fn refresh_ttl(&self) -> Duration {
        self.encoder.refresh_ttl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::error::ErrorKind;
    use uuid::Uuid;

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            session_id: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let codec = TokenCodec::new(&AuthConfig::default());
        let subject = subject();
        let issued = codec.issue_access(&subject).unwrap();

        let claims = codec.verify_access(&issued.token).unwrap();
        assert_eq!(claims.sub, subject.user_id);
        assert_eq!(claims.sid, subject.session_id);
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_wrong_type_rejected_even_with_shared_secret() {
        let config = AuthConfig {
            refresh_token_secret: AuthConfig::default().access_token_secret,
            ..AuthConfig::default()
        };
        let codec = TokenCodec::new(&config);
        let subject = subject();

        let access = codec.issue_access(&subject).unwrap();
        let refresh = codec.issue_refresh(&subject).unwrap();

        let err = codec.verify_refresh(&access.token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidToken);
        let err = codec.verify_access(&refresh.token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidToken);
    }

    #[test]
    fn test_secrets_are_independent() {
        let codec = TokenCodec::new(&AuthConfig::default());
        let refresh = codec.issue_refresh(&subject()).unwrap();
        assert_eq!(
            codec.verify_access(&refresh.token).unwrap_err().kind,
            ErrorKind::InvalidToken
        );
    }

    #[test]
    fn test_expired_token() {
        let codec = TokenCodec::new(&AuthConfig::default());
        let issued = codec
            .issue_at(&subject(), TokenType::Access, Utc::now() - Duration::hours(1))
            .unwrap();
        let err = codec.verify_access(&issued.token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenExpired);
    }

    #[test]
    fn test_expiry_is_judged_at_the_given_clock() {
        let codec = TokenCodec::new(&AuthConfig::default());
        let issued = codec.issue_refresh(&subject()).unwrap();

        assert!(codec.verify_refresh_at(&issued.token, Utc::now()).is_ok());
        let err = codec
            .verify_refresh_at(&issued.token, Utc::now() + Duration::days(8))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenExpired);
    }

    #[test]
    fn test_leeway_extends_expiry() {
        let codec = TokenCodec::new(&AuthConfig {
            leeway_seconds: 120,
            ..AuthConfig::default()
        });
        let issued = codec
            .issue_at(&subject(), TokenType::Access, Utc::now() - Duration::seconds(15 * 60 + 60))
            .unwrap();
        assert!(codec.verify_access(&issued.token).is_ok());
    }

    #[test]
    fn test_garbage_is_invalid() {
        let codec = TokenCodec::new(&AuthConfig::default());
        let err = codec.verify_access("not.a.jwt").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidToken);
    }

    #[test]
    fn test_opaque_tokens() {
        let a = generate_opaque_token(32);
        assert_eq!(a.len(), 64);
        assert_ne!(a, generate_opaque_token(32));
    }

    #[test]
    fn test_hash_token_is_lower_hex() {
        let digest = hash_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
