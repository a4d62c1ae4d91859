//! Request authentication from transport headers.
//!
//! The access token is read from the `accessToken` cookie, falling back to
//! an `Authorization: Bearer` header. A token is accepted only if it
//! verifies, is not blacklisted, and its session (when it names one) is
//! still live and owned by the token's subject.

use std::sync::Arc;

use chrono::Utc;
use http::HeaderMap;
use http::header::{AUTHORIZATION, COOKIE, USER_AGENT};
use tracing::{debug, error};

use keyward_core::error::AppError;
use keyward_database::CredentialStore;

use crate::context::{AuthContext, ClientInfo};
use crate::jwt::{TokenCodec, hash_token};
use crate::session::SessionManager;

/// Cookie carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Extract the access token: cookie first, then bearer header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty());
    if from_cookie.is_some() {
        return from_cookie;
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Client IP (first forwarded hop, else `x-real-ip`) and user agent.
pub fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let ip_address = header(X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header(X_REAL_IP))
        .map(str::to_string);

    ClientInfo {
        ip_address,
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

/// Validates access tokens presented with requests.
#[derive(Clone)]
pub struct RequestAuthenticator {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
    sessions: SessionManager,
}

impl std::fmt::Debug for RequestAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAuthenticator").finish()
    }
}

impl RequestAuthenticator {
    /// Creates an authenticator.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        codec: Arc<TokenCodec>,
        sessions: SessionManager,
    ) -> Self {
        Self {
            store,
            codec,
            sessions,
        }
    }

    /// Validate a raw access token. Any failure yields `None`.
    pub async fn validate(&self, token: &str, client: &ClientInfo) -> Option<AuthContext> {
        let claims = match self.codec.verify_access(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "Access token rejected");
                return None;
            }
        };

        match self.store.is_token_blacklisted(&hash_token(token)).await {
            Ok(false) => {}
            Ok(true) => {
                debug!(user_id = %claims.sub, jti = %claims.jti, "Blacklisted access token");
                return None;
            }
            Err(e) => {
                error!(error = %e, "Blacklist lookup failed");
                return None;
            }
        }

        if let Some(session_id) = claims.sid {
            let live = match self.store.find_session(session_id).await {
                Ok(session) => session
                    .is_some_and(|s| s.user_id == claims.sub && s.is_live(Utc::now())),
                Err(e) => {
                    error!(session_id = %session_id, error = %e, "Session lookup failed");
                    return None;
                }
            };
            if !live {
                debug!(session_id = %session_id, "Access token bound to inactive session");
                return None;
            }
            self.sessions
                .touch(session_id, client.ip_address.as_deref())
                .await;
        }

        Some(AuthContext {
            user_id: claims.sub,
            email: claims.email.clone(),
            session_id: claims.sid,
            token_id: claims.jti,
            expires_at: claims.expires_at(),
            client: client.clone(),
        })
    }

    /// Authenticate a request from its headers.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Option<AuthContext> {
        let token = extract_token(headers)?;
        self.validate(&token, &client_info(headers)).await
    }

    /// Like [`authenticate`](Self::authenticate), failing with `Unauthorized`.
    pub async fn require(&self, headers: &HeaderMap) -> Result<AuthContext, AppError> {
        self.authenticate(headers)
            .await
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}
