//! Session lifecycle manager: creation, activity, revocation, and refresh
//! token rotation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use keyward_core::config::{AuthConfig, SessionConfig};
use keyward_core::error::{AppError, ErrorKind};
use keyward_core::types::{PageRequest, PageResponse};
use keyward_database::CredentialStore;
use keyward_entity::session::{NewBlacklistEntry, NewRefreshToken, NewSession, RevokeReason, Session};
use keyward_entity::user::User;

use crate::audit::{self, AuditSink};
use crate::context::{Actor, ClientInfo};
use crate::jwt::{TokenCodec, TokenSubject, TokenType, generate_opaque_token, hash_token};

/// Freshly issued access and refresh tokens.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    /// Signed access token.
    pub access_token: String,
    /// Signed refresh token. Only its digest is stored.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Row ID of the stored refresh token.
    #[serde(skip)]
    pub refresh_token_id: Uuid,
}

/// Manages the complete session lifecycle.
#[derive(Clone)]
pub struct SessionManager {
    /// Persistence for sessions, tokens, and users.
    store: Arc<dyn CredentialStore>,
    /// Token signing and verification.
    codec: Arc<TokenCodec>,
    /// Audit event sink.
    audit: Arc<dyn AuditSink>,
    /// Auth configuration.
    auth_config: AuthConfig,
    /// Session configuration.
    session_config: SessionConfig,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("session_config", &self.session_config)
            .field("revoke_family_on_reuse", &self.auth_config.revoke_family_on_reuse)
            .finish()
    }
}

impl SessionManager {
    /// Creates a new session manager.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        codec: Arc<TokenCodec>,
        audit: Arc<dyn AuditSink>,
        auth_config: AuthConfig,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            store,
            codec,
            audit,
            auth_config,
            session_config,
        }
    }

    /// Token codec used by this manager.
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Opens a new active session. Never reuses an existing row.
    pub async fn create_session(
        &self,
        user_id: Uuid,
        device_id: Option<Uuid>,
        device_name: Option<String>,
        client: &ClientInfo,
    ) -> Result<Session, AppError> {
        let now = Utc::now();
        let data = NewSession {
            user_id,
            device_id,
            session_token: generate_opaque_token(32),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            device_name,
            expires_at: now + chrono::Duration::days(self.session_config.ttl_days as i64),
        };

        let session = self.store.create_session(&data, now).await?;
        info!(
            user_id = %user_id,
            session_id = %session.id,
            "Session created"
        );
        Ok(session)
    }

    /// Issues an access token and a refresh token opening a new family,
    /// both bound to `session`.
    pub async fn issue_tokens(&self, user: &User, session: &Session) -> Result<TokenPair, AppError> {
        let now = Utc::now();
        let subject = TokenSubject {
            user_id: user.id,
            email: user.email.clone(),
            session_id: Some(session.id),
        };

        let access = self.codec.issue_at(&subject, TokenType::Access, now)?;
        let refresh = self.codec.issue_at(&subject, TokenType::Refresh, now)?;

        let stored = self
            .store
            .create_refresh_token(
                &NewRefreshToken {
                    user_id: user.id,
                    token_hash: hash_token(&refresh.token),
                    family_id: Uuid::new_v4(),
                    parent_token_id: None,
                    session_id: Some(session.id),
                    device_id: session.device_id,
                    ip_address: session.ip_address.clone(),
                    user_agent: session.user_agent.clone(),
                    expires_at: refresh.expires_at,
                },
                now,
            )
            .await?;

        debug!(
            user_id = %user.id,
            session_id = %session.id,
            family_id = %stored.family_id,
            "Token family opened"
        );

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_in: self.codec.access_ttl().num_seconds(),
            refresh_token_id: stored.id,
        })
    }

    /// Records activity on a session. Failures are logged and ignored.
    pub async fn touch(&self, session_id: Uuid, ip_address: Option<&str>) {
        match self.store.touch_session(session_id, ip_address, Utc::now()).await {
            Ok(true) => {}
            Ok(false) => debug!(session_id = %session_id, "Touch skipped for inactive session"),
            Err(e) => error!(session_id = %session_id, error = %e, "Failed to touch session"),
        }
    }

    /// Revokes a session and its refresh tokens. Idempotent; returns whether
    /// this call performed the revocation.
    pub async fn revoke(
        &self,
        session_id: Uuid,
        revoked_by: Option<Uuid>,
        reason: &str,
    ) -> Result<bool, AppError> {
        let revoked = self
            .store
            .revoke_session(session_id, revoked_by, reason, Utc::now())
            .await?;
        if revoked {
            info!(session_id = %session_id, reason = reason, "Session revoked");
        }
        Ok(revoked)
    }

    /// Revokes every active session and refresh token of a user.
    pub async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        revoked_by: Option<Uuid>,
        reason: &str,
    ) -> Result<u64, AppError> {
        let count = self
            .store
            .revoke_user_sessions(user_id, revoked_by, reason, Utc::now())
            .await?;
        info!(user_id = %user_id, count = count, reason = reason, "All user sessions revoked");
        Ok(count)
    }

    /// Exchanges a refresh token for a new pair.
    pub async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        self.rotate_at(refresh_token, Utc::now()).await
    }

    /// Exchanges a refresh token for a new pair, judging expiry against `now`.
    ///
    /// The old row is retired and its successor inserted in one
    /// compare-and-set, so of two concurrent calls with the same token
    /// exactly one succeeds.
    pub async fn rotate_at(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AppError> {
        // A signed but expired token still goes through the row checks so a
        // replayed token is reported and handled as reuse.
        let signature_expired = match self.codec.verify_refresh_at(refresh_token, now) {
            Ok(_) => false,
            Err(e) if e.is(ErrorKind::TokenExpired) => true,
            Err(e) => return Err(e),
        };

        let token_hash = hash_token(refresh_token);
        let stored = self
            .store
            .find_refresh_token_by_hash(&token_hash)
            .await?
            .ok_or_else(|| AppError::invalid_token("Refresh token not recognized"))?;

        if !stored.is_usable() {
            if self.auth_config.revoke_family_on_reuse {
                let revoked = self
                    .store
                    .revoke_token_family(stored.family_id, RevokeReason::ReuseDetected.as_str(), now)
                    .await?;
                warn!(
                    user_id = %stored.user_id,
                    family_id = %stored.family_id,
                    revoked = revoked,
                    "Refresh token reuse detected, family revoked"
                );
            } else {
                warn!(
                    user_id = %stored.user_id,
                    family_id = %stored.family_id,
                    "Revoked refresh token presented"
                );
            }
            return Err(AppError::invalid_token("Refresh token has been revoked"));
        }

        if signature_expired || stored.is_expired(now) {
            return Err(AppError::token_expired("Refresh token has expired"));
        }

        let user = self
            .store
            .find_user_by_id(stored.user_id)
            .await?
            .ok_or_else(|| AppError::invalid_token("Refresh token owner no longer exists"))?;
        if !user.is_active {
            return Err(AppError::forbidden("Account is deactivated"));
        }
        if user.is_blocked {
            return Err(AppError::forbidden("Account is blocked"));
        }

        let session_id = stored
            .session_id
            .ok_or_else(|| AppError::invalid_token("Refresh token is not bound to a session"))?;
        let session = self
            .store
            .find_session(session_id)
            .await?
            .filter(|s| s.is_live(now))
            .ok_or_else(|| AppError::invalid_token("Session is no longer active"))?;

        let subject = TokenSubject {
            user_id: user.id,
            email: user.email.clone(),
            session_id: Some(session.id),
        };
        let refresh = self.codec.issue_at(&subject, TokenType::Refresh, now)?;

        let next = NewRefreshToken {
            user_id: user.id,
            token_hash: hash_token(&refresh.token),
            family_id: stored.family_id,
            parent_token_id: Some(stored.id),
            session_id: Some(session.id),
            device_id: stored.device_id,
            ip_address: stored.ip_address.clone(),
            user_agent: stored.user_agent.clone(),
            expires_at: refresh.expires_at,
        };

        let Some(rotated) = self.store.rotate_refresh_token(stored.id, &next, now).await? else {
            warn!(
                user_id = %user.id,
                token_id = %stored.id,
                "Refresh token lost a concurrent rotation"
            );
            return Err(AppError::invalid_token("Refresh token has already been used"));
        };

        let access = self.codec.issue_at(&subject, TokenType::Access, now)?;

        debug!(
            user_id = %user.id,
            session_id = %session.id,
            token_id = %rotated.id,
            "Refresh token rotated"
        );

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_in: self.codec.access_ttl().num_seconds(),
            refresh_token_id: rotated.id,
        })
    }

    /// A user's active sessions, newest first.
    pub async fn list_sessions(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<PageResponse<Session>, AppError> {
        self.store.list_sessions(Some(user_id), true, page).await
    }

    /// Sessions across all users, for administration.
    pub async fn list_all_sessions(
        &self,
        user_id: Option<Uuid>,
        active_only: bool,
        page: PageRequest,
    ) -> Result<PageResponse<Session>, AppError> {
        self.store.list_sessions(user_id, active_only, page).await
    }

    /// Fetch a session owned by `user_id`.
    pub async fn get_session(&self, session_id: Uuid, user_id: Uuid) -> Result<Session, AppError> {
        let session = self
            .store
            .find_session(session_id)
            .await?
            .ok_or_else(|| AppError::not_found("Session not found"))?;

        if session.user_id != user_id {
            return Err(AppError::forbidden("Session belongs to another user"));
        }
        Ok(session)
    }

    /// Revoke one of the caller's own sessions.
    pub async fn revoke_owned(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        reason: Option<&str>,
    ) -> Result<(), AppError> {
        self.get_session(session_id, user_id).await?;

        let reason = reason.unwrap_or(RevokeReason::SessionRevoked.as_str());
        self.revoke(session_id, Some(user_id), reason).await?;

        self.audit
            .record(
                audit::event("session.revoked", "session", &Actor::user(user_id))
                    .entity_id(session_id)
                    .values(None, Some(serde_json::json!({ "reason": reason }))),
            )
            .await;
        Ok(())
    }

    /// Blacklists an access token until its natural expiry.
    ///
    /// An already expired token is left alone.
    pub async fn blacklist_access_token(
        &self,
        token: &str,
        user_id: Option<Uuid>,
        reason: &str,
    ) -> Result<(), AppError> {
        let claims = match self.codec.verify_access(token) {
            Ok(claims) => claims,
            Err(e) if e.is(ErrorKind::TokenExpired) => return Ok(()),
            Err(e) => return Err(e),
        };

        self.store
            .blacklist_token(
                &NewBlacklistEntry {
                    token_hash: hash_token(token),
                    user_id: user_id.or(Some(claims.sub)),
                    reason: Some(reason.to_string()),
                    expires_at: claims.expires_at(),
                },
                Utc::now(),
            )
            .await?;

        info!(user_id = %claims.sub, jti = %claims.jti, "Access token blacklisted");
        Ok(())
    }
}
