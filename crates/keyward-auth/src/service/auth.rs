//! Auth orchestrator: login, registration, refresh, logout, and password
//! flows.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

use keyward_core::config::{AuthConfig, SessionConfig};
use keyward_core::error::AppError;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_database::CredentialStore;
use keyward_entity::history::{LoginFailureReason, LoginHistory, NewLoginHistory};
use keyward_entity::session::RevokeReason;
use keyward_entity::user::{CreateUser, Profile, UpdateProfile, User};

use crate::audit::{self, AuditSink, StoreAuditSink, diff_values};
use crate::authenticator::RequestAuthenticator;
use crate::context::{Actor, ClientInfo};
use crate::device::{DeviceResolver, fingerprint};
use crate::history::LoginRecorder;
use crate::jwt::{TokenCodec, generate_opaque_token, hash_token};
use crate::password::{PasswordHasher, PasswordValidator};
use crate::rbac::{RbacAdmin, RbacResolver};
use crate::session::SessionManager;

use super::reset::{LoggingResetDelivery, ResetTokenDelivery};
use super::types::{AuthTokens, AuthUser, LoginInput, LoginResponse, RegisterInput, SessionSummary};

/// Bytes of entropy in a password reset token.
const RESET_TOKEN_BYTES: usize = 32;

/// Password hashed at startup and verified against on unknown-email logins.
const DECOY_PASSWORD: &str = "keyward-decoy-password";

/// Canonical form of a submitted email.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Composes the credential core.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
    hasher: PasswordHasher,
    decoy_hash: Arc<str>,
    policy: PasswordValidator,
    sessions: SessionManager,
    devices: DeviceResolver,
    rbac: RbacResolver,
    history: LoginRecorder,
    audit: Arc<dyn AuditSink>,
    reset_delivery: Arc<dyn ResetTokenDelivery>,
    auth_config: AuthConfig,
    session_config: SessionConfig,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Wires the core over a store. Audit events go to the same store.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        auth_config: AuthConfig,
        session_config: SessionConfig,
    ) -> Result<Self, AppError> {
        auth_config.validate()?;
        let audit: Arc<dyn AuditSink> = Arc::new(StoreAuditSink::new(store.clone()));
        let codec = Arc::new(TokenCodec::new(&auth_config));
        let hasher = PasswordHasher::new(&auth_config)?;
        let decoy_hash = hasher.hash_password(DECOY_PASSWORD)?.into();

        Ok(Self {
            hasher,
            decoy_hash,
            policy: PasswordValidator::new(&auth_config),
            sessions: SessionManager::new(
                store.clone(),
                codec.clone(),
                audit.clone(),
                auth_config.clone(),
                session_config.clone(),
            ),
            devices: DeviceResolver::new(store.clone(), audit.clone()),
            rbac: RbacResolver::new(store.clone()),
            history: LoginRecorder::new(store.clone()),
            reset_delivery: Arc::new(LoggingResetDelivery),
            store,
            codec,
            audit,
            auth_config,
            session_config,
        })
    }

    /// Routes audit events to `sink` instead of the store.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sessions = SessionManager::new(
            self.store.clone(),
            self.codec.clone(),
            sink.clone(),
            self.auth_config.clone(),
            self.session_config.clone(),
        );
        self.devices = DeviceResolver::new(self.store.clone(), sink.clone());
        self.audit = sink;
        self
    }

    /// Delivers reset tokens through `delivery`.
    pub fn with_reset_delivery(mut self, delivery: Arc<dyn ResetTokenDelivery>) -> Self {
        self.reset_delivery = delivery;
        self
    }

    /// Session manager.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Device resolver.
    pub fn devices(&self) -> &DeviceResolver {
        &self.devices
    }

    /// RBAC resolver.
    pub fn rbac(&self) -> &RbacResolver {
        &self.rbac
    }

    /// RBAC administration sharing this service's store and audit sink.
    pub fn rbac_admin(&self) -> RbacAdmin {
        RbacAdmin::new(self.store.clone(), self.audit.clone())
    }

    /// Request authenticator sharing this service's codec and sessions.
    pub fn authenticator(&self) -> RequestAuthenticator {
        RequestAuthenticator::new(self.store.clone(), self.codec.clone(), self.sessions.clone())
    }

    async fn record_failure(
        &self,
        base: &NewLoginHistory,
        user_id: Option<Uuid>,
        reason: LoginFailureReason,
    ) {
        warn!(email = %base.email, reason = %reason, "Login refused");
        self.history
            .record(NewLoginHistory {
                user_id,
                success: false,
                failure_reason: Some(reason.to_string()),
                ..base.clone()
            })
            .await;
    }

    /// Authenticates by email and password and opens a session.
    ///
    /// Every refused attempt is written to login history before the error is
    /// returned. Unknown emails and wrong passwords are indistinguishable to
    /// the caller.
    pub async fn login(
        &self,
        input: LoginInput,
        client: &ClientInfo,
    ) -> Result<LoginResponse, AppError> {
        let email = normalize_email(&input.email);
        let attempt = NewLoginHistory {
            email: email.clone(),
            fingerprint: Some(fingerprint(
                client.user_agent.as_deref(),
                client.ip_address.as_deref(),
            )),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            ..NewLoginHistory::default()
        };

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            // Same Argon2 cost as a known email with a wrong password.
            self.hasher
                .verify(input.password, self.decoy_hash.to_string())
                .await?;
            self.record_failure(&attempt, None, LoginFailureReason::UserNotFound)
                .await;
            return Err(AppError::invalid_credentials("Invalid email or password"));
        };

        if !user.is_active {
            self.record_failure(&attempt, Some(user.id), LoginFailureReason::UserInactive)
                .await;
            return Err(AppError::forbidden("Account is deactivated"));
        }
        if user.is_blocked {
            self.record_failure(&attempt, Some(user.id), LoginFailureReason::UserBlocked)
                .await;
            return Err(AppError::forbidden("Account is blocked"));
        }

        if !self
            .hasher
            .verify(input.password, user.password_hash.clone())
            .await?
        {
            self.record_failure(&attempt, Some(user.id), LoginFailureReason::InvalidPassword)
                .await;
            return Err(AppError::invalid_credentials("Invalid email or password"));
        }

        let device = self.devices.find_or_create(user.id, client).await?;
        let session = self
            .sessions
            .create_session(user.id, Some(device.id), device.device_name.clone(), client)
            .await?;
        let tokens = self.sessions.issue_tokens(&user, &session).await?;

        let now = Utc::now();
        self.store.update_last_login(user.id, now).await?;

        self.history
            .record(NewLoginHistory {
                user_id: Some(user.id),
                success: true,
                device_id: Some(device.id),
                session_id: Some(session.id),
                refresh_token_id: Some(tokens.refresh_token_id),
                ..attempt
            })
            .await;

        let access = self.rbac.get_user_access(user.id).await?;
        let profile = self.store.find_profile(user.id).await?;

        self.audit
            .record(
                audit::event(
                    "user.logged_in",
                    "user",
                    &Actor {
                        user_id: Some(user.id),
                        email: Some(user.email.clone()),
                        client: client.clone(),
                    },
                )
                .entity_id(user.id)
                .values(None, Some(serde_json::json!({ "session_id": session.id }))),
            )
            .await;

        info!(
            user_id = %user.id,
            session_id = %session.id,
            device_id = %device.id,
            "Login successful"
        );

        let user = User {
            last_login_at: Some(now),
            ..user
        };
        Ok(LoginResponse {
            user: AuthUser::compose(&user, access, profile),
            tokens: tokens.into(),
            session: SessionSummary::from(&session),
        })
    }

    /// Creates an account with an empty profile, then logs in normally.
    pub async fn register(
        &self,
        input: RegisterInput,
        client: &ClientInfo,
    ) -> Result<LoginResponse, AppError> {
        input.validate()?;
        self.policy.validate(&input.password)?;

        let email = normalize_email(&input.email);
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::already_exists("Email is already registered"));
        }

        let password_hash = self.hasher.hash(input.password.clone()).await?;
        let now = Utc::now();
        let user = self
            .store
            .create_user(
                &CreateUser {
                    email: email.clone(),
                    password_hash,
                    name: input.name.clone(),
                    email_verified: false,
                },
                now,
            )
            .await?;
        self.store.create_profile(user.id, now).await?;

        self.audit
            .record(
                audit::event(
                    "user.created",
                    "user",
                    &Actor {
                        user_id: Some(user.id),
                        email: Some(user.email.clone()),
                        client: client.clone(),
                    },
                )
                .entity_id(user.id)
                .values(None, Some(serde_json::json!({ "email": user.email, "name": user.name }))),
            )
            .await;
        info!(user_id = %user.id, "User registered");

        self.login(
            LoginInput {
                email,
                password: input.password,
            },
            client,
        )
        .await
    }

    /// Exchanges a refresh token for a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AppError> {
        Ok(self.sessions.rotate(refresh_token).await?.into())
    }

    /// Ends one session, or every session of the user when `session_id` is
    /// `None`. A session the user does not own is left untouched.
    pub async fn logout(&self, user_id: Uuid, session_id: Option<Uuid>) -> Result<(), AppError> {
        match session_id {
            Some(session_id) => {
                let owned = self
                    .store
                    .find_session(session_id)
                    .await?
                    .is_some_and(|s| s.user_id == user_id);
                if owned {
                    self.sessions
                        .revoke(session_id, Some(user_id), RevokeReason::UserLogout.as_str())
                        .await?;
                } else {
                    debug!(
                        user_id = %user_id,
                        session_id = %session_id,
                        "Logout ignored for unknown or foreign session"
                    );
                }
            }
            None => {
                self.sessions
                    .revoke_all_for_user(user_id, Some(user_id), RevokeReason::UserLogoutAll.as_str())
                    .await?;
            }
        }

        self.audit
            .record(
                audit::event("user.logged_out", "user", &Actor::user(user_id))
                    .entity_id(user_id)
                    .values(None, session_id.map(|id| serde_json::json!({ "session_id": id }))),
            )
            .await;
        Ok(())
    }

    /// Revokes every session of `user_id` on behalf of an administrator.
    pub async fn force_logout(
        &self,
        user_id: Uuid,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<u64, AppError> {
        let reason = reason.unwrap_or(RevokeReason::AllSessionsRevoked.as_str());
        let count = self
            .sessions
            .revoke_all_for_user(user_id, actor.user_id, reason)
            .await?;

        self.audit
            .record(
                audit::event("sessions.revoked_all", "user", actor)
                    .entity_id(user_id)
                    .values(None, Some(serde_json::json!({ "reason": reason, "count": count }))),
            )
            .await;
        Ok(count)
    }

    /// Replaces the password after checking the current one. Other sessions
    /// stay signed in.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        if !self
            .hasher
            .verify(current_password.to_string(), user.password_hash.clone())
            .await?
        {
            return Err(AppError::invalid_credentials("Current password is incorrect"));
        }

        self.policy.validate(new_password)?;
        self.policy.validate_not_same(current_password, new_password)?;

        let password_hash = self.hasher.hash(new_password.to_string()).await?;
        self.store
            .update_password(user_id, &password_hash, Utc::now())
            .await?;

        self.audit
            .record(
                audit::event(
                    "user.password_changed",
                    "user",
                    &Actor {
                        user_id: Some(user.id),
                        email: Some(user.email.clone()),
                        client: ClientInfo::default(),
                    },
                )
                .entity_id(user_id),
            )
            .await;
        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Issues a reset token for an existing account. Always succeeds, so the
    /// caller cannot probe which emails are registered.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = generate_opaque_token(RESET_TOKEN_BYTES);
        let expires_at =
            Utc::now() + Duration::minutes(self.auth_config.reset_token_ttl_minutes as i64);
        self.store
            .set_reset_token(user.id, &hash_token(&token), expires_at)
            .await?;

        if let Err(e) = self.reset_delivery.deliver(&user, &token, expires_at).await {
            error!(user_id = %user.id, error = %e, "Failed to deliver password reset token");
        }
        Ok(())
    }

    /// Consumes a reset token and sets a new password.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        self.policy.validate(new_password)?;
        let password_hash = self.hasher.hash(new_password.to_string()).await?;

        let user = self
            .store
            .consume_reset_token(&hash_token(token), &password_hash, Utc::now())
            .await?
            .ok_or_else(|| AppError::invalid_token("Reset token is invalid or has expired"))?;

        self.audit
            .record(
                audit::event(
                    "user.password_reset",
                    "user",
                    &Actor {
                        user_id: Some(user.id),
                        email: Some(user.email.clone()),
                        client: ClientInfo::default(),
                    },
                )
                .entity_id(user.id),
            )
            .await;
        info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    /// The authenticated-user view.
    pub async fn me(&self, user_id: Uuid) -> Result<AuthUser, AppError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        let access = self.rbac.get_user_access(user_id).await?;
        let profile = self.store.find_profile(user_id).await?;
        Ok(AuthUser::compose(&user, access, profile))
    }

    /// Applies a partial update to the user's own profile.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfile,
    ) -> Result<Profile, AppError> {
        input.validate()?;
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        if input.is_empty() {
            return Err(AppError::validation("No profile fields to update"));
        }

        let existing = self.store.find_profile(user_id).await?;
        let profile = self
            .store
            .update_profile(user_id, &input, Utc::now())
            .await?;

        let old = match &existing {
            Some(p) => serde_json::to_value(p)?,
            None => serde_json::Value::Null,
        };
        let (old_values, new_values) = diff_values(&old, &serde_json::to_value(&profile)?);
        self.audit
            .record(
                audit::event(
                    "user.profile_updated",
                    "profile",
                    &Actor {
                        user_id: Some(user.id),
                        email: Some(user.email.clone()),
                        client: ClientInfo::default(),
                    },
                )
                .entity_id(profile.id)
                .values(old_values, new_values),
            )
            .await;
        info!(user_id = %user_id, "Profile updated");
        Ok(profile)
    }

    /// A user's login attempts, newest first.
    pub async fn login_history(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<PageResponse<LoginHistory>, AppError> {
        self.store.list_login_history(user_id, page).await
    }

    /// Attempts submitted for an email, known account or not, newest first.
    pub async fn login_attempts(
        &self,
        email: &str,
        page: PageRequest,
    ) -> Result<PageResponse<LoginHistory>, AppError> {
        self.store
            .list_login_history_by_email(&normalize_email(email), page)
            .await
    }
}
