//! Store traits consumed by the credential core.
//!
//! Every operation that must be atomic is a single trait method, so each
//! implementation decides how to make it so (a transaction for PostgreSQL,
//! one lock acquisition for the in-memory store). Callers pass `now`
//! explicitly wherever the outcome depends on the clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use keyward_core::result::AppResult;
use keyward_core::types::{PageRequest, PageResponse};
use keyward_entity::audit::{AuditLog, NewAuditLog};
use keyward_entity::device::{Device, NewDevice};
use keyward_entity::history::{LoginHistory, NewLoginHistory};
use keyward_entity::role::{
    AssignPermission, AssignRole, AssignedRole, CreatePermission, CreateRole, Permission,
    PermissionGrant, Role, RolePermission, UpdatePermission, UpdateRole, UserRole,
};
use keyward_entity::session::{
    BlacklistEntry, NewBlacklistEntry, NewRefreshToken, NewSession, RefreshToken, Session,
};
use keyward_entity::user::{CreateUser, Profile, UpdateProfile, User, UserStatusChange};

/// User accounts, profiles, and password reset state.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by id.
    async fn find_user_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Find a user by (lower-cased) email.
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Insert a user. A duplicate email is `AlreadyExists`.
    async fn create_user(&self, data: &CreateUser, now: DateTime<Utc>) -> AppResult<User>;

    /// Insert an empty profile for a user.
    async fn create_profile(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<Profile>;

    /// Find a user's profile.
    async fn find_profile(&self, user_id: Uuid) -> AppResult<Option<Profile>>;

    /// Apply a partial profile update, creating the profile if it is missing.
    async fn update_profile(
        &self,
        user_id: Uuid,
        data: &UpdateProfile,
        now: DateTime<Utc>,
    ) -> AppResult<Profile>;

    /// Record a successful login time.
    async fn update_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<()>;

    /// Replace a user's password digest.
    async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Store a pending reset token digest, replacing any earlier one.
    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_digest: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Atomically consume a pending reset token.
    ///
    /// Matches `token_digest` against an unexpired pending reset, replaces the
    /// password digest, and clears the token fields. Returns `None` when no
    /// pending reset matches.
    async fn consume_reset_token(
        &self,
        token_digest: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>>;

    /// Apply an administrative flag change.
    async fn set_user_status(
        &self,
        user_id: Uuid,
        change: UserStatusChange,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>>;

    /// List users, newest first.
    async fn list_users(&self, page: PageRequest) -> AppResult<PageResponse<User>>;
}

/// Device rows keyed by `(user_id, fingerprint)`.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Insert the device or bump `login_count`, `last_seen_at` and the IP of
    /// the existing row, as one atomic upsert.
    async fn record_device_login(&self, data: &NewDevice, now: DateTime<Utc>) -> AppResult<Device>;

    /// Find a device row by id.
    async fn find_device(&self, id: Uuid) -> AppResult<Option<Device>>;

    /// List a user's devices, most recently seen first.
    async fn list_devices(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> AppResult<PageResponse<Device>>;

    /// Set the trusted flag.
    async fn set_device_trusted(&self, id: Uuid, trusted: bool) -> AppResult<Option<Device>>;
}

/// Sessions and their cascading revocation.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new active session.
    async fn create_session(&self, data: &NewSession, now: DateTime<Utc>) -> AppResult<Session>;

    /// Find a session by id.
    async fn find_session(&self, id: Uuid) -> AppResult<Option<Session>>;

    /// Bump activity on an active session. Returns `false` if the session is
    /// missing or no longer active.
    async fn touch_session(
        &self,
        id: Uuid,
        ip_address: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Revoke one session and every active refresh token bound to it.
    ///
    /// Returns `false` if the session was already revoked or does not exist.
    async fn revoke_session(
        &self,
        id: Uuid,
        revoked_by: Option<Uuid>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Revoke every active session of a user and every active refresh token
    /// of that user. Returns the number of sessions revoked.
    async fn revoke_user_sessions(
        &self,
        user_id: Uuid,
        revoked_by: Option<Uuid>,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// List sessions, newest first, optionally for one user and optionally
    /// only the active ones.
    async fn list_sessions(
        &self,
        user_id: Option<Uuid>,
        active_only: bool,
        page: PageRequest,
    ) -> AppResult<PageResponse<Session>>;

    /// Revoke active sessions past their expiry, cascading to their tokens.
    async fn expire_sessions(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// Refresh token rows and rotation.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Insert a refresh token.
    async fn create_refresh_token(
        &self,
        data: &NewRefreshToken,
        now: DateTime<Utc>,
    ) -> AppResult<RefreshToken>;

    /// Find a refresh token by digest.
    async fn find_refresh_token_by_hash(&self, token_hash: &str)
    -> AppResult<Option<RefreshToken>>;

    /// Compare-and-set rotation.
    ///
    /// If `old_id` is still active, marks it inactive, revoked and rotated,
    /// and inserts `next` in the same atomic unit. Returns `None` when
    /// another caller already rotated or revoked `old_id`.
    async fn rotate_refresh_token(
        &self,
        old_id: Uuid,
        next: &NewRefreshToken,
        now: DateTime<Utc>,
    ) -> AppResult<Option<RefreshToken>>;

    /// Revoke every active token of a family. Returns the number revoked.
    async fn revoke_token_family(
        &self,
        family_id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// All tokens of a family in issue order.
    async fn list_token_family(&self, family_id: Uuid) -> AppResult<Vec<RefreshToken>>;
}

/// Access token blacklist.
#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Blacklist a token digest. Re-blacklisting is a no-op.
    async fn blacklist_token(
        &self,
        data: &NewBlacklistEntry,
        now: DateTime<Utc>,
    ) -> AppResult<BlacklistEntry>;

    /// Whether a token digest is blacklisted.
    async fn is_token_blacklisted(&self, token_hash: &str) -> AppResult<bool>;

    /// Delete rows whose token has expired anyway.
    async fn purge_expired_blacklist(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// Roles, permissions, and the grants between them.
#[async_trait]
pub trait RbacStore: Send + Sync {
    /// Insert a role. Name or slug conflicts are `AlreadyExists`.
    async fn create_role(
        &self,
        data: &CreateRole,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<Role>;

    /// Apply a partial update. Name or slug conflicts are `AlreadyExists`.
    async fn update_role(
        &self,
        id: Uuid,
        data: &UpdateRole,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Role>>;

    /// Delete a role and its grants.
    async fn delete_role(&self, id: Uuid) -> AppResult<bool>;

    /// Find a role by id.
    async fn find_role(&self, id: Uuid) -> AppResult<Option<Role>>;

    /// Find a role by slug.
    async fn find_role_by_slug(&self, slug: &str) -> AppResult<Option<Role>>;

    /// List roles by level descending, then slug.
    async fn list_roles(&self, page: PageRequest) -> AppResult<PageResponse<Role>>;

    /// Number of users with an active grant of the role.
    async fn count_role_users(&self, role_id: Uuid) -> AppResult<u64>;

    /// Insert a permission. Name or slug conflicts are `AlreadyExists`.
    async fn create_permission(
        &self,
        data: &CreatePermission,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<Permission>;

    /// Apply a partial update. Name or slug conflicts are `AlreadyExists`.
    async fn update_permission(
        &self,
        id: Uuid,
        data: &UpdatePermission,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Permission>>;

    /// Delete a permission and its grants.
    async fn delete_permission(&self, id: Uuid) -> AppResult<bool>;

    /// Find a permission by id.
    async fn find_permission(&self, id: Uuid) -> AppResult<Option<Permission>>;

    /// Find a permission by slug.
    async fn find_permission_by_slug(&self, slug: &str) -> AppResult<Option<Permission>>;

    /// List permissions by category then slug, optionally for one category.
    async fn list_permissions(
        &self,
        category: Option<&str>,
        page: PageRequest,
    ) -> AppResult<PageResponse<Permission>>;

    /// Find the grant row for a `(user, role)` pair.
    async fn find_user_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<Option<UserRole>>;

    /// Insert or re-activate a user's role grant.
    async fn upsert_user_role(
        &self,
        data: &AssignRole,
        assigned_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<UserRole>;

    /// Soft-revoke a user's role grant. Returns `false` if no row exists.
    async fn deactivate_user_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<bool>;

    /// Insert or update a role's permission grant.
    async fn upsert_role_permission(
        &self,
        data: &AssignPermission,
        assigned_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> AppResult<RolePermission>;

    /// Hard-delete a role's permission grant. Returns `false` if no row exists.
    async fn delete_role_permission(&self, role_id: Uuid, permission_id: Uuid) -> AppResult<bool>;

    /// Every role grant of a user, joined with role state.
    async fn list_assigned_roles(&self, user_id: Uuid) -> AppResult<Vec<AssignedRole>>;

    /// Every permission grant of the given roles, joined with permission state.
    async fn list_permission_grants(&self, role_ids: &[Uuid]) -> AppResult<Vec<PermissionGrant>>;
}

/// Append-only login history.
#[async_trait]
pub trait LoginHistoryStore: Send + Sync {
    /// Append a login attempt.
    async fn record_login(
        &self,
        data: &NewLoginHistory,
        now: DateTime<Utc>,
    ) -> AppResult<LoginHistory>;

    /// A user's attempts, newest first.
    async fn list_login_history(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> AppResult<PageResponse<LoginHistory>>;

    /// Attempts for a submitted email, newest first.
    async fn list_login_history_by_email(
        &self,
        email: &str,
        page: PageRequest,
    ) -> AppResult<PageResponse<LoginHistory>>;
}

/// Append-only audit log.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an audit entry.
    async fn record_audit(&self, data: &NewAuditLog, now: DateTime<Utc>) -> AppResult<AuditLog>;

    /// Entries newest first, optionally filtered by action.
    async fn list_audit(
        &self,
        action: Option<&str>,
        page: PageRequest,
    ) -> AppResult<PageResponse<AuditLog>>;
}

/// Everything the credential core needs from persistence.
pub trait CredentialStore:
    UserStore
    + DeviceStore
    + SessionStore
    + RefreshTokenStore
    + BlacklistStore
    + RbacStore
    + LoginHistoryStore
    + AuditStore
{
}

impl<T> CredentialStore for T where
    T: UserStore
        + DeviceStore
        + SessionStore
        + RefreshTokenStore
        + BlacklistStore
        + RbacStore
        + LoginHistoryStore
        + AuditStore
{
}
