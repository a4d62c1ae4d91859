//! Password reset token delivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use keyward_core::error::AppError;
use keyward_entity::user::User;

/// Hands a freshly issued reset token to the user, e.g. by email.
#[async_trait]
pub trait ResetTokenDelivery: Send + Sync {
    /// Deliver `token` to `user`. Errors are logged by the caller and never
    /// reach the requester.
    async fn deliver(
        &self,
        user: &User,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}

/// Logs that a token was issued. The token itself is never logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingResetDelivery;

#[async_trait]
impl ResetTokenDelivery for LoggingResetDelivery {
    async fn deliver(
        &self,
        user: &User,
        _token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        info!(
            user_id = %user.id,
            expires_at = %expires_at,
            "Password reset token issued"
        );
        Ok(())
    }
}
