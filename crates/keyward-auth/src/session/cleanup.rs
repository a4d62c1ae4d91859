//! Expired session and blacklist cleanup.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use keyward_core::error::AppError;
use keyward_database::CredentialStore;

/// Outcome of one cleanup cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Sessions revoked because they passed `expires_at`.
    pub expired_sessions: u64,
    /// Blacklist rows deleted.
    pub purged_blacklist: u64,
}

/// Handles periodic cleanup of expired sessions and blacklist rows.
#[derive(Clone)]
pub struct SessionCleanup {
    store: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for SessionCleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCleanup").finish()
    }
}

impl SessionCleanup {
    /// Creates a new cleanup handler.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Runs one cleanup cycle.
    pub async fn run_cleanup(&self) -> Result<CleanupReport, AppError> {
        self.run_cleanup_at(Utc::now()).await
    }

    /// Runs one cleanup cycle as of `now`.
    ///
    /// Expired sessions are revoked with reason `expired`, which cascades to
    /// their refresh tokens.
    pub async fn run_cleanup_at(&self, now: DateTime<Utc>) -> Result<CleanupReport, AppError> {
        let expired_sessions = self.store.expire_sessions(now).await?;
        let purged_blacklist = self.store.purge_expired_blacklist(now).await?;

        let report = CleanupReport {
            expired_sessions,
            purged_blacklist,
        };
        if report != CleanupReport::default() {
            info!(
                expired_sessions = expired_sessions,
                purged_blacklist = purged_blacklist,
                "Session cleanup completed"
            );
        }
        Ok(report)
    }

    /// Runs cleanup every `interval` until the task is aborted.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_cleanup().await {
                    error!(error = %e, "Session cleanup cycle failed");
                }
            }
        })
    }
}
