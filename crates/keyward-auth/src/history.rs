//! Best-effort login history recording.

use std::sync::Arc;

use chrono::Utc;
use tracing::error;

use keyward_database::CredentialStore;
use keyward_entity::history::NewLoginHistory;

/// Appends login attempts to the history log, swallowing store failures.
#[derive(Clone)]
pub struct LoginRecorder {
    store: Arc<dyn CredentialStore>,
}

impl LoginRecorder {
    /// Creates a recorder over a store.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Append one attempt.
    pub async fn record(&self, entry: NewLoginHistory) {
        if let Err(e) = self.store.record_login(&entry, Utc::now()).await {
            error!(
                email = %entry.email,
                success = entry.success,
                error = %e,
                "Failed to record login history"
            );
        }
    }
}
