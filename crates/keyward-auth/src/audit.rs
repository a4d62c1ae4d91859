//! Audit event sink.
//!
//! Mutating operations hand a [`NewAuditLog`] to an [`AuditSink`]. Recording
//! is best-effort: a failing sink never fails the operation that emitted the
//! event.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::error;

use keyward_database::CredentialStore;
use keyward_entity::audit::NewAuditLog;

use crate::context::Actor;

/// Destination for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one event. Implementations must not propagate failures.
    async fn record(&self, event: NewAuditLog);
}

/// Writes audit events to the credential store.
#[derive(Clone)]
pub struct StoreAuditSink {
    store: Arc<dyn CredentialStore>,
}

impl StoreAuditSink {
    /// Creates a sink over a store.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for StoreAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreAuditSink").finish_non_exhaustive()
    }
}

#[async_trait]
impl AuditSink for StoreAuditSink {
    async fn record(&self, event: NewAuditLog) {
        if let Err(e) = self.store.record_audit(&event, Utc::now()).await {
            error!(
                action = %event.action,
                entity = %event.entity,
                error = %e,
                "Failed to record audit event"
            );
        }
    }
}

/// Starts an audit event attributed to `actor`.
pub(crate) fn event(action: &str, entity: &str, actor: &Actor) -> NewAuditLog {
    let mut event = NewAuditLog::new(action, entity)
        .actor(actor.user_id)
        .client(actor.client.ip_address.clone(), actor.client.user_agent.clone());
    if let Some(email) = &actor.email {
        event = event.actor_email(email.clone());
    }
    event
}

/// Bookkeeping fields left out of update diffs.
const DIFF_IGNORED: &[&str] = &["updated_at", "updated_by"];

/// Reduces two serialized snapshots to the fields that changed.
///
/// Returns `(old, new)` objects holding only differing keys, or `None` for
/// both when nothing changed.
pub fn diff_values(old: &Value, new: &Value) -> (Option<Value>, Option<Value>) {
    let (Some(old), Some(new)) = (old.as_object(), new.as_object()) else {
        if old == new {
            return (None, None);
        }
        return (Some(old.clone()), Some(new.clone()));
    };

    let mut before = Map::new();
    let mut after = Map::new();
    for (key, new_value) in new {
        if DIFF_IGNORED.contains(&key.as_str()) {
            continue;
        }
        let old_value = old.get(key).unwrap_or(&Value::Null);
        if old_value != new_value {
            before.insert(key.clone(), old_value.clone());
            after.insert(key.clone(), new_value.clone());
        }
    }

    if after.is_empty() {
        (None, None)
    } else {
        (Some(Value::Object(before)), Some(Value::Object(after)))
    }
}
