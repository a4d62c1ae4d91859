mod common;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use keyward_auth::AuditSink;
use keyward_core::error::ErrorKind;
use keyward_core::types::PageRequest;
use keyward_entity::audit::NewAuditLog;

use common::{PASSWORD, client, harness, login_input};

/// Keeps audit events in memory.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<NewAuditLog>>,
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn record(&self, event: NewAuditLog) {
        self.events.lock().await.push(event);
    }
}

#[tokio::test]
async fn test_trust_device_is_owner_only_and_audited() {
    let sink = Arc::new(RecordingSink::default());
    let mut h = harness();
    h.service = h.service.with_audit_sink(sink.clone());

    let owner = h.seed_user("owner@x.com").await;
    let other = h.seed_user("other@x.com").await;
    h.service
        .login(login_input("owner@x.com", PASSWORD), &client())
        .await
        .unwrap();

    let devices = h
        .service
        .devices()
        .list_devices(owner.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(devices.total_items, 1);
    let device = &devices.items[0];
    assert!(!device.is_trusted);

    let err = h
        .service
        .devices()
        .trust_device(device.id, other.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let trusted = h
        .service
        .devices()
        .trust_device(device.id, owner.id)
        .await
        .unwrap();
    assert!(trusted.is_trusted);

    let events = sink.events.lock().await;
    let actions: Vec<&str> = events.iter().map(|e| e.action.as_str()).collect();
    assert!(actions.contains(&"user.logged_in"));
    let trust = events
        .iter()
        .find(|e| e.action == "device.trusted")
        .expect("device.trusted event");
    assert_eq!(trust.entity_id, Some(device.id));
    assert_eq!(trust.user_id, Some(owner.id));
}

#[tokio::test]
async fn test_get_device_not_found() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;

    let err = h
        .service
        .devices()
        .get_device(Uuid::new_v4(), user.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_distinct_clients_get_distinct_devices() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;

    h.service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();
    let phone = keyward_auth::ClientInfo::new(
        Some("198.51.100.4".into()),
        Some("Mozilla/5.0 (Linux; Android 14; Pixel 8) Mobile Safari/537.36".into()),
    );
    h.service
        .login(login_input("a@x.com", PASSWORD), &phone)
        .await
        .unwrap();

    let devices = h
        .service
        .devices()
        .list_devices(user.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(devices.total_items, 2);
    assert!(devices.items.iter().all(|d| d.login_count == 1));
}
