mod common;

use uuid::Uuid;

use keyward_core::error::ErrorKind;
use keyward_core::types::PageRequest;
use keyward_database::AuditStore;
use keyward_entity::user::UpdateProfile;

use common::{client, harness, register_input};

#[tokio::test]
async fn test_update_profile_merges_and_audits_changes() {
    let h = harness();
    let registered = h
        .service
        .register(register_input("a@x.com"), &client())
        .await
        .unwrap();
    let user_id = registered.user.id;

    let profile = h
        .service
        .update_profile(
            user_id,
            UpdateProfile {
                first_name: Some("Ada".into()),
                display_name: Some("ada".into()),
                ..UpdateProfile::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(profile.user_id, user_id);
    assert_eq!(profile.first_name.as_deref(), Some("Ada"));

    let profile = h
        .service
        .update_profile(
            user_id,
            UpdateProfile {
                last_name: Some("Lovelace".into()),
                ..UpdateProfile::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(profile.first_name.as_deref(), Some("Ada"));
    assert_eq!(profile.last_name.as_deref(), Some("Lovelace"));

    let me = h.service.me(user_id).await.unwrap();
    let summary = me.profile.expect("profile in me view");
    assert_eq!(summary.display_name.as_deref(), Some("ada"));

    let audit = h
        .store
        .list_audit(Some("user.profile_updated"), PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(audit.total_items, 2);
    let latest = &audit.items[0];
    assert_eq!(latest.entity_id, Some(profile.id));
    assert_eq!(
        latest.new_values,
        Some(serde_json::json!({ "last_name": "Lovelace" }))
    );
}

#[tokio::test]
async fn test_update_profile_creates_missing_profile() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;

    let profile = h
        .service
        .update_profile(
            user.id,
            UpdateProfile {
                avatar: Some("https://cdn.example.com/a.png".into()),
                ..UpdateProfile::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(profile.avatar.as_deref(), Some("https://cdn.example.com/a.png"));
}

#[tokio::test]
async fn test_update_profile_rejects_bad_input() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;

    let err = h
        .service
        .update_profile(user.id, UpdateProfile::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = h
        .service
        .update_profile(
            user.id,
            UpdateProfile {
                avatar: Some("not a url".into()),
                ..UpdateProfile::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = h
        .service
        .update_profile(
            Uuid::new_v4(),
            UpdateProfile {
                first_name: Some("Ghost".into()),
                ..UpdateProfile::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}
