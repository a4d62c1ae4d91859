mod common;

use keyward_auth::jwt::hash_token;
use keyward_core::error::ErrorKind;
use keyward_core::types::PageRequest;
use keyward_database::{
    AuditStore, DeviceStore, LoginHistoryStore, RefreshTokenStore, SessionStore, UserStore,
};
use keyward_entity::user::UserStatusChange;

use common::{PASSWORD, auth_config, client, harness, harness_with, login_input, register_input};

fn page() -> PageRequest {
    PageRequest::new(1, 100)
}

#[tokio::test]
async fn test_login_creates_session_and_token_family() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;

    let response = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();

    assert_eq!(response.user.id, user.id);
    assert_eq!(response.tokens.expires_in, 15 * 60);

    let sessions = h.store.list_sessions(Some(user.id), false, page()).await.unwrap();
    assert_eq!(sessions.total_items, 1);
    assert_eq!(sessions.items[0].id, response.session.id);
    assert_eq!(sessions.items[0].device_name.as_deref(), Some("Chrome on Windows"));

    let claims = h
        .service
        .sessions()
        .codec()
        .verify_access(&response.tokens.access_token)
        .unwrap();
    assert_eq!(claims.sid, Some(response.session.id));

    let refresh = h
        .store
        .find_refresh_token_by_hash(&hash_token(&response.tokens.refresh_token))
        .await
        .unwrap()
        .expect("stored refresh token");
    assert_eq!(refresh.session_id, Some(response.session.id));
    assert_eq!(refresh.parent_token_id, None);
    assert!(refresh.is_usable());

    let refreshed_user = h.store.find_user_by_id(user.id).await.unwrap().unwrap();
    assert!(refreshed_user.last_login_at.is_some());

    let history = h.store.list_login_history(user.id, page()).await.unwrap();
    assert_eq!(history.total_items, 1);
    assert!(history.items[0].success);
    assert_eq!(history.items[0].session_id, Some(response.session.id));
    assert_eq!(history.items[0].refresh_token_id, Some(refresh.id));

    let audit = h.store.list_audit(Some("user.logged_in"), page()).await.unwrap();
    assert_eq!(audit.total_items, 1);
}

#[tokio::test]
async fn test_login_email_is_case_insensitive() {
    let h = harness();
    h.seed_user("a@x.com").await;
    assert!(
        h.service
            .login(login_input("  A@X.com ", PASSWORD), &client())
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_look_the_same() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;

    let unknown = h
        .service
        .login(login_input("nobody@x.com", PASSWORD), &client())
        .await
        .unwrap_err();
    let wrong = h
        .service
        .login(login_input("a@x.com", "Wrong1!!"), &client())
        .await
        .unwrap_err();

    assert_eq!(unknown.kind, ErrorKind::InvalidCredentials);
    assert_eq!(wrong.kind, ErrorKind::InvalidCredentials);
    assert_eq!(unknown.message, wrong.message);

    let by_email = h
        .service
        .login_attempts(" NoBody@x.com", page())
        .await
        .unwrap();
    assert_eq!(by_email.total_items, 1);
    assert!(!by_email.items[0].success);
    assert_eq!(by_email.items[0].failure_reason.as_deref(), Some("user_not_found"));
    assert_eq!(by_email.items[0].user_id, None);

    let for_user = h.service.login_history(user.id, page()).await.unwrap();
    assert_eq!(for_user.total_items, 1);
    assert_eq!(
        for_user.items[0].failure_reason.as_deref(),
        Some("invalid_password")
    );

    let sessions = h.store.list_sessions(Some(user.id), false, page()).await.unwrap();
    assert_eq!(sessions.total_items, 0);
}

#[tokio::test]
async fn test_unknown_email_pays_the_hashing_cost() {
    let mut config = auth_config();
    config.argon2.memory_kib = 16 * 1024;
    config.argon2.iterations = 3;
    let h = harness_with(config);
    h.seed_user("a@x.com").await;

    let started = std::time::Instant::now();
    let wrong = h
        .service
        .login(login_input("a@x.com", "Wrong1!!"), &client())
        .await
        .unwrap_err();
    let known = started.elapsed();

    let started = std::time::Instant::now();
    let unknown = h
        .service
        .login(login_input("nobody@x.com", "Wrong1!!"), &client())
        .await
        .unwrap_err();
    let missing = started.elapsed();

    assert_eq!(wrong.kind, ErrorKind::InvalidCredentials);
    assert_eq!(unknown.kind, ErrorKind::InvalidCredentials);
    assert!(
        missing * 4 >= known,
        "unknown email took {missing:?}, wrong password took {known:?}"
    );
}

#[tokio::test]
async fn test_blocked_and_inactive_users_are_forbidden() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;

    h.store
        .set_user_status(user.id, UserStatusChange::Block, chrono::Utc::now())
        .await
        .unwrap();
    let err = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    h.store
        .set_user_status(user.id, UserStatusChange::Unblock, chrono::Utc::now())
        .await
        .unwrap();
    h.store
        .set_user_status(user.id, UserStatusChange::Deactivate, chrono::Utc::now())
        .await
        .unwrap();
    let err = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let history = h.service.login_history(user.id, page()).await.unwrap();
    let reasons: Vec<_> = history
        .items
        .iter()
        .filter_map(|h| h.failure_reason.clone())
        .collect();
    assert_eq!(reasons, vec!["user_inactive", "user_blocked"]);
}

#[tokio::test]
async fn test_repeat_login_reuses_device() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;

    let first = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();
    let second = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();
    assert_ne!(first.session.id, second.session.id);

    let devices = h.store.list_devices(user.id, page()).await.unwrap();
    assert_eq!(devices.total_items, 1);
    assert_eq!(devices.items[0].login_count, 2);
    assert_eq!(devices.items[0].browser.as_deref(), Some("Chrome"));

    let sessions = h.store.list_sessions(Some(user.id), true, page()).await.unwrap();
    assert_eq!(sessions.total_items, 2);
}

#[tokio::test]
async fn test_register_then_login() {
    let h = harness();
    let response = h
        .service
        .register(register_input("New@X.com"), &client())
        .await
        .unwrap();

    assert_eq!(response.user.email, "new@x.com");
    assert_eq!(response.user.name.as_deref(), Some("Ada Lovelace"));
    assert!(response.user.profile.is_some());
    assert!(response.user.roles.is_empty());

    let created = h.store.list_audit(Some("user.created"), page()).await.unwrap();
    assert_eq!(created.total_items, 1);
    assert_eq!(created.items[0].entity_id, Some(response.user.id));

    let me = h.service.me(response.user.id).await.unwrap();
    assert_eq!(me.id, response.user.id);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_passwords() {
    let h = harness();
    h.seed_user("a@x.com").await;

    let err = h
        .service
        .register(register_input("A@x.com"), &client())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyExists);

    let mut weak = register_input("b@x.com");
    weak.password = "password".into();
    let err = h.service.register(weak, &client()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_me_for_unknown_user() {
    let h = harness();
    let err = h.service.me(uuid::Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}
