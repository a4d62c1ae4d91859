mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use keyward_auth::jwt::{TokenSubject, TokenType, hash_token};
use keyward_auth::session::SessionCleanup;
use keyward_core::error::ErrorKind;
use keyward_core::types::PageRequest;
use keyward_database::{CredentialStore, RefreshTokenStore, SessionStore, UserStore};
use keyward_entity::session::{NewRefreshToken, RefreshToken};
use keyward_entity::user::UserStatusChange;

use common::{Harness, PASSWORD, auth_config, client, harness, harness_with, login_input};

#[tokio::test]
async fn test_rotation_extends_the_family() {
    let h = harness();
    h.seed_user("a@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();

    let rotated = h.service.refresh(&login.tokens.refresh_token).await.unwrap();
    assert_ne!(rotated.refresh_token, login.tokens.refresh_token);

    let old = h
        .store
        .find_refresh_token_by_hash(&hash_token(&login.tokens.refresh_token))
        .await
        .unwrap()
        .unwrap();
    let new = h
        .store
        .find_refresh_token_by_hash(&hash_token(&rotated.refresh_token))
        .await
        .unwrap()
        .unwrap();

    assert!(!old.is_active);
    assert!(old.is_revoked);
    assert!(old.rotated_at.is_some());
    assert_eq!(old.revoked_reason.as_deref(), Some("rotated"));
    assert_eq!(new.family_id, old.family_id);
    assert_eq!(new.parent_token_id, Some(old.id));
    assert_eq!(new.session_id, old.session_id);
    assert!(new.is_usable());

    let family = h.store.list_token_family(old.family_id).await.unwrap();
    assert_eq!(family.iter().filter(|t| t.is_active).count(), 1);

    let claims = h
        .service
        .sessions()
        .codec()
        .verify_access(&rotated.access_token)
        .unwrap();
    assert_eq!(claims.sid, Some(login.session.id));
}

#[tokio::test]
async fn test_reusing_a_rotated_token_fails() {
    let h = harness();
    h.seed_user("a@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();

    let rotated = h.service.refresh(&login.tokens.refresh_token).await.unwrap();
    let err = h
        .service
        .refresh(&login.tokens.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidToken);

    // Default policy leaves the live successor alone.
    assert!(h.service.refresh(&rotated.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_reuse_revokes_family_when_enabled() {
    let mut config = auth_config();
    config.revoke_family_on_reuse = true;
    let h = harness_with(config);
    h.seed_user("a@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();

    let rotated = h.service.refresh(&login.tokens.refresh_token).await.unwrap();
    let err = h
        .service
        .refresh(&login.tokens.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidToken);

    let err = h.service.refresh(&rotated.refresh_token).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidToken);

    let successor = h
        .store
        .find_refresh_token_by_hash(&hash_token(&rotated.refresh_token))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(successor.revoked_reason.as_deref(), Some("reuse_detected"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotation_has_one_winner() {
    let h = harness();
    h.seed_user("a@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();

    let service = Arc::new(h.service.clone());
    let token = Arc::new(login.tokens.refresh_token.clone());
    let attempts = (0..8).map(|_| {
        let service = service.clone();
        let token = token.clone();
        tokio::spawn(async move { service.refresh(&token).await })
    });

    let results = futures::future::join_all(attempts).await;
    let mut wins = 0;
    for result in results {
        match result.expect("task completes") {
            Ok(_) => wins += 1,
            Err(e) => assert_eq!(e.kind, ErrorKind::InvalidToken),
        }
    }
    assert_eq!(wins, 1);

    let old = h
        .store
        .find_refresh_token_by_hash(&hash_token(&login.tokens.refresh_token))
        .await
        .unwrap()
        .unwrap();
    let family = h.store.list_token_family(old.family_id).await.unwrap();
    assert_eq!(family.len(), 2);
    assert_eq!(family.iter().filter(|t| t.is_active).count(), 1);
}

/// Issues a refresh token eight days in the past for the user's only session
/// and stores its row. Returns the raw token and the row.
async fn stale_refresh_token(h: &Harness, email: &str) -> (String, RefreshToken) {
    let user = h.seed_user(email).await;
    let login = h
        .service
        .login(login_input(email, PASSWORD), &client())
        .await
        .unwrap();

    let issued_at = Utc::now() - Duration::days(8);
    let subject = TokenSubject {
        user_id: user.id,
        email: user.email.clone(),
        session_id: Some(login.session.id),
    };
    let issued = h
        .service
        .sessions()
        .codec()
        .issue_at(&subject, TokenType::Refresh, issued_at)
        .unwrap();
    let row = h
        .store
        .create_refresh_token(
            &NewRefreshToken {
                user_id: user.id,
                token_hash: hash_token(&issued.token),
                family_id: Uuid::new_v4(),
                parent_token_id: None,
                session_id: Some(login.session.id),
                device_id: None,
                ip_address: None,
                user_agent: None,
                expires_at: issued.expires_at,
            },
            issued_at,
        )
        .await
        .unwrap();
    (issued.token, row)
}

#[tokio::test]
async fn test_expired_active_token_reports_token_expired() {
    let h = harness();
    let (token, _) = stale_refresh_token(&h, "a@x.com").await;

    let err = h.service.refresh(&token).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::TokenExpired);
}

#[tokio::test]
async fn test_expired_revoked_token_is_invalid() {
    let h = harness();
    let (token, row) = stale_refresh_token(&h, "a@x.com").await;
    h.store
        .revoke_token_family(row.family_id, "user_logout", Utc::now())
        .await
        .unwrap();

    let err = h.service.refresh(&token).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidToken);
}

#[tokio::test]
async fn test_expired_rotated_token_replay_revokes_family() {
    let mut config = auth_config();
    config.revoke_family_on_reuse = true;
    let h = harness_with(config);
    let (token, row) = stale_refresh_token(&h, "a@x.com").await;

    let successor = NewRefreshToken {
        user_id: row.user_id,
        token_hash: hash_token("successor"),
        family_id: row.family_id,
        parent_token_id: Some(row.id),
        session_id: row.session_id,
        device_id: None,
        ip_address: None,
        user_agent: None,
        expires_at: Utc::now() + Duration::days(7),
    };
    h.store
        .rotate_refresh_token(row.id, &successor, row.created_at)
        .await
        .unwrap()
        .unwrap();

    let err = h.service.refresh(&token).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidToken);

    let successor = h
        .store
        .find_refresh_token_by_hash(&hash_token("successor"))
        .await
        .unwrap()
        .unwrap();
    assert!(!successor.is_active);
    assert_eq!(successor.revoked_reason.as_deref(), Some("reuse_detected"));
}

#[tokio::test]
async fn test_access_token_is_not_a_refresh_token() {
    let h = harness();
    h.seed_user("a@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();

    let err = h
        .service
        .refresh(&login.tokens.access_token)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidToken);
}

#[tokio::test]
async fn test_blocked_user_cannot_refresh() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();

    h.store
        .set_user_status(user.id, UserStatusChange::Block, Utc::now())
        .await
        .unwrap();
    let err = h
        .service
        .refresh(&login.tokens.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_logout_revokes_session_tokens() {
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

    h.service.logout(user.id, Some(first.session.id)).await.unwrap();

    let err = h
        .service
        .refresh(&first.tokens.refresh_token)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidToken);
    assert!(h.service.refresh(&second.tokens.refresh_token).await.is_ok());

    let session = h.store.find_session(first.session.id).await.unwrap().unwrap();
    assert!(session.is_revoked);
    assert_eq!(session.revoked_reason.as_deref(), Some("user_logout"));

    // Second logout of the same session is a no-op.
    h.service.logout(user.id, Some(first.session.id)).await.unwrap();
}

#[tokio::test]
async fn test_logout_everywhere() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;
    for _ in 0..3 {
        h.service
            .login(login_input("a@x.com", PASSWORD), &client())
            .await
            .unwrap();
    }

    h.service.logout(user.id, None).await.unwrap();

    let active = h
        .store
        .list_sessions(Some(user.id), true, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(active.total_items, 0);
}

#[tokio::test]
async fn test_logout_ignores_foreign_session() {
    let h = harness();
    h.seed_user("a@x.com").await;
    let mallory = h.seed_user("m@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();

    h.service
        .logout(mallory.id, Some(login.session.id))
        .await
        .unwrap();
    h.service
        .logout(mallory.id, Some(uuid::Uuid::new_v4()))
        .await
        .unwrap();

    let session = h.store.find_session(login.session.id).await.unwrap().unwrap();
    assert!(session.is_live(Utc::now()));
}

#[tokio::test]
async fn test_owned_session_revocation() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;
    let other = h.seed_user("b@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();
    let sessions = h.service.sessions();

    let err = sessions
        .revoke_owned(login.session.id, other.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let err = sessions
        .get_session(uuid::Uuid::new_v4(), user.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    sessions
        .revoke_owned(login.session.id, user.id, None)
        .await
        .unwrap();
    let listed = sessions
        .list_sessions(user.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(listed.total_items, 0);
}

#[tokio::test]
async fn test_cleanup_expires_sessions() {
    let h = harness();
    h.seed_user("a@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();

    let store: Arc<dyn CredentialStore> = h.store.clone();
    let cleanup = SessionCleanup::new(store);

    let report = cleanup.run_cleanup().await.unwrap();
    assert_eq!(report.expired_sessions, 0);

    let report = cleanup
        .run_cleanup_at(Utc::now() + Duration::days(8))
        .await
        .unwrap();
    assert_eq!(report.expired_sessions, 1);

    let session = h.store.find_session(login.session.id).await.unwrap().unwrap();
    assert_eq!(session.revoked_reason.as_deref(), Some("expired"));
    let token = h
        .store
        .find_refresh_token_by_hash(&hash_token(&login.tokens.refresh_token))
        .await
        .unwrap()
        .unwrap();
    assert!(!token.is_usable());
}
