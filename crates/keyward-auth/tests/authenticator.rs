mod common;

use http::header::{AUTHORIZATION, COOKIE, USER_AGENT};
use http::{HeaderMap, HeaderValue};

use keyward_auth::Actor;
use keyward_core::error::ErrorKind;
use keyward_database::SessionStore;

use common::{CHROME_UA, PASSWORD, client, harness, login_input};

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.4, 10.0.0.1"));
    headers.insert(USER_AGENT, HeaderValue::from_static(CHROME_UA));
    headers
}

#[tokio::test]
async fn test_valid_token_authenticates_and_touches_session() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();
    let authenticator = h.service.authenticator();

    let ctx = authenticator
        .authenticate(&bearer(&login.tokens.access_token))
        .await
        .expect("authenticated");
    assert_eq!(ctx.user_id, user.id);
    assert_eq!(ctx.session_id, Some(login.session.id));
    assert_eq!(ctx.client.ip_address.as_deref(), Some("198.51.100.4"));

    let session = h.store.find_session(login.session.id).await.unwrap().unwrap();
    assert_eq!(session.activity_count, 1);
    assert_eq!(session.last_activity_ip.as_deref(), Some("198.51.100.4"));
}

#[tokio::test]
async fn test_cookie_token_is_accepted() {
    let h = harness();
    h.seed_user("a@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();

    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&format!("accessToken={}", login.tokens.access_token)).unwrap(),
    );
    headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer garbage"));

    assert!(h.service.authenticator().authenticate(&headers).await.is_some());
}

#[tokio::test]
async fn test_revoked_session_rejects_token() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();

    h.service
        .force_logout(user.id, &Actor::system(), Some("security review"))
        .await
        .unwrap();

    let authenticator = h.service.authenticator();
    assert!(
        authenticator
            .validate(&login.tokens.access_token, &client())
            .await
            .is_none()
    );
    let err = authenticator
        .require(&bearer(&login.tokens.access_token))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);

    let session = h.store.find_session(login.session.id).await.unwrap().unwrap();
    assert_eq!(session.revoked_reason.as_deref(), Some("security review"));
}

#[tokio::test]
async fn test_blacklisted_token_is_rejected() {
    let h = harness();
    let user = h.seed_user("a@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();
    let authenticator = h.service.authenticator();
    assert!(
        authenticator
            .validate(&login.tokens.access_token, &client())
            .await
            .is_some()
    );

    h.service
        .sessions()
        .blacklist_access_token(&login.tokens.access_token, Some(user.id), "forced_logout")
        .await
        .unwrap();

    assert!(
        authenticator
            .validate(&login.tokens.access_token, &client())
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_refresh_token_and_missing_header_are_rejected() {
    let h = harness();
    h.seed_user("a@x.com").await;
    let login = h
        .service
        .login(login_input("a@x.com", PASSWORD), &client())
        .await
        .unwrap();
    let authenticator = h.service.authenticator();

    assert!(
        authenticator
            .authenticate(&bearer(&login.tokens.refresh_token))
            .await
            .is_none()
    );
    assert!(authenticator.authenticate(&HeaderMap::new()).await.is_none());
}
