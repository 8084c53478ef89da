//! Login, refresh, and logout flow.

mod common;

use axum::http::StatusCode;
use common::{get_json, login_user, post_json, setup, signup_user};
use devauth::services::{AuthStore, JwtService, TokenKind};
use serde_json::json;

#[tokio::test]
async fn login_refresh_logout_lifecycle() {
    let harness = setup().await;
    signup_user(&harness, "user@x.com", "Passw0rd!").await;

    let (access_token, refresh_token) = login_user(&harness, "user@x.com", "Passw0rd!").await;

    // Access token: 15 minute lifetime, access kind, scoped to this app.
    let claims = JwtService::decode_unverified(&access_token).expect("decodable");
    assert_eq!(claims.kind, TokenKind::Access);
    assert_eq!(claims.app_id, harness.app_id);
    assert_eq!(claims.exp - claims.iat, 15 * 60);

    // Refresh token embeds the session id of a live session row.
    let refresh_claims = JwtService::decode_unverified(&refresh_token).expect("decodable");
    assert_eq!(refresh_claims.kind, TokenKind::Refresh);
    let session_id = refresh_claims.session_id.expect("session id claim");
    let sessions = harness
        .store
        .list_sessions_for_user(refresh_claims.sub)
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, session_id);
    assert!(!sessions[0].revoked);

    // Refresh mints a new access token; the session stays live.
    let app_header = vec![("x-app-id".to_string(), harness.app_id.clone())];
    let (status, body) = post_json(
        &harness.app,
        "/v1/auth/refresh",
        &app_header,
        json!({ "refresh_token": refresh_token }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let new_access = body["access_token"].as_str().expect("new access token");
    assert!(JwtService::decode_unverified(new_access).is_some());

    let sessions = harness
        .store
        .list_sessions_for_user(refresh_claims.sub)
        .await
        .unwrap();
    assert!(!sessions[0].revoked, "refresh must not revoke the session");

    // Logout revokes the session.
    let (status, _) = post_json(
        &harness.app,
        "/v1/auth/logout",
        &app_header,
        json!({ "refresh_token": refresh_token }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let sessions = harness
        .store
        .list_sessions_for_user(refresh_claims.sub)
        .await
        .unwrap();
    assert!(sessions[0].revoked);
    assert!(sessions[0].revoked_at.is_some());

    // The refresh token is dead now.
    let (status, body) = post_json(
        &harness.app,
        "/v1/auth/refresh",
        &app_header,
        json!({ "refresh_token": refresh_token }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn wrong_password_and_unknown_user_fail_identically() {
    let harness = setup().await;
    signup_user(&harness, "user@x.com", "Passw0rd!").await;

    let (status_wrong, body_wrong) = post_json(
        &harness.app,
        "/v1/auth/login",
        &harness.tenant_headers(),
        json!({ "email": "user@x.com", "password": "Wrong0rd!" }),
    )
    .await;
    let (status_ghost, body_ghost) = post_json(
        &harness.app,
        "/v1/auth/login",
        &harness.tenant_headers(),
        json!({ "email": "ghost@x.com", "password": "Passw0rd!" }),
    )
    .await;

    assert_eq!(status_wrong, StatusCode::UNAUTHORIZED);
    assert_eq!(status_ghost, StatusCode::UNAUTHORIZED);
    assert_eq!(body_wrong, body_ghost);
    assert_eq!(body_wrong["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn me_returns_current_user_for_bearer_token() {
    let harness = setup().await;
    signup_user(&harness, "user@x.com", "Passw0rd!").await;
    let (access_token, _) = login_user(&harness, "user@x.com", "Passw0rd!").await;

    let headers = vec![
        ("x-app-id".to_string(), harness.app_id.clone()),
        ("authorization".to_string(), format!("Bearer {}", access_token)),
    ];
    let (status, body) = get_json(&harness.app, "/v1/auth/me", &headers).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "user@x.com");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let harness = setup().await;
    signup_user(&harness, "user@x.com", "Passw0rd!").await;
    let (_, refresh_token) = login_user(&harness, "user@x.com", "Passw0rd!").await;

    // Presenting a refresh token where an access token is expected fails.
    let headers = vec![
        ("x-app-id".to_string(), harness.app_id.clone()),
        (
            "authorization".to_string(),
            format!("Bearer {}", refresh_token),
        ),
    ];
    let (status, body) = get_json(&harness.app, "/v1/auth/me", &headers).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn access_token_cannot_refresh() {
    let harness = setup().await;
    signup_user(&harness, "user@x.com", "Passw0rd!").await;
    let (access_token, _) = login_user(&harness, "user@x.com", "Passw0rd!").await;

    let (status, body) = post_json(
        &harness.app,
        "/v1/auth/refresh",
        &[("x-app-id".to_string(), harness.app_id.clone())],
        json!({ "refresh_token": access_token }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn logout_with_garbage_token_succeeds() {
    let harness = setup().await;

    let (status, _) = post_json(
        &harness.app,
        "/v1/auth/logout",
        &[("x-app-id".to_string(), harness.app_id.clone())],
        json!({ "refresh_token": "garbage" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}
