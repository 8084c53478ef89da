//! Developer portal: accounts, applications, API keys.

mod common;

use axum::http::StatusCode;
use common::{get_json, post_json, request_json, setup, signup_user};
use devauth::services::AuthStore;
use serde_json::json;

#[tokio::test]
async fn developer_signup_and_login() {
    let harness = setup().await;

    let (status, body) = post_json(
        &harness.app,
        "/v1/portal/signup",
        &[],
        json!({ "email": "dev2@devauth.test", "password": "DevPassw0rd!", "name": "Dev Two" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "dev2@devauth.test");
    assert!(body.get("password_hash").is_none());

    let (status, body) = post_json(
        &harness.app,
        "/v1/portal/login",
        &[],
        json!({ "email": "dev2@devauth.test", "password": "DevPassw0rd!" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].as_str().is_some());
    assert_eq!(body["token_type"], "Bearer");
}

#[tokio::test]
async fn application_lifecycle_shows_secret_exactly_once() {
    let harness = setup().await;

    let (status, body) = post_json(
        &harness.app,
        "/v1/portal/apps",
        &harness.portal_headers(),
        json!({ "name": "Prod App", "environment": "prod" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let app_id = body["application"]["app_id"].as_str().unwrap().to_string();
    assert!(body["app_secret"].as_str().is_some());

    // Neither listing nor fetching ever exposes secret material.
    let (status, body) = get_json(&harness.app, "/v1/portal/apps", &harness.portal_headers()).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    for app in listed {
        assert!(app.get("app_secret").is_none());
        assert!(app.get("app_secret_encrypted").is_none());
    }

    let (status, body) = get_json(
        &harness.app,
        &format!("/v1/portal/apps/{}", app_id),
        &harness.portal_headers(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["environment"], "prod");
}

#[tokio::test]
async fn api_key_lifecycle() {
    let harness = setup().await;

    let (status, body) = post_json(
        &harness.app,
        &format!("/v1/portal/apps/{}/keys", harness.app_id),
        &harness.portal_headers(),
        json!({ "label": "ci" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let key_id = body["api_key"]["id"].as_str().unwrap().to_string();
    let plaintext = body["key"].as_str().unwrap().to_string();

    // The new key authenticates tenant endpoints.
    let headers = vec![
        ("x-app-id".to_string(), harness.app_id.clone()),
        ("x-api-key".to_string(), plaintext.clone()),
    ];
    let (status, _) = post_json(
        &harness.app,
        "/v1/auth/signup",
        &headers,
        json!({ "email": "via-new-key@x.com", "password": "Passw0rd!" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Listing shows both keys, hashes never included.
    let (status, body) = get_json(
        &harness.app,
        &format!("/v1/portal/apps/{}/keys", harness.app_id),
        &harness.portal_headers(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let keys = body.as_array().unwrap();
    assert_eq!(keys.len(), 2);
    for key in keys {
        assert!(key.get("key_hash").is_none());
    }

    // Revoked keys stop authenticating.
    let (status, _) = request_json(
        &harness.app,
        "DELETE",
        &format!("/v1/portal/apps/{}/keys/{}", harness.app_id, key_id),
        &harness.portal_headers(),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &harness.app,
        "/v1/auth/signup",
        &headers,
        json!({ "email": "after-revoke@x.com", "password": "Passw0rd!" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_API_KEY");
}

#[tokio::test]
async fn deleting_application_cascades_to_users_and_keys() {
    let harness = setup().await;
    signup_user(&harness, "user@x.com", "Passw0rd!").await;

    let (status, _) = request_json(
        &harness.app,
        "DELETE",
        &format!("/v1/portal/apps/{}", harness.app_id),
        &harness.portal_headers(),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The tenant's API key and users are gone with it.
    let (status, body) = post_json(
        &harness.app,
        "/v1/auth/login",
        &harness.tenant_headers(),
        json!({ "email": "user@x.com", "password": "Passw0rd!" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_API_KEY");

    assert!(harness
        .store
        .find_user_by_email(&harness.app_id, "user@x.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn portal_routes_require_portal_token() {
    let harness = setup().await;
    signup_user(&harness, "user@x.com", "Passw0rd!").await;
    let (access_token, _) = common::login_user(&harness, "user@x.com", "Passw0rd!").await;

    // An end-user access token is not a portal token.
    let headers = vec![(
        "authorization".to_string(),
        format!("Bearer {}", access_token),
    )];
    let (status, body) = get_json(&harness.app, "/v1/portal/apps", &headers).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
}
