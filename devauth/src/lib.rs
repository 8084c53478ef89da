pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Json, Router,
};
use service_core::error::AppError;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::DevAuthConfig;
use crate::services::{
    ApiKeyService, AuthService, AuthStore, CounterStore, JwtService, PortalService, RateLimiter,
};

#[derive(Clone)]
pub struct AppState {
    pub config: DevAuthConfig,
    pub store: Arc<dyn AuthStore>,
    pub counters: Arc<dyn CounterStore>,
    pub jwt: JwtService,
    pub auth: AuthService,
    pub portal: PortalService,
    pub api_keys: ApiKeyService,
    pub rate_limiter: RateLimiter,
}

pub fn build_router(state: AppState) -> Router {
    // End-user routes authenticated by application API key.
    let api_key_routes = Router::new()
        .route("/v1/auth/signup", post(handlers::auth::signup))
        .route("/v1/auth/login", post(handlers::auth::login))
        .route(
            "/v1/auth/email/verify/request",
            post(handlers::auth::request_verification),
        )
        .route(
            "/v1/auth/password/reset/request",
            post(handlers::auth::request_password_reset),
        )
        .route("/v1/introspect", post(handlers::introspect::introspect))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::app_auth_middleware,
        ));

    // Routes requiring a bearer access token.
    let user_routes = Router::new()
        .route("/v1/auth/me", get(handlers::auth::me))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    // Developer portal routes behind a portal bearer token.
    let portal_routes = Router::new()
        .route(
            "/v1/portal/apps",
            post(handlers::portal::create_application).get(handlers::portal::list_applications),
        )
        .route(
            "/v1/portal/apps/:app_id",
            get(handlers::portal::get_application).delete(handlers::portal::delete_application),
        )
        .route(
            "/v1/portal/apps/:app_id/keys",
            post(handlers::keys::create_key).get(handlers::keys::list_keys),
        )
        .route(
            "/v1/portal/apps/:app_id/keys/:key_id",
            delete(handlers::keys::revoke_key),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::portal_auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .cors_origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!(origin = %origin, error = %e, "Invalid CORS origin, skipping");
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-app-id"),
            header::HeaderName::from_static("x-api-key"),
        ]);

    Router::new()
        .route("/health", get(health_check))
        .route("/v1/portal/signup", post(handlers::portal::developer_signup))
        .route("/v1/portal/login", post(handlers::portal::developer_login))
        .route("/v1/auth/refresh", post(handlers::auth::refresh))
        .route("/v1/auth/logout", post(handlers::auth::logout))
        .route(
            "/v1/auth/email/verify/confirm",
            post(handlers::auth::verify_email),
        )
        .route(
            "/v1/auth/password/reset/confirm",
            post(handlers::auth::confirm_password_reset),
        )
        .merge(api_key_routes)
        .merge(user_routes)
        .merge(portal_routes)
        .with_state(state.clone())
        // Global rate limiting by API-key hash or client IP.
        .layer(from_fn_with_state(
            state.rate_limiter.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Service health check: storage and counter store must both answer.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await?;
    state.counters.health_check().await?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "checks": {
            "database": "up",
            "redis": "up"
        }
    })))
}
