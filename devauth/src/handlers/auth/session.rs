use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use std::net::SocketAddr;

use crate::{
    dtos::auth::{
        LoginRequest, LogoutRequest, RefreshRequest, RefreshResponse, TokenPairResponse,
        UserResponse,
    },
    dtos::MessageResponse,
    middleware::{rate_limit::client_ip, AppContext, AppId, CurrentUser},
    utils::ValidatedJson,
    AppState,
};

/// Login with email and password, opening a session.
pub async fn login(
    State(state): State<AppState>,
    AppContext(application): AppContext,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ip_address = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let (user, access_token, refresh_token) = state
        .auth
        .login(&application, req, ip_address, user_agent)
        .await?;

    Ok(Json(TokenPairResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_token_expiry_seconds(),
        user: user.into(),
    }))
}

/// Mint a new access token from a refresh token.
pub async fn refresh(
    State(state): State<AppState>,
    AppId(app_id): AppId,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let access_token = state.auth.refresh(&app_id, &req.refresh_token).await?;
    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_token_expiry_seconds(),
    }))
}

/// Revoke the session behind a refresh token. Idempotent: an already-dead
/// token still logs out successfully.
pub async fn logout(
    State(state): State<AppState>,
    AppId(app_id): AppId,
    Json(req): Json<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.logout(&app_id, &req.refresh_token).await?;
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// Current user, resolved from the bearer access token.
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}
