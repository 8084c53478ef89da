//! API-key authentication of machine callers via `x-app-id` / `x-api-key`.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::models::Application;
use crate::AppState;

fn invalid_api_key(message: &str) -> AppError {
    AppError::Unauthorized {
        code: "INVALID_API_KEY",
        message: message.to_string(),
    }
}

/// Validate the API key headers and attach the resolved [`Application`].
pub async fn app_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let app_id = req
        .headers()
        .get("x-app-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| invalid_api_key("Missing x-app-id header"))?;

    let api_key = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| invalid_api_key("Missing x-api-key header"))?;

    let application = state.api_keys.authenticate(&app_id, &api_key).await?;

    req.extensions_mut().insert(AppContext(application));
    Ok(next.run(req).await)
}

/// The application context resolved from a valid API key.
#[derive(Clone)]
pub struct AppContext(pub Application);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AppContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AppContext>().cloned().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "application context missing from request extensions"
            ))
        })
    }
}

/// Extractor for the bare `x-app-id` header on routes that take a token in
/// the body instead of an API key (refresh, logout, confirm endpoints).
pub struct AppId(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AppId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-app-id")
            .and_then(|v| v.to_str().ok())
            .map(|v| AppId(v.to_string()))
            .ok_or(AppError::BadRequest {
                code: "MISSING_APP_ID",
                message: "Missing x-app-id header".to_string(),
            })
    }
}
