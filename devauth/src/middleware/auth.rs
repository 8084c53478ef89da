//! Bearer-token middleware for end users and portal developers.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::models::{Developer, User};
use crate::services::{TokenKind, PORTAL_APP_ID};
use crate::AppState;

fn invalid_token(message: &str) -> AppError {
    AppError::Unauthorized {
        code: "INVALID_TOKEN",
        message: message.to_string(),
    }
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Require a valid end-user access token whose `app_id` matches the
/// `x-app-id` header, and attach the loaded [`User`] to the request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)
        .ok_or_else(|| invalid_token("Missing or invalid Authorization header"))?;

    let claims = state
        .jwt
        .verify(token)
        .ok_or_else(|| invalid_token("Invalid or expired token"))?;

    // The verifier does not check kind; type confusion is rejected here.
    if claims.kind != TokenKind::Access {
        return Err(invalid_token("Invalid or expired token"));
    }

    let app_id = req
        .headers()
        .get("x-app-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| invalid_token("Missing x-app-id header"))?;

    // Cross-tenant reuse of an otherwise valid token is rejected.
    if claims.app_id != app_id {
        return Err(invalid_token("Token does not belong to this application"));
    }

    let user = state
        .store
        .find_user_by_id(claims.sub, &claims.app_id)
        .await?
        .ok_or(AppError::Unauthorized {
            code: "USER_NOT_FOUND",
            message: "User not found".to_string(),
        })?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Require a valid portal access token and attach the loaded [`Developer`].
pub async fn portal_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)
        .ok_or_else(|| invalid_token("Missing or invalid Authorization header"))?;

    let claims = state
        .jwt
        .verify(token)
        .filter(|c| c.kind == TokenKind::Access && c.app_id == PORTAL_APP_ID)
        .ok_or_else(|| invalid_token("Invalid or expired token"))?;

    let developer = state
        .store
        .find_developer_by_id(claims.sub)
        .await?
        .ok_or(AppError::Unauthorized {
            code: "DEVELOPER_NOT_FOUND",
            message: "Developer not found".to_string(),
        })?;

    req.extensions_mut().insert(PortalDeveloper(developer));
    Ok(next.run(req).await)
}

/// The authenticated end user, injected by [`auth_middleware`].
#[derive(Clone)]
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("auth claims missing from request extensions"))
            })
    }
}

/// The authenticated portal developer, injected by
/// [`portal_auth_middleware`].
#[derive(Clone)]
pub struct PortalDeveloper(pub Developer);

#[axum::async_trait]
impl<S> FromRequestParts<S> for PortalDeveloper
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PortalDeveloper>()
            .cloned()
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "portal developer missing from request extensions"
                ))
            })
    }
}
