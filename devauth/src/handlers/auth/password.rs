use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::{PasswordResetConfirm, PasswordResetRequest},
    dtos::MessageResponse,
    middleware::{AppContext, AppId},
    utils::ValidatedJson,
    AppState,
};

/// Request a password reset email. The response is identical whether or not
/// the address exists.
pub async fn request_password_reset(
    State(state): State<AppState>,
    AppContext(application): AppContext,
    ValidatedJson(req): ValidatedJson<PasswordResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .request_password_reset(&application, &req.email)
        .await?;
    Ok(Json(MessageResponse::new(
        "If the email exists, a password reset link has been sent",
    )))
}

/// Consume a reset token and set the new password. Every active session of
/// the user is revoked.
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    AppId(app_id): AppId,
    ValidatedJson(req): ValidatedJson<PasswordResetConfirm>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .confirm_password_reset(&app_id, &req.token, &req.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password reset successfully")))
}
