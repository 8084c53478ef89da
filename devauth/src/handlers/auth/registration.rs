use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::{ResendVerificationRequest, SignupRequest, SignupResponse, VerifyEmailRequest},
    dtos::MessageResponse,
    middleware::{AppContext, AppId},
    utils::ValidatedJson,
    AppState,
};

/// Register a new end user under the authenticated application.
pub async fn signup(
    State(state): State<AppState>,
    AppContext(application): AppContext,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.signup(&application, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user: user.into(),
            message: "Registration successful. Please check your email to verify your account."
                .to_string(),
        }),
    ))
}

/// Confirm an email verification token.
pub async fn verify_email(
    State(state): State<AppState>,
    AppId(app_id): AppId,
    ValidatedJson(req): ValidatedJson<VerifyEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.verify_email(&app_id, &req.token).await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// Request a fresh verification email. The response is identical whether or
/// not the address exists.
pub async fn request_verification(
    State(state): State<AppState>,
    AppContext(application): AppContext,
    ValidatedJson(req): ValidatedJson<ResendVerificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .request_email_verification(&application, &req.email)
        .await?;
    Ok(Json(MessageResponse::new(
        "If the email exists, a verification link has been sent",
    )))
}
