use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::portal::{
        ApplicationResponse, CreateApplicationRequest, CreateApplicationResponse,
        DeveloperAuthResponse, DeveloperLoginRequest, DeveloperResponse, DeveloperSignupRequest,
    },
    dtos::MessageResponse,
    middleware::PortalDeveloper,
    utils::ValidatedJson,
    AppState,
};

pub async fn developer_signup(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<DeveloperSignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let developer = state.portal.developer_signup(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(DeveloperResponse::from(developer)),
    ))
}

pub async fn developer_login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<DeveloperLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (developer, access_token) = state.portal.developer_login(req).await?;
    Ok(Json(DeveloperAuthResponse {
        developer: developer.into(),
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_token_expiry_seconds(),
    }))
}

/// Create an application. The plaintext secret appears in this response and
/// nowhere else, ever again.
pub async fn create_application(
    State(state): State<AppState>,
    PortalDeveloper(developer): PortalDeveloper,
    ValidatedJson(req): ValidatedJson<CreateApplicationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (application, app_secret) = state.portal.create_application(developer.id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateApplicationResponse {
            application: application.into(),
            app_secret,
        }),
    ))
}

pub async fn list_applications(
    State(state): State<AppState>,
    PortalDeveloper(developer): PortalDeveloper,
) -> Result<impl IntoResponse, AppError> {
    let applications = state.portal.list_applications(developer.id).await?;
    let response: Vec<ApplicationResponse> =
        applications.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

pub async fn get_application(
    State(state): State<AppState>,
    PortalDeveloper(developer): PortalDeveloper,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let application = state.portal.get_application(developer.id, &app_id).await?;
    Ok(Json(ApplicationResponse::from(application)))
}

pub async fn delete_application(
    State(state): State<AppState>,
    PortalDeveloper(developer): PortalDeveloper,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.portal.delete_application(developer.id, &app_id).await?;
    Ok(Json(MessageResponse::new("Application deleted")))
}
