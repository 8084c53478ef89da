use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::portal::{ApiKeyResponse, CreateApiKeyRequest, CreateApiKeyResponse},
    dtos::MessageResponse,
    middleware::PortalDeveloper,
    AppState,
};

/// Create an API key. The plaintext key appears in this response and
/// nowhere else, ever again.
pub async fn create_key(
    State(state): State<AppState>,
    PortalDeveloper(developer): PortalDeveloper,
    Path(app_id): Path<String>,
    Json(req): Json<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (api_key, key) = state
        .api_keys
        .create_key(developer.id, &app_id, req.label)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            api_key: api_key.into(),
            key,
        }),
    ))
}

pub async fn list_keys(
    State(state): State<AppState>,
    PortalDeveloper(developer): PortalDeveloper,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let keys = state.api_keys.list_keys(developer.id, &app_id).await?;
    let response: Vec<ApiKeyResponse> = keys.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

pub async fn revoke_key(
    State(state): State<AppState>,
    PortalDeveloper(developer): PortalDeveloper,
    Path((app_id, key_id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .api_keys
        .revoke_key(developer.id, &app_id, key_id)
        .await?;
    Ok(Json(MessageResponse::new("API key revoked")))
}
