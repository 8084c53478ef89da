use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::IntrospectRequest,
    middleware::AppContext,
    AppState,
};

/// Report whether an access token is active for the authenticated
/// application. Inactive tokens yield `{"active": false}` with no detail.
pub async fn introspect(
    State(state): State<AppState>,
    AppContext(application): AppContext,
    Json(req): Json<IntrospectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state
        .auth
        .introspect(&application.app_id, &req.token)
        .await?;
    Ok(Json(response))
}
