use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Service-wide error type.
///
/// Client-facing variants carry a stable machine-readable code alongside the
/// human message; infrastructure variants are logged and rendered as an
/// opaque `INTERNAL_ERROR` so no internal detail crosses the boundary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },

    #[error("{message}")]
    Unauthorized { code: &'static str, message: String },

    #[error("{message}")]
    Forbidden { code: &'static str, message: String },

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("{message}")]
    TooManyRequests {
        code: &'static str,
        message: String,
        retry_after: Option<u64>,
    },

    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("counter store error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("email error: {0}")]
    Email(String),

    #[error("configuration error: {0}")]
    Config(anyhow::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, retry_after) = match self {
            AppError::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, code, message, None)
            }
            AppError::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, code, message, None)
            }
            AppError::Forbidden { code, message } => (StatusCode::FORBIDDEN, code, message, None),
            AppError::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message, None),
            AppError::Conflict { code, message } => (StatusCode::CONFLICT, code, message, None),
            AppError::TooManyRequests {
                code,
                message,
                retry_after,
            } => (StatusCode::TOO_MANY_REQUESTS, code, message, retry_after),
            AppError::Validation(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                err.to_string(),
                None,
            ),
            // Infrastructure failures: log the cause, return an opaque body.
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                internal()
            }
            AppError::Redis(err) => {
                tracing::error!(error = %err, "counter store error");
                internal()
            }
            AppError::Email(msg) => {
                tracing::error!(error = %msg, "email transport error");
                internal()
            }
            AppError::Config(err) => {
                tracing::error!(error = %err, "configuration error");
                internal()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                internal()
            }
        };

        let mut res = (
            status,
            Json(ErrorBody {
                code: code.to_string(),
                message,
            }),
        )
            .into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}

fn internal() -> (StatusCode, &'static str, String, Option<u64>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "Internal server error".to_string(),
        None,
    )
}
