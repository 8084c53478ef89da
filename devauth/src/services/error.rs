use service_core::error::AppError;
use thiserror::Error;

use crate::services::counters::CounterError;
use crate::services::store::StoreError;

/// Client-facing and infrastructure errors raised by the lifecycle services.
///
/// Every client-facing variant maps to a stable code + message with no
/// internal detail; infrastructure variants surface as opaque 5xx responses.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Email or password is incorrect")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    InvalidPassword(String),

    #[error("Account locked due to too many failed login attempts. Please try again later.")]
    AccountLocked,

    #[error("Email already registered")]
    EmailExists,

    #[error("Email already verified")]
    AlreadyVerified,

    #[error("Application not found")]
    ApplicationNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Developer not found")]
    DeveloperNotFound,

    #[error("API key not found")]
    ApiKeyNotFound,

    #[error("API key already revoked")]
    AlreadyRevoked,

    #[error("Invalid or revoked API key")]
    InvalidApiKey,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Counters(#[from] CounterError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Internal(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<CounterError> for AppError {
    fn from(err: CounterError) -> Self {
        match err {
            CounterError::Redis(e) => AppError::Redis(e),
            CounterError::Internal(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::InvalidCredentials => AppError::Unauthorized {
                code: "INVALID_CREDENTIALS",
                message,
            },
            ServiceError::InvalidToken => AppError::Unauthorized {
                code: "INVALID_TOKEN",
                message,
            },
            ServiceError::InvalidPassword(_) => AppError::BadRequest {
                code: "INVALID_PASSWORD",
                message,
            },
            ServiceError::AccountLocked => AppError::TooManyRequests {
                code: "ACCOUNT_LOCKED",
                message,
                retry_after: None,
            },
            ServiceError::EmailExists => AppError::Conflict {
                code: "EMAIL_EXISTS",
                message,
            },
            ServiceError::AlreadyVerified => AppError::BadRequest {
                code: "ALREADY_VERIFIED",
                message,
            },
            ServiceError::ApplicationNotFound => AppError::NotFound {
                code: "APPLICATION_NOT_FOUND",
                message,
            },
            ServiceError::UserNotFound => AppError::NotFound {
                code: "USER_NOT_FOUND",
                message,
            },
            ServiceError::DeveloperNotFound => AppError::NotFound {
                code: "DEVELOPER_NOT_FOUND",
                message,
            },
            ServiceError::ApiKeyNotFound => AppError::NotFound {
                code: "API_KEY_NOT_FOUND",
                message,
            },
            ServiceError::AlreadyRevoked => AppError::BadRequest {
                code: "ALREADY_REVOKED",
                message,
            },
            ServiceError::InvalidApiKey => AppError::Unauthorized {
                code: "INVALID_API_KEY",
                message,
            },
            ServiceError::Store(StoreError::Database(e)) => AppError::Database(e),
            ServiceError::Store(StoreError::Internal(msg)) => {
                AppError::Internal(anyhow::anyhow!(msg))
            }
            ServiceError::Counters(CounterError::Redis(e)) => AppError::Redis(e),
            ServiceError::Counters(CounterError::Internal(msg)) => {
                AppError::Internal(anyhow::anyhow!(msg))
            }
            ServiceError::Internal(e) => AppError::Internal(e),
        }
    }
}
