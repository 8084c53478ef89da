use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{ApiKey, Application, Developer};

#[derive(Debug, Deserialize, Validate)]
pub struct DeveloperSignupRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeveloperLoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct DeveloperResponse {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Developer> for DeveloperResponse {
    fn from(d: Developer) -> Self {
        Self {
            id: d.id,
            email: d.email,
            name: d.name,
            created_at: d.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeveloperAuthResponse {
    pub developer: DeveloperResponse,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateApplicationRequest {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,

    pub environment: crate::models::AppEnvironment,
}

/// Application representation for API responses; the encrypted secret never
/// leaves the service.
#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub name: String,
    pub environment: String,
    pub app_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<Application> for ApplicationResponse {
    fn from(a: Application) -> Self {
        Self {
            id: a.id,
            name: a.name,
            environment: a.environment,
            app_id: a.app_id,
            created_at: a.created_at,
        }
    }
}

/// Creation response: the only place the plaintext secret is ever shown.
#[derive(Debug, Serialize)]
pub struct CreateApplicationResponse {
    pub application: ApplicationResponse,
    pub app_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub app_id: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(k: ApiKey) -> Self {
        Self {
            id: k.id,
            app_id: k.app_id,
            label: k.label,
            created_at: k.created_at,
            last_used_at: k.last_used_at,
            revoked: k.revoked,
        }
    }
}

/// Creation response: the only place the plaintext key is ever shown.
#[derive(Debug, Serialize)]
pub struct CreateApiKeyResponse {
    pub api_key: ApiKeyResponse,
    pub key: String,
}
