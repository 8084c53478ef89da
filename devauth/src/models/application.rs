//! Application model - one tenant of the platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Deployment environment of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Dev,
    Prod,
}

impl AppEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnvironment::Dev => "dev",
            AppEnvironment::Prod => "prod",
        }
    }
}

impl std::str::FromStr for AppEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(AppEnvironment::Dev),
            "prod" => Ok(AppEnvironment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

/// Application entity.
///
/// `app_id` is the public tenant identifier end-user requests carry;
/// `app_secret_encrypted` is the AES-GCM ciphertext of the application
/// secret - the service must be able to recover the plaintext, so this is
/// encrypted rather than hashed.
#[derive(Debug, Clone, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub developer_id: Uuid,
    pub name: String,
    pub environment: String,
    pub app_id: String,
    pub app_secret_encrypted: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(
        developer_id: Uuid,
        name: String,
        environment: AppEnvironment,
        app_id: String,
        app_secret_encrypted: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            developer_id,
            name,
            environment: environment.as_str().to_string(),
            app_id,
            app_secret_encrypted,
            created_at: now,
            updated_at: now,
        }
    }
}
