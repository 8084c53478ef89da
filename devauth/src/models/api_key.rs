//! API key model - machine-caller credentials for an application's backend.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub app_id: String,
    pub label: Option<String>,
    pub key_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn new(app_id: String, label: Option<String>, key_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            app_id,
            label,
            key_hash,
            created_at: Utc::now(),
            last_used_at: None,
            revoked: false,
            revoked_at: None,
        }
    }
}
