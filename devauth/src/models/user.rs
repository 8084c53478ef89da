//! User model - tenant-scoped end-user accounts.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// End-user entity. `(app_id, email)` is unique, so the same address may
/// exist independently under different applications.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub app_id: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(
        app_id: String,
        email: String,
        password_hash: String,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            app_id,
            email,
            password_hash,
            email_verified: false,
            metadata,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }
}
