//! Developer model - portal accounts that own applications.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Developer entity. Deleting a developer cascades to their applications.
#[derive(Debug, Clone, FromRow)]
pub struct Developer {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Developer {
    pub fn new(email: String, password_hash: String, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            name,
            created_at: now,
            updated_at: now,
        }
    }
}
