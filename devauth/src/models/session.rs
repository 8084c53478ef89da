//! Session model - one refresh-token lineage per row.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Session entity.
///
/// Holds the SHA-256 hash of the refresh token currently backing this
/// lineage. Once revoked a session is never reactivated; cleanup purges it
/// after the retention window.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub app_id: String,
    pub refresh_token_hash: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session with a caller-chosen id.
    ///
    /// The refresh token embeds the session id, so the id must exist before
    /// the token is minted and the token's hash before the row is written.
    pub fn new_with_id(
        id: Uuid,
        user_id: Uuid,
        app_id: String,
        refresh_token_hash: String,
        user_agent: Option<String>,
        ip_address: Option<String>,
        expiry_days: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            app_id,
            refresh_token_hash,
            user_agent,
            ip_address,
            created_at: now,
            expires_at: now + Duration::days(expiry_days),
            revoked: false,
            revoked_at: None,
        }
    }

    /// Usable for refresh: not revoked and not expired.
    pub fn is_active(&self) -> bool {
        !self.revoked && self.expires_at > Utc::now()
    }
}
