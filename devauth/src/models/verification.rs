//! One-time token models for email verification and password reset.
//!
//! Both store only the SHA-256 hash of the token handed to the user, and
//! both are single-use: once `used` is set they are never valid again,
//! regardless of expiry.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Email verification tokens are valid for 48 hours.
pub const EMAIL_VERIFICATION_EXPIRY_HOURS: i64 = 48;

/// Password reset tokens are valid for 1 hour.
pub const PASSWORD_RESET_EXPIRY_HOURS: i64 = 1;

#[derive(Debug, Clone, FromRow)]
pub struct EmailVerificationToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl EmailVerificationToken {
    pub fn new(user_id: Uuid, token_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            created_at: now,
            expires_at: now + Duration::hours(EMAIL_VERIFICATION_EXPIRY_HOURS),
            used: false,
            used_at: None,
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at > now
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl PasswordResetToken {
    pub fn new(user_id: Uuid, token_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            created_at: now,
            expires_at: now + Duration::hours(PASSWORD_RESET_EXPIRY_HOURS),
            used: false,
            used_at: None,
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at > now
    }
}
