//! Periodic purge of expired one-time tokens and long-revoked sessions.
//!
//! Each purge is its own transaction and each logs its row count; `run_all`
//! logs failures and carries on, so one broken purge never blocks the
//! others. All three are idempotent.

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::services::error::ServiceError;
use crate::services::store::AuthStore;

/// Verification tokens stay queryable for 48h past expiry.
const VERIFICATION_GRACE_HOURS: i64 = 48;
/// Reset tokens stay queryable for 24h past expiry.
const RESET_GRACE_HOURS: i64 = 24;
/// Revoked sessions are retained for 90 days.
const SESSION_RETENTION_DAYS: i64 = 90;

#[derive(Clone)]
pub struct CleanupService {
    store: Arc<dyn AuthStore>,
}

impl CleanupService {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    /// Delete email verification tokens that expired more than 48h ago.
    pub async fn cleanup_expired_verification_tokens(&self) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - Duration::hours(VERIFICATION_GRACE_HOURS);
        let deleted = self.store.purge_verification_tokens(cutoff).await?;
        tracing::info!(deleted, "Cleaned up expired email verification tokens");
        Ok(deleted)
    }

    /// Delete password reset tokens that expired more than 24h ago.
    pub async fn cleanup_expired_reset_tokens(&self) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - Duration::hours(RESET_GRACE_HOURS);
        let deleted = self.store.purge_reset_tokens(cutoff).await?;
        tracing::info!(deleted, "Cleaned up expired password reset tokens");
        Ok(deleted)
    }

    /// Delete sessions revoked more than 90 days ago.
    pub async fn cleanup_old_revoked_sessions(&self) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - Duration::days(SESSION_RETENTION_DAYS);
        let deleted = self.store.purge_revoked_sessions(cutoff).await?;
        tracing::info!(deleted, "Cleaned up old revoked sessions");
        Ok(deleted)
    }

    /// Run every purge; a failure in one is logged and the rest still run.
    pub async fn run_all(&self) {
        if let Err(e) = self.cleanup_expired_verification_tokens().await {
            tracing::error!(error = %e, "Error cleaning up verification tokens");
        }
        if let Err(e) = self.cleanup_expired_reset_tokens().await {
            tracing::error!(error = %e, "Error cleaning up reset tokens");
        }
        if let Err(e) = self.cleanup_old_revoked_sessions().await {
            tracing::error!(error = %e, "Error cleaning up revoked sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailVerificationToken, PasswordResetToken, Session};
    use crate::services::memory::InMemoryStore;
    use uuid::Uuid;

    fn expired_verification(user_id: Uuid, hours_past_grace: i64) -> EmailVerificationToken {
        let mut token = EmailVerificationToken::new(user_id, "hash".to_string());
        token.expires_at =
            Utc::now() - Duration::hours(VERIFICATION_GRACE_HOURS + hours_past_grace);
        token
    }

    fn expired_reset(user_id: Uuid, hours_past_grace: i64) -> PasswordResetToken {
        let mut token = PasswordResetToken::new(user_id, "hash".to_string());
        token.expires_at = Utc::now() - Duration::hours(RESET_GRACE_HOURS + hours_past_grace);
        token
    }

    fn old_revoked_session(user_id: Uuid, days_past_retention: i64) -> Session {
        let mut session = Session::new_with_id(
            Uuid::new_v4(),
            user_id,
            "app_1".to_string(),
            "hash".to_string(),
            None,
            None,
            7,
        );
        session.revoked = true;
        session.revoked_at =
            Some(Utc::now() - Duration::days(SESSION_RETENTION_DAYS + days_past_retention));
        session
    }

    #[tokio::test]
    async fn purges_only_rows_past_grace() {
        let store = Arc::new(InMemoryStore::new());
        let cleanup = CleanupService::new(store.clone());
        let user_id = Uuid::new_v4();

        store
            .insert_email_verification_token(&expired_verification(user_id, 1))
            .await
            .unwrap();
        store
            .insert_email_verification_token(&EmailVerificationToken::new(
                user_id,
                "fresh".to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(
            cleanup.cleanup_expired_verification_tokens().await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn revoked_session_purge_leaves_live_sessions() {
        let store = Arc::new(InMemoryStore::new());
        let cleanup = CleanupService::new(store.clone());
        let user_id = Uuid::new_v4();

        store
            .insert_session(&old_revoked_session(user_id, 5))
            .await
            .unwrap();
        let live = Session::new_with_id(
            Uuid::new_v4(),
            user_id,
            "app_1".to_string(),
            "hash".to_string(),
            None,
            None,
            7,
        );
        store.insert_session(&live).await.unwrap();

        assert_eq!(cleanup.cleanup_old_revoked_sessions().await.unwrap(), 1);
        assert_eq!(store.list_sessions_for_user(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_run_deletes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let cleanup = CleanupService::new(store.clone());
        let user_id = Uuid::new_v4();

        store
            .insert_email_verification_token(&expired_verification(user_id, 1))
            .await
            .unwrap();
        store
            .insert_password_reset_token(&expired_reset(user_id, 1))
            .await
            .unwrap();
        store
            .insert_session(&old_revoked_session(user_id, 1))
            .await
            .unwrap();

        cleanup.run_all().await;

        assert_eq!(
            cleanup.cleanup_expired_verification_tokens().await.unwrap(),
            0
        );
        assert_eq!(cleanup.cleanup_expired_reset_tokens().await.unwrap(), 0);
        assert_eq!(cleanup.cleanup_old_revoked_sessions().await.unwrap(), 0);
    }
}
