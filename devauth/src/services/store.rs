//! Persistence boundary: the `AuthStore` trait and its PostgreSQL
//! implementation.
//!
//! Rows cross this boundary as immutable snapshots; mutations are explicit
//! update statements. Multi-step writes that must be atomic (signup,
//! verification confirm, reset confirm) are single trait methods running one
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ApiKey, Application, Developer, EmailVerificationToken, PasswordResetToken, Session, User,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store error: {0}")]
    Internal(String),
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    // Developers
    async fn insert_developer(&self, developer: &Developer) -> Result<(), StoreError>;
    async fn find_developer_by_email(&self, email: &str) -> Result<Option<Developer>, StoreError>;
    async fn find_developer_by_id(&self, id: Uuid) -> Result<Option<Developer>, StoreError>;

    // Applications
    async fn insert_application(&self, application: &Application) -> Result<(), StoreError>;
    async fn find_application_by_app_id(
        &self,
        app_id: &str,
    ) -> Result<Option<Application>, StoreError>;
    async fn find_application_for_developer(
        &self,
        app_id: &str,
        developer_id: Uuid,
    ) -> Result<Option<Application>, StoreError>;
    async fn list_applications(&self, developer_id: Uuid) -> Result<Vec<Application>, StoreError>;
    /// Cascades to users, sessions, API keys, and one-time tokens.
    async fn delete_application(&self, id: Uuid) -> Result<(), StoreError>;

    // Users
    async fn find_user_by_email(
        &self,
        app_id: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn find_user_by_id(&self, id: Uuid, app_id: &str) -> Result<Option<User>, StoreError>;
    /// Insert the user together with their first verification token, one
    /// transaction.
    async fn create_user_with_verification(
        &self,
        user: &User,
        token: &EmailVerificationToken,
    ) -> Result<(), StoreError>;
    async fn update_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    // Email verification
    async fn insert_email_verification_token(
        &self,
        token: &EmailVerificationToken,
    ) -> Result<(), StoreError>;
    /// Atomically consume a verification token: hash match, unused,
    /// unexpired, and owned by a user of `app_id` must all hold. Marks the
    /// token used and the user verified. Returns whether a token was
    /// consumed.
    async fn consume_email_verification(
        &self,
        token_hash: &str,
        app_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    // Password reset
    async fn insert_password_reset_token(
        &self,
        token: &PasswordResetToken,
    ) -> Result<(), StoreError>;
    /// Atomically consume a reset token under the same conditions as
    /// verification, update the user's password hash, and revoke every
    /// active session belonging to the user. Returns whether a token was
    /// consumed.
    async fn consume_password_reset(
        &self,
        token_hash: &str,
        app_id: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    // Sessions
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError>;
    async fn find_active_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        app_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError>;
    /// Revoke a not-yet-revoked session. Returns whether a row changed.
    async fn revoke_session(
        &self,
        session_id: Uuid,
        app_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    async fn list_sessions_for_user(&self, user_id: Uuid) -> Result<Vec<Session>, StoreError>;

    // API keys
    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), StoreError>;
    async fn list_api_keys(&self, app_id: &str) -> Result<Vec<ApiKey>, StoreError>;
    async fn find_api_key(&self, id: Uuid, app_id: &str) -> Result<Option<ApiKey>, StoreError>;
    async fn find_active_api_key(
        &self,
        key_hash: &str,
        app_id: &str,
    ) -> Result<Option<ApiKey>, StoreError>;
    async fn revoke_api_key(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError>;
    async fn touch_api_key(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    // Cleanup
    async fn purge_verification_tokens(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
    async fn purge_reset_tokens(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
    async fn purge_revoked_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_developer(&self, developer: &Developer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO developers (id, email, password_hash, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(developer.id)
        .bind(&developer.email)
        .bind(&developer.password_hash)
        .bind(&developer.name)
        .bind(developer.created_at)
        .bind(developer.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_developer_by_email(&self, email: &str) -> Result<Option<Developer>, StoreError> {
        let developer = sqlx::query_as::<_, Developer>(
            "SELECT * FROM developers WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(developer)
    }

    async fn find_developer_by_id(&self, id: Uuid) -> Result<Option<Developer>, StoreError> {
        let developer = sqlx::query_as::<_, Developer>("SELECT * FROM developers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(developer)
    }

    async fn insert_application(&self, application: &Application) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO applications
                (id, developer_id, name, environment, app_id, app_secret_encrypted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(application.id)
        .bind(application.developer_id)
        .bind(&application.name)
        .bind(&application.environment)
        .bind(&application.app_id)
        .bind(&application.app_secret_encrypted)
        .bind(application.created_at)
        .bind(application.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_application_by_app_id(
        &self,
        app_id: &str,
    ) -> Result<Option<Application>, StoreError> {
        let application =
            sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE app_id = $1")
                .bind(app_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(application)
    }

    async fn find_application_for_developer(
        &self,
        app_id: &str,
        developer_id: Uuid,
    ) -> Result<Option<Application>, StoreError> {
        let application = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE app_id = $1 AND developer_id = $2",
        )
        .bind(app_id)
        .bind(developer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(application)
    }

    async fn list_applications(&self, developer_id: Uuid) -> Result<Vec<Application>, StoreError> {
        let applications = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE developer_id = $1 ORDER BY created_at",
        )
        .bind(developer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(applications)
    }

    async fn delete_application(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_user_by_email(
        &self,
        app_id: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE app_id = $1 AND LOWER(email) = LOWER($2)",
        )
        .bind(app_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid, app_id: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND app_id = $2")
            .bind(id)
            .bind(app_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user_with_verification(
        &self,
        user: &User,
        token: &EmailVerificationToken,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users
                (id, app_id, email, password_hash, email_verified, metadata, created_at, updated_at, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.app_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.email_verified)
        .bind(&user.metadata)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.last_login_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO email_verification_tokens
                (id, user_id, token_hash, created_at, expires_at, used, used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.used)
        .bind(token.used_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_login_at = $1, updated_at = $1 WHERE id = $2")
            .bind(at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_email_verification_token(
        &self,
        token: &EmailVerificationToken,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO email_verification_tokens
                (id, user_id, token_hash, created_at, expires_at, used, used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.used)
        .bind(token.used_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_email_verification(
        &self,
        token_hash: &str,
        app_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let token = sqlx::query_as::<_, EmailVerificationToken>(
            r#"
            SELECT evt.* FROM email_verification_tokens evt
            JOIN users u ON evt.user_id = u.id
            WHERE evt.token_hash = $1
              AND evt.used = FALSE
              AND evt.expires_at > $2
              AND u.app_id = $3
            FOR UPDATE OF evt
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .bind(app_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(token) = token else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query("UPDATE email_verification_tokens SET used = TRUE, used_at = $1 WHERE id = $2")
            .bind(now)
            .bind(token.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET email_verified = TRUE, updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(token.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn insert_password_reset_token(
        &self,
        token: &PasswordResetToken,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens
                (id, user_id, token_hash, created_at, expires_at, used, used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.used)
        .bind(token.used_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn consume_password_reset(
        &self,
        token_hash: &str,
        app_id: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            SELECT prt.* FROM password_reset_tokens prt
            JOIN users u ON prt.user_id = u.id
            WHERE prt.token_hash = $1
              AND prt.used = FALSE
              AND prt.expires_at > $2
              AND u.app_id = $3
            FOR UPDATE OF prt
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .bind(app_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(token) = token else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query("UPDATE password_reset_tokens SET used = TRUE, used_at = $1 WHERE id = $2")
            .bind(now)
            .bind(token.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(new_password_hash)
            .bind(now)
            .bind(token.user_id)
            .execute(&mut *tx)
            .await?;

        // Global logout on password change.
        sqlx::query(
            "UPDATE sessions SET revoked = TRUE, revoked_at = $1 WHERE user_id = $2 AND revoked = FALSE",
        )
        .bind(now)
        .bind(token.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions
                (id, user_id, app_id, refresh_token_hash, user_agent, ip_address,
                 created_at, expires_at, revoked, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.app_id)
        .bind(&session.refresh_token_hash)
        .bind(&session.user_agent)
        .bind(&session.ip_address)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.revoked)
        .bind(session.revoked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_active_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        app_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE id = $1 AND user_id = $2 AND app_id = $3
              AND revoked = FALSE AND expires_at > $4
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .bind(app_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn revoke_session(
        &self,
        session_id: Uuid,
        app_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET revoked = TRUE, revoked_at = $1
            WHERE id = $2 AND app_id = $3 AND revoked = FALSE
            "#,
        )
        .bind(now)
        .bind(session_id)
        .bind(app_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_sessions_for_user(&self, user_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let sessions = sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO api_keys
                (id, app_id, label, key_hash, created_at, last_used_at, revoked, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(key.id)
        .bind(&key.app_id)
        .bind(&key.label)
        .bind(&key.key_hash)
        .bind(key.created_at)
        .bind(key.last_used_at)
        .bind(key.revoked)
        .bind(key.revoked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_api_keys(&self, app_id: &str) -> Result<Vec<ApiKey>, StoreError> {
        let keys = sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys WHERE app_id = $1 ORDER BY created_at",
        )
        .bind(app_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn find_api_key(&self, id: Uuid, app_id: &str) -> Result<Option<ApiKey>, StoreError> {
        let key = sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys WHERE id = $1 AND app_id = $2",
        )
        .bind(id)
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn find_active_api_key(
        &self,
        key_hash: &str,
        app_id: &str,
    ) -> Result<Option<ApiKey>, StoreError> {
        let key = sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys WHERE key_hash = $1 AND app_id = $2 AND revoked = FALSE",
        )
        .bind(key_hash)
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn revoke_api_key(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_keys SET revoked = TRUE, revoked_at = $1 WHERE id = $2")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn touch_api_key(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_keys SET last_used_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_verification_tokens(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM email_verification_tokens WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn purge_reset_tokens(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn purge_revoked_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE revoked = TRUE AND revoked_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
