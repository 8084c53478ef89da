//! In-memory implementation of [`AuthStore`] for tests and local harnesses.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{
    ApiKey, Application, Developer, EmailVerificationToken, PasswordResetToken, Session, User,
};
use crate::services::store::{AuthStore, StoreError};

#[derive(Default)]
struct Inner {
    developers: HashMap<Uuid, Developer>,
    applications: HashMap<Uuid, Application>,
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Session>,
    api_keys: HashMap<Uuid, ApiKey>,
    verification_tokens: HashMap<Uuid, EmailVerificationToken>,
    reset_tokens: HashMap<Uuid, PasswordResetToken>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Internal("store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl AuthStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    async fn insert_developer(&self, developer: &Developer) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.developers.insert(developer.id, developer.clone());
        Ok(())
    }

    async fn find_developer_by_email(&self, email: &str) -> Result<Option<Developer>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .developers
            .values()
            .find(|d| d.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_developer_by_id(&self, id: Uuid) -> Result<Option<Developer>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.developers.get(&id).cloned())
    }

    async fn insert_application(&self, application: &Application) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner
            .applications
            .insert(application.id, application.clone());
        Ok(())
    }

    async fn find_application_by_app_id(
        &self,
        app_id: &str,
    ) -> Result<Option<Application>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .applications
            .values()
            .find(|a| a.app_id == app_id)
            .cloned())
    }

    async fn find_application_for_developer(
        &self,
        app_id: &str,
        developer_id: Uuid,
    ) -> Result<Option<Application>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .applications
            .values()
            .find(|a| a.app_id == app_id && a.developer_id == developer_id)
            .cloned())
    }

    async fn list_applications(&self, developer_id: Uuid) -> Result<Vec<Application>, StoreError> {
        let inner = self.lock()?;
        let mut apps: Vec<Application> = inner
            .applications
            .values()
            .filter(|a| a.developer_id == developer_id)
            .cloned()
            .collect();
        apps.sort_by_key(|a| a.created_at);
        Ok(apps)
    }

    async fn delete_application(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let Some(application) = inner.applications.remove(&id) else {
            return Ok(());
        };

        // Cascade, as the foreign keys would.
        let app_id = application.app_id;
        let user_ids: Vec<Uuid> = inner
            .users
            .values()
            .filter(|u| u.app_id == app_id)
            .map(|u| u.id)
            .collect();
        inner.users.retain(|_, u| u.app_id != app_id);
        inner.sessions.retain(|_, s| s.app_id != app_id);
        inner.api_keys.retain(|_, k| k.app_id != app_id);
        inner
            .verification_tokens
            .retain(|_, t| !user_ids.contains(&t.user_id));
        inner
            .reset_tokens
            .retain(|_, t| !user_ids.contains(&t.user_id));
        Ok(())
    }

    async fn find_user_by_email(
        &self,
        app_id: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .values()
            .find(|u| u.app_id == app_id && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid, app_id: &str) -> Result<Option<User>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .get(&id)
            .filter(|u| u.app_id == app_id)
            .cloned())
    }

    async fn create_user_with_verification(
        &self,
        user: &User,
        token: &EmailVerificationToken,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.users.insert(user.id, user.clone());
        inner.verification_tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn update_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.last_login_at = Some(at);
            user.updated_at = at;
        }
        Ok(())
    }

    async fn insert_email_verification_token(
        &self,
        token: &EmailVerificationToken,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.verification_tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn consume_email_verification(
        &self,
        token_hash: &str,
        app_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;

        let token_id = inner.verification_tokens.values().find_map(|t| {
            let owner = inner.users.get(&t.user_id)?;
            (t.token_hash == token_hash && t.is_usable(now) && owner.app_id == app_id)
                .then_some(t.id)
        });
        let Some(token_id) = token_id else {
            return Ok(false);
        };

        let Some(token) = inner.verification_tokens.get_mut(&token_id) else {
            return Ok(false);
        };
        token.used = true;
        token.used_at = Some(now);
        let user_id = token.user_id;

        if let Some(user) = inner.users.get_mut(&user_id) {
            user.email_verified = true;
            user.updated_at = now;
        }
        Ok(true)
    }

    async fn insert_password_reset_token(
        &self,
        token: &PasswordResetToken,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.reset_tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn consume_password_reset(
        &self,
        token_hash: &str,
        app_id: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;

        let token_id = inner.reset_tokens.values().find_map(|t| {
            let owner = inner.users.get(&t.user_id)?;
            (t.token_hash == token_hash && t.is_usable(now) && owner.app_id == app_id)
                .then_some(t.id)
        });
        let Some(token_id) = token_id else {
            return Ok(false);
        };

        let Some(token) = inner.reset_tokens.get_mut(&token_id) else {
            return Ok(false);
        };
        token.used = true;
        token.used_at = Some(now);
        let user_id = token.user_id;

        if let Some(user) = inner.users.get_mut(&user_id) {
            user.password_hash = new_password_hash.to_string();
            user.updated_at = now;
        }
        for session in inner.sessions.values_mut() {
            if session.user_id == user_id && !session.revoked {
                session.revoked = true;
                session.revoked_at = Some(now);
            }
        }
        Ok(true)
    }

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_active_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        app_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .sessions
            .get(&session_id)
            .filter(|s| {
                s.user_id == user_id && s.app_id == app_id && !s.revoked && s.expires_at > now
            })
            .cloned())
    }

    async fn revoke_session(
        &self,
        session_id: Uuid,
        app_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        match inner.sessions.get_mut(&session_id) {
            Some(session) if session.app_id == app_id && !session.revoked => {
                session.revoked = true;
                session.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_sessions_for_user(&self, user_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let inner = self.lock()?;
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.api_keys.insert(key.id, key.clone());
        Ok(())
    }

    async fn list_api_keys(&self, app_id: &str) -> Result<Vec<ApiKey>, StoreError> {
        let inner = self.lock()?;
        let mut keys: Vec<ApiKey> = inner
            .api_keys
            .values()
            .filter(|k| k.app_id == app_id)
            .cloned()
            .collect();
        keys.sort_by_key(|k| k.created_at);
        Ok(keys)
    }

    async fn find_api_key(&self, id: Uuid, app_id: &str) -> Result<Option<ApiKey>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .api_keys
            .get(&id)
            .filter(|k| k.app_id == app_id)
            .cloned())
    }

    async fn find_active_api_key(
        &self,
        key_hash: &str,
        app_id: &str,
    ) -> Result<Option<ApiKey>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .api_keys
            .values()
            .find(|k| k.key_hash == key_hash && k.app_id == app_id && !k.revoked)
            .cloned())
    }

    async fn revoke_api_key(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(key) = inner.api_keys.get_mut(&id) {
            key.revoked = true;
            key.revoked_at = Some(now);
        }
        Ok(())
    }

    async fn touch_api_key(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(key) = inner.api_keys.get_mut(&id) {
            key.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn purge_verification_tokens(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.verification_tokens.len();
        inner
            .verification_tokens
            .retain(|_, t| t.expires_at >= cutoff);
        Ok((before - inner.verification_tokens.len()) as u64)
    }

    async fn purge_reset_tokens(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.reset_tokens.len();
        inner.reset_tokens.retain(|_, t| t.expires_at >= cutoff);
        Ok((before - inner.reset_tokens.len()) as u64)
    }

    async fn purge_revoked_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|_, s| !(s.revoked && s.revoked_at.map_or(false, |at| at < cutoff)));
        Ok((before - inner.sessions.len()) as u64)
    }
}
