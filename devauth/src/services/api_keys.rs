//! API key management and machine-caller authentication.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{ApiKey, Application};
use crate::services::error::ServiceError;
use crate::services::store::AuthStore;
use crate::utils::{generate_api_key, hash_token};

#[derive(Clone)]
pub struct ApiKeyService {
    store: Arc<dyn AuthStore>,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    /// Create a key for an application the developer owns. Returns the row
    /// and the plaintext key, which is shown exactly once.
    pub async fn create_key(
        &self,
        developer_id: Uuid,
        app_id: &str,
        label: Option<String>,
    ) -> Result<(ApiKey, String), ServiceError> {
        self.store
            .find_application_for_developer(app_id, developer_id)
            .await?
            .ok_or(ServiceError::ApplicationNotFound)?;

        let (plaintext, key_hash) = generate_api_key();
        let api_key = ApiKey::new(app_id.to_string(), label, key_hash);
        self.store.insert_api_key(&api_key).await?;

        tracing::info!(app_id = %app_id, key_id = %api_key.id, "API key created");
        Ok((api_key, plaintext))
    }

    pub async fn list_keys(
        &self,
        developer_id: Uuid,
        app_id: &str,
    ) -> Result<Vec<ApiKey>, ServiceError> {
        self.store
            .find_application_for_developer(app_id, developer_id)
            .await?
            .ok_or(ServiceError::ApplicationNotFound)?;

        Ok(self.store.list_api_keys(app_id).await?)
    }

    pub async fn revoke_key(
        &self,
        developer_id: Uuid,
        app_id: &str,
        key_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.store
            .find_application_for_developer(app_id, developer_id)
            .await?
            .ok_or(ServiceError::ApplicationNotFound)?;

        let key = self
            .store
            .find_api_key(key_id, app_id)
            .await?
            .ok_or(ServiceError::ApiKeyNotFound)?;

        if key.revoked {
            return Err(ServiceError::AlreadyRevoked);
        }

        self.store.revoke_api_key(key.id, Utc::now()).await?;
        tracing::info!(app_id = %app_id, key_id = %key_id, "API key revoked");
        Ok(())
    }

    /// Authenticate a machine caller by `(app_id, api_key)`.
    ///
    /// Only the key's hash is ever compared against storage. A revoked or
    /// unknown key and an unknown application all fail the same way.
    pub async fn authenticate(
        &self,
        app_id: &str,
        presented_key: &str,
    ) -> Result<Application, ServiceError> {
        let key_hash = hash_token(presented_key);
        let key = self
            .store
            .find_active_api_key(&key_hash, app_id)
            .await?
            .ok_or(ServiceError::InvalidApiKey)?;

        self.store.touch_api_key(key.id, Utc::now()).await?;

        self.store
            .find_application_by_app_id(app_id)
            .await?
            .ok_or(ServiceError::InvalidApiKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppEnvironment;
    use crate::services::memory::InMemoryStore;

    async fn fixture() -> (ApiKeyService, Arc<InMemoryStore>, Application, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let developer_id = Uuid::new_v4();
        let developer = crate::models::Developer::new(
            "dev@example.com".to_string(),
            "hash".to_string(),
            None,
        );
        let developer = crate::models::Developer {
            id: developer_id,
            ..developer
        };
        store.insert_developer(&developer).await.unwrap();

        let application = Application::new(
            developer_id,
            "My App".to_string(),
            AppEnvironment::Dev,
            "app_test".to_string(),
            "ciphertext".to_string(),
        );
        store.insert_application(&application).await.unwrap();

        (
            ApiKeyService::new(store.clone()),
            store,
            application,
            developer_id,
        )
    }

    #[tokio::test]
    async fn authenticate_accepts_active_key_and_touches_it() {
        let (service, store, application, developer_id) = fixture().await;
        let (key, plaintext) = service
            .create_key(developer_id, &application.app_id, Some("backend".to_string()))
            .await
            .unwrap();

        let authed = service
            .authenticate(&application.app_id, &plaintext)
            .await
            .unwrap();
        assert_eq!(authed.app_id, application.app_id);

        let stored = store
            .find_api_key(key.id, &application.app_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.last_used_at.is_some());
    }

    #[tokio::test]
    async fn authenticate_rejects_revoked_key() {
        let (service, _, application, developer_id) = fixture().await;
        let (key, plaintext) = service
            .create_key(developer_id, &application.app_id, None)
            .await
            .unwrap();

        service
            .revoke_key(developer_id, &application.app_id, key.id)
            .await
            .unwrap();

        let err = service
            .authenticate(&application.app_id, &plaintext)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidApiKey));
    }

    #[tokio::test]
    async fn revoking_twice_reports_already_revoked() {
        let (service, _, application, developer_id) = fixture().await;
        let (key, _) = service
            .create_key(developer_id, &application.app_id, None)
            .await
            .unwrap();

        service
            .revoke_key(developer_id, &application.app_id, key.id)
            .await
            .unwrap();
        let err = service
            .revoke_key(developer_id, &application.app_id, key.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyRevoked));
    }

    #[tokio::test]
    async fn key_scoped_to_its_application() {
        let (service, store, application, developer_id) = fixture().await;
        let other = Application::new(
            developer_id,
            "Other App".to_string(),
            AppEnvironment::Dev,
            "app_other".to_string(),
            "ciphertext".to_string(),
        );
        store.insert_application(&other).await.unwrap();

        let (_, plaintext) = service
            .create_key(developer_id, &application.app_id, None)
            .await
            .unwrap();

        let err = service
            .authenticate("app_other", &plaintext)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidApiKey));
    }
}
