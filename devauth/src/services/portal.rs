//! Developer portal: developer accounts and application management.

use std::sync::Arc;
use uuid::Uuid;

use crate::dtos::portal::{CreateApplicationRequest, DeveloperLoginRequest, DeveloperSignupRequest};
use crate::models::{Application, Developer};
use crate::services::error::ServiceError;
use crate::services::jwt::JwtService;
use crate::services::secrets::SecretCipher;
use crate::services::store::AuthStore;
use crate::utils::{
    generate_secure_token, hash_password, validate_password_strength, verify_password,
};

/// Pseudo tenant id carried by portal access tokens.
pub const PORTAL_APP_ID: &str = "portal";

/// Length of the public application identifier.
const APP_ID_CHARS: usize = 32;
/// Byte length of the generated application secret.
const APP_SECRET_BYTES: usize = 48;

#[derive(Clone)]
pub struct PortalService {
    store: Arc<dyn AuthStore>,
    jwt: JwtService,
    cipher: SecretCipher,
    enforce_password_complexity: bool,
}

impl PortalService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        jwt: JwtService,
        cipher: SecretCipher,
        enforce_password_complexity: bool,
    ) -> Self {
        Self {
            store,
            jwt,
            cipher,
            enforce_password_complexity,
        }
    }

    pub async fn developer_signup(
        &self,
        req: DeveloperSignupRequest,
    ) -> Result<Developer, ServiceError> {
        validate_password_strength(&req.password, self.enforce_password_complexity)
            .map_err(ServiceError::InvalidPassword)?;

        if self
            .store
            .find_developer_by_email(&req.email)
            .await?
            .is_some()
        {
            return Err(ServiceError::EmailExists);
        }

        let developer = Developer::new(req.email, hash_password(&req.password)?, req.name);
        self.store.insert_developer(&developer).await?;

        tracing::info!(developer_id = %developer.id, "Developer registered");
        Ok(developer)
    }

    /// Authenticate a developer and issue a portal access token.
    pub async fn developer_login(
        &self,
        req: DeveloperLoginRequest,
    ) -> Result<(Developer, String), ServiceError> {
        let developer = self
            .store
            .find_developer_by_email(&req.email)
            .await?
            .filter(|d| verify_password(&req.password, &d.password_hash))
            .ok_or(ServiceError::InvalidCredentials)?;

        let access_token =
            self.jwt
                .issue_access_token(developer.id, PORTAL_APP_ID, &developer.email)?;

        Ok((developer, access_token))
    }

    /// Create an application, returning the row and the plaintext secret.
    /// The secret is persisted only as ciphertext and shown exactly once.
    pub async fn create_application(
        &self,
        developer_id: Uuid,
        req: CreateApplicationRequest,
    ) -> Result<(Application, String), ServiceError> {
        if self
            .store
            .find_developer_by_id(developer_id)
            .await?
            .is_none()
        {
            return Err(ServiceError::DeveloperNotFound);
        }

        let mut app_id = generate_secure_token(APP_ID_CHARS);
        app_id.truncate(APP_ID_CHARS);
        let app_secret = generate_secure_token(APP_SECRET_BYTES);
        let app_secret_encrypted = self
            .cipher
            .encrypt(&app_secret)
            .map_err(|e| ServiceError::Internal(e.into()))?;

        let application = Application::new(
            developer_id,
            req.name,
            req.environment,
            app_id,
            app_secret_encrypted,
        );
        self.store.insert_application(&application).await?;

        tracing::info!(
            developer_id = %developer_id,
            app_id = %application.app_id,
            "Application created"
        );

        Ok((application, app_secret))
    }

    pub async fn list_applications(
        &self,
        developer_id: Uuid,
    ) -> Result<Vec<Application>, ServiceError> {
        Ok(self.store.list_applications(developer_id).await?)
    }

    pub async fn get_application(
        &self,
        developer_id: Uuid,
        app_id: &str,
    ) -> Result<Application, ServiceError> {
        self.store
            .find_application_for_developer(app_id, developer_id)
            .await?
            .ok_or(ServiceError::ApplicationNotFound)
    }

    /// Delete an application; the store cascades to its users, sessions,
    /// keys, and tokens.
    pub async fn delete_application(
        &self,
        developer_id: Uuid,
        app_id: &str,
    ) -> Result<(), ServiceError> {
        let application = self.get_application(developer_id, app_id).await?;
        self.store.delete_application(application.id).await?;

        tracing::info!(app_id = %app_id, "Application deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JwtConfig, DEFAULT_DEV_JWT_PRIVATE_KEY, DEFAULT_DEV_JWT_PUBLIC_KEY};
    use crate::models::AppEnvironment;
    use crate::services::memory::InMemoryStore;

    const TEST_KEY: &str = "MDEyMzQ1Njc4OUFCQ0RFRjAxMjM0NTY3ODlBQkNERUY=";

    fn service() -> (PortalService, Arc<InMemoryStore>, SecretCipher) {
        let store = Arc::new(InMemoryStore::new());
        let jwt = JwtService::new(&JwtConfig {
            private_key: DEFAULT_DEV_JWT_PRIVATE_KEY.to_string(),
            public_key: DEFAULT_DEV_JWT_PUBLIC_KEY.to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        })
        .unwrap();
        let cipher = SecretCipher::new(TEST_KEY).unwrap();
        (
            PortalService::new(store.clone(), jwt, cipher.clone(), false),
            store,
            cipher,
        )
    }

    fn signup_req() -> DeveloperSignupRequest {
        DeveloperSignupRequest {
            email: "dev@example.com".to_string(),
            password: "Passw0rd!".to_string(),
            name: Some("Dev".to_string()),
        }
    }

    #[tokio::test]
    async fn application_secret_is_stored_encrypted_and_recoverable() {
        let (portal, store, cipher) = service();
        let developer = portal.developer_signup(signup_req()).await.unwrap();

        let (application, plaintext_secret) = portal
            .create_application(
                developer.id,
                CreateApplicationRequest {
                    name: "My App".to_string(),
                    environment: AppEnvironment::Dev,
                },
            )
            .await
            .unwrap();

        assert_eq!(application.app_id.len(), APP_ID_CHARS);
        let stored = store
            .find_application_by_app_id(&application.app_id)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.app_secret_encrypted, plaintext_secret);
        assert_eq!(
            cipher.decrypt(&stored.app_secret_encrypted).unwrap(),
            plaintext_secret
        );
    }

    #[tokio::test]
    async fn login_issues_portal_scoped_token() {
        let (portal, _, _) = service();
        portal.developer_signup(signup_req()).await.unwrap();

        let (developer, token) = portal
            .developer_login(DeveloperLoginRequest {
                email: "dev@example.com".to_string(),
                password: "Passw0rd!".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(developer.email, "dev@example.com");
        assert!(!token.is_empty());
    }

    #[tokio::test]
    async fn deleting_application_requires_ownership() {
        let (portal, _, _) = service();
        let owner = portal.developer_signup(signup_req()).await.unwrap();
        let (application, _) = portal
            .create_application(
                owner.id,
                CreateApplicationRequest {
                    name: "My App".to_string(),
                    environment: AppEnvironment::Dev,
                },
            )
            .await
            .unwrap();

        let err = portal
            .delete_application(Uuid::new_v4(), &application.app_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ApplicationNotFound));

        portal
            .delete_application(owner.id, &application.app_id)
            .await
            .unwrap();
    }
}
