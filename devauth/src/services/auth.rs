//! Session/token lifecycle manager: signup, login, refresh, logout, email
//! verification, and password reset.
//!
//! State lives in the persistent store; each operation is one atomic
//! store-level transaction. Cross-request coordination (lockout counters)
//! goes through the shared counter store.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::dtos::auth::{LoginRequest, SignupRequest};
use crate::models::{Application, EmailVerificationToken, PasswordResetToken, Session, User};
use crate::services::email::EmailProvider;
use crate::services::error::ServiceError;
use crate::services::jwt::{JwtService, TokenKind};
use crate::services::rate_limit::BruteForceGuard;
use crate::services::store::AuthStore;
use crate::utils::{
    generate_secure_token, hash_password, hash_token, validate_password_strength, verify_password,
    verify_token_hash,
};

/// Byte length of one-time verification/reset tokens.
const ONE_TIME_TOKEN_BYTES: usize = 32;

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    mailer: Arc<dyn EmailProvider>,
    jwt: JwtService,
    guard: BruteForceGuard,
    refresh_token_expiry_days: i64,
    enforce_password_complexity: bool,
    /// Hash verified against when the user does not exist, so lookup misses
    /// and wrong passwords take the same time and produce the same error.
    fallback_hash: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        mailer: Arc<dyn EmailProvider>,
        jwt: JwtService,
        guard: BruteForceGuard,
        refresh_token_expiry_days: i64,
        enforce_password_complexity: bool,
    ) -> Result<Self, anyhow::Error> {
        let fallback_hash = hash_password(&generate_secure_token(ONE_TIME_TOKEN_BYTES))?;
        Ok(Self {
            store,
            mailer,
            jwt,
            guard,
            refresh_token_expiry_days,
            enforce_password_complexity,
            fallback_hash,
        })
    }

    /// Register a new end user under `app` and send a verification email.
    ///
    /// The email send is best-effort: a failed send is logged and never
    /// fails the signup.
    pub async fn signup(
        &self,
        app: &Application,
        req: SignupRequest,
    ) -> Result<User, ServiceError> {
        validate_password_strength(&req.password, self.enforce_password_complexity)
            .map_err(ServiceError::InvalidPassword)?;

        if self
            .store
            .find_user_by_email(&app.app_id, &req.email)
            .await?
            .is_some()
        {
            return Err(ServiceError::EmailExists);
        }

        let password_hash = hash_password(&req.password)?;
        let user = User::new(app.app_id.clone(), req.email, password_hash, req.metadata);

        let verification_token = generate_secure_token(ONE_TIME_TOKEN_BYTES);
        let token_record =
            EmailVerificationToken::new(user.id, hash_token(&verification_token));

        self.store
            .create_user_with_verification(&user, &token_record)
            .await?;

        tracing::info!(user_id = %user.id, app_id = %app.app_id, "User registered");

        if let Err(e) = self
            .mailer
            .send_verification_email(&user.email, &app.name, &verification_token)
            .await
        {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to send verification email");
        }

        Ok(user)
    }

    /// Confirm an email verification token.
    ///
    /// Hash match, unused, unexpired, and tenant scope must all hold; any
    /// miss is the same `InvalidToken`, so a caller cannot learn which
    /// condition failed.
    pub async fn verify_email(&self, app_id: &str, token: &str) -> Result<(), ServiceError> {
        let consumed = self
            .store
            .consume_email_verification(&hash_token(token), app_id, Utc::now())
            .await?;

        if !consumed {
            return Err(ServiceError::InvalidToken);
        }

        tracing::info!(app_id = %app_id, "Email verified");
        Ok(())
    }

    /// Issue a fresh verification token for a not-yet-verified user.
    ///
    /// Unknown emails are a silent no-op so this endpoint cannot be used to
    /// enumerate accounts.
    pub async fn request_email_verification(
        &self,
        app: &Application,
        email: &str,
    ) -> Result<(), ServiceError> {
        let Some(user) = self.store.find_user_by_email(&app.app_id, email).await? else {
            return Ok(());
        };

        if user.email_verified {
            return Err(ServiceError::AlreadyVerified);
        }

        let verification_token = generate_secure_token(ONE_TIME_TOKEN_BYTES);
        let token_record =
            EmailVerificationToken::new(user.id, hash_token(&verification_token));
        self.store
            .insert_email_verification_token(&token_record)
            .await?;

        if let Err(e) = self
            .mailer
            .send_verification_email(&user.email, &app.name, &verification_token)
            .await
        {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to send verification email");
        }

        Ok(())
    }

    /// Authenticate and open a session.
    ///
    /// Returns `(user, access_token, refresh_token)`. The refresh token
    /// embeds the session id and the session row stores the refresh token's
    /// hash, both established in the same insert.
    pub async fn login(
        &self,
        app: &Application,
        req: LoginRequest,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(User, String, String), ServiceError> {
        // Lockout short-circuits before any password work.
        if let Some(ip) = ip_address.as_deref() {
            if self.guard.check_lockout(&req.email, ip).await? {
                return Err(ServiceError::AccountLocked);
            }
        }

        let found = self
            .store
            .find_user_by_email(&app.app_id, &req.email)
            .await?;

        let user = match found {
            Some(user) if verify_password(&req.password, &user.password_hash) => user,
            other => {
                if other.is_none() {
                    // Equalize timing between "no such user" and "wrong
                    // password".
                    verify_password(&req.password, &self.fallback_hash);
                }
                if let Some(ip) = ip_address.as_deref() {
                    let (locked, remaining) =
                        self.guard.record_failed_attempt(&req.email, ip).await?;
                    tracing::warn!(
                        app_id = %app.app_id,
                        locked,
                        remaining,
                        "Failed login attempt"
                    );
                }
                return Err(ServiceError::InvalidCredentials);
            }
        };

        if let Some(ip) = ip_address.as_deref() {
            self.guard.clear_attempts(&req.email, ip).await?;
        }

        let now = Utc::now();
        self.store.update_last_login(user.id, now).await?;

        let access_token = self
            .jwt
            .issue_access_token(user.id, &app.app_id, &user.email)?;

        let session_id = Uuid::new_v4();
        let refresh_token = self
            .jwt
            .issue_refresh_token(user.id, &app.app_id, session_id)?;

        let session = Session::new_with_id(
            session_id,
            user.id,
            app.app_id.clone(),
            hash_token(&refresh_token),
            user_agent,
            ip_address,
            self.refresh_token_expiry_days,
        );
        self.store.insert_session(&session).await?;

        tracing::info!(user_id = %user.id, session_id = %session_id, "User logged in");

        let mut user = user;
        user.last_login_at = Some(now);

        Ok((user, access_token, refresh_token))
    }

    /// Mint a new access token from a refresh token.
    ///
    /// The presented token must verify, be of refresh kind, belong to this
    /// tenant, match a live session, and hash to exactly what that session
    /// stored - a leaked-but-superseded token fails the last check.
    pub async fn refresh(&self, app_id: &str, refresh_token: &str) -> Result<String, ServiceError> {
        let claims = self
            .jwt
            .verify(refresh_token)
            .ok_or(ServiceError::InvalidToken)?;
        if claims.kind != TokenKind::Refresh || claims.app_id != app_id {
            return Err(ServiceError::InvalidToken);
        }
        let session_id = claims.session_id.ok_or(ServiceError::InvalidToken)?;

        let session = self
            .store
            .find_active_session(session_id, claims.sub, app_id, Utc::now())
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        if !verify_token_hash(refresh_token, &session.refresh_token_hash) {
            tracing::warn!(user_id = %claims.sub, session_id = %session_id, "Refresh token hash mismatch");
            return Err(ServiceError::InvalidToken);
        }

        let user = self
            .store
            .find_user_by_id(claims.sub, app_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let access_token = self.jwt.issue_access_token(user.id, app_id, &user.email)?;

        // Refresh tokens are not rotated here; the session keeps its
        // lineage until logout, reset, or expiry.
        Ok(access_token)
    }

    /// Revoke the session behind a refresh token.
    ///
    /// An undecodable or wrong-kind token means there is nothing left to log
    /// out of, which is success, not an error.
    pub async fn logout(&self, app_id: &str, refresh_token: &str) -> Result<(), ServiceError> {
        let claims = match self.jwt.verify(refresh_token) {
            Some(claims) if claims.kind == TokenKind::Refresh => claims,
            _ => return Ok(()),
        };
        let Some(session_id) = claims.session_id else {
            return Ok(());
        };

        if self
            .store
            .revoke_session(session_id, app_id, Utc::now())
            .await?
        {
            tracing::info!(user_id = %claims.sub, session_id = %session_id, "User logged out");
        }

        Ok(())
    }

    /// Issue a password reset token; silent no-op for unknown emails.
    pub async fn request_password_reset(
        &self,
        app: &Application,
        email: &str,
    ) -> Result<(), ServiceError> {
        let Some(user) = self.store.find_user_by_email(&app.app_id, email).await? else {
            return Ok(());
        };

        let reset_token = generate_secure_token(ONE_TIME_TOKEN_BYTES);
        let token_record = PasswordResetToken::new(user.id, hash_token(&reset_token));
        self.store.insert_password_reset_token(&token_record).await?;

        tracing::info!(user_id = %user.id, "Password reset requested");

        if let Err(e) = self
            .mailer
            .send_password_reset_email(&user.email, &app.name, &reset_token)
            .await
        {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to send password reset email");
        }

        Ok(())
    }

    /// Consume a reset token, set the new password, and revoke every active
    /// session the user has (global logout on password change).
    pub async fn confirm_password_reset(
        &self,
        app_id: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        validate_password_strength(new_password, self.enforce_password_complexity)
            .map_err(ServiceError::InvalidPassword)?;

        let new_hash = hash_password(new_password)?;
        let consumed = self
            .store
            .consume_password_reset(&hash_token(token), app_id, &new_hash, Utc::now())
            .await?;

        if !consumed {
            return Err(ServiceError::InvalidToken);
        }

        tracing::info!(app_id = %app_id, "Password reset completed, sessions revoked");
        Ok(())
    }

    /// Report whether an access token is active for this tenant.
    pub async fn introspect(
        &self,
        app_id: &str,
        token: &str,
    ) -> Result<crate::dtos::auth::IntrospectionResponse, ServiceError> {
        use crate::dtos::auth::{IntrospectionResponse, IntrospectionUser};

        let Some(claims) = self.jwt.verify(token) else {
            return Ok(IntrospectionResponse::inactive());
        };
        if claims.kind != TokenKind::Access || claims.app_id != app_id {
            return Ok(IntrospectionResponse::inactive());
        }

        let Some(user) = self.store.find_user_by_id(claims.sub, app_id).await? else {
            return Ok(IntrospectionResponse::inactive());
        };

        Ok(IntrospectionResponse {
            active: true,
            user: Some(IntrospectionUser {
                id: user.id,
                email: user.email,
                app_id: user.app_id,
            }),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JwtConfig, DEFAULT_DEV_JWT_PRIVATE_KEY, DEFAULT_DEV_JWT_PUBLIC_KEY};
    use crate::dtos::auth::SignupRequest;
    use crate::models::AppEnvironment;
    use crate::services::counters::InMemoryCounterStore;
    use crate::services::email::MockMailer;
    use crate::services::memory::InMemoryStore;
    use std::time::Duration;

    struct Fixture {
        service: AuthService,
        store: Arc<InMemoryStore>,
        mailer: Arc<MockMailer>,
        app: Application,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let mailer = Arc::new(MockMailer::new());
        let jwt = JwtService::new(&JwtConfig {
            private_key: DEFAULT_DEV_JWT_PRIVATE_KEY.to_string(),
            public_key: DEFAULT_DEV_JWT_PUBLIC_KEY.to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        })
        .unwrap();
        let guard = BruteForceGuard::new(
            Arc::new(InMemoryCounterStore::new()),
            5,
            Duration::from_secs(900),
        );

        let service = AuthService::new(
            store.clone(),
            mailer.clone(),
            jwt,
            guard,
            7,
            false,
        )
        .unwrap();

        let app = Application::new(
            Uuid::new_v4(),
            "Test App".to_string(),
            AppEnvironment::Dev,
            "app_test".to_string(),
            "ciphertext".to_string(),
        );
        store.insert_application(&app).await.unwrap();

        Fixture {
            service,
            store,
            mailer,
            app,
        }
    }

    fn signup_req(email: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            password: "Passw0rd!".to_string(),
            metadata: None,
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_signup_conflicts() {
        let fx = fixture().await;

        fx.service
            .signup(&fx.app, signup_req("user@x.com"))
            .await
            .unwrap();
        let err = fx
            .service
            .signup(&fx.app, signup_req("user@x.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::EmailExists));
    }

    #[tokio::test]
    async fn weak_password_rejected_before_any_write() {
        let fx = fixture().await;

        let err = fx
            .service
            .signup(
                &fx.app,
                SignupRequest {
                    email: "user@x.com".to_string(),
                    password: "short".to_string(),
                    metadata: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidPassword(_)));
        assert!(fx
            .store
            .find_user_by_email("app_test", "user@x.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_err_identically() {
        let fx = fixture().await;
        fx.service
            .signup(&fx.app, signup_req("user@x.com"))
            .await
            .unwrap();

        let missing = fx
            .service
            .login(&fx.app, login_req("ghost@x.com", "Passw0rd!"), None, None)
            .await
            .unwrap_err();
        let wrong = fx
            .service
            .login(&fx.app, login_req("user@x.com", "Wrong0rd!"), None, None)
            .await
            .unwrap_err();

        assert!(matches!(missing, ServiceError::InvalidCredentials));
        assert!(matches!(wrong, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_records_session_hash_matching_token() {
        let fx = fixture().await;
        fx.service
            .signup(&fx.app, signup_req("user@x.com"))
            .await
            .unwrap();

        let (user, _access, refresh) = fx
            .service
            .login(&fx.app, login_req("user@x.com", "Passw0rd!"), None, None)
            .await
            .unwrap();

        let sessions = fx.store.list_sessions_for_user(user.id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(verify_token_hash(&refresh, &sessions[0].refresh_token_hash));
        assert!(user.last_login_at.is_some());
    }

    #[tokio::test]
    async fn refresh_rejects_cross_tenant_token() {
        let fx = fixture().await;
        fx.service
            .signup(&fx.app, signup_req("user@x.com"))
            .await
            .unwrap();
        let (_, _, refresh) = fx
            .service
            .login(&fx.app, login_req("user@x.com", "Passw0rd!"), None, None)
            .await
            .unwrap();

        let err = fx.service.refresh("other_app", &refresh).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken));
    }

    #[tokio::test]
    async fn refresh_rejects_superseded_token_hash() {
        let fx = fixture().await;
        fx.service
            .signup(&fx.app, signup_req("user@x.com"))
            .await
            .unwrap();
        let (user, _, refresh) = fx
            .service
            .login(&fx.app, login_req("user@x.com", "Passw0rd!"), None, None)
            .await
            .unwrap();

        // Simulate the session moving on to a different token.
        let sessions = fx.store.list_sessions_for_user(user.id).await.unwrap();
        let mut superseded = sessions[0].clone();
        superseded.refresh_token_hash = hash_token("a different token");
        fx.store.insert_session(&superseded).await.unwrap();

        let err = fx.service.refresh("app_test", &refresh).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken));
    }

    #[tokio::test]
    async fn logout_of_garbage_token_is_success() {
        let fx = fixture().await;
        assert!(fx.service.logout("app_test", "garbage").await.is_ok());
    }

    #[tokio::test]
    async fn signup_then_verify_marks_user_verified() {
        let fx = fixture().await;

        let user = fx
            .service
            .signup(&fx.app, signup_req("user@x.com"))
            .await
            .unwrap();
        let token = fx.mailer.last_verification_token().unwrap();

        fx.service.verify_email("app_test", &token).await.unwrap();
        let user = fx
            .store
            .find_user_by_id(user.id, "app_test")
            .await
            .unwrap()
            .unwrap();
        assert!(user.email_verified);
    }

    #[tokio::test]
    async fn resend_verification_is_silent_for_unknown_email() {
        let fx = fixture().await;
        fx.service
            .request_email_verification(&fx.app, "ghost@x.com")
            .await
            .unwrap();
        assert!(fx.mailer.last_verification_token().is_none());
    }
}
