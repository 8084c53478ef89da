//! Outbound transactional email: verification and password-reset messages.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use service_core::error::AppError;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmtpConfig;

const MAX_SEND_ATTEMPTS: u32 = 3;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_verification_email(
        &self,
        to_email: &str,
        app_name: &str,
        verification_token: &str,
    ) -> Result<(), AppError>;

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        app_name: &str,
        reset_token: &str,
    ) -> Result<(), AppError>;
}

/// SMTP mailer built on lettre.
///
/// Sends run on the blocking thread pool and retry with exponential backoff
/// before reporting failure; callers treat a failed send as a logged,
/// non-fatal event.
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: SmtpTransport,
    from_email: String,
    frontend_base_url: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| AppError::Email(e.to_string()))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.from_email.clone(),
            frontend_base_url: config.frontend_base_url.clone(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: &str,
        html_body: &str,
    ) -> Result<(), AppError> {
        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| AppError::Email(e.to_string()))?,
            )
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| AppError::Email(e.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| AppError::Email(e.to_string()))?;

        for attempt in 1..=MAX_SEND_ATTEMPTS {
            // Blocking transport; keep it off the async runtime.
            let mailer = self.mailer.clone();
            let message = email.clone();
            let result = tokio::task::spawn_blocking(move || mailer.send(&message))
                .await
                .map_err(|e| AppError::Internal(e.into()))?;

            match result {
                Ok(_) => {
                    tracing::info!(to = %to_email, subject = %subject, "Email sent");
                    return Ok(());
                }
                Err(e) if attempt < MAX_SEND_ATTEMPTS => {
                    tracing::warn!(
                        to = %to_email,
                        attempt,
                        error = %e,
                        "Email send attempt failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(1 << (attempt - 1))).await;
                }
                Err(e) => {
                    tracing::error!(
                        to = %to_email,
                        attempts = MAX_SEND_ATTEMPTS,
                        error = %e,
                        "Failed to send email"
                    );
                    return Err(AppError::Email(e.to_string()));
                }
            }
        }

        Err(AppError::Email("send retries exhausted".to_string()))
    }
}

#[async_trait]
impl EmailProvider for SmtpMailer {
    async fn send_verification_email(
        &self,
        to_email: &str,
        app_name: &str,
        verification_token: &str,
    ) -> Result<(), AppError> {
        let verification_url = format!(
            "{}/verify-email?token={}",
            self.frontend_base_url, verification_token
        );

        let subject = format!("Verify your email for {}", app_name);
        let html_body = format!(
            r#"<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #4A90E2;">Verify Your Email</h1>
    <p>Thank you for signing up for {app_name}!</p>
    <p>Please click the button below to verify your email address:</p>
    <p style="text-align: center; margin: 30px 0;">
      <a href="{url}" style="background-color: #4A90E2; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px; display: inline-block;">Verify Email</a>
    </p>
    <p>Or copy and paste this link into your browser:</p>
    <p style="word-break: break-all; color: #666;">{url}</p>
    <p style="color: #999; font-size: 12px; margin-top: 30px;">
      This link will expire in 48 hours. If you didn't create an account, please ignore this email.
    </p>
  </div>
</body>
</html>"#,
            app_name = app_name,
            url = verification_url
        );
        let plain_body = format!(
            "Thank you for signing up for {}!\n\nPlease visit the following link to verify your email address:\n\n{}\n\nThis link will expire in 48 hours. If you didn't create an account, please ignore this email.",
            app_name, verification_url
        );

        self.send_email(to_email, &subject, &plain_body, &html_body)
            .await
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        app_name: &str,
        reset_token: &str,
    ) -> Result<(), AppError> {
        let reset_url = format!(
            "{}/reset-password?token={}",
            self.frontend_base_url, reset_token
        );

        let subject = format!("Reset your password for {}", app_name);
        let html_body = format!(
            r#"<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #4A90E2;">Reset Your Password</h1>
    <p>We received a request to reset your password for {app_name}.</p>
    <p>Click the button below to reset your password:</p>
    <p style="text-align: center; margin: 30px 0;">
      <a href="{url}" style="background-color: #4A90E2; color: white; padding: 12px 24px; text-decoration: none; border-radius: 4px; display: inline-block;">Reset Password</a>
    </p>
    <p>Or copy and paste this link into your browser:</p>
    <p style="word-break: break-all; color: #666;">{url}</p>
    <p style="color: #999; font-size: 12px; margin-top: 30px;">
      This link will expire in 1 hour. If you didn't request a password reset, please ignore this email.
    </p>
  </div>
</body>
</html>"#,
            app_name = app_name,
            url = reset_url
        );
        let plain_body = format!(
            "We received a request to reset your password for {}.\n\nPlease visit the following link to set a new password:\n\n{}\n\nThis link will expire in 1 hour. If you didn't request a password reset, please ignore this email.",
            app_name, reset_url
        );

        self.send_email(to_email, &subject, &plain_body, &html_body)
            .await
    }
}

/// One recorded outbound message.
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub app_name: String,
    pub token: String,
}

/// Recording mailer for tests: captures the plaintext tokens instead of
/// delivering anything.
#[derive(Default)]
pub struct MockMailer {
    pub verifications: Mutex<Vec<SentEmail>>,
    pub password_resets: Mutex<Vec<SentEmail>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_verification_token(&self) -> Option<String> {
        self.verifications
            .lock()
            .ok()?
            .last()
            .map(|m| m.token.clone())
    }

    pub fn last_reset_token(&self) -> Option<String> {
        self.password_resets
            .lock()
            .ok()?
            .last()
            .map(|m| m.token.clone())
    }
}

#[async_trait]
impl EmailProvider for MockMailer {
    async fn send_verification_email(
        &self,
        to_email: &str,
        app_name: &str,
        verification_token: &str,
    ) -> Result<(), AppError> {
        self.verifications
            .lock()
            .map_err(|_| AppError::Email("mock mailer mutex poisoned".to_string()))?
            .push(SentEmail {
                to: to_email.to_string(),
                app_name: app_name.to_string(),
                token: verification_token.to_string(),
            });
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        app_name: &str,
        reset_token: &str,
    ) -> Result<(), AppError> {
        self.password_resets
            .lock()
            .map_err(|_| AppError::Email("mock mailer mutex poisoned".to_string()))?
            .push(SentEmail {
                to: to_email.to_string(),
                app_name: app_name.to_string(),
                token: reset_token.to_string(),
            });
        Ok(())
    }
}
