//! JWT issuance and verification.
//!
//! Tokens are signed RS256 with the private key and verified with the public
//! key, so verification can be delegated to other services without handing
//! out signing capability.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

/// Token kind carried in the `type` claim.
///
/// The verifier does not enforce kind; callers presented with a token must
/// branch on this claim themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims for both token kinds.
///
/// Access tokens carry `email`; refresh tokens carry `session_id`. Absent
/// claims are omitted from the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user id.
    pub sub: Uuid,
    /// Tenant the token is scoped to.
    pub app_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub kind: TokenKind,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

impl JwtService {
    /// Create the service from base64-encoded PEM key material.
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let private_pem = STANDARD
            .decode(&config.private_key)
            .map_err(|e| anyhow::anyhow!("JWT_PRIVATE_KEY is not valid base64: {}", e))?;
        let encoding_key = EncodingKey::from_rsa_pem(&private_pem)
            .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?;

        let public_pem = STANDARD
            .decode(&config.public_key)
            .map_err(|e| anyhow::anyhow!("JWT_PUBLIC_KEY is not valid base64: {}", e))?;
        let decoding_key = DecodingKey::from_rsa_pem(&public_pem)
            .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        })
    }

    /// Issue a short-lived access token.
    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        app_id: &str,
        email: &str,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id,
            app_id: app_id.to_string(),
            email: Some(email.to_string()),
            session_id: None,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.access_token_expiry_minutes)).timestamp(),
            kind: TokenKind::Access,
        };
        self.sign(&claims)
    }

    /// Issue a refresh token tied to one session lineage.
    pub fn issue_refresh_token(
        &self,
        user_id: Uuid,
        app_id: &str,
        session_id: Uuid,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id,
            app_id: app_id.to_string(),
            email: None,
            session_id: Some(session_id),
            iat: now.timestamp(),
            exp: (now + Duration::days(self.refresh_token_expiry_days)).timestamp(),
            kind: TokenKind::Refresh,
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, anyhow::Error> {
        let header = Header::new(Algorithm::RS256);
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode token: {}", e))
    }

    /// Verify signature and expiry.
    ///
    /// Fails closed: any failure is `None`, with no detail about which check
    /// tripped. Callers must branch on `None` explicitly.
    pub fn verify(&self, token: &str) -> Option<TokenClaims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Decode without verifying the signature, for debugging and logging
    /// only. Never an input to an authorization decision.
    pub fn decode_unverified(token: &str) -> Option<TokenClaims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;

        decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .map(|data| data.claims)
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}
