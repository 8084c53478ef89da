pub mod api_keys;
pub mod auth;
pub mod cleanup;
pub mod counters;
pub mod email;
pub mod error;
pub mod jwt;
pub mod memory;
pub mod portal;
pub mod rate_limit;
pub mod secrets;
pub mod store;

pub use api_keys::ApiKeyService;
pub use auth::AuthService;
pub use cleanup::CleanupService;
pub use counters::{CounterError, CounterStore, InMemoryCounterStore, RedisCounterStore};
pub use email::{EmailProvider, MockMailer, SmtpMailer};
pub use error::ServiceError;
pub use jwt::{JwtService, TokenClaims, TokenKind};
pub use memory::InMemoryStore;
pub use portal::{PortalService, PORTAL_APP_ID};
pub use rate_limit::{BruteForceGuard, RateDecision, RateLimiter};
pub use secrets::{SecretCipher, SecretCipherError};
pub use store::{AuthStore, PgStore, StoreError};
