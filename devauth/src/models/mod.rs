pub mod api_key;
pub mod application;
pub mod developer;
pub mod session;
pub mod user;
pub mod verification;

pub use api_key::ApiKey;
pub use application::{AppEnvironment, Application};
pub use developer::Developer;
pub use session::Session;
pub use user::User;
pub use verification::{EmailVerificationToken, PasswordResetToken};
