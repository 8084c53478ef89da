pub mod password;
pub mod token;
pub mod validation;

pub use password::{hash_password, validate_password_strength, verify_password};
pub use token::{generate_api_key, generate_secure_token, hash_token, verify_token_hash};
pub use validation::ValidatedJson;
