use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with Argon2id.
///
/// A fresh random salt is generated per call and embedded in the PHC output
/// string, so two hashes of the same password never match.
pub fn hash_password(password: &str) -> Result<String, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {}", e))?
        .to_string();

    Ok(hash)
}

/// Verify a password against a stored PHC hash string.
///
/// The underlying verifier compares digests in constant time; a malformed
/// stored hash counts as a failed verification rather than an error so the
/// caller has a single rejection path.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Validate password strength.
///
/// Length is always enforced. The complexity rule (lower + upper + digit +
/// symbol) only applies when `enforce_complexity` is on; it ships disabled
/// pending a product decision.
pub fn validate_password_strength(password: &str, enforce_complexity: bool) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    if enforce_complexity && !meets_complexity_rules(password) {
        return Err(
            "Password must contain at least one uppercase letter, one lowercase letter, \
             one number, and one special character"
                .to_string(),
        );
    }

    Ok(())
}

fn meets_complexity_rules(password: &str) -> bool {
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| "@$!%*?&".contains(c));
    has_lower && has_upper && has_digit && has_symbol
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("mySecurePassword123").expect("hashing failed");

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("mySecurePassword123", &hash));
        assert!(!verify_password("wrongPassword", &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        let hash1 = hash_password("correct horse battery").unwrap();
        let hash2 = hash_password("correct horse battery").unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password("correct horse battery", &hash1));
        assert!(verify_password("correct horse battery", &hash2));
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(!verify_password("whatever", "not-a-phc-string"));
    }

    #[test]
    fn strength_enforces_minimum_length() {
        assert!(validate_password_strength("short", false).is_err());
        assert!(validate_password_strength("longenough", false).is_ok());
    }

    #[test]
    fn complexity_only_applies_when_enabled() {
        // Plain lowercase passes with complexity off, fails with it on.
        assert!(validate_password_strength("alllowercase", false).is_ok());
        assert!(validate_password_strength("alllowercase", true).is_err());
        assert!(validate_password_strength("Passw0rd!", true).is_ok());
    }
}
