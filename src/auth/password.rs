/// Password Hashing and Verification
///
/// One-way, salted bcrypt hashing. Verification never fails loudly: a
/// malformed stored hash is just a mismatch.

use bcrypt::{hash, verify};

use crate::error::AppError;

/// Cost bounds accepted by bcrypt
pub const MIN_HASH_COST: u32 = 4;
pub const MAX_HASH_COST: u32 = 31;

#[derive(Debug, Clone, Copy)]
pub struct CredentialVerifier {
    cost: u32,
}

impl CredentialVerifier {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a plaintext password with a fresh salt
    ///
    /// # Errors
    /// Returns error if the configured cost is out of range for bcrypt
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Check a plaintext password against a stored hash
    pub fn verify(&self, password: &str, password_hash: &str) -> bool {
        match verify(password, password_hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!("Stored password hash could not be parsed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> CredentialVerifier {
        CredentialVerifier::new(MIN_HASH_COST)
    }

    #[test]
    fn test_hash_password() {
        let password = "ValidPassword123";
        let hash = verifier().hash(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_same_password_gets_different_salt() {
        let first = verifier().hash("pw").unwrap();
        let second = verifier().hash("pw").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_password() {
        let hash = verifier().hash("ValidPassword123").unwrap();
        assert!(verifier().verify("ValidPassword123", &hash));
    }

    #[test]
    fn test_verify_wrong_password() {
        let hash = verifier().hash("ValidPassword123").unwrap();
        assert!(!verifier().verify("WrongPassword123", &hash));
    }

    #[test]
    fn test_malformed_hash_is_a_mismatch() {
        assert!(!verifier().verify("pw", "not-a-bcrypt-hash"));
        assert!(!verifier().verify("pw", ""));
    }

    #[test]
    fn test_invalid_cost_is_an_error() {
        assert!(CredentialVerifier::new(99).hash("pw").is_err());
    }
}
