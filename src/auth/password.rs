/// Hash a password for storage with a per-password bcrypt salt.
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Constant-time check of a plaintext password against a stored hash.
/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_original_password() {
        let hash = hash_password("secret1", 4).unwrap();
        assert_ne!(hash, "secret1");
        assert!(verify_password("secret1", &hash));
        assert!(!verify_password("secret2", &hash));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let a = hash_password("secret1", 4).unwrap();
        let b = hash_password("secret1", 4).unwrap();
        assert_ne!(a, b);
        assert!(verify_password("secret1", &a));
        assert!(verify_password("secret1", &b));
    }

    #[test]
    fn malformed_hash_does_not_verify() {
        assert!(!verify_password("secret1", "not-a-bcrypt-hash"));
    }
}
