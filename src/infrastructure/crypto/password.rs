//! Password hashing utilities

use bcrypt::{hash, verify};

/// Cost range bcrypt accepts
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

/// Hash a password using bcrypt at the given cost
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hashed = hash_password("hunter22", MIN_BCRYPT_COST).unwrap();
        assert_ne!(hashed, "hunter22");
        assert!(verify_password("hunter22", &hashed).unwrap());
        assert!(!verify_password("hunter23", &hashed).unwrap());
    }

    #[test]
    fn test_cost_bounds_match_bcrypt() {
        assert!(hash_password("hunter22", MIN_BCRYPT_COST - 1).is_err());
        assert!(hash_password("hunter22", MIN_BCRYPT_COST).is_ok());
        assert!(hash_password("hunter22", MAX_BCRYPT_COST + 1).is_err());
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(verify_password("x", "not-a-bcrypt-hash").is_err());
    }
}
