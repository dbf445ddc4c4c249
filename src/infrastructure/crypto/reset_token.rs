//! Password reset tokens
//!
//! The raw token goes to the user once; only its SHA-256 digest is stored.

use rand::Rng;
use sha2::{Digest, Sha256};

/// A freshly generated reset token and the digest to persist
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub token: String,
    pub hash: String,
}

/// Generate a 32-byte random token, hex encoded
pub fn generate_reset_token() -> ResetToken {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    let token = hex::encode(bytes);
    let hash = hash_reset_token(&token);
    ResetToken { token, hash }
}

pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
