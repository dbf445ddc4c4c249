//! Credential primitives: JWT, bcrypt, reset tokens

pub mod jwt;
pub mod password;
pub mod reset_token;

pub use jwt::{create_token, verify_token, JwtConfig, TokenClaims, TokenSubject};
pub use password::{hash_password, verify_password, MAX_BCRYPT_COST, MIN_BCRYPT_COST};
pub use reset_token::{generate_reset_token, hash_reset_token, ResetToken};
