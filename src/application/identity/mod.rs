//! Identity module: user management & authentication
//!
//! `IdentityService` runs the account flows (register, login, logout,
//! password reset) and resolves bearer tokens into an `AuthenticatedUser`.

pub mod service;

pub use service::{AuthResult, AuthenticatedUser, IdentityService, IdentitySettings};
