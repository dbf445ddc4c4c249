//! Authentication module: registration, login, logout, password reset, profile

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
