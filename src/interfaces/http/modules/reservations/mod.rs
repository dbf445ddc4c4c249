//! Reservation endpoints: reserve, cancel, and ownership-scoped queries

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
