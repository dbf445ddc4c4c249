//! Locker aggregate
//!
//! Contains the Locker entity, related types, and repository interface.

pub mod model;
pub mod repository;

pub use model::{Locker, LockerSize, LockerStatus};
pub use repository::{LockerRepository, LockerUpdate};
