//! HTTP feature modules

pub mod auth;
pub mod health;
pub mod lockers;
pub mod metrics;
pub mod reservations;
