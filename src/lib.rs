//! # Locker rental service
//!
//! Backend for renting storage lockers by the hour.
//!
//! - **domain**: lockers, reservations, users and the store/notifier ports
//! - **application**: reservation lifecycle, expiry reconciler, identity, locker admin
//! - **infrastructure**: SeaORM and in-memory stores, crypto, notifier adapter
//! - **interfaces**: REST API with Swagger documentation
//! - **server**: process lifecycle and graceful shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};
pub use infrastructure::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
pub use interfaces::http::create_api_router;
