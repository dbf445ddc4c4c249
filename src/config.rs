//! Application configuration
//!
//! Loaded from a TOML file, by default `~/.config/locker-service/config.toml`.
//! Every section and every key is optional; omitted values take the defaults
//! below.
//!
//! ```toml
//! [server]
//! api_port = 8080
//!
//! [database]
//! url = "sqlite://./lockers.db?mode=rwc"   # or "memory"
//!
//! [reconciler]
//! poll_interval_secs = 60
//! reminder_lookahead_minutes = 60
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::{IdentitySettings, ReconcilerSettings, ReservationSettings};
use crate::infrastructure::crypto::jwt::JwtConfig;
use crate::infrastructure::crypto::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::infrastructure::DatabaseConfig;
use crate::shared::errors::InfraError;

/// `database.url` value selecting the in-memory store
pub const MEMORY_DATABASE_URL: &str = "memory";

/// Config file location: `$LOCKER_CONFIG`, else the per-user config dir.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("LOCKER_CONFIG") {
        return PathBuf::from(path);
    }
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("locker-service")
        .join("config.toml")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSection,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub admin: AdminConfig,
    pub reservations: ReservationsConfig,
    pub reconciler: ReconcilerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_host: String,
    pub api_port: u16,
    /// Seconds allowed for in-flight work after a shutdown signal
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        let defaults = DatabaseConfig::default();
        Self {
            url: defaults.url,
            max_connections: defaults.max_connections,
            connect_timeout_secs: defaults.connect_timeout_secs,
        }
    }
}

impl DatabaseSection {
    pub fn is_memory(&self) -> bool {
        self.url == MEMORY_DATABASE_URL
    }

    pub fn to_database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            connect_timeout_secs: self.connect_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub reset_token_ttl_minutes: i64,
    pub bcrypt_cost: u32,
    /// Base URL used in password reset links
    pub frontend_url: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: JwtConfig::default().secret,
            jwt_expiration_hours: 24,
            reset_token_ttl_minutes: 30,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            frontend_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Account created on first start when the user table is empty
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            email: "admin@localhost.local".to_string(),
            password: "change-me-now".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationsConfig {
    pub max_duration_hours: i64,
    pub store_timeout_secs: u64,
    pub notify_timeout_secs: u64,
}

impl Default for ReservationsConfig {
    fn default() -> Self {
        Self {
            max_duration_hours: 720,
            store_timeout_secs: 5,
            notify_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub enabled: bool,
    pub poll_interval_secs: u64,
    pub reminder_lookahead_minutes: i64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 60,
            reminder_lookahead_minutes: 60,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, InfraError> {
        let config: Self =
            toml::from_str(content).map_err(|e| InfraError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<(), InfraError> {
        let fail = |msg: &str| Err(InfraError::Config(msg.to_string()));

        if self.security.jwt_secret.trim().is_empty() {
            return fail("security.jwt_secret must not be empty");
        }
        if self.security.jwt_expiration_hours <= 0 {
            return fail("security.jwt_expiration_hours must be positive");
        }
        if self.security.reset_token_ttl_minutes <= 0 {
            return fail("security.reset_token_ttl_minutes must be positive");
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.security.bcrypt_cost) {
            return fail("security.bcrypt_cost must be between 4 and 31");
        }
        if self.reservations.max_duration_hours < 1 {
            return fail("reservations.max_duration_hours must be at least 1");
        }
        if self.reconciler.poll_interval_secs == 0 {
            return fail("reconciler.poll_interval_secs must be positive");
        }
        if self.reconciler.reminder_lookahead_minutes < 0 {
            return fail("reconciler.reminder_lookahead_minutes must not be negative");
        }
        Ok(())
    }

    pub fn identity_settings(&self) -> IdentitySettings {
        IdentitySettings {
            jwt: JwtConfig::new(
                self.security.jwt_secret.clone(),
                self.security.jwt_expiration_hours,
            ),
            bcrypt_cost: self.security.bcrypt_cost,
            reset_token_ttl: chrono::Duration::minutes(self.security.reset_token_ttl_minutes),
            frontend_url: self.security.frontend_url.trim_end_matches('/').to_string(),
            notify_timeout: Duration::from_secs(self.reservations.notify_timeout_secs),
        }
    }

    pub fn reservation_settings(&self) -> ReservationSettings {
        ReservationSettings {
            max_duration_hours: self.reservations.max_duration_hours,
            store_timeout: Duration::from_secs(self.reservations.store_timeout_secs),
            notify_timeout: Duration::from_secs(self.reservations.notify_timeout_secs),
        }
    }

    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            poll_interval: Duration::from_secs(self.reconciler.poll_interval_secs),
            reminder_lookahead: chrono::Duration::minutes(
                self.reconciler.reminder_lookahead_minutes,
            ),
            store_timeout: Duration::from_secs(self.reservations.store_timeout_secs),
            notify_timeout: Duration::from_secs(self.reservations.notify_timeout_secs),
        }
    }
}
