//! Locker rental service
//!
//! ```sh
//! # Run with default config (~/.config/locker-service/config.toml)
//! locker-service
//!
//! # Custom config path, port override
//! locker-service --config /etc/locker-service/config.toml --api-port 8081
//!
//! # Validate config without starting
//! locker-service --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use locker_rental::config::{default_config_path, AppConfig};
use locker_rental::server::{init_tracing, ServerHandle, ServerOptions};

/// Storage locker rental backend: reservations, expiry reminders, REST API.
#[derive(Parser, Debug)]
#[command(
    name = "locker-service",
    version,
    about = "Storage locker rental backend",
    long_about = "REST API server for renting storage lockers by the hour, with a \
                  background reconciler that expires reservations and sends reminders.\n\n\
                  Default config: ~/.config/locker-service/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "LOCKER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,

    /// Skip creating the default admin user.
    #[arg(long)]
    no_admin: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(default_config_path);

    let loaded = AppConfig::load(&config_path);
    if cli.check {
        return match loaded {
            Ok(config) => {
                println!("✅ Configuration is valid");
                println!("   Config file : {}", config_path.display());
                println!(
                    "   API address : {}:{}",
                    config.server.api_host,
                    cli.api_port.unwrap_or(config.server.api_port)
                );
                println!("   Database    : {}", config.database.url);
                println!("   Reconciler  : {}", if config.reconciler.enabled { "enabled" } else { "disabled" });
                println!("   Log level   : {}", cli.log_level.as_deref().unwrap_or(&config.logging.level));
                Ok(())
            }
            Err(e) => {
                eprintln!("❌ Invalid configuration {}: {}", config_path.display(), e);
                Err(e.into())
            }
        };
    }

    let mut config = match loaded {
        Ok(mut cfg) => {
            if let Some(ref level) = cli.log_level {
                cfg.logging.level = level.clone();
            }
            init_tracing(&cfg);
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            let mut cfg = AppConfig::default();
            if let Some(ref level) = cli.log_level {
                cfg.logging.level = level.clone();
            }
            init_tracing(&cfg);
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
            cfg
        }
    };

    if let Some(port) = cli.api_port {
        info!("CLI override: api_port = {}", port);
        config.server.api_port = port;
    }

    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
        create_default_admin: !cli.no_admin,
    })
    .await?;

    handle.install_signal_handler();
    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.wait().await;
    Ok(())
}
