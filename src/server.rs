//! Server runtime.
//!
//! [`ServerHandle`] owns the full lifecycle: storage init and migrations,
//! default admin seeding, the expiry reconciler, the REST API, metrics and
//! graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::{
    ExpiryReconciler, IdentityService, LockerService, ReservationService,
};
use crate::config::AppConfig;
use crate::domain::{RepositoryProvider, SharedNotifier};
use crate::infrastructure::database::migrator::Migrator;
use crate::infrastructure::{
    init_database, InMemoryRepositoryProvider, LogNotifier, SeaOrmRepositoryProvider,
};
use crate::interfaces::http::modules::health::HealthState;
use crate::interfaces::http::modules::metrics::{install_recorder, MetricsState};
use crate::interfaces::http::{create_api_router, ApiContext};
use crate::shared::errors::{AppError, InfraError};
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};
use crate::shared::time::{SharedClock, SystemClock};

pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup
    pub auto_migrate: bool,
    /// Create the configured admin when no user exists
    pub create_default_admin: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
            create_default_admin: true,
        }
    }
}

/// Handle to a running locker service.
///
/// ```rust,no_run
/// use locker_rental::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.install_signal_handler();
///     handle.shutdown_signal().wait().await;
///     handle.wait().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    pub repos: Arc<dyn RepositoryProvider>,
    pub config: AppConfig,
    /// Bound address; differs from the configured one when port 0 was requested
    pub api_addr: SocketAddr,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownCoordinator,
    api_task: JoinHandle<()>,
    reconciler_task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub async fn start(opts: ServerOptions) -> Result<Self, AppError> {
        let app_cfg = opts.config;
        app_cfg.validate()?;

        info!("Starting locker service...");

        let metrics = match install_recorder() {
            Ok(handle) => {
                info!("📊 Prometheus metrics recorder ready");
                Some(MetricsState { handle })
            }
            Err(e) => {
                warn!(error = %e, "Prometheus recorder unavailable, /metrics disabled");
                None
            }
        };

        // ── Storage ────────────────────────────────────────────
        let (repos, db): (Arc<dyn RepositoryProvider>, Option<DatabaseConnection>) =
            if app_cfg.database.is_memory() {
                warn!("Using the in-memory store; data is lost on shutdown");
                (Arc::new(InMemoryRepositoryProvider::new()), None)
            } else {
                let db = init_database(&app_cfg.database.to_database_config())
                    .await
                    .map_err(InfraError::from)?;
                if opts.auto_migrate {
                    info!("Running database migrations...");
                    Migrator::up(&db, None).await.map_err(InfraError::from)?;
                    info!("Migrations completed");
                }
                (Arc::new(SeaOrmRepositoryProvider::new(db.clone())), Some(db))
            };

        // ── Services ───────────────────────────────────────────
        let clock: SharedClock = Arc::new(SystemClock);
        let notifier: SharedNotifier = Arc::new(LogNotifier);

        let identity = Arc::new(IdentityService::new(
            repos.clone(),
            notifier.clone(),
            clock.clone(),
            app_cfg.identity_settings(),
        ));
        info!(
            "JWT configured with {}h token expiration",
            app_cfg.security.jwt_expiration_hours
        );

        if opts.create_default_admin {
            let admin = &app_cfg.admin;
            if let Err(e) = identity
                .ensure_default_admin(&admin.username, &admin.email, &admin.password)
                .await
            {
                error!(error = %e, "Failed to create default admin user");
            }
        }

        let lockers = Arc::new(LockerService::new(repos.clone(), clock.clone()));
        let reservations = Arc::new(ReservationService::new(
            repos.clone(),
            notifier.clone(),
            clock.clone(),
            app_cfg.reservation_settings(),
        ));

        // ── Shutdown & background work ─────────────────────────
        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        let reconciler_task = if app_cfg.reconciler.enabled {
            let reconciler = Arc::new(ExpiryReconciler::new(
                repos.clone(),
                notifier,
                clock,
                app_cfg.reconciler_settings(),
            ));
            Some(reconciler.start(shutdown_signal.clone()))
        } else {
            warn!("Expiry reconciler disabled; reservations will not expire automatically");
            None
        };

        // ── REST API ───────────────────────────────────────────
        let router = create_api_router(ApiContext {
            identity,
            lockers,
            reservations,
            health: HealthState {
                db: db.clone(),
                started_at: Arc::new(Instant::now()),
                reconciler_enabled: app_cfg.reconciler.enabled,
            },
            metrics,
        });

        let bind_addr = format!("{}:{}", app_cfg.server.api_host, app_cfg.server.api_port);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(InfraError::from)?;
        let api_addr = listener.local_addr().map_err(InfraError::from)?;
        info!("REST API server listening on http://{}", api_addr);
        info!("Swagger UI available at http://{}/docs/", api_addr);

        let api_shutdown = shutdown_signal.clone();
        let api_server = axum::serve(listener, router).with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("🛑 REST API server received shutdown signal");
        });

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        info!("🚀 Locker service started");

        Ok(Self {
            repos,
            config: app_cfg,
            api_addr,
            db,
            shutdown,
            api_task,
            reconciler_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Trigger shutdown on SIGTERM / SIGINT.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for shutdown to be triggered, then for every task to stop
    /// within `server.shutdown_timeout`.
    pub async fn wait(self) {
        let Self {
            db,
            shutdown,
            api_task,
            reconciler_task,
            ..
        } = self;

        shutdown
            .shutdown_with_cleanup(|| async move {
                match api_task.await {
                    Ok(()) => info!("REST API server stopped"),
                    Err(e) => error!("REST API server task panicked: {}", e),
                }
                if let Some(task) = reconciler_task {
                    if let Err(e) = task.await {
                        error!("Expiry reconciler task panicked: {}", e);
                    }
                }
            })
            .await;

        if let Some(db) = db {
            match db.close().await {
                Ok(()) => info!("✅ Database connection closed"),
                Err(e) => warn!("Error closing database connection: {}", e),
            }
        }

        info!("👋 Locker service shutdown complete");
    }

    pub async fn shutdown(self) {
        info!("🛑 Shutting down locker service...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides
/// `logging.level`; `logging.format = "json"` selects JSON lines.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
