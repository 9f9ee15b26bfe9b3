//! Hookline Server
//!
//! Delivers record lifecycle events to registered webhook endpoints.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::file::StoreBackend;
use config::{ConfigLoader, get_database_url};
use hookline_core::config::{ConfigStore, Settings};
use hookline_core::extensions::{BACKGROUND_SCHEDULER, ExtensionRegistry};
use hookline_core::processors::{Dispatcher, EventRouter, spawn_dispatch_pool};
use hookline_core::store::{MemoryRegistrationStore, PgRegistrationStore, RegistrationStore};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Hookline - lifecycle event webhook dispatcher
#[derive(Parser, Debug)]
#[command(name = "hookline-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./hookline.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting hookline-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let file_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    let listen_addr = file_config.server.listen;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // The background pool is sized once; reloads keep it.
    let (background, dispatch_pool) = spawn_dispatch_pool(
        file_config.webhooks.queue_capacity,
        file_config.webhooks.max_in_flight,
    );
    let mut registry = ExtensionRegistry::with_defaults();
    registry.register_scheduler(BACKGROUND_SCHEDULER, background);
    let registry = Arc::new(registry);

    let settings = Settings::resolve(&file_config.webhooks, &registry).map_err(|e| {
        tracing::error!("Invalid webhook settings: {}", e);
        e
    })?;
    let settings_store = ConfigStore::new(settings);

    let (store, db_pool) = match file_config.database.backend {
        StoreBackend::Postgres => {
            let database_url = get_database_url().map_err(|e| {
                tracing::error!("DATABASE_URL environment variable not set");
                e
            })?;

            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(file_config.database.max_connections)
                .connect(&database_url)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to database: {}", e);
                    e
                })?;
            tracing::info!("Database connection established");

            if args.migrate {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("../migrations")
                    .run(&db_pool)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to run migrations: {}", e);
                        e
                    })?;
                tracing::info!("Migrations completed successfully");
            }

            let store: Arc<dyn RegistrationStore> = Arc::new(PgRegistrationStore::new(
                db_pool.clone(),
                settings_store.clone(),
            ));
            (store, Some(db_pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory registration store; registrations are not persisted");
            let store: Arc<dyn RegistrationStore> = Arc::new(MemoryRegistrationStore::new());
            (store, None)
        }
    };

    let dispatcher = Dispatcher::new(Arc::clone(&store));
    let router = EventRouter::new(settings_store.clone(), Arc::new(dispatcher));
    let state = AppState::new(store, settings_store, router);

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify = spawn_config_reload_handler(state.clone(), config_loader, registry);

    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    shutdown_notify.notify_one();

    tracing::info!("Draining queued webhooks...");
    dispatch_pool.shutdown().await;

    if let Some(db_pool) = db_pool {
        tracing::info!("Closing database connections...");
        db_pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
