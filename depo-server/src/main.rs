//! Depo Server
//!
//! Crypto deposit intake and wallet crediting: opens BTC payment sessions
//! for USD top-ups, follows them through provider webhooks and polling, and
//! credits each confirmed deposit to the user's wallet exactly once.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use depo_core::store::{MemoryStore, Stores};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Depo - deposit and wallet reconciliation service
#[derive(Parser, Debug)]
#[command(name = "depo-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "DEPO_CONFIG", default_value = "./depo-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Keep deposits and wallets in process memory instead of PostgreSQL.
    /// Everything is lost on exit.
    #[arg(long, default_value = "false")]
    memory_store: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting depo-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    let environment = loaded_config.server.environment;
    tracing::info!(?environment, "Configuration loaded from {:?}", args.config);

    // Convert to shared config with separate locks for each section
    let shared_config = loaded_config.into_shared();

    let (stores, db_pool) = if args.memory_store {
        if environment.is_production() {
            tracing::warn!("In-memory store selected in production; balances will not survive a restart");
        }
        tracing::info!("Using in-memory store");
        (Stores::memory(Arc::new(MemoryStore::new())), None)
    } else {
        // Get database URL from environment
        let database_url = get_database_url().map_err(|e| {
            tracing::error!("DATABASE_URL environment variable not set");
            e
        })?;

        // Create database connection pool
        tracing::info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to database: {}", e);
                e
            })?;
        tracing::info!("Database connection established");

        // Run migrations if requested
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

        (Stores::postgres(db_pool.clone()), Some(db_pool))
    };

    // Create application state
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(shared_config.clone(), stores, shutdown_rx.clone())
        .await
        .map_err(|e| {
            tracing::error!("Failed to initialise payment provider: {}", e);
            e
        })?;
    tracing::info!(provider = state.services.provider.name(), "Payment provider ready");

    // Background reconciliation sweep
    let reconciler_handle = tokio::spawn(
        state
            .services
            .reconciler
            .clone()
            .run(shared_config.reconciler.clone(), shutdown_rx),
    );

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(state.clone(), config_loader);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr, shutdown_tx.clone()).await;

    // Stop background tasks
    reload_notify.notify_one();
    let _ = shutdown_tx.send(true);
    if let Err(e) = reconciler_handle.await {
        tracing::error!(error = %e, "Reconciler task failed");
    }

    // Close database connections gracefully
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
