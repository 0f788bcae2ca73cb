//! folio-ps (Progress Service) - Main entry point
//!
//! Serves `GET`/`PATCH /read-progress` over a SQLite database and merges
//! concurrent updates from several tabs or devices without losing any.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_common::config::{load_toml, RootFolderInitializer, RootFolderResolver};
use folio_common::db::init::init_database;
use folio_ps::config::{RuntimeSettings, TomlConfig, CONFIG_FILE_NAME};
use folio_ps::{build_router, AppState};

/// Command-line arguments for folio-ps
#[derive(Parser, Debug)]
#[command(name = "folio-ps")]
#[command(about = "Reading progress service for Folio")]
#[command(version)]
struct Args {
    /// Root folder holding the database and folio-ps.toml
    #[arg(short, long, env = "FOLIO_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides folio-ps.toml)
    #[arg(short, long, env = "FOLIO_PS_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides folio-ps.toml)
    #[arg(short, long, env = "FOLIO_PS_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let root_folder = RootFolderResolver::new("progress-service")
        .with_cli_arg(args.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let config_path = initializer.root_folder().join(CONFIG_FILE_NAME);
    let toml_config = load_toml::<TomlConfig>(&config_path)?.unwrap_or_default();

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Folio Progress Service (folio-ps) v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = toml_config
        .database_path
        .clone()
        .unwrap_or_else(|| initializer.database_path());
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database initialized");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let settings = RuntimeSettings::load(&pool)
        .await
        .context("Failed to load runtime settings")?;
    info!(
        max_attempts = settings.write_max_attempts,
        backoff_ms = settings.write_backoff_ms,
        "Loaded write retry settings"
    );

    let state = AppState::from_pool(pool.clone(), settings.retry_policy());
    let app = build_router(state);

    let bind_address = args.bind.unwrap_or(toml_config.bind_address);
    let port = args.port.unwrap_or(toml_config.port);
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("folio-ps listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
