//! Leaderboard server.
//!
//! `serve` (the default) exposes the HTTP API over the configured backend.
//! `migrate` copies the JSON ranking document into the SQLite database and
//! `cleanup` trims the configured backend to its record bound. All tunables
//! come from the environment, see [`config`].

mod config;
mod http;

use anyhow::Context;
use clap::{Parser, Subcommand};
use http::AppState;
use ranking::store::file::FileStore;
use ranking::store::sqlite::{migrate_file_to_sqlite, Database};
use ranking::{BackendKind, Limits, RankingStore};
use std::net::SocketAddr;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "ranking-server", about = "Game leaderboard service")]
struct Cli {
    /// Storage backend (`file` or `sqlite`). Overrides `LEADERBOARD_BACKEND`.
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API.
    Serve {
        /// Listen address. Overrides `LEADERBOARD_BIND_ADDR`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Import the JSON ranking document into the SQLite database.
    ///
    /// Skipped when the database already holds rankings.
    Migrate,
    /// Evict records beyond the backend's bound.
    Cleanup,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::fmt::format::FmtSpan;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let cli = Cli::parse();
    let backend = match cli.backend.as_deref() {
        Some(name) => name.parse::<BackendKind>()?,
        None => config::get_backend()?,
    };
    let store_config = config::store_config(backend)?;
    tracing::info!("Using data directory: {}", config::get_data_dir().display());

    match cli.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => {
            let addr = bind.unwrap_or_else(config::get_bind_addr);
            let store = ranking::store::open(&store_config).await?;
            serve(store, &addr).await
        }
        Commands::Migrate => {
            let source = FileStore::open(store_config.file.clone())?;
            let db = Database::open(&store_config.sqlite.database).await?;
            let report = migrate_file_to_sqlite(db.pool(), &source).await?;
            if report.skipped {
                tracing::info!(existing = report.existing, "Nothing migrated");
            } else {
                tracing::info!(migrated = report.migrated, "Migration finished");
            }
            Ok(())
        }
        Commands::Cleanup => {
            let store = ranking::store::open(&store_config).await?;
            let evicted = store.cleanup().await?;
            tracing::info!(backend = %store.kind(), evicted, "Cleanup finished");
            Ok(())
        }
    }
}

async fn serve<S: RankingStore + 'static>(store: S, addr: &str) -> anyhow::Result<()> {
    let app = http::router(AppState::new(store, Limits::default()));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
    })
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
