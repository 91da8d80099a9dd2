//! SQLite connection pool and migration runner.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::store::StoreError;

/// Concurrent submissions queue on the write lock for at most this long.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Holds a connection pool to the ranking database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the ranking database at `path` and bring its schema
    /// up to date.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let db = Self::connect(SqlitePoolOptions::new().max_connections(5), options).await?;
        info!(path = %path.display(), "Ranking database ready");
        Ok(db)
    }

    /// An in-memory ranking database, used by tests.
    ///
    /// Every connection to `:memory:` sees its own database, so the pool is
    /// pinned to a single connection that never expires.
    pub async fn new_in_memory() -> Result<Self, StoreError> {
        let pool_options = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
        Self::connect(pool_options, SqliteConnectOptions::from_str("sqlite::memory:")?).await
    }

    async fn connect(
        pool_options: SqlitePoolOptions,
        options: SqliteConnectOptions,
    ) -> Result<Self, StoreError> {
        let pool = pool_options.connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
