//! Storage backends behind a single [`RankingStore`] contract.
//!
//! Both backends derive ranks from the whole record set using
//! [`crate::order`], so a record set yields the same ranking whichever backend
//! holds it. The backend is chosen once at startup with [`open`] and the
//! resulting [`Backend`] handle is shared with every request handler.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so the
//! futures are guaranteed `Send`, as required by axum handlers and
//! `tokio::spawn`.

pub mod file;
pub mod sqlite;

use crate::order::TimeOrder;
use crate::page::{Page, PageRequest};
use crate::record::{Record, RecordDraft};
use crate::stats::Stats;
use file::{FileStore, FileStoreConfig};
use sqlite::{Database, SqliteConfig, SqliteRankingStore};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Errors from the storage layer. None of them are retried by the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt ranking data in {}: {reason}", .path.display())]
    CorruptState { path: PathBuf, reason: String },
    #[error("failed to encode ranking data: {0}")]
    Encode(serde_json::Error),
    #[error("record {id} did not place within the top {max_records}")]
    Evicted { id: u64, max_records: usize },
    #[error("{0} not implemented")]
    NotImplemented(String),
    #[error("invalid store configuration: {0}")]
    Config(String),
    #[error("storage task failed: {0}")]
    Task(String),
}

/// A stored submission together with the size of the set it was ranked in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub record: Record,
    /// Records in the set right after this write, including this one.
    pub total: u64,
}

/// The leaderboard storage contract shared by every backend.
pub trait RankingStore: Send + Sync {
    /// Store a validated submission. Rank and total are taken from the same
    /// write, so concurrent submissions never see each other's counts.
    fn submit(
        &self,
        draft: RecordDraft,
    ) -> impl Future<Output = Result<Placement, StoreError>> + Send;

    /// Store a validated submission and return it with its freshly computed rank.
    fn add(&self, draft: RecordDraft) -> impl Future<Output = Result<Record, StoreError>> + Send {
        async move { self.submit(draft).await.map(|placement| placement.record) }
    }

    /// One page of the ranked record set.
    fn list(
        &self,
        request: PageRequest,
    ) -> impl Future<Output = Result<Page<Record>, StoreError>> + Send;

    fn stats(&self) -> impl Future<Output = Result<Stats, StoreError>> + Send;

    fn count(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// The full record set in ranking order.
    fn snapshot(&self) -> impl Future<Output = Result<Vec<Record>, StoreError>> + Send;

    /// Evict records beyond the backend's bound. Returns how many were removed.
    fn cleanup(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Deleting individual records needs an authenticated admin surface,
    /// which no backend offers.
    fn delete(&self, id: u64) -> impl Future<Output = Result<(), StoreError>> + Send {
        async move { Err(StoreError::NotImplemented(format!("deleting record {id}"))) }
    }
}

/// Which backend [`open`] constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    File,
    Sqlite,
    /// Recognised so configuration typos are distinguishable from a backend
    /// that does not exist yet.
    Mysql,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::File => write!(f, "file"),
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Mysql => write!(f, "mysql"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(BackendKind::File),
            "sqlite" => Ok(BackendKind::Sqlite),
            "mysql" => Ok(BackendKind::Mysql),
            other => Err(StoreError::Config(format!(
                "unsupported database type: {other}"
            ))),
        }
    }
}

/// Settings for every backend; [`open`] uses the part selected by `backend`.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub file: FileStoreConfig,
    pub sqlite: SqliteConfig,
}

impl StoreConfig {
    /// Defaults for both backends rooted at `data_dir`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            backend: BackendKind::default(),
            file: FileStoreConfig::new(data_dir),
            sqlite: SqliteConfig::new(data_dir),
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Apply one time tie-break policy to both backends.
    pub fn with_time_order(mut self, time_order: TimeOrder) -> Self {
        self.file.time_order = time_order;
        self.sqlite.time_order = time_order;
        self
    }
}

/// A backend selected at startup.
#[derive(Debug, Clone)]
pub enum Backend {
    File(FileStore),
    Sqlite(SqliteRankingStore),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::File(_) => BackendKind::File,
            Backend::Sqlite(_) => BackendKind::Sqlite,
        }
    }
}

/// Construct the backend named by `config.backend`.
pub async fn open(config: &StoreConfig) -> Result<Backend, StoreError> {
    let backend = match config.backend {
        BackendKind::File => Backend::File(FileStore::open(config.file.clone())?),
        BackendKind::Sqlite => {
            let db = Database::open(&config.sqlite.database).await?;
            Backend::Sqlite(SqliteRankingStore::new(db.pool().clone(), &config.sqlite))
        }
        BackendKind::Mysql => {
            return Err(StoreError::NotImplemented("mysql backend".to_string()));
        }
    };
    let time_order = match backend {
        Backend::File(_) => config.file.time_order,
        Backend::Sqlite(_) => config.sqlite.time_order,
    };
    tracing::info!(
        backend = %backend.kind(),
        time_order = %time_order,
        "Ranking store opened"
    );
    Ok(backend)
}

impl RankingStore for Backend {
    async fn submit(&self, draft: RecordDraft) -> Result<Placement, StoreError> {
        match self {
            Backend::File(store) => store.submit(draft).await,
            Backend::Sqlite(store) => store.submit(draft).await,
        }
    }

    async fn list(&self, request: PageRequest) -> Result<Page<Record>, StoreError> {
        match self {
            Backend::File(store) => store.list(request).await,
            Backend::Sqlite(store) => store.list(request).await,
        }
    }

    async fn stats(&self) -> Result<Stats, StoreError> {
        match self {
            Backend::File(store) => store.stats().await,
            Backend::Sqlite(store) => store.stats().await,
        }
    }

    async fn count(&self) -> Result<u64, StoreError> {
        match self {
            Backend::File(store) => store.count().await,
            Backend::Sqlite(store) => store.count().await,
        }
    }

    async fn snapshot(&self) -> Result<Vec<Record>, StoreError> {
        match self {
            Backend::File(store) => store.snapshot().await,
            Backend::Sqlite(store) => store.snapshot().await,
        }
    }

    async fn cleanup(&self) -> Result<u64, StoreError> {
        match self {
            Backend::File(store) => store.cleanup().await,
            Backend::Sqlite(store) => store.cleanup().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("file".parse::<BackendKind>().unwrap(), BackendKind::File);
        assert_eq!("SQLite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert_eq!("mysql".parse::<BackendKind>().unwrap(), BackendKind::Mysql);
        assert!(matches!(
            "postgres".parse::<BackendKind>(),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_time_order_applies_to_both_backends() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path()).with_time_order(TimeOrder::LongerFirst);
        assert_eq!(config.file.time_order, TimeOrder::LongerFirst);
        assert_eq!(config.sqlite.time_order, TimeOrder::LongerFirst);
    }

    #[tokio::test]
    async fn test_open_mysql_not_implemented() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path()).with_backend(BackendKind::Mysql);
        let result = open(&config).await;
        assert!(matches!(result, Err(StoreError::NotImplemented(_))));
    }

    #[tokio::test]
    async fn test_open_each_backend() {
        let dir = tempfile::tempdir().unwrap();
        let file = open(&StoreConfig::new(dir.path())).await.unwrap();
        assert_eq!(file.kind(), BackendKind::File);

        let sqlite_store = open(&StoreConfig::new(dir.path()).with_backend(BackendKind::Sqlite))
            .await
            .unwrap();
        assert_eq!(sqlite_store.kind(), BackendKind::Sqlite);
        assert!(dir.path().join(sqlite::DEFAULT_DATABASE_FILE).exists());
    }

    #[tokio::test]
    async fn test_delete_not_implemented() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&StoreConfig::new(dir.path())).await.unwrap();
        let result = store.delete(1).await;
        assert!(matches!(result, Err(StoreError::NotImplemented(_))));
    }
}
