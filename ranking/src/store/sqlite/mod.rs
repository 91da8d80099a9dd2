//! SQLite-backed ranking store.
//!
//! ## Database setup
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with:
//! - **WAL mode**: one writer and multiple concurrent readers.
//! - **Embedded migrations**: `sqlx::migrate!` runs `migrations/001_rankings.sql`
//!   when [`Database::open`] is called. The schema is idempotent.
//!
//! ## Ranking
//!
//! Ranks are never stored. Reads number rows with `ROW_NUMBER()` over the
//! ranking order and `add` counts the rows strictly better than the new one,
//! inside the transaction that inserted it.
//!
//! ## File migration
//!
//! [`migrate_file_to_sqlite`] performs a one-time, idempotent import of a
//! JSON ranking document. The source document is never modified.

mod database;
mod migrate_file;
mod ranking_repo;

pub use database::Database;
pub use migrate_file::{migrate_file_to_sqlite, MigrationReport};
pub use ranking_repo::SqliteRankingStore;

use crate::order::TimeOrder;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE_FILE: &str = "leaderboard.db";
/// Rows kept by [`SqliteRankingStore`]'s cleanup. Larger than the file
/// backend's bound since reads never load the whole table.
pub const DEFAULT_CLEANUP_LIMIT: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    pub database: PathBuf,
    pub time_order: TimeOrder,
    pub cleanup_limit: u64,
}

impl SqliteConfig {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            database: data_dir.join(DEFAULT_DATABASE_FILE),
            time_order: TimeOrder::default(),
            cleanup_limit: DEFAULT_CLEANUP_LIMIT,
        }
    }
}
