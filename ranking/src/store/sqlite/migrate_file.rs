use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use super::ranking_repo::{insert_record, row_count};
use crate::store::file::FileStore;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub skipped: bool,
    /// Rows already in the table before the migration ran.
    pub existing: u64,
    pub migrated: u64,
}

/// Copy every record of `source` into the `rankings` table, keeping ids,
/// creation times and origins. The emptiness check and all inserts run in one
/// transaction.
///
/// Does nothing when the table already holds rows, so running it twice is
/// harmless. Ids the file store issued and later evicted stay reserved: the
/// table's id sequence continues after the file store's highest issued id.
pub async fn migrate_file_to_sqlite(
    pool: &SqlitePool,
    source: &FileStore,
) -> Result<MigrationReport, StoreError> {
    let document = source.config().document_path();
    info!(document = %document.display(), "Starting file to SQLite migration");

    let store = source.clone();
    let (records, last_issued_id) =
        tokio::task::spawn_blocking(move || Ok::<_, StoreError>((store.load()?, store.last_issued_id()?)))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;
    info!(
        records = records.len(),
        last_issued_id,
        "Loaded ranking document for migration"
    );

    let mut tx = pool.begin().await?;

    let existing = row_count(&mut *tx).await?;
    if existing > 0 {
        info!(
            existing,
            "SQLite already contains rankings, skipping file migration"
        );
        tx.rollback().await?;
        return Ok(MigrationReport {
            skipped: true,
            existing,
            migrated: 0,
        });
    }

    for record in &records {
        insert_record(&mut tx, record).await?;
    }
    reserve_ids_through(&mut tx, last_issued_id).await?;
    tx.commit().await?;

    let report = MigrationReport {
        skipped: false,
        existing: 0,
        migrated: records.len() as u64,
    };
    info!(migrated = report.migrated, "File to SQLite migration completed");
    Ok(report)
}

/// Raise the `AUTOINCREMENT` sequence of `rankings` to at least `id`.
async fn reserve_ids_through(
    tx: &mut Transaction<'_, Sqlite>,
    id: u64,
) -> Result<(), StoreError> {
    if id == 0 {
        return Ok(());
    }
    let id = i64::try_from(id).unwrap_or(i64::MAX);
    sqlx::query("UPDATE sqlite_sequence SET seq = MAX(seq, ?) WHERE name = 'rankings'")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    sqlx::query(
        "INSERT INTO sqlite_sequence (name, seq) SELECT 'rankings', ? \
         WHERE NOT EXISTS (SELECT 1 FROM sqlite_sequence WHERE name = 'rankings')",
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
