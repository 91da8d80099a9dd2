//! Single-document JSON backend.
//!
//! The whole record set lives in one JSON array. Writers serialize on an
//! exclusive lock held on a sibling `.lock` file, so the read → rank →
//! serialize → write cycle is exclusive across threads and processes. The new
//! document is written to a temporary file in the same directory and renamed
//! over the old one, so readers (which never take the lock) see either the
//! previous or the next document, never a partial one.
//!
//! Files kept next to the document:
//! - `<document>.lock` — lock target, never holds data.
//! - `<document>.seq` — highest id ever issued, so ids of evicted records are
//!   not handed out again.
//! - the backup document, a copy of the previous snapshot (when enabled).

use super::{Placement, RankingStore, StoreError};
use crate::order::{sort_and_rank, TimeOrder};
use crate::page::{paginate, Page, PageRequest};
use crate::record::{now_timestamp, Record, RecordDraft};
use crate::stats::{self, Stats};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const DEFAULT_RANKING_FILE: &str = "ranking_data.json";
pub const DEFAULT_BACKUP_FILE: &str = "ranking_data_backup.json";
pub const DEFAULT_MAX_RECORDS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStoreConfig {
    pub data_dir: PathBuf,
    pub ranking_file: String,
    pub backup_file: String,
    pub max_records: usize,
    pub enable_backup: bool,
    pub time_order: TimeOrder,
}

impl FileStoreConfig {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            ranking_file: DEFAULT_RANKING_FILE.to_string(),
            backup_file: DEFAULT_BACKUP_FILE.to_string(),
            max_records: DEFAULT_MAX_RECORDS,
            enable_backup: true,
            time_order: TimeOrder::default(),
        }
    }

    pub fn document_path(&self) -> PathBuf {
        self.data_dir.join(&self.ranking_file)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.data_dir.join(&self.backup_file)
    }

    fn lock_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.lock", self.ranking_file))
    }

    fn sequence_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.seq", self.ranking_file))
    }
}

/// JSON-document implementation of [`RankingStore`].
///
/// Cloning is cheap and clones share the same configuration. Blocking file
/// work runs on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: Arc<FileStoreConfig>,
}

/// Exclusive lock on the document, released when dropped.
struct WriteLock {
    file: File,
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!("Failed to release ranking lock: {}", e);
        }
    }
}

impl FileStore {
    /// Open the store, creating the data directory if needed. A missing
    /// document is an empty record set; it is created on the first write.
    pub fn open(config: FileStoreConfig) -> Result<Self, StoreError> {
        if config.max_records == 0 {
            return Err(StoreError::Config(
                "max_records must be at least 1".to_string(),
            ));
        }
        std::fs::create_dir_all(&config.data_dir)?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    /// Load the record set in ranking order with ranks assigned.
    pub fn load(&self) -> Result<Vec<Record>, StoreError> {
        let mut records = self.read_document()?;
        sort_and_rank(&mut records, self.config.time_order);
        Ok(records)
    }

    /// Insert a submission and return it as persisted, with its rank and the
    /// size of the set it was written into.
    pub fn insert(&self, draft: RecordDraft) -> Result<Placement, StoreError> {
        let lock = self.lock()?;

        let mut records = self.read_document()?;
        let highest_existing = records.iter().map(|r| r.id).max().unwrap_or(0);
        let id = highest_existing.max(self.read_sequence()) + 1;
        records.push(draft.into_record(id, now_timestamp()));

        sort_and_rank(&mut records, self.config.time_order);
        self.enforce_bound(&mut records);

        // The sequence goes first so a crash between the two writes can only
        // skip an id, never reissue one.
        self.write_sequence(id)?;
        self.write_document(&records)?;

        let persisted = self.load()?;
        drop(lock);

        let total = persisted.len() as u64;
        match persisted.into_iter().find(|r| r.id == id) {
            Some(record) => {
                info!(
                    id = record.id,
                    nickname = %record.nickname,
                    score = record.score,
                    time = record.time,
                    rank = record.rank,
                    total,
                    "Ranking added"
                );
                Ok(Placement { record, total })
            }
            None => Err(StoreError::Evicted {
                id,
                max_records: self.config.max_records,
            }),
        }
    }

    /// Highest id ever issued, including ids of records that were evicted.
    pub fn last_issued_id(&self) -> Result<u64, StoreError> {
        let highest_present = self.read_document()?.iter().map(|r| r.id).max().unwrap_or(0);
        Ok(highest_present.max(self.read_sequence()))
    }

    /// Re-apply the record bound, for stores whose bound was lowered.
    pub fn trim(&self) -> Result<u64, StoreError> {
        let _lock = self.lock()?;
        let mut records = self.load()?;
        let evicted = self.enforce_bound(&mut records);
        if evicted > 0 {
            self.write_document(&records)?;
        }
        Ok(evicted)
    }

    /// Truncate an already ranked set to `max_records`.
    fn enforce_bound(&self, records: &mut Vec<Record>) -> u64 {
        let max = self.config.max_records;
        if records.len() <= max {
            return 0;
        }
        let evicted = (records.len() - max) as u64;
        records.truncate(max);
        info!(evicted, max_records = max, "Trimmed ranking data");
        evicted
    }

    fn lock(&self) -> Result<WriteLock, StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.config.lock_path())?;
        file.lock()?;
        Ok(WriteLock { file })
    }

    fn read_document(&self) -> Result<Vec<Record>, StoreError> {
        let path = self.config.document_path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let records: Vec<Record> =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::CorruptState {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.id) {
                return Err(StoreError::CorruptState {
                    path,
                    reason: format!("duplicate id {}", record.id),
                });
            }
        }
        Ok(records)
    }

    fn write_document(&self, records: &[Record]) -> Result<(), StoreError> {
        if self.config.enable_backup {
            self.backup();
        }
        let json = serde_json::to_vec_pretty(records).map_err(StoreError::Encode)?;
        self.write_atomically(&self.config.document_path(), &json)?;
        debug!(records = records.len(), "Ranking data saved");
        Ok(())
    }

    /// Copy the current document to the backup location. Failures are logged
    /// and do not block the write.
    fn backup(&self) {
        let source = self.config.document_path();
        if !source.exists() {
            return;
        }
        let target = self.config.backup_path();
        match std::fs::copy(&source, &target) {
            Ok(_) => debug!(backup = %target.display(), "Backup created"),
            Err(e) => warn!(
                backup = %target.display(),
                error = %e,
                "Failed to back up ranking data"
            ),
        }
    }

    fn read_sequence(&self) -> u64 {
        let path = self.config.sequence_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => contents.trim().parse().unwrap_or_else(|_| {
                warn!(path = %path.display(), "Ignoring unreadable id sequence");
                0
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable id sequence");
                0
            }
        }
    }

    fn write_sequence(&self, id: u64) -> Result<(), StoreError> {
        self.write_atomically(&self.config.sequence_path(), id.to_string().as_bytes())
    }

    fn write_atomically(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let mut tmp = NamedTempFile::new_in(&self.config.data_dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Run blocking file work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}

impl RankingStore for FileStore {
    async fn submit(&self, draft: RecordDraft) -> Result<Placement, StoreError> {
        let store = self.clone();
        blocking(move || store.insert(draft)).await
    }

    async fn list(&self, request: PageRequest) -> Result<Page<Record>, StoreError> {
        let ranked = self.snapshot().await?;
        Ok(paginate(ranked, request))
    }

    async fn stats(&self) -> Result<Stats, StoreError> {
        let store = self.clone();
        let records = blocking(move || store.read_document()).await?;
        Ok(stats::compute(&records))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let store = self.clone();
        let records = blocking(move || store.read_document()).await?;
        Ok(records.len() as u64)
    }

    async fn snapshot(&self) -> Result<Vec<Record>, StoreError> {
        let store = self.clone();
        blocking(move || store.load()).await
    }

    async fn cleanup(&self) -> Result<u64, StoreError> {
        let store = self.clone();
        blocking(move || store.trim()).await
    }
}
