//! SQLite implementation of [`RankingStore`].

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use super::SqliteConfig;
use crate::order::TimeOrder;
use crate::page::{Page, PageRequest};
use crate::record::{now_timestamp, Record, RecordDraft};
use crate::stats::{round2, Stats};
use crate::store::{Placement, RankingStore, StoreError};

/// `(id, nickname, score, time, created_at, origin, rank)`
type RankedRow = (i64, String, i64, i64, i64, String, i64);

fn to_record(row: RankedRow) -> Record {
    let (id, nickname, score, time, created_at, origin, rank) = row;
    Record {
        id: id as u64,
        nickname,
        score: score as u64,
        time: time as u64,
        rank: rank as u64,
        created_at: created_at as u64,
        origin,
    }
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone)]
pub struct SqliteRankingStore {
    pool: SqlitePool,
    time_order: TimeOrder,
    cleanup_limit: u64,
}

impl SqliteRankingStore {
    pub fn new(pool: SqlitePool, config: &SqliteConfig) -> Self {
        Self {
            pool,
            time_order: config.time_order,
            cleanup_limit: config.cleanup_limit,
        }
    }

    fn ranked_select(&self) -> String {
        format!(
            "SELECT id, nickname, score, time, created_at, origin, \
                    ROW_NUMBER() OVER (ORDER BY {order}) AS position \
             FROM rankings \
             ORDER BY {order}",
            order = self.time_order.sql_order_by()
        )
    }
}

/// Insert a record keeping its id, creation time and origin.
pub(super) async fn insert_record(
    tx: &mut Transaction<'_, Sqlite>,
    record: &Record,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO rankings (id, nickname, score, time, created_at, origin) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(to_sql_int(record.id))
    .bind(&record.nickname)
    .bind(to_sql_int(record.score))
    .bind(to_sql_int(record.time))
    .bind(to_sql_int(record.created_at))
    .bind(&record.origin)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub(super) async fn row_count<'c, E>(executor: E) -> Result<u64, StoreError>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rankings")
        .fetch_one(executor)
        .await?;
    Ok(row.0 as u64)
}

impl RankingStore for SqliteRankingStore {
    async fn submit(&self, draft: RecordDraft) -> Result<Placement, StoreError> {
        let created_at = now_timestamp();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO rankings (nickname, score, time, created_at, origin) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&draft.nickname)
        .bind(to_sql_int(draft.score))
        .bind(to_sql_int(draft.time))
        .bind(to_sql_int(created_at))
        .bind(&draft.origin)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        let better = format!(
            "SELECT COUNT(*) FROM rankings AS other, rankings AS me \
             WHERE me.id = ? AND {}",
            self.time_order.sql_strictly_better("other", "me")
        );
        let (ahead,): (i64,) = sqlx::query_as(&better)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let total = row_count(&mut *tx).await?;

        tx.commit().await?;

        let mut record = draft.into_record(id as u64, created_at);
        record.rank = ahead as u64 + 1;
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

    async fn list(&self, request: PageRequest) -> Result<Page<Record>, StoreError> {
        // Count and page in one transaction so the pagination matches the rows.
        let mut tx = self.pool.begin().await?;

        let total = row_count(&mut *tx).await?;

        let query = format!("{} LIMIT ? OFFSET ?", self.ranked_select());
        let rows: Vec<RankedRow> = sqlx::query_as(&query)
            .bind(to_sql_int(request.limit()))
            .bind(to_sql_int(request.offset()))
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page {
            data: rows.into_iter().map(to_record).collect(),
            pagination: request.pagination(total),
        })
    }

    async fn stats(&self) -> Result<Stats, StoreError> {
        let (total, highest, lowest, avg_score, best_time, avg_time): (i64, i64, i64, f64, i64, f64) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       COALESCE(MAX(score), 0),
                       COALESCE(MIN(score), 0),
                       COALESCE(AVG(score), 0.0),
                       COALESCE(MIN(time), 0),
                       COALESCE(AVG(time), 0.0)
                FROM rankings
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(Stats {
            total_players: total as u64,
            highest_score: highest as u64,
            lowest_score: lowest as u64,
            average_score: round2(avg_score),
            best_time: best_time as u64,
            average_time: round2(avg_time),
        })
    }

    async fn count(&self) -> Result<u64, StoreError> {
        row_count(&self.pool).await
    }

    async fn snapshot(&self) -> Result<Vec<Record>, StoreError> {
        let rows: Vec<RankedRow> = sqlx::query_as(&self.ranked_select())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(to_record).collect())
    }

    async fn cleanup(&self) -> Result<u64, StoreError> {
        let query = format!(
            "DELETE FROM rankings WHERE id NOT IN \
             (SELECT id FROM rankings ORDER BY {} LIMIT ?)",
            self.time_order.sql_order_by()
        );
        let result = sqlx::query(&query)
            .bind(to_sql_int(self.cleanup_limit))
            .execute(&self.pool)
            .await?;
        let evicted = result.rows_affected();
        info!(evicted, limit = self.cleanup_limit, "Ranking cleanup finished");
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sqlite::Database;
    use std::path::Path;

    async fn store_with(time_order: TimeOrder, cleanup_limit: u64) -> SqliteRankingStore {
        let db = Database::new_in_memory().await.unwrap();
        let mut config = SqliteConfig::new(Path::new("."));
        config.time_order = time_order;
        config.cleanup_limit = cleanup_limit;
        SqliteRankingStore::new(db.pool().clone(), &config)
    }

    async fn store() -> SqliteRankingStore {
        store_with(TimeOrder::default(), 10_000).await
    }

    #[tokio::test]
    async fn test_add_computes_rank() {
        let store = store().await;
        let ann = store.add(RecordDraft::new("Ann", 100, 50)).await.unwrap();
        assert_eq!((ann.id, ann.rank), (1, 1));

        let bo = store.add(RecordDraft::new("Bo", 200, 40)).await.unwrap();
        assert_eq!((bo.id, bo.rank), (2, 1));

        let cy = store.add(RecordDraft::new("Cy", 100, 30)).await.unwrap();
        assert_eq!(cy.rank, 2);

        let page = store.list(PageRequest::default()).await.unwrap();
        let names: Vec<&str> = page.data.iter().map(|r| r.nickname.as_str()).collect();
        assert_eq!(names, vec!["Bo", "Cy", "Ann"]);
        let ranks: Vec<u64> = page.data.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_longer_time_order() {
        let store = store_with(TimeOrder::LongerFirst, 10_000).await;
        store.add(RecordDraft::new("fast", 100, 30)).await.unwrap();
        let slow = store.add(RecordDraft::new("slow", 100, 60)).await.unwrap();
        assert_eq!(slow.rank, 1);
        let ranked = store.snapshot().await.unwrap();
        assert_eq!(ranked[0].nickname, "slow");
    }

    #[tokio::test]
    async fn test_equal_score_and_time_break_on_id() {
        let store = store().await;
        store.add(RecordDraft::new("first", 10, 10)).await.unwrap();
        let second = store.add(RecordDraft::new("second", 10, 10)).await.unwrap();
        assert_eq!(second.rank, 2);
    }

    #[tokio::test]
    async fn test_list_second_page() {
        let store = store().await;
        for (name, score) in [("a", 30), ("b", 20), ("c", 10)] {
            store.add(RecordDraft::new(name, score, 1)).await.unwrap();
        }
        let page = store.list(PageRequest::new(2, 1)).await.unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].nickname, "b");
        assert_eq!(page.data[0].rank, 2);
        assert_eq!(
            (page.pagination.page, page.pagination.limit, page.pagination.total, page.pagination.pages),
            (2, 1, 3, 3)
        );
    }

    #[tokio::test]
    async fn test_stats() {
        let store = store().await;
        assert_eq!(store.stats().await.unwrap(), Stats::default());

        store.add(RecordDraft::new("a", 100, 50)).await.unwrap();
        store.add(RecordDraft::new("b", 200, 40)).await.unwrap();
        store.add(RecordDraft::new("c", 50, 70)).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_players, 3);
        assert_eq!(stats.highest_score, 200);
        assert_eq!(stats.lowest_score, 50);
        assert_eq!(stats.average_score, 116.67);
        assert_eq!(stats.best_time, 40);
        assert_eq!(stats.average_time, 53.33);
    }

    #[tokio::test]
    async fn test_origin_is_persisted() {
        let store = store().await;
        store
            .add(RecordDraft::new("a", 1, 1).with_origin("10.0.0.1"))
            .await
            .unwrap();
        let ranked = store.snapshot().await.unwrap();
        assert_eq!(ranked[0].origin, "10.0.0.1");
    }

    #[tokio::test]
    async fn test_cleanup_keeps_top_rows() {
        let store = store_with(TimeOrder::default(), 2).await;
        for score in [10, 50, 30, 40] {
            store.add(RecordDraft::new("p", score, 1)).await.unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 4);

        assert_eq!(store.cleanup().await.unwrap(), 2);
        let scores: Vec<u64> = store.snapshot().await.unwrap().iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![50, 40]);

        assert_eq!(store.cleanup().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_submit_reports_total_from_same_write() {
        let store = store().await;
        let first = store.submit(RecordDraft::new("a", 10, 1)).await.unwrap();
        assert_eq!(first.total, 1);
        let second = store.submit(RecordDraft::new("b", 20, 1)).await.unwrap();
        assert_eq!((second.record.rank, second.total), (1, 2));

        let mut handles = Vec::new();
        for i in 0..8u64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.submit(RecordDraft::new(format!("p{i}"), i, 1)).await.unwrap()
            }));
        }
        let mut totals = Vec::new();
        for handle in handles {
            totals.push(handle.await.unwrap().total);
        }
        totals.sort_unstable();
        assert_eq!(totals, (3..=10).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_ids_continue_after_cleanup() {
        let store = store_with(TimeOrder::default(), 1).await;
        store.add(RecordDraft::new("keep", 100, 1)).await.unwrap();
        store.add(RecordDraft::new("drop", 1, 1)).await.unwrap();
        store.cleanup().await.unwrap();
        let next = store.add(RecordDraft::new("next", 2, 1)).await.unwrap();
        assert_eq!(next.id, 3);
    }
}
