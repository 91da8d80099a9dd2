//! Ranking store for a score/time leaderboard.
//!
//! Submissions pass through [`validate`](validate::validate) and are handed to
//! a [`RankingStore`] backend, which persists them and derives ranks from the
//! full record set. Two interchangeable backends exist: a single JSON document
//! ([`store::file::FileStore`]) and a SQLite table
//! ([`store::sqlite::SqliteRankingStore`]). [`store::open`] picks one from a
//! [`StoreConfig`].

pub mod order;
pub mod page;
pub mod record;
pub mod stats;
pub mod store;
pub mod validate;

pub use order::TimeOrder;
pub use page::{Page, PageRequest, Pagination};
pub use record::{now_timestamp, Record, RecordDraft, UNKNOWN_ORIGIN};
pub use stats::Stats;
pub use store::{Backend, BackendKind, Placement, RankingStore, StoreConfig, StoreError};
pub use validate::{validate, Limits, ValidationError};
