//! Configuration for the leaderboard server.
//!
//! Every tunable has a compile-time default and can be overridden at runtime
//! via a dedicated environment variable. Unparseable numeric or boolean
//! values fall back to the default. An unknown backend name or time order is
//! an error.

use ranking::store::file::DEFAULT_MAX_RECORDS;
use ranking::store::sqlite::DEFAULT_CLEANUP_LIMIT;
use ranking::{BackendKind, StoreConfig, StoreError, TimeOrder};
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Get the directory holding the ranking document and database.
///
/// Priority:
/// 1. `LEADERBOARD_DATA_DIR` env variable if set
/// 2. `./data` as fallback
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LEADERBOARD_DATA_DIR") {
        return PathBuf::from(dir);
    }

    PathBuf::from(DEFAULT_DATA_DIR)
}

/// Get the storage backend, `file` unless `LEADERBOARD_BACKEND` says otherwise.
pub fn get_backend() -> Result<BackendKind, StoreError> {
    match std::env::var("LEADERBOARD_BACKEND") {
        Ok(name) => name.parse(),
        Err(_) => Ok(BackendKind::default()),
    }
}

/// Get the file backend's record bound (`LEADERBOARD_MAX_RECORDS`, default 1000).
pub fn get_max_records() -> usize {
    if let Ok(max) = std::env::var("LEADERBOARD_MAX_RECORDS") {
        return max.parse().unwrap_or(DEFAULT_MAX_RECORDS);
    }

    DEFAULT_MAX_RECORDS
}

/// Whether the file backend keeps a backup of the previous document
/// (`LEADERBOARD_ENABLE_BACKUP`, default on).
pub fn get_enable_backup() -> bool {
    if let Ok(flag) = std::env::var("LEADERBOARD_ENABLE_BACKUP") {
        return parse_flag(&flag).unwrap_or(true);
    }

    true
}

/// Get the number of rows the SQLite cleanup keeps
/// (`LEADERBOARD_CLEANUP_LIMIT`, default 10000).
pub fn get_cleanup_limit() -> u64 {
    if let Ok(limit) = std::env::var("LEADERBOARD_CLEANUP_LIMIT") {
        return limit.parse().unwrap_or(DEFAULT_CLEANUP_LIMIT);
    }

    DEFAULT_CLEANUP_LIMIT
}

/// Get the time tie-break (`LEADERBOARD_TIME_ORDER`: `shorter` or `longer`).
pub fn get_time_order() -> Result<TimeOrder, StoreError> {
    match std::env::var("LEADERBOARD_TIME_ORDER") {
        Ok(order) => parse_time_order(&order),
        Err(_) => Ok(TimeOrder::default()),
    }
}

fn parse_time_order(value: &str) -> Result<TimeOrder, StoreError> {
    value
        .parse()
        .map_err(|e| StoreError::Config(format!("LEADERBOARD_TIME_ORDER: {e}")))
}

/// Get the HTTP listen address (`LEADERBOARD_BIND_ADDR`, default `127.0.0.1:8080`).
pub fn get_bind_addr() -> String {
    if let Ok(addr) = std::env::var("LEADERBOARD_BIND_ADDR") {
        return addr;
    }

    DEFAULT_BIND_ADDR.to_string()
}

/// Assemble the store configuration from the environment.
pub fn store_config(backend: BackendKind) -> Result<StoreConfig, StoreError> {
    let mut config = StoreConfig::new(&get_data_dir())
        .with_backend(backend)
        .with_time_order(get_time_order()?);
    config.file.max_records = get_max_records();
    config.file.enable_backup = get_enable_backup();
    config.sqlite.cleanup_limit = get_cleanup_limit();
    Ok(config)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
