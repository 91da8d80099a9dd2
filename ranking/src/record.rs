use serde::{Deserialize, Deserializer, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Origin recorded when the submitter's address is not known.
pub const UNKNOWN_ORIGIN: &str = "unknown";

/// One leaderboard entry as persisted by a backend.
///
/// `rank` is derived from the full record set every time the set is read or
/// written; a value loaded from storage is only a cache and is overwritten.
///
/// Documents written by the earlier PHP service are read as well: their
/// `created_at` is a `Y-m-d H:i:s` string (taken as UTC) and the submitter's
/// address is stored under `ip`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub id: u64,
    pub nickname: String,
    pub score: u64,
    pub time: u64,
    #[serde(default)]
    pub rank: u64,
    #[serde(deserialize_with = "deserialize_created_at")]
    pub created_at: u64,
    #[serde(default = "unknown_origin", alias = "ip")]
    pub origin: String,
}

const LEGACY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTimestamp {
    Seconds(u64),
    Text(String),
}

fn deserialize_created_at<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match StoredTimestamp::deserialize(deserializer)? {
        StoredTimestamp::Seconds(seconds) => Ok(seconds),
        StoredTimestamp::Text(text) => parse_legacy_timestamp(&text).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid created_at timestamp: {text:?}"))
        }),
    }
}

/// Unix seconds from either a numeric string or a `Y-m-d H:i:s` UTC datetime.
fn parse_legacy_timestamp(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Ok(seconds) = text.parse::<u64>() {
        return Some(seconds);
    }
    let datetime = chrono::NaiveDateTime::parse_from_str(text, LEGACY_DATETIME_FORMAT).ok()?;
    u64::try_from(datetime.and_utc().timestamp()).ok()
}

fn unknown_origin() -> String {
    UNKNOWN_ORIGIN.to_string()
}

/// A validated submission that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub nickname: String,
    pub score: u64,
    pub time: u64,
    pub origin: String,
}

impl RecordDraft {
    pub fn new(nickname: impl Into<String>, score: u64, time: u64) -> Self {
        Self {
            nickname: nickname.into(),
            score,
            time,
            origin: unknown_origin(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Turn the draft into a record with the given identity. Rank is left at
    /// zero until the record is placed in a ranked set.
    pub fn into_record(self, id: u64, created_at: u64) -> Record {
        Record {
            id,
            nickname: self.nickname,
            score: self.score,
            time: self.time,
            rank: 0,
            created_at,
            origin: self.origin,
        }
    }
}

/// Get the current unix timestamp in seconds.
pub fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_into_record() {
        let record = RecordDraft::new("Ann", 100, 50)
            .with_origin("10.0.0.1")
            .into_record(7, 1_700_000_000);
        assert_eq!(record.id, 7);
        assert_eq!(record.nickname, "Ann");
        assert_eq!(record.rank, 0);
        assert_eq!(record.origin, "10.0.0.1");
    }

    #[test]
    fn test_deserialize_without_origin_or_rank() {
        let json = r#"{"id":1,"nickname":"Ann","score":100,"time":50,"created_at":5}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.origin, UNKNOWN_ORIGIN);
        assert_eq!(record.rank, 0);
    }

    #[test]
    fn test_deserialize_legacy_entry() {
        let json = r#"{"id":1,"nickname":"Ann","score":100,"time":50,
            "created_at":"2024-05-01 12:00:00","ip":"1.2.3.4","rank":1}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.created_at, 1_714_564_800);
        assert_eq!(record.origin, "1.2.3.4");

        let reencoded = serde_json::to_value(&record).unwrap();
        assert_eq!(reencoded["created_at"], 1_714_564_800u64);
        assert_eq!(reencoded["origin"], "1.2.3.4");
    }

    #[test]
    fn test_reject_unreadable_created_at() {
        let json = r#"{"id":1,"nickname":"Ann","score":1,"time":1,"created_at":"yesterday"}"#;
        let err = serde_json::from_str::<Record>(json).unwrap_err();
        assert!(err.to_string().contains("created_at"));
    }
}
