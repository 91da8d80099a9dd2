use crate::record::Record;
use serde::{Deserialize, Serialize};

/// Aggregate figures over the whole record set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Stats {
    pub total_players: u64,
    pub highest_score: u64,
    pub lowest_score: u64,
    pub average_score: f64,
    /// Minimum time; shorter is better regardless of the ranking policy.
    pub best_time: u64,
    pub average_time: f64,
}

/// Compute stats over `records`. An empty slice yields all zeros.
pub fn compute(records: &[Record]) -> Stats {
    if records.is_empty() {
        return Stats::default();
    }

    let count = records.len() as f64;
    let score_sum: u128 = records.iter().map(|r| r.score as u128).sum();
    let time_sum: u128 = records.iter().map(|r| r.time as u128).sum();

    Stats {
        total_players: records.len() as u64,
        highest_score: records.iter().map(|r| r.score).max().unwrap_or(0),
        lowest_score: records.iter().map(|r| r.score).min().unwrap_or(0),
        average_score: round2(score_sum as f64 / count),
        best_time: records.iter().map(|r| r.time).min().unwrap_or(0),
        average_time: round2(time_sum as f64 / count),
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
