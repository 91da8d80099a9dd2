//! The ranking order: score descending, then time, then id ascending.
//!
//! The direction of the time tie-break is a product decision, so it is carried
//! as [`TimeOrder`] rather than hard-coded. Both backends must use the same
//! value or their rankings diverge.

use crate::record::Record;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// How two records with equal score are ordered by elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeOrder {
    /// A shorter time ranks higher.
    #[default]
    ShorterFirst,
    /// A longer time ranks higher.
    LongerFirst,
}

impl TimeOrder {
    /// `ORDER BY` body matching [`compare`].
    pub fn sql_order_by(self) -> &'static str {
        match self {
            TimeOrder::ShorterFirst => "score DESC, time ASC, id ASC",
            TimeOrder::LongerFirst => "score DESC, time DESC, id ASC",
        }
    }

    /// Predicate true when row `better` strictly outranks row `row`.
    pub fn sql_strictly_better(self, better: &str, row: &str) -> String {
        let time_cmp = match self {
            TimeOrder::ShorterFirst => "<",
            TimeOrder::LongerFirst => ">",
        };
        format!(
            "({b}.score > {r}.score \
             OR ({b}.score = {r}.score AND {b}.time {t} {r}.time) \
             OR ({b}.score = {r}.score AND {b}.time = {r}.time AND {b}.id < {r}.id))",
            b = better,
            r = row,
            t = time_cmp
        )
    }
}

impl fmt::Display for TimeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeOrder::ShorterFirst => write!(f, "shorter"),
            TimeOrder::LongerFirst => write!(f, "longer"),
        }
    }
}

impl FromStr for TimeOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shorter" | "asc" | "ascending" => Ok(TimeOrder::ShorterFirst),
            "longer" | "desc" | "descending" => Ok(TimeOrder::LongerFirst),
            other => Err(format!("unknown time order: {other}")),
        }
    }
}

/// Compare two records; `Less` means `a` ranks above `b`.
pub fn compare(a: &Record, b: &Record, time_order: TimeOrder) -> Ordering {
    let by_time = match time_order {
        TimeOrder::ShorterFirst => a.time.cmp(&b.time),
        TimeOrder::LongerFirst => b.time.cmp(&a.time),
    };
    b.score
        .cmp(&a.score)
        .then(by_time)
        .then(a.id.cmp(&b.id))
}

/// Sort records into ranking order and assign ranks `1..=N`.
pub fn sort_and_rank(records: &mut [Record], time_order: TimeOrder) {
    records.sort_by(|a, b| compare(a, b, time_order));
    for (index, record) in records.iter_mut().enumerate() {
        record.rank = index as u64 + 1;
    }
}

/// Rank a record would have within `records`: one more than the number of
/// records strictly better than it. The record itself may or may not be part
/// of the slice.
pub fn rank_of(record: &Record, records: &[Record], time_order: TimeOrder) -> u64 {
    let better = records
        .iter()
        .filter(|other| compare(other, record, time_order) == Ordering::Less)
        .count();
    better as u64 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(id: u64, score: u64, time: u64) -> Record {
        Record {
            id,
            nickname: format!("p{id}"),
            score,
            time,
            rank: 0,
            created_at: 0,
            origin: "unknown".to_string(),
        }
    }

    #[test]
    fn test_higher_score_ranks_first() {
        let mut records = vec![rec(1, 100, 50), rec(2, 200, 40)];
        sort_and_rank(&mut records, TimeOrder::ShorterFirst);
        assert_eq!(records[0].id, 2);
        assert_eq!(records[0].rank, 1);
        assert_eq!(records[1].id, 1);
        assert_eq!(records[1].rank, 2);
    }

    #[test]
    fn test_equal_score_shorter_time_first() {
        let mut records = vec![rec(1, 100, 60), rec(2, 100, 30)];
        sort_and_rank(&mut records, TimeOrder::ShorterFirst);
        assert_eq!(records[0].time, 30);
    }

    #[test]
    fn test_equal_score_longer_time_first() {
        let mut records = vec![rec(1, 100, 30), rec(2, 100, 60)];
        sort_and_rank(&mut records, TimeOrder::LongerFirst);
        assert_eq!(records[0].time, 60);
    }

    #[test]
    fn test_full_tie_broken_by_id() {
        let mut records = vec![rec(9, 100, 30), rec(3, 100, 30), rec(5, 100, 30)];
        sort_and_rank(&mut records, TimeOrder::ShorterFirst);
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 5, 9]);
    }

    #[test]
    fn test_rank_of_counts_strictly_better() {
        let records = vec![rec(1, 300, 10), rec(2, 200, 10), rec(3, 100, 10)];
        assert_eq!(rank_of(&rec(4, 250, 5), &records, TimeOrder::ShorterFirst), 2);
        assert_eq!(rank_of(&records[0], &records, TimeOrder::ShorterFirst), 1);
    }

    #[test]
    fn test_time_order_parse() {
        assert_eq!("asc".parse::<TimeOrder>().unwrap(), TimeOrder::ShorterFirst);
        assert_eq!("Longer".parse::<TimeOrder>().unwrap(), TimeOrder::LongerFirst);
        assert!("sideways".parse::<TimeOrder>().is_err());
        for order in [TimeOrder::ShorterFirst, TimeOrder::LongerFirst] {
            assert_eq!(order.to_string().parse::<TimeOrder>().unwrap(), order);
        }
    }

    #[test]
    fn test_sql_strictly_better_shape() {
        let sql = TimeOrder::ShorterFirst.sql_strictly_better("r2", "r1");
        assert!(sql.contains("r2.time < r1.time"));
        assert!(sql.contains("r2.id < r1.id"));
    }

    fn arb_records() -> impl Strategy<Value = Vec<Record>> {
        prop::collection::vec((0u64..5, 0u64..5), 0..40).prop_map(|pairs| {
            pairs
                .into_iter()
                .enumerate()
                .map(|(i, (score, time))| rec(i as u64 + 1, score, time))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_order_is_strict_total(records in arb_records()) {
            for a in &records {
                for b in &records {
                    let ab = compare(a, b, TimeOrder::ShorterFirst);
                    let ba = compare(b, a, TimeOrder::ShorterFirst);
                    if a.id == b.id {
                        prop_assert_eq!(ab, Ordering::Equal);
                    } else {
                        prop_assert_ne!(ab, Ordering::Equal);
                        prop_assert_eq!(ab, ba.reverse());
                    }
                }
            }
        }

        #[test]
        fn prop_ranks_are_dense_and_match_rank_of(records in arb_records()) {
            let mut ranked = records.clone();
            sort_and_rank(&mut ranked, TimeOrder::ShorterFirst);
            for (index, record) in ranked.iter().enumerate() {
                prop_assert_eq!(record.rank, index as u64 + 1);
                prop_assert_eq!(record.rank, rank_of(record, &records, TimeOrder::ShorterFirst));
            }
        }
    }
}
