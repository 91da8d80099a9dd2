//! Validation of raw leaderboard submissions.
//!
//! Input arrives as loosely-typed JSON: score and time may be numbers or
//! numeric strings, and the name may need trimming. [`validate`] checks the
//! fields in a fixed order (name, score, time) and reports the first problem.

use crate::record::RecordDraft;
use serde_json::Value;

pub const DEFAULT_MAX_NAME_LENGTH: usize = 50;
pub const DEFAULT_MAX_SCORE: u64 = 999_999_999;
/// 24 hours.
pub const DEFAULT_MAX_TIME: u64 = 86_400;

/// Upper bounds applied to submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_name_length: usize,
    pub max_score: u64,
    pub max_time: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            max_score: DEFAULT_MAX_SCORE,
            max_time: DEFAULT_MAX_TIME,
        }
    }
}

/// A client-caused submission error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Data must be a JSON object")]
    NotAnObject,
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Name must be text")]
    InvalidName,
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("Name too long (max {max} characters)")]
    NameTooLong { max: usize },
    #[error("Invalid score")]
    InvalidScore,
    #[error("Score too high (max {max})")]
    ScoreTooHigh { max: u64 },
    #[error("Invalid time")]
    InvalidTime,
    #[error("Time too long (max {max} seconds)")]
    TimeTooLong { max: u64 },
}

const REQUIRED_FIELDS: [&str; 3] = ["name", "score", "time"];

/// Validate a raw submission and produce a sanitized draft.
///
/// The draft's origin is [`UNKNOWN_ORIGIN`](crate::UNKNOWN_ORIGIN); callers
/// that know the submitter's address attach it with
/// [`RecordDraft::with_origin`].
pub fn validate(raw: &Value, limits: &Limits) -> Result<RecordDraft, ValidationError> {
    let fields = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    for field in REQUIRED_FIELDS {
        match fields.get(field) {
            None | Some(Value::Null) => return Err(ValidationError::MissingField(field)),
            Some(_) => {}
        }
    }

    let name = match &fields["name"] {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(ValidationError::InvalidName),
    };
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.chars().count() > limits.max_name_length {
        return Err(ValidationError::NameTooLong {
            max: limits.max_name_length,
        });
    }

    let score = numeric(&fields["score"]).ok_or(ValidationError::InvalidScore)?;
    if score > limits.max_score as f64 {
        return Err(ValidationError::ScoreTooHigh {
            max: limits.max_score,
        });
    }

    let time = numeric(&fields["time"]).ok_or(ValidationError::InvalidTime)?;
    if time > limits.max_time as f64 {
        return Err(ValidationError::TimeTooLong {
            max: limits.max_time,
        });
    }

    Ok(RecordDraft::new(
        escape_markup(&name),
        score.trunc() as u64,
        time.trunc() as u64,
    ))
}

/// Non-negative finite number from a JSON number or numeric string.
fn numeric(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (parsed.is_finite() && parsed >= 0.0).then_some(parsed)
}

/// Escape the characters that would let a nickname inject markup.
pub fn escape_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(raw: Value) -> Result<RecordDraft, ValidationError> {
        validate(&raw, &Limits::default())
    }

    #[test]
    fn test_valid_submission() {
        let draft = check(json!({"name": "  Ann  ", "score": 100, "time": 50})).unwrap();
        assert_eq!(draft.nickname, "Ann");
        assert_eq!(draft.score, 100);
        assert_eq!(draft.time, 50);
        assert_eq!(draft.origin, "unknown");
    }

    #[test]
    fn test_missing_fields_in_order() {
        assert_eq!(
            check(json!({"score": 1, "time": 1})),
            Err(ValidationError::MissingField("name"))
        );
        assert_eq!(
            check(json!({"name": "a", "time": 1})),
            Err(ValidationError::MissingField("score"))
        );
        assert_eq!(
            check(json!({"name": "a", "score": 1, "time": null})),
            Err(ValidationError::MissingField("time"))
        );
    }

    #[test]
    fn test_not_an_object() {
        assert_eq!(check(json!([1, 2, 3])), Err(ValidationError::NotAnObject));
    }

    #[test]
    fn test_empty_and_long_names() {
        assert_eq!(
            check(json!({"name": "   ", "score": 1, "time": 1})),
            Err(ValidationError::EmptyName)
        );
        let long = "x".repeat(51);
        assert_eq!(
            check(json!({"name": long, "score": 1, "time": 1})),
            Err(ValidationError::NameTooLong { max: 50 })
        );
        let exact = "é".repeat(50);
        assert!(check(json!({"name": exact, "score": 1, "time": 1})).is_ok());
    }

    #[test]
    fn test_non_text_name() {
        assert_eq!(
            check(json!({"name": true, "score": 1, "time": 1})),
            Err(ValidationError::InvalidName)
        );
        let draft = check(json!({"name": 42, "score": 1, "time": 1})).unwrap();
        assert_eq!(draft.nickname, "42");
    }

    #[test]
    fn test_score_bounds() {
        assert_eq!(
            check(json!({"name": "a", "score": -1, "time": 1})),
            Err(ValidationError::InvalidScore)
        );
        assert_eq!(
            check(json!({"name": "a", "score": "lots", "time": 1})),
            Err(ValidationError::InvalidScore)
        );
        assert_eq!(
            check(json!({"name": "a", "score": 1_000_000_000u64, "time": 1})),
            Err(ValidationError::ScoreTooHigh { max: 999_999_999 })
        );
        assert!(check(json!({"name": "a", "score": 999_999_999u64, "time": 1})).is_ok());
    }

    #[test]
    fn test_time_bounds() {
        assert_eq!(
            check(json!({"name": "a", "score": 1, "time": -5})),
            Err(ValidationError::InvalidTime)
        );
        assert_eq!(
            check(json!({"name": "a", "score": 1, "time": 86_401})),
            Err(ValidationError::TimeTooLong { max: 86_400 })
        );
        assert!(check(json!({"name": "a", "score": 1, "time": 86_400})).is_ok());
    }

    #[test]
    fn test_numeric_strings_are_truncated() {
        let draft = check(json!({"name": "a", "score": "120.9", "time": " 45 "})).unwrap();
        assert_eq!(draft.score, 120);
        assert_eq!(draft.time, 45);
    }

    #[test]
    fn test_non_finite_strings_rejected() {
        assert_eq!(
            check(json!({"name": "a", "score": "inf", "time": 1})),
            Err(ValidationError::InvalidScore)
        );
        assert_eq!(
            check(json!({"name": "a", "score": 1, "time": "NaN"})),
            Err(ValidationError::InvalidTime)
        );
    }

    #[test]
    fn test_name_is_escaped() {
        let draft = check(json!({"name": "<b>\"Bo\" & 'co'</b>", "score": 1, "time": 1})).unwrap();
        assert_eq!(
            draft.nickname,
            "&lt;b&gt;&quot;Bo&quot; &amp; &#039;co&#039;&lt;/b&gt;"
        );
    }
}
