//! Request handlers for the `/rankings` resource.

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{Extensions, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ranking::{validate, PageRequest, RankingStore, Record, UNKNOWN_ORIGIN};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::{info, warn};

use super::error::AppError;
use super::AppState;

/// Raw query string pairs. A repeated key keeps its last value and nothing in
/// it can fail to parse, so a malformed query never turns into a plain-text
/// extractor rejection.
type QueryPairs = Query<HashMap<String, String>>;

/// Query string of `GET /rankings`. Values are kept as text so malformed
/// numbers degrade to defaults instead of rejecting the request.
#[derive(Debug, Default)]
pub struct ListParams {
    pub action: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListParams {
    fn from_pairs(mut pairs: HashMap<String, String>) -> Self {
        Self {
            action: pairs.remove("action"),
            page: pairs.remove("page"),
            limit: pairs.remove("limit"),
        }
    }

    fn page_request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        let page = self
            .page
            .as_deref()
            .map_or(defaults.page() as i64, leading_int);
        let limit = self
            .limit
            .as_deref()
            .map_or(defaults.limit() as i64, leading_int);
        PageRequest::new(page, limit)
    }
}

/// Integer prefix of `s` (`"12abc"` is 12, `"abc"` is 0).
fn leading_int(s: &str) -> i64 {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value = digits[..end].parse::<i64>().unwrap_or(if end == 0 { 0 } else { i64::MAX });
    if negative {
        -value
    } else {
        value
    }
}

/// A record as listed to clients. The submitter's address stays server-side.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RankingView {
    pub id: u64,
    pub nickname: String,
    pub score: u64,
    pub time: u64,
    pub rank: u64,
    pub created_at: u64,
}

impl From<Record> for RankingView {
    fn from(record: Record) -> Self {
        Self {
            id: record.id,
            nickname: record.nickname,
            score: record.score,
            time: record.time,
            rank: record.rank,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AddResponse {
    pub success: bool,
    pub rank: u64,
    pub nickname: String,
    pub score: u64,
    pub time: u64,
    pub id: u64,
    pub total_players: u64,
}

/// `GET /rankings`: one page of the leaderboard, or the stats with `action=stats`.
pub async fn list_rankings<S: RankingStore + 'static>(
    State(state): State<AppState<S>>,
    Query(pairs): QueryPairs,
) -> Result<Response, AppError> {
    let params = ListParams::from_pairs(pairs);
    if params.action.as_deref() == Some("stats") {
        let stats = state
            .store
            .stats()
            .await
            .map_err(AppError::store("Failed to retrieve stats"))?;
        return Ok(Json(stats).into_response());
    }

    let request = params.page_request();
    let page = state
        .store
        .list(request)
        .await
        .map_err(AppError::store("Failed to retrieve rankings"))?;
    info!(
        page = request.page(),
        limit = request.limit(),
        total = page.pagination.total,
        "Rankings served"
    );
    Ok(Json(page.map(RankingView::from)).into_response())
}

/// `POST /rankings`: validate and store a submission.
pub async fn add_ranking<S: RankingStore + 'static>(
    State(state): State<AppState<S>>,
    extensions: Extensions,
    body: Bytes,
) -> Result<Response, AppError> {
    let raw: Value = serde_json::from_slice(&body).map_err(|_| AppError::InvalidJson)?;
    if raw.is_null() {
        return Err(AppError::InvalidJson);
    }

    let origin = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_ORIGIN.to_string(), |info| info.0.ip().to_string());

    let draft = validate(&raw, &state.limits)
        .inspect_err(|e| warn!(origin = %origin, reason = %e, "Submission rejected"))?
        .with_origin(origin);

    let placement = state
        .store
        .submit(draft)
        .await
        .map_err(AppError::store("Failed to add ranking"))?;
    let record = placement.record;

    let response = AddResponse {
        success: true,
        rank: record.rank,
        nickname: record.nickname,
        score: record.score,
        time: record.time,
        id: record.id,
        total_players: placement.total,
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// `OPTIONS /rankings`: an empty 200 for clients that check before posting.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// `DELETE /rankings`: record removal is not offered.
pub async fn delete_ranking<S: RankingStore + 'static>(
    State(state): State<AppState<S>>,
    Query(pairs): QueryPairs,
) -> Result<Response, AppError> {
    let id = pairs
        .get("id")
        .and_then(|id| id.trim().parse::<u64>().ok())
        .unwrap_or_default();
    state
        .store
        .delete(id)
        .await
        .map_err(AppError::store("Delete operation not implemented"))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

pub async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
