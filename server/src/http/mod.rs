//! HTTP surface of the leaderboard.
//!
//! # Endpoints
//!
//! - `GET /rankings?page=&limit=` - one page of the ranked leaderboard
//! - `GET /rankings?action=stats` - aggregate stats
//! - `POST /rankings` - submit `{name, score, time}`
//! - `OPTIONS /rankings` - empty 200
//! - `DELETE /rankings` - always 501
//! - `GET /health` - liveness check
//!
//! Any other method on `/rankings` is answered with a JSON 405.

pub mod error;
pub mod handlers;

use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use ranking::{Limits, RankingStore};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
pub struct AppState<S> {
    pub store: Arc<S>,
    pub limits: Limits,
}

impl<S> AppState<S> {
    pub fn new(store: S, limits: Limits) -> Self {
        Self {
            store: Arc::new(store),
            limits,
        }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            limits: self.limits,
        }
    }
}

pub fn router<S: RankingStore + 'static>(state: AppState<S>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let rankings = get(handlers::list_rankings::<S>)
        .post(handlers::add_ranking::<S>)
        .options(handlers::preflight)
        .delete(handlers::delete_ranking::<S>)
        .fallback(handlers::method_not_allowed);

    Router::new()
        .route("/rankings", rankings)
        .route("/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
