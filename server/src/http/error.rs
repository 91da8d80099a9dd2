//! HTTP error responses.
//!
//! Every failure leaves the server as a JSON body `{"error": ..., "details": [...]}`.
//! Storage failures are logged here and their internals are not echoed to the
//! client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ranking::{StoreError, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("request body is not JSON")]
    InvalidJson,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A storage failure; `context` is the message shown to the client.
    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        source: StoreError,
    },
    #[error("method not allowed")]
    MethodNotAllowed,
}

impl AppError {
    pub fn store(context: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| AppError::Store { context, source }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InvalidJson => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("Invalid JSON input"),
            ),
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("Validation failed").with_details(vec![e.to_string()]),
            ),
            AppError::Store {
                source: source @ StoreError::Evicted { .. },
                ..
            } => {
                tracing::warn!(error = %source, "Submission did not survive the record bound");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Failed to save ranking"),
                )
            }
            AppError::Store {
                context,
                source: StoreError::NotImplemented(_),
            } => (StatusCode::NOT_IMPLEMENTED, ErrorResponse::new(context)),
            AppError::Store { context, source } => {
                tracing::error!(error = %source, "{}", context);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new(context))
            }
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorResponse::new("Method Not Allowed"),
            ),
        };
        (status, Json(body)).into_response()
    }
}
