//! Error types for the Valence server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed configuration: unknown service key, absent
    /// required value.  Fatal for the request.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A patron or bib failed a service eligibility predicate.  Always
    /// carries the explanation shown to the patron.
    #[error("{0}")]
    Ineligible(String),

    /// A downstream API call failed.  Recoverable per call.
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Backend(e.to_string())
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration",
                    "Internal configuration error".to_string(),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::Ineligible(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "ineligible", msg.clone())
            }
            AppError::Backend(msg) => (StatusCode::BAD_GATEWAY, "backend", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database",
                    "Database error".to_string(),
                )
            }
            AppError::Mail(msg) => {
                tracing::error!("Mail error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "mail",
                    "Notification delivery failed".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl AppError {
    /// The message safe to show a patron.  Internal failure classes collapse
    /// to a generic message; the details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound(msg) | AppError::Ineligible(msg) | AppError::Backend(msg) => {
                msg.clone()
            }
            AppError::Configuration(_)
            | AppError::Database(_)
            | AppError::Mail(_)
            | AppError::Internal(_) => {
                "This request cannot be completed right now. Please try again later.".to_string()
            }
        }
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
