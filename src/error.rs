use crate::datasource::QuoteError;
use crate::engine::LedgerError;
use crate::orchestration::DeskError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// The command was well formed but the ledger refused it.
    #[error("Rejected: {0}")]
    Rejected(String),
    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<DeskError> for AppError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::Ledger(e @ LedgerError::AccountNotFound(_)) => {
                AppError::NotFound(e.to_string())
            }
            DeskError::Ledger(e @ LedgerError::InvalidOperand(_)) => {
                AppError::BadRequest(e.to_string())
            }
            DeskError::Ledger(e) => AppError::Rejected(e.to_string()),
            DeskError::Quote(e @ QuoteError::UnsupportedInstrument(_)) => {
                AppError::BadRequest(e.to_string())
            }
            DeskError::Quote(e) => AppError::QuoteUnavailable(e.to_string()),
            DeskError::Database(e) => AppError::from(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Rejected(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::QuoteUnavailable(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
