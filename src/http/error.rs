//! Error responses for the JSON API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::db::{DataError, Table};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Database not connected")]
    NotConnected,

    #[error("{} not found", .0.label())]
    NotFound(Table),

    #[error("invalid id {0:?}")]
    InvalidId(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<DataError> for ApiError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::NotConnected => ApiError::NotConnected,
            DataError::Query(e) => ApiError::Database(e.0),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidId(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::Database(message) => {
                tracing::error!(error = %message, "Database query failed");
                json!({ "error": "Database error", "message": message })
            }
            other => json!({ "message": other.to_string() }),
        };
        (self.status(), Json(body)).into_response()
    }
}
