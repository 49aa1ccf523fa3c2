//! JSON API handlers.

use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::db::{mock, DataError, Table};
use crate::http::error::ApiError;
use crate::http::state::AppState;
use crate::lifecycle::trigger::{ReloadError, ReloadSource};

/// Marks responses served from static rows instead of the database.
pub const X_DATA_SOURCE: HeaderName = HeaderName::from_static("x-data-source");

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub db_connected: bool,
    pub server_time: String,
    pub port: u16,
    pub node_env: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResponse {
    pub success: bool,
    pub message: String,
    pub port: u16,
    pub node_env: &'static str,
    pub db_connected: bool,
    pub database_url_changed: bool,
    pub server_restarting: bool,
}

/// `/api/status`, `/api/reload-env` and the per-table data routes.
pub fn routes() -> Router<AppState> {
    let mut router = Router::new()
        .route("/api/status", get(status))
        .route("/api/reload-env", post(reload_env));

    for table in Table::ALL {
        router = router
            .route(
                &format!("/api/{}", table.name()),
                get(move |State(state): State<AppState>| list_rows(state, table)),
            )
            .route(
                &format!("/api/{}/{{id}}", table.name()),
                get(move |State(state): State<AppState>, Path(id): Path<String>| get_row(state, table, id)),
            );
    }

    router
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let settings = state.process.settings();
    Json(StatusResponse {
        db_connected: state.process.is_db_connected(),
        server_time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        port: settings.port,
        node_env: settings.mode.as_str(),
    })
}

pub async fn reload_env(State(state): State<AppState>) -> (StatusCode, Json<ReloadResponse>) {
    match state.reload.request(ReloadSource::Http).await {
        Ok(report) => (
            StatusCode::OK,
            Json(ReloadResponse {
                success: true,
                message: "Environment variables reloaded".to_string(),
                port: report.current.port,
                node_env: report.current.mode.as_str(),
                db_connected: state.process.is_db_connected(),
                database_url_changed: report.diff.database_changed(),
                server_restarting: report.server_restarting,
            }),
        ),
        Err(e) => {
            let status = match e {
                ReloadError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ReloadError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            };
            let settings = state.process.settings();
            (
                status,
                Json(ReloadResponse {
                    success: false,
                    message: format!("Failed to reload environment variables: {e}"),
                    port: settings.port,
                    node_env: settings.mode.as_str(),
                    db_connected: state.process.is_db_connected(),
                    database_url_changed: false,
                    server_restarting: false,
                }),
            )
        }
    }
}

async fn list_rows(state: AppState, table: Table) -> Result<Response, ApiError> {
    match state.pool.fetch_all(table).await {
        Ok(rows) => Ok(Json(rows).into_response()),
        Err(DataError::NotConnected) if state.process.settings().mock_fallback => {
            tracing::debug!(table = table.name(), "Database not connected, serving mock rows");
            Ok(mock_response(Value::Array(mock::rows(table))))
        }
        Err(e) => Err(e.into()),
    }
}

async fn get_row(state: AppState, table: Table, raw_id: String) -> Result<Response, ApiError> {
    let id: i64 = raw_id.parse().map_err(|_| ApiError::InvalidId(raw_id.clone()))?;

    match state.pool.fetch_one(table, id).await {
        Ok(Some(row)) => Ok(Json(row).into_response()),
        Ok(None) => Err(ApiError::NotFound(table)),
        Err(DataError::NotConnected) if state.process.settings().mock_fallback => mock::row(table, id)
            .map(mock_response)
            .ok_or(ApiError::NotFound(table)),
        Err(e) => Err(e.into()),
    }
}

fn mock_response(body: Value) -> Response {
    ([(X_DATA_SOURCE, HeaderValue::from_static("mock"))], Json(body)).into_response()
}
