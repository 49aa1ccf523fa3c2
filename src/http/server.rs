//! Router assembly.
//!
//! # Responsibilities
//! - Mount the JSON API and the page fallback
//! - Serve the client build's static assets in production
//! - Wire up middleware (request id, tracing, compression, timeout, metrics)
//!
//! The listener itself is owned by [`ServerLifecycle`](crate::lifecycle::ServerLifecycle),
//! which calls [`build_router`] again whenever the mode changes.

use std::time::Duration;

use axum::extract::State;
use axum::http::Uri;
use axum::routing::any;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::EnvironmentMode;
use crate::http::middleware::track_requests;
use crate::http::request::{request_span, MakeRequestUuidV4, X_REQUEST_ID};
use crate::http::state::AppState;
use crate::http::{api, pages};

/// Upper bound on handling one request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// No endpoint accepts a meaningful body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the application router for `mode`.
#[allow(deprecated)]
pub fn build_router(state: AppState, mode: EnvironmentMode) -> Router {
    let page = any(move |State(state): State<AppState>, uri: Uri| pages::render_page(State(state), mode, uri));

    let router = api::routes();
    let router = if mode.is_production() {
        let assets = ServeDir::new(&state.pages.static_dir)
            .append_index_html_on_directories(false)
            .fallback(page.with_state(state.clone()));
        router.fallback_service(assets)
    } else {
        router.fallback(page)
    };

    router
        .with_state(state)
        .layer(axum::middleware::from_fn(track_requests))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
}
