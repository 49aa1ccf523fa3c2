//! Router behavior without a listener.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use hotenv::config::{EnvironmentMode, Settings};
use hotenv::db::{ConnectionDescriptor, ResourcePool};
use hotenv::http::{build_router, AppState, PageOptions};
use hotenv::lifecycle::{ProcessState, ReloadTrigger};
use serde_json::Value;

use common::{TestConnector, UP_DB};

struct Fixture {
    dir: tempfile::TempDir,
    state: AppState,
}

impl Fixture {
    fn new(mock_fallback: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            mock_fallback,
            ..Settings::default()
        };
        let process = Arc::new(ProcessState::new(settings));
        let pool = Arc::new(ResourcePool::new(
            Arc::new(TestConnector::reaching(&[UP_DB])),
            process.clone(),
            Duration::from_secs(1),
        ));
        // no reconciler behind the queue
        let (reload, _) = ReloadTrigger::channel(1);

        let state = AppState {
            process,
            pool,
            reload,
            pages: Arc::new(PageOptions {
                template: dir.path().join("index.html"),
                static_dir: dir.path().join("dist"),
            }),
        };
        Self { dir, state }
    }

    async fn connect(&self) {
        self.state.pool.open(ConnectionDescriptor::new(UP_DB)).await.unwrap();
    }

    fn router(&self, mode: EnvironmentMode) -> Router {
        build_router(self.state.clone(), mode)
    }
}

async fn send(router: Router, method: &str, uri: &str) -> Response {
    router
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn status_reports_snapshot() {
    let fixture = Fixture::new(true);
    let response = send(fixture.router(EnvironmentMode::Development), "GET", "/api/status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["dbConnected"], false);
    assert_eq!(body["port"], 3000);
    assert_eq!(body["nodeEnv"], "development");

    // ISO-8601 with milliseconds, UTC
    let time = body["serverTime"].as_str().unwrap();
    assert!(time.ends_with('Z'));
    assert_eq!(time.len(), "2024-01-01T00:00:00.000Z".len());
}

#[tokio::test]
async fn every_response_has_a_request_id() {
    let fixture = Fixture::new(true);
    let generated = send(fixture.router(EnvironmentMode::Development), "GET", "/api/status").await;
    let id = generated.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(id.len(), 36);

    let supplied = fixture
        .router(EnvironmentMode::Development)
        .oneshot(
            Request::builder()
                .uri("/api/status")
                .header("x-request-id", "client-chosen")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(supplied.headers()["x-request-id"], "client-chosen");
}

#[tokio::test]
async fn connected_database_serves_rows() {
    let fixture = Fixture::new(true);
    fixture.connect().await;

    let list = send(fixture.router(EnvironmentMode::Development), "GET", "/api/users").await;
    assert_eq!(list.status(), StatusCode::OK);
    assert!(list.headers().get("x-data-source").is_none());
    assert_eq!(body_json(list).await.as_array().unwrap().len(), 2);

    let one = send(fixture.router(EnvironmentMode::Development), "GET", "/api/products/2").await;
    assert_eq!(body_json(one).await["table"], "products");

    let missing = send(fixture.router(EnvironmentMode::Development), "GET", "/api/tasks/99").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(missing).await["message"], "Task not found");
}

#[tokio::test]
async fn disconnected_database_falls_back_to_mock_rows() {
    let fixture = Fixture::new(true);

    let list = send(fixture.router(EnvironmentMode::Development), "GET", "/api/posts").await;
    assert_eq!(list.status(), StatusCode::OK);
    assert_eq!(list.headers()["x-data-source"], "mock");
    assert_eq!(body_json(list).await.as_array().unwrap().len(), 4);

    let user = send(fixture.router(EnvironmentMode::Development), "GET", "/api/users/1").await;
    assert_eq!(body_json(user).await["name"], "John Doe");

    let missing = send(fixture.router(EnvironmentMode::Development), "GET", "/api/users/42").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(missing).await["message"], "User not found");
}

#[tokio::test]
async fn disconnected_database_without_fallback_is_unavailable() {
    let fixture = Fixture::new(false);
    let response = send(fixture.router(EnvironmentMode::Development), "GET", "/api/users").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["message"], "Database not connected");
}

#[tokio::test]
async fn non_numeric_id_is_rejected() {
    let fixture = Fixture::new(true);
    let response = send(fixture.router(EnvironmentMode::Development), "GET", "/api/users/abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reload_without_reconciler_is_unavailable() {
    let fixture = Fixture::new(true);
    let response = send(fixture.router(EnvironmentMode::Development), "POST", "/api/reload-env").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["serverRestarting"], false);
}

#[tokio::test]
async fn other_routes_render_the_page() {
    let fixture = Fixture::new(true);

    let shell = send(fixture.router(EnvironmentMode::Development), "GET", "/dashboard").await;
    assert_eq!(shell.status(), StatusCode::OK);
    let html = body_text(shell).await;
    assert!(html.contains(r#"data-path="/dashboard""#));
    assert!(!html.contains("<!--app-html-->"));

    std::fs::write(
        fixture.dir.path().join("index.html"),
        "<html><body>custom<!--app-html--></body></html>",
    )
    .unwrap();
    let custom = send(fixture.router(EnvironmentMode::Development), "POST", "/anything").await;
    let html = body_text(custom).await;
    assert!(html.starts_with("<html><body>custom<main"));
}

#[tokio::test]
async fn production_serves_build_assets() {
    let fixture = Fixture::new(true);
    let dist = fixture.dir.path().join("dist");
    std::fs::create_dir_all(&dist).unwrap();
    std::fs::write(dist.join("app.js"), "console.log('hi')").unwrap();
    std::fs::write(dist.join("index.html"), "<html>built<!--app-html--></html>").unwrap();

    let asset = send(fixture.router(EnvironmentMode::Production), "GET", "/app.js").await;
    assert_eq!(asset.status(), StatusCode::OK);
    assert_eq!(body_text(asset).await, "console.log('hi')");

    let page = send(fixture.router(EnvironmentMode::Production), "GET", "/").await;
    assert_eq!(page.status(), StatusCode::OK);
    assert!(body_text(page).await.starts_with("<html>built<main"));

    // development does not expose the build directory
    let hidden = send(fixture.router(EnvironmentMode::Development), "GET", "/app.js").await;
    assert!(!body_text(hidden).await.contains("console.log"));
}
