//! End-to-end reload behavior against a live listener.

mod common;

use std::time::Duration;

use hotenv::config::WatchStrategy;
use serde_json::Value;

use common::{eventually, free_port, TestConnector, TestServer, DOWN_DB, UP_DB};

async fn get_json(url: &str) -> Value {
    reqwest::get(url).await.unwrap().json().await.unwrap()
}

async fn post_reload(url: &str) -> (u16, Value) {
    let res = reqwest::Client::new().post(url).send().await.unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn database_down_at_startup_recovers_after_reload() {
    let server = TestServer::start(
        &[("PORT", "0"), ("DATABASE_URL", DOWN_DB)],
        TestConnector::reaching(&[UP_DB]),
        WatchStrategy::Off,
    )
    .await;

    let status = get_json(&server.url("/api/status")).await;
    assert_eq!(status["dbConnected"], false);
    assert_eq!(status["nodeEnv"], "development");

    server.rewrite_env(&[("PORT", "0"), ("DATABASE_URL", UP_DB)]);
    let (code, body) = post_reload(&server.url("/api/reload-env")).await;
    assert_eq!(code, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["databaseUrlChanged"], true);
    assert_eq!(body["serverRestarting"], false);

    let state = server.runtime.state().clone();
    assert!(eventually(Duration::from_secs(3), || state.is_db_connected()).await);

    let status = get_json(&server.url("/api/status")).await;
    assert_eq!(status["dbConnected"], true);

    server.stop().await;
}

#[tokio::test]
async fn port_change_moves_the_listener() {
    let old_port = free_port();
    let new_port = free_port();
    let (old, new) = (old_port.to_string(), new_port.to_string());
    let server = TestServer::start(
        &[("PORT", old.as_str()), ("DATABASE_URL", UP_DB)],
        TestConnector::reaching(&[UP_DB]),
        WatchStrategy::Off,
    )
    .await;
    assert_eq!(server.addr().port(), old_port);
    let connects = server.connector.log().len();

    server.rewrite_env(&[("PORT", new.as_str()), ("DATABASE_URL", UP_DB)]);
    let (code, body) = post_reload(&format!("http://127.0.0.1:{old_port}/api/reload-env")).await;
    assert_eq!(code, 200);
    assert_eq!(body["serverRestarting"], true);
    assert_eq!(body["databaseUrlChanged"], false);
    assert_eq!(body["port"], new_port);

    let server_lifecycle = server.runtime.reconciler().server().clone();
    assert!(eventually(Duration::from_secs(5), || server_lifecycle.restarts() == 1).await);

    let status = get_json(&format!("http://127.0.0.1:{new_port}/api/status")).await;
    assert_eq!(status["port"], new_port);
    assert!(reqwest::get(format!("http://127.0.0.1:{old_port}/api/status")).await.is_err());
    assert_eq!(server.connector.log().len(), connects, "no reconnect on port change");

    server.stop().await;
}

#[tokio::test]
async fn polling_watcher_applies_file_changes() {
    let other = "postgresql://localhost:5432/other";
    let server = TestServer::start(
        &[("PORT", "0"), ("DATABASE_URL", UP_DB)],
        TestConnector::reaching(&[UP_DB, other]),
        WatchStrategy::Poll,
    )
    .await;
    let addr = server.addr();

    // coarse mtime resolution on some filesystems
    tokio::time::sleep(Duration::from_millis(1100)).await;
    server.rewrite_env(&[("PORT", "0"), ("DATABASE_URL", other)]);

    let state = server.runtime.state().clone();
    assert!(eventually(Duration::from_secs(5), || state.settings().database_url == other).await);

    let pool = server.runtime.reconciler().pool().clone();
    assert!(
        eventually(Duration::from_secs(5), || pool
            .descriptor()
            .is_some_and(|d| d.as_str() == other))
        .await
    );
    assert_eq!(
        server.connector.log(),
        vec![format!("connect {UP_DB}"), format!("close {UP_DB}"), format!("connect {other}")]
    );
    assert_eq!(server.addr(), addr);
    assert_eq!(server.runtime.reconciler().server().restarts(), 0);

    server.stop().await;
}

#[tokio::test]
async fn unreadable_config_reports_failure() {
    let server = TestServer::start(
        &[("PORT", "0"), ("DATABASE_URL", UP_DB)],
        TestConnector::reaching(&[UP_DB]),
        WatchStrategy::Off,
    )
    .await;

    std::fs::remove_file(&server.env_path).unwrap();
    let (code, body) = post_reload(&server.url("/api/reload-env")).await;
    assert_eq!(code, 500);
    assert_eq!(body["success"], false);
    assert_eq!(body["dbConnected"], true);
    assert_eq!(body["port"], 0);

    server.stop().await;
}

#[tokio::test]
async fn shutdown_closes_pool_and_listener() {
    let server = TestServer::start(
        &[("PORT", "0"), ("DATABASE_URL", UP_DB)],
        TestConnector::reaching(&[UP_DB]),
        WatchStrategy::Auto,
    )
    .await;
    let addr = server.addr();
    let state = server.runtime.state().clone();
    let connector = server.connector.clone();

    server.stop().await;

    assert!(!state.is_db_connected());
    assert_eq!(state.listening_addr(), None);
    assert_eq!(connector.log().last().unwrap(), &format!("close {UP_DB}"));
    assert!(reqwest::get(format!("http://{addr}/api/status")).await.is_err());
}
