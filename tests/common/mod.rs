//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::{json, Value};

use hotenv::config::{ConfigSource, WatchStrategy, WatcherConfig};
use hotenv::db::{CloseError, ConnectError, ConnectionDescriptor, Connector, DatabasePool, QueryError, Table};
use hotenv::http::PageOptions;
use hotenv::lifecycle::{launch, Runtime, RuntimeOptions};

pub const UP_DB: &str = "postgresql://localhost:5432/up";
pub const DOWN_DB: &str = "postgresql://localhost:5432/down";

/// Connector that only reaches the databases it was told about.
#[derive(Clone, Default)]
pub struct TestConnector {
    reachable: Arc<Mutex<HashSet<String>>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl TestConnector {
    pub fn reaching(urls: &[&str]) -> Self {
        let connector = Self::default();
        for url in urls {
            connector.make_reachable(url);
        }
        connector
    }

    pub fn make_reachable(&self, url: &str) {
        self.reachable.lock().unwrap().insert(url.to_string());
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Connector for TestConnector {
    fn connect<'a>(
        &'a self,
        descriptor: &'a ConnectionDescriptor,
    ) -> BoxFuture<'a, Result<Box<dyn DatabasePool>, ConnectError>> {
        Box::pin(async move {
            let url = descriptor.as_str().to_string();
            self.log.lock().unwrap().push(format!("connect {url}"));
            if !self.reachable.lock().unwrap().contains(&url) {
                return Err(ConnectError::Driver(format!("{url} refused the connection")));
            }
            Ok(Box::new(TestPool {
                url,
                log: Arc::clone(&self.log),
            }) as Box<dyn DatabasePool>)
        })
    }
}

struct TestPool {
    url: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl DatabasePool for TestPool {
    fn probe(&self) -> BoxFuture<'_, Result<(), QueryError>> {
        Box::pin(async { Ok(()) })
    }

    fn fetch_all(&self, table: Table) -> BoxFuture<'_, Result<Vec<Value>, QueryError>> {
        Box::pin(async move {
            Ok(vec![
                json!({ "id": 1, "table": table.name(), "database": self.url }),
                json!({ "id": 2, "table": table.name(), "database": self.url }),
            ])
        })
    }

    fn fetch_one(&self, table: Table, id: i64) -> BoxFuture<'_, Result<Option<Value>, QueryError>> {
        Box::pin(async move {
            Ok((id <= 2).then(|| json!({ "id": id, "table": table.name(), "database": self.url })))
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), CloseError>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("close {}", self.url));
            Ok(())
        })
    }
}

/// Write a dotenv file from key/value pairs.
pub fn write_env(path: &Path, pairs: &[(&str, &str)]) {
    let body: String = pairs.iter().map(|(k, v)| format!("{k}={v}\n")).collect();
    std::fs::write(path, body).unwrap();
}

pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub fn options(strategy: WatchStrategy, pages: PageOptions) -> RuntimeOptions {
    RuntimeOptions {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        watcher: WatcherConfig {
            strategy,
            debounce: Duration::from_millis(50),
            poll_interval: Duration::from_millis(50),
        },
        connect_timeout: Duration::from_secs(2),
        drain_timeout: Duration::from_secs(2),
        pages,
    }
}

/// A running server rooted in a temporary directory.
pub struct TestServer {
    pub dir: tempfile::TempDir,
    pub env_path: PathBuf,
    pub connector: TestConnector,
    pub runtime: Runtime,
}

impl TestServer {
    pub async fn start(pairs: &[(&str, &str)], connector: TestConnector, strategy: WatchStrategy) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join(".env");
        write_env(&env_path, pairs);

        let pages = PageOptions {
            template: dir.path().join("index.html"),
            static_dir: dir.path().join("dist"),
        };
        let runtime = launch(
            ConfigSource::new(&env_path),
            Arc::new(connector.clone()),
            options(strategy, pages),
        )
        .await
        .unwrap();

        Self {
            dir,
            env_path,
            connector,
            runtime,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.runtime.local_addr().expect("server listening")
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr(), path)
    }

    pub fn rewrite_env(&self, pairs: &[(&str, &str)]) {
        write_env(&self.env_path, pairs);
    }

    pub async fn stop(self) {
        self.runtime.shutdown().await;
    }
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
