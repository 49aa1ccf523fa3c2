//! In-memory connector for exercising pool transitions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::{json, Value};

use crate::db::{CloseError, ConnectError, ConnectionDescriptor, Connector, DatabasePool, QueryError, Table};

#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    Up { delay: Duration },
    Down,
    Hang,
    ProbeFails,
    CloseFails,
}

#[derive(Default)]
struct Registry {
    behaviors: Mutex<HashMap<String, Behavior>>,
    log: Mutex<Vec<String>>,
    open: AtomicUsize,
    max_open: AtomicUsize,
}

impl Registry {
    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeConnector {
    registry: Arc<Registry>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, url: &str, behavior: Behavior) {
        self.registry
            .behaviors
            .lock()
            .unwrap()
            .insert(url.to_string(), behavior);
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.registry.log.lock().unwrap().clone()
    }

    /// Pools currently open.
    pub(crate) fn open_count(&self) -> usize {
        self.registry.open.load(Ordering::SeqCst)
    }

    /// Most pools ever open at the same time.
    pub(crate) fn max_open(&self) -> usize {
        self.registry.max_open.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    fn connect<'a>(
        &'a self,
        descriptor: &'a ConnectionDescriptor,
    ) -> BoxFuture<'a, Result<Box<dyn DatabasePool>, ConnectError>> {
        Box::pin(async move {
            let url = descriptor.as_str().to_string();
            let behavior = self
                .registry
                .behaviors
                .lock()
                .unwrap()
                .get(&url)
                .cloned()
                .unwrap_or(Behavior::Up { delay: Duration::ZERO });
            self.registry.record(format!("connect {url}"));

            match &behavior {
                Behavior::Down => return Err(ConnectError::Driver("connection refused".into())),
                Behavior::Hang => std::future::pending::<()>().await,
                Behavior::Up { delay } if !delay.is_zero() => tokio::time::sleep(*delay).await,
                _ => {}
            }

            let open = self.registry.open.fetch_add(1, Ordering::SeqCst) + 1;
            self.registry.max_open.fetch_max(open, Ordering::SeqCst);

            Ok(Box::new(FakePool {
                url,
                behavior,
                registry: Arc::clone(&self.registry),
                closed: AtomicBool::new(false),
            }) as Box<dyn DatabasePool>)
        })
    }
}

struct FakePool {
    url: String,
    behavior: Behavior,
    registry: Arc<Registry>,
    closed: AtomicBool,
}

impl DatabasePool for FakePool {
    fn probe(&self) -> BoxFuture<'_, Result<(), QueryError>> {
        Box::pin(async move {
            self.registry.record(format!("probe {}", self.url));
            match self.behavior {
                Behavior::ProbeFails => Err(QueryError("probe rejected".into())),
                _ => Ok(()),
            }
        })
    }

    fn fetch_all(&self, table: Table) -> BoxFuture<'_, Result<Vec<Value>, QueryError>> {
        Box::pin(async move { Ok(vec![json!({ "id": 1, "table": table.name(), "source": self.url })]) })
    }

    fn fetch_one(&self, table: Table, id: i64) -> BoxFuture<'_, Result<Option<Value>, QueryError>> {
        Box::pin(async move {
            Ok((id == 1).then(|| json!({ "id": 1, "table": table.name(), "source": self.url })))
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), CloseError>> {
        Box::pin(async move {
            if !self.closed.swap(true, Ordering::SeqCst) {
                self.registry.open.fetch_sub(1, Ordering::SeqCst);
            }
            self.registry.record(format!("close {}", self.url));
            match self.behavior {
                Behavior::CloseFails => Err(CloseError("socket already gone".into())),
                _ => Ok(()),
            }
        })
    }
}
