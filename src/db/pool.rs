//! Ownership of the zero-or-one open database pool.
//!
//! # State Transitions
//! ```text
//! Closed → Opening → Open → Closing → Closed
//!             │
//!             └── connect/probe failure → Closed
//! ```
//!
//! All transitions run under one async mutex, so closing the old pool always
//! completes before a new one is opened and at most one pool is ever live.
//! The handle is published to readers only once it is `Open`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use crate::db::{ConnectError, ConnectionDescriptor, Connector, DataError, DatabasePool, Table};
use crate::lifecycle::state::ProcessState;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Result of a reconcile request.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The open pool already targets this descriptor.
    Unchanged,
    /// The new descriptor is open and published.
    Connected,
    /// Connecting failed; the pool is closed.
    Failed(ConnectError),
    /// A newer generation was scheduled; nothing was published.
    Superseded,
}

struct ResourceHandle {
    descriptor: ConnectionDescriptor,
    pool: Box<dyn DatabasePool>,
}

pub struct ResourcePool {
    connector: Arc<dyn Connector>,
    state: Arc<ProcessState>,
    connect_timeout: Duration,
    /// Reader view; `Some` only while Open.
    current: ArcSwapOption<ResourceHandle>,
    /// Owning slot; the lock serializes every transition.
    slot: Mutex<Option<Arc<ResourceHandle>>>,
    phase: watch::Sender<ResourceState>,
    latest: AtomicU64,
}

impl ResourcePool {
    pub fn new(connector: Arc<dyn Connector>, state: Arc<ProcessState>, connect_timeout: Duration) -> Self {
        let (phase, _) = watch::channel(ResourceState::Closed);
        Self {
            connector,
            state,
            connect_timeout,
            current: ArcSwapOption::empty(),
            slot: Mutex::new(None),
            phase,
            latest: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ResourceState {
        *self.phase.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.current.load().is_some()
    }

    /// Descriptor of the open pool, if any.
    pub fn descriptor(&self) -> Option<ConnectionDescriptor> {
        self.current.load_full().map(|h| h.descriptor.clone())
    }

    /// Open `descriptor`, closing whatever is open first.
    ///
    /// Failures are logged and leave the pool closed; the error is returned
    /// for callers that want to report it.
    pub async fn open(&self, descriptor: ConnectionDescriptor) -> Result<(), ConnectError> {
        let mut slot = self.slot.lock().await;
        self.close_locked(&mut slot).await;
        let handle = self.open_locked(&descriptor).await?;
        self.publish(&mut slot, handle);
        Ok(())
    }

    /// Close the open pool, if any. Close errors are logged only.
    pub async fn close(&self) {
        let mut slot = self.slot.lock().await;
        self.close_locked(&mut slot).await;
    }

    /// Close the pool and supersede every reconcile still queued behind it.
    pub async fn shutdown(&self) {
        self.latest.store(u64::MAX, Ordering::SeqCst);
        self.close().await;
    }

    /// Record `generation` as the newest target, then reconcile in the
    /// background.
    pub fn schedule(self: &Arc<Self>, descriptor: ConnectionDescriptor, generation: u64) -> JoinHandle<ReconcileOutcome> {
        self.latest.fetch_max(generation, Ordering::SeqCst);
        let pool = Arc::clone(self);
        tokio::spawn(async move { pool.reconcile(descriptor, generation).await })
    }

    /// Point the pool at `descriptor` unless a newer generation has been
    /// scheduled.
    pub async fn reconcile(&self, descriptor: ConnectionDescriptor, generation: u64) -> ReconcileOutcome {
        self.latest.fetch_max(generation, Ordering::SeqCst);
        let mut slot = self.slot.lock().await;

        if self.is_stale(generation) {
            tracing::debug!(generation, database = %descriptor, "Skipping superseded reconnect");
            return ReconcileOutcome::Superseded;
        }

        match slot.as_ref() {
            Some(handle) if handle.descriptor == descriptor => return ReconcileOutcome::Unchanged,
            Some(handle) => tracing::info!(
                generation,
                from = %handle.descriptor,
                to = %descriptor,
                "Database connection string changed, reconnecting"
            ),
            None => tracing::info!(
                generation,
                to = %descriptor,
                "No existing database connection, connecting with new settings"
            ),
        }

        self.close_locked(&mut slot).await;

        match self.open_locked(&descriptor).await {
            Ok(handle) => {
                if self.is_stale(generation) {
                    tracing::info!(generation, database = %descriptor, "Reconnect superseded while opening, discarding");
                    self.release(handle).await;
                    return ReconcileOutcome::Superseded;
                }
                self.publish(&mut slot, handle);
                ReconcileOutcome::Connected
            }
            Err(e) => ReconcileOutcome::Failed(e),
        }
    }

    pub async fn fetch_all(&self, table: Table) -> Result<Vec<Value>, DataError> {
        let handle = self.current.load_full().ok_or(DataError::NotConnected)?;
        Ok(handle.pool.fetch_all(table).await?)
    }

    pub async fn fetch_one(&self, table: Table, id: i64) -> Result<Option<Value>, DataError> {
        let handle = self.current.load_full().ok_or(DataError::NotConnected)?;
        Ok(handle.pool.fetch_one(table, id).await?)
    }

    fn is_stale(&self, generation: u64) -> bool {
        generation < self.latest.load(Ordering::SeqCst)
    }

    async fn open_locked(&self, descriptor: &ConnectionDescriptor) -> Result<Arc<ResourceHandle>, ConnectError> {
        self.phase.send_replace(ResourceState::Opening);
        tracing::info!(database = %descriptor, "Connecting to database");

        let result = self.connect_and_probe(descriptor).await;
        metrics::record_db_connect(result.is_ok());

        match result {
            Ok(pool) => {
                tracing::info!(database = %descriptor, "Database connection successful");
                Ok(Arc::new(ResourceHandle {
                    descriptor: descriptor.clone(),
                    pool,
                }))
            }
            Err(e) => {
                self.phase.send_replace(ResourceState::Closed);
                self.state.set_db_connected(false);
                tracing::warn!(database = %descriptor, error = %e, "Database connection failed");
                Err(e)
            }
        }
    }

    async fn connect_and_probe(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabasePool>, ConnectError> {
        let pool = match time::timeout(self.connect_timeout, self.connector.connect(descriptor)).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectError::Timeout(self.connect_timeout)),
        };

        let probe = match time::timeout(self.connect_timeout, pool.probe()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectError::Probe(e)),
            Err(_) => Err(ConnectError::Timeout(self.connect_timeout)),
        };

        match probe {
            Ok(()) => Ok(pool),
            Err(e) => {
                if let Err(close_err) = pool.close().await {
                    tracing::warn!(error = %close_err, "Error closing pool after failed probe");
                }
                Err(e)
            }
        }
    }

    fn publish(&self, slot: &mut Option<Arc<ResourceHandle>>, handle: Arc<ResourceHandle>) {
        self.current.store(Some(Arc::clone(&handle)));
        *slot = Some(handle);
        self.phase.send_replace(ResourceState::Open);
        self.state.set_db_connected(true);
    }

    async fn close_locked(&self, slot: &mut Option<Arc<ResourceHandle>>) {
        let Some(handle) = slot.take() else {
            return;
        };
        self.current.store(None);
        self.state.set_db_connected(false);
        self.release(handle).await;
    }

    async fn release(&self, handle: Arc<ResourceHandle>) {
        self.phase.send_replace(ResourceState::Closing);
        tracing::info!(database = %handle.descriptor, "Closing database connection");
        match handle.pool.close().await {
            Ok(()) => tracing::info!(database = %handle.descriptor, "Database connection closed"),
            Err(e) => tracing::warn!(database = %handle.descriptor, error = %e, "Error closing database connection"),
        }
        self.phase.send_replace(ResourceState::Closed);
    }
}
