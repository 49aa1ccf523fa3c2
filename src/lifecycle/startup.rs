//! Startup orchestration.
//!
//! # Order
//! ```text
//! load settings (missing file degrades to env + defaults)
//!     → open database pool (failure degrades to db_connected = false)
//!     → bind listener (failure is fatal)
//!     → spawn reload loop, config watcher, SIGHUP listener
//! ```
//!
//! [`Runtime::shutdown`] reverses it: stop background tasks, drain the
//! listener, close the pool.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::{ConfigSource, ConfigWatcher, WatchHandle, WatcherConfig};
use crate::db::{Connector, ResourcePool, DEFAULT_CONNECT_TIMEOUT};
use crate::http::{build_router, AppState, PageOptions};
use crate::lifecycle::reconciler::Reconciler;
use crate::lifecycle::server::{RouterFactory, ServeError, ServerLifecycle, DEFAULT_DRAIN_TIMEOUT};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::lifecycle::state::ProcessState;
use crate::lifecycle::trigger::ReloadTrigger;

/// Pending reload requests beyond this are coalesced.
pub const RELOAD_QUEUE_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to start HTTP server: {0}")]
    Serve(#[from] ServeError),
}

/// Process-level options that are not hot-reloadable.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub host: IpAddr,
    pub watcher: WatcherConfig,
    pub connect_timeout: Duration,
    pub drain_timeout: Duration,
    pub pages: PageOptions,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            watcher: WatcherConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            pages: PageOptions::default(),
        }
    }
}

/// Everything started by [`launch`].
pub struct Runtime {
    state: Arc<ProcessState>,
    reconciler: Arc<Reconciler>,
    trigger: ReloadTrigger,
    shutdown: Shutdown,
    reload_task: JoinHandle<()>,
    watch: WatchHandle,
    hangup: JoinHandle<()>,
}

pub async fn launch(
    source: ConfigSource,
    connector: Arc<dyn Connector>,
    options: RuntimeOptions,
) -> Result<Runtime, StartupError> {
    let settings = source.load_or_default().await;
    tracing::info!(
        path = %source.path().display(),
        port = settings.port,
        mode = %settings.mode,
        database = %settings.descriptor(),
        mock_fallback = settings.mock_fallback,
        "Configuration loaded"
    );

    let state = Arc::new(ProcessState::new(settings.clone()));
    let pool = Arc::new(ResourcePool::new(connector, Arc::clone(&state), options.connect_timeout));
    if let Err(e) = pool.open(settings.descriptor()).await {
        tracing::warn!(error = %e, "Starting without a database connection");
    }

    let (trigger, queue) = ReloadTrigger::channel(RELOAD_QUEUE_CAPACITY);

    let app = AppState {
        process: Arc::clone(&state),
        pool: Arc::clone(&pool),
        reload: trigger.clone(),
        pages: Arc::new(options.pages.clone()),
    };
    let factory: RouterFactory = Arc::new(move |mode| build_router(app.clone(), mode));
    let server = Arc::new(ServerLifecycle::new(
        options.host,
        factory,
        Arc::clone(&state),
        options.drain_timeout,
    ));

    let addr = match server.start(&settings).await {
        Ok(addr) => addr,
        Err(e) => {
            pool.shutdown().await;
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    let reconciler = Arc::new(Reconciler::new(
        source.clone(),
        Arc::clone(&state),
        pool,
        server,
    ));
    let reload_task = tokio::spawn(Arc::clone(&reconciler).run(queue, shutdown.subscribe()));
    let watch = ConfigWatcher::new(source.path(), options.watcher.clone(), trigger.clone())
        .spawn(shutdown.subscribe());
    let hangup = signals::spawn_reload_on_hangup(trigger.clone(), shutdown.subscribe());

    tracing::info!(
        address = %addr,
        db_connected = state.is_db_connected(),
        watch = watch.mode(),
        "Server running"
    );

    Ok(Runtime {
        state,
        reconciler,
        trigger,
        shutdown,
        reload_task,
        watch,
        hangup,
    })
}

impl Runtime {
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.reconciler.server().local_addr()
    }

    pub fn state(&self) -> &Arc<ProcessState> {
        &self.state
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Handle for requesting reloads from outside the runtime.
    pub fn trigger(&self) -> ReloadTrigger {
        self.trigger.clone()
    }

    pub fn watch_mode(&self) -> &'static str {
        self.watch.mode()
    }

    /// Stop background tasks, drain the listener, then close the pool.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down");
        self.shutdown.trigger();

        if let Err(e) = self.reload_task.await {
            tracing::warn!(error = %e, "Reload loop ended abnormally");
        }
        self.watch.join().await;
        if let Err(e) = self.hangup.await {
            tracing::warn!(error = %e, "Signal listener ended abnormally");
        }

        self.reconciler.shutdown().await;
        tracing::info!("Shutdown complete");
    }
}
