//! Ownership of the zero-or-one HTTP listener.
//!
//! # State Transitions
//! ```text
//! Stopped → Starting → Listening → Stopping → Stopped
//!              │
//!              └── bind failure → Stopped
//! ```
//!
//! Start, stop and restart share one async mutex: the previous listener is
//! fully closed before the next bind is attempted.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::{EnvironmentMode, Settings};
use crate::lifecycle::state::ProcessState;
use crate::observability::metrics;

/// How long in-flight requests may drain before the serve task is aborted.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the router served for a mode.
pub type RouterFactory = Arc<dyn Fn(EnvironmentMode) -> Router + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Listening,
    Stopping,
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("a listener is already running on {0}")]
    AlreadyRunning(SocketAddr),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Result of a restart request.
#[derive(Debug)]
pub enum RestartOutcome {
    /// The old listener is closed and the new one accepts connections.
    Restarted(SocketAddr),
    /// The running listener already serves this port and mode.
    Unchanged,
    /// No listener is running; nothing to restart.
    NotRunning,
    /// A newer restart was scheduled.
    Superseded,
    /// Binding the new port failed; the previous port was re-bound if possible.
    Failed(ServeError),
}

/// Port and mode a listener was bound with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    port: u16,
    mode: EnvironmentMode,
}

struct RunningServer {
    local_addr: SocketAddr,
    port: u16,
    mode: EnvironmentMode,
    stop: oneshot::Sender<()>,
    task: JoinHandle<io::Result<()>>,
}

pub struct ServerLifecycle {
    host: IpAddr,
    factory: RouterFactory,
    state: Arc<ProcessState>,
    drain_timeout: Duration,
    slot: Mutex<Option<RunningServer>>,
    /// Last binding that succeeded; survives the gap inside a restart.
    applied: ArcSwapOption<Binding>,
    phase: watch::Sender<ServerState>,
    /// True between `start` and `stop`, including while restarting.
    active: AtomicBool,
    latest: AtomicU64,
    restarts: AtomicU64,
}

impl ServerLifecycle {
    pub fn new(host: IpAddr, factory: RouterFactory, state: Arc<ProcessState>, drain_timeout: Duration) -> Self {
        let (phase, _) = watch::channel(ServerState::Stopped);
        Self {
            host,
            factory,
            state,
            drain_timeout,
            slot: Mutex::new(None),
            applied: ArcSwapOption::empty(),
            phase,
            active: AtomicBool::new(false),
            latest: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ServerState {
        *self.phase.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether the listener is bound with the port and mode of `settings`.
    /// False after a restart to them failed, so the next reload retries.
    pub fn serves(&self, settings: &Settings) -> bool {
        self.applied
            .load()
            .as_deref()
            .is_some_and(|b| b.port == settings.port && b.mode == settings.mode)
    }

    /// Address of the live listener, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.listening_addr()
    }

    /// Completed restarts since startup.
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::SeqCst)
    }

    /// Bind `host:port` and start serving. Resolves once the bind succeeded.
    pub async fn start(&self, settings: &Settings) -> Result<SocketAddr, ServeError> {
        let mut slot = self.slot.lock().await;
        if let Some(running) = slot.as_ref() {
            return Err(ServeError::AlreadyRunning(running.local_addr));
        }
        let addr = self.start_locked(&mut slot, settings.port, settings.mode).await?;
        self.active.store(true, Ordering::SeqCst);
        Ok(addr)
    }

    /// Stop accepting, drain in-flight requests, then release the socket.
    pub async fn stop(&self) {
        let mut slot = self.slot.lock().await;
        self.active.store(false, Ordering::SeqCst);
        self.applied.store(None);
        self.stop_locked(&mut slot).await;
    }

    /// Record `generation` as the newest target, then restart in the
    /// background.
    pub fn schedule_restart(self: &Arc<Self>, settings: Arc<Settings>, generation: u64) -> JoinHandle<RestartOutcome> {
        self.latest.fetch_max(generation, Ordering::SeqCst);
        let server = Arc::clone(self);
        tokio::spawn(async move { server.restart(&settings, generation).await })
    }

    /// Move the listener to the port and mode of `settings`.
    pub async fn restart(&self, settings: &Settings, generation: u64) -> RestartOutcome {
        self.latest.fetch_max(generation, Ordering::SeqCst);
        let mut slot = self.slot.lock().await;

        if generation < self.latest.load(Ordering::SeqCst) {
            tracing::debug!(generation, port = settings.port, "Skipping superseded restart");
            return RestartOutcome::Superseded;
        }

        let (previous_port, previous_mode) = match slot.as_ref() {
            None => return RestartOutcome::NotRunning,
            Some(running) if running.port == settings.port && running.mode == settings.mode => {
                return RestartOutcome::Unchanged;
            }
            Some(running) => (running.port, running.mode),
        };

        tracing::info!(
            generation,
            from_port = previous_port,
            to_port = settings.port,
            from_mode = %previous_mode,
            to_mode = %settings.mode,
            "Server settings changed, restarting server"
        );

        self.stop_locked(&mut slot).await;

        match self.start_locked(&mut slot, settings.port, settings.mode).await {
            Ok(addr) => {
                self.restarts.fetch_add(1, Ordering::SeqCst);
                metrics::record_restart(true);
                RestartOutcome::Restarted(addr)
            }
            Err(e) => {
                metrics::record_restart(false);
                tracing::error!(error = %e, port = settings.port, "Restart failed, restoring previous listener");
                if let Err(restore) = self.start_locked(&mut slot, previous_port, previous_mode).await {
                    self.applied.store(None);
                    tracing::error!(error = %restore, "Could not restore previous listener, no longer serving");
                }
                RestartOutcome::Failed(e)
            }
        }
    }

    async fn start_locked(
        &self,
        slot: &mut Option<RunningServer>,
        port: u16,
        mode: EnvironmentMode,
    ) -> Result<SocketAddr, ServeError> {
        self.phase.send_replace(ServerState::Starting);
        let addr = SocketAddr::new(self.host, port);

        let bound = match TcpListener::bind(addr).await {
            Ok(listener) => listener.local_addr().map(|local| (listener, local)),
            Err(e) => Err(e),
        };
        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(source) => {
                self.phase.send_replace(ServerState::Stopped);
                return Err(ServeError::Bind { addr, source });
            }
        };

        let router = (self.factory)(mode);
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = stopped.await;
                })
                .await
        });

        *slot = Some(RunningServer {
            local_addr,
            port,
            mode,
            stop,
            task,
        });
        self.applied.store(Some(Arc::new(Binding { port, mode })));
        self.state.set_listening(Some(local_addr));
        self.phase.send_replace(ServerState::Listening);
        tracing::info!(address = %local_addr, mode = %mode, "Server running");
        Ok(local_addr)
    }

    async fn stop_locked(&self, slot: &mut Option<RunningServer>) {
        let Some(mut running) = slot.take() else {
            return;
        };
        self.phase.send_replace(ServerState::Stopping);
        self.state.set_listening(None);
        tracing::info!(address = %running.local_addr, "Closing server");

        let _ = running.stop.send(());
        match time::timeout(self.drain_timeout, &mut running.task).await {
            Ok(Ok(Ok(()))) => tracing::info!(address = %running.local_addr, "Server closed"),
            Ok(Ok(Err(e))) => tracing::warn!(address = %running.local_addr, error = %e, "Server exited with error"),
            Ok(Err(e)) => tracing::warn!(address = %running.local_addr, error = %e, "Server task failed"),
            Err(_) => {
                tracing::warn!(
                    address = %running.local_addr,
                    drain_timeout = ?self.drain_timeout,
                    "Drain timed out, aborting server"
                );
                running.task.abort();
                let _ = running.task.await;
            }
        }
        self.phase.send_replace(ServerState::Stopped);
    }
}
