//! Applies configuration reloads to the dependent resources.
//!
//! # Reload Flow
//! ```text
//! reload():
//!     [serialized] previous ← snapshot
//!     [serialized] current ← ConfigSource::load()   (failure: abort, keep previous)
//!     [serialized] install current, bump generation
//!     diff(previous, current)
//!         database_url changed        → ResourcePool::schedule(gen)
//!         port/mode changed or not yet
//!         served by the listener & running → ServerLifecycle::schedule_restart(gen)
//!     return report without awaiting either task
//! ```
//!
//! Scheduled transitions may overlap later reloads. Each resource drops work
//! whose generation is older than the newest one it has seen.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::{ConfigReadError, ConfigSource, Settings, SettingsDiff};
use crate::db::{ReconcileOutcome, ResourcePool};
use crate::lifecycle::server::{RestartOutcome, ServerLifecycle};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::lifecycle::state::ProcessState;
use crate::lifecycle::trigger::{ReloadCommand, ReloadQueue};
use crate::observability::metrics;

/// What one successful reload decided.
#[derive(Debug, Clone)]
pub struct ReloadReport {
    pub generation: u64,
    pub previous: Arc<Settings>,
    pub current: Arc<Settings>,
    pub diff: SettingsDiff,
    /// A listener restart was scheduled.
    pub server_restarting: bool,
    pub at: DateTime<Utc>,
}

/// A report plus the transitions it scheduled.
#[derive(Debug)]
pub struct Reload {
    pub report: ReloadReport,
    reconnect: Option<JoinHandle<ReconcileOutcome>>,
    restart: Option<JoinHandle<RestartOutcome>>,
}

impl Reload {
    /// Wait for the scheduled transitions to finish.
    pub async fn settle(self) -> (Option<ReconcileOutcome>, Option<RestartOutcome>) {
        let reconnect = match self.reconnect {
            Some(task) => match task.await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "Reconnect task failed");
                    None
                }
            },
            None => None,
        };
        let restart = match self.restart {
            Some(task) => match task.await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "Restart task failed");
                    None
                }
            },
            None => None,
        };
        (reconnect, restart)
    }
}

pub struct Reconciler {
    source: ConfigSource,
    state: Arc<ProcessState>,
    pool: Arc<ResourcePool>,
    server: Arc<ServerLifecycle>,
    reload_lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        source: ConfigSource,
        state: Arc<ProcessState>,
        pool: Arc<ResourcePool>,
        server: Arc<ServerLifecycle>,
    ) -> Self {
        Self {
            source,
            state,
            pool,
            server,
            reload_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> &Arc<ProcessState> {
        &self.state
    }

    pub fn pool(&self) -> &Arc<ResourcePool> {
        &self.pool
    }

    pub fn server(&self) -> &Arc<ServerLifecycle> {
        &self.server
    }

    /// Re-read the config source and schedule the transitions its diff needs.
    pub async fn reload(&self) -> Result<Reload, ConfigReadError> {
        let _guard = self.reload_lock.lock().await;

        let previous = self.state.settings();
        let current = match self.source.load().await {
            Ok(settings) => Arc::new(settings),
            Err(e) => {
                tracing::error!(error = %e, "Error reloading environment variables, keeping previous settings");
                return Err(e);
            }
        };

        let generation = self.state.install(Arc::clone(&current));
        let diff = previous.diff(&current);

        tracing::info!(
            generation,
            port = current.port,
            mode = %current.mode,
            database = %current.descriptor(),
            port_changed = diff.port,
            mode_changed = diff.mode,
            database_changed = diff.database_url,
            "Environment variables reloaded"
        );

        let reconnect = diff
            .database_changed()
            .then(|| self.pool.schedule(current.descriptor(), generation));

        // a failed restart leaves the listener behind the snapshot
        let server_restarting =
            self.server.is_running() && (diff.server_changed() || !self.server.serves(&current));
        let restart = server_restarting.then(|| self.server.schedule_restart(Arc::clone(&current), generation));

        Ok(Reload {
            report: ReloadReport {
                generation,
                previous,
                current,
                diff,
                server_restarting,
                at: Utc::now(),
            },
            reconnect,
            restart,
        })
    }

    /// Serve reload requests until shutdown or until every trigger is gone.
    pub async fn run(self: Arc<Self>, mut queue: ReloadQueue, mut shutdown: ShutdownSignal) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                command = queue.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }
        tracing::debug!("Reload loop stopped");
    }

    async fn handle(&self, command: ReloadCommand) {
        tracing::info!(source = command.source.as_str(), "Reload requested");
        let result = self.reload().await.map(|reload| reload.report);
        metrics::record_reload(command.source.as_str(), result.is_ok());

        if let Some(reply) = command.reply {
            // requester may have gone away
            let _ = reply.send(result);
        }
    }

    /// Stop the listener, then close the pool.
    pub async fn shutdown(&self) {
        self.server.stop().await;
        self.pool.shutdown().await;
    }
}
