//! Configuration file watcher for hot reload.
//!
//! Two observation strategies deliver into the same [`ReloadTrigger`]:
//!
//! ```text
//! notify events (parent dir) ──▶ Debouncer {Idle, PendingDebounce} ──┐
//!                                                                     ├──▶ ReloadTrigger
//! mtime polling (fallback)   ──▶ MtimeTracker (strictly increasing) ──┘
//! ```
//!
//! The event watcher subscribes to the file's parent directory so editors
//! that save by replacing the file are still observed. When the subscription
//! reports an error or its stream ends, the task continues as a poller.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::lifecycle::shutdown::ShutdownSignal;
use crate::lifecycle::trigger::{ReloadSource, ReloadTrigger};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// How the config file is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum WatchStrategy {
    /// OS notifications, falling back to polling when unavailable.
    #[default]
    Auto,
    /// Modification-time polling only.
    Poll,
    /// No watching; reloads only via HTTP or SIGHUP.
    Off,
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub strategy: WatchStrategy,
    pub debounce: Duration,
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            strategy: WatchStrategy::Auto,
            debounce: DEFAULT_DEBOUNCE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Debounce state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    PendingDebounce { until: Instant },
}

/// Collapses bursts of change notifications into one reload per window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Idle => None,
            DebounceState::PendingDebounce { until } => Some(until),
        }
    }

    /// Record a notification. Returns `true` if it opened a new window;
    /// notifications inside an open window are swallowed.
    pub fn observe(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Idle => {
                self.state = DebounceState::PendingDebounce {
                    until: now + self.window,
                };
                true
            }
            DebounceState::PendingDebounce { .. } => false,
        }
    }

    /// Returns `true` exactly once per window, when it has elapsed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::PendingDebounce { until } if now >= until => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }
}

/// Tracks the last seen modification time for polling.
#[derive(Debug, Default)]
pub struct MtimeTracker {
    last: Option<SystemTime>,
}

impl MtimeTracker {
    pub fn new(initial: Option<SystemTime>) -> Self {
        Self { last: initial }
    }

    /// Returns `true` when `modified` is strictly newer than anything seen.
    /// A file that appears after being absent counts as changed.
    pub fn observe(&mut self, modified: SystemTime) -> bool {
        match self.last {
            Some(previous) if modified <= previous => false,
            _ => {
                self.last = Some(modified);
                true
            }
        }
    }
}

/// What the notify callback forwards to the debounce task.
#[derive(Debug)]
pub enum FileEvent {
    Changed,
    Failed(notify::Error),
}

/// Running watcher. Dropping it stops event delivery; the tasks also exit on
/// process shutdown.
pub enum WatchHandle {
    Events {
        _watcher: RecommendedWatcher,
        task: JoinHandle<()>,
    },
    Polling {
        task: JoinHandle<()>,
    },
    Off,
}

impl WatchHandle {
    pub fn mode(&self) -> &'static str {
        match self {
            WatchHandle::Events { .. } => "events",
            WatchHandle::Polling { .. } => "polling",
            WatchHandle::Off => "off",
        }
    }

    /// Wait for the watch task to exit.
    pub async fn join(self) {
        let task = match self {
            WatchHandle::Events { task, .. } | WatchHandle::Polling { task } => task,
            WatchHandle::Off => return,
        };
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Config watch task ended abnormally");
        }
    }
}

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    config: WatcherConfig,
    trigger: ReloadTrigger,
}

impl ConfigWatcher {
    pub fn new(path: &Path, config: WatcherConfig, trigger: ReloadTrigger) -> Self {
        Self {
            path: path.to_path_buf(),
            config,
            trigger,
        }
    }

    /// Start watching in the background.
    pub fn spawn(self, shutdown: ShutdownSignal) -> WatchHandle {
        match self.config.strategy {
            WatchStrategy::Off => {
                tracing::info!("Config file watching disabled");
                WatchHandle::Off
            }
            WatchStrategy::Poll => self.spawn_polling(shutdown),
            WatchStrategy::Auto => match self.subscribe() {
                Ok((watcher, events)) => {
                    tracing::info!(path = %self.path.display(), "Watching config file for changes");
                    let task = tokio::spawn(debounce_events(
                        events,
                        Debouncer::new(self.config.debounce),
                        self.config.poll_interval,
                        self.trigger,
                        self.path,
                        shutdown,
                    ));
                    WatchHandle::Events {
                        _watcher: watcher,
                        task,
                    }
                }
                Err(e) => {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %e,
                        "Failed to set up file watcher, falling back to polling"
                    );
                    self.spawn_polling(shutdown)
                }
            },
        }
    }

    fn subscribe(&self) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<FileEvent>), notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let file_name: Option<OsString> = self.path.file_name().map(OsStr::to_os_string);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if (event.kind.is_modify() || event.kind.is_create())
                        && touches(&event, file_name.as_deref())
                    {
                        let _ = tx.send(FileEvent::Changed);
                    }
                }
                Err(e) => {
                    let _ = tx.send(FileEvent::Failed(e));
                }
            },
            notify::Config::default(),
        )?;

        watcher.watch(&watch_dir(&self.path), RecursiveMode::NonRecursive)?;
        Ok((watcher, rx))
    }

    fn spawn_polling(self, shutdown: ShutdownSignal) -> WatchHandle {
        let seed = current_mtime(&self.path);
        tracing::info!(
            path = %self.path.display(),
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "Polling config file for changes"
        );
        let task = tokio::spawn(poll_mtime(
            self.path,
            self.config.poll_interval,
            MtimeTracker::new(seed),
            self.trigger,
            shutdown,
        ));
        WatchHandle::Polling { task }
    }
}

fn current_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn touches(event: &Event, file_name: Option<&OsStr>) -> bool {
    match file_name {
        Some(name) => event.paths.iter().any(|p| p.file_name() == Some(name)),
        None => true,
    }
}

async fn debounce_events(
    mut events: mpsc::UnboundedReceiver<FileEvent>,
    mut debouncer: Debouncer,
    poll_interval: Duration,
    trigger: ReloadTrigger,
    path: PathBuf,
    mut shutdown: ShutdownSignal,
) {
    loop {
        let deadline = debouncer.deadline();
        let window = async move {
            match deadline {
                Some(at) => time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!("Config event watcher stopped");
                return;
            }
            event = events.recv() => match event {
                Some(FileEvent::Changed) => {
                    if debouncer.observe(Instant::now()) {
                        tracing::debug!(path = %path.display(), "Config change observed, debouncing");
                    }
                }
                Some(FileEvent::Failed(e)) => {
                    tracing::error!(error = %e, "Config watch error, falling back to polling");
                    break;
                }
                None => {
                    tracing::warn!("Config event stream closed, falling back to polling");
                    break;
                }
            },
            _ = window => {
                if debouncer.fire(Instant::now()) {
                    tracing::info!(path = %path.display(), "Config file changed, reloading");
                    trigger.notify(ReloadSource::FileWatch);
                }
            }
        }
    }

    // a change seen before the failure must not be lost
    if debouncer.deadline().is_some() {
        trigger.notify(ReloadSource::FileWatch);
    }
    let seed = current_mtime(&path);
    poll_mtime(path, poll_interval, MtimeTracker::new(seed), trigger, shutdown).await;
}

async fn poll_mtime(
    path: PathBuf,
    interval: Duration,
    mut tracker: MtimeTracker,
    trigger: ReloadTrigger,
    mut shutdown: ShutdownSignal,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let mut failing = false;
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                match modified_time(&path).await {
                    Ok(modified) => {
                        failing = false;
                        if tracker.observe(modified) {
                            tracing::info!(path = %path.display(), "Config file changed (detected by polling), reloading");
                            trigger.notify(ReloadSource::FileWatch);
                        }
                    }
                    Err(e) if !failing => {
                        failing = true;
                        tracing::warn!(path = %path.display(), error = %e, "Error checking config file");
                    }
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "Config file still unavailable");
                    }
                }
            }
        }
    }
    tracing::debug!("Config poller stopped");
}

async fn modified_time(path: &Path) -> std::io::Result<SystemTime> {
    tokio::fs::metadata(path).await?.modified()
}
