//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load settings → Open pool → Bind listener → Spawn reload sources
//!
//! Reload (trigger.rs → reconciler.rs):
//!     watcher / POST /api/reload-env / SIGHUP → ReloadTrigger
//!     → Reconciler: load, swap snapshot, diff
//!     → ResourcePool::schedule and/or ServerLifecycle::schedule_restart
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → stop reload sources → drain listener → close pool
//! ```
//!
//! # Design Decisions
//! - Handlers never hold the Reconciler; they talk to it through a channel
//! - Each resource serializes its own transitions and drops stale generations
//! - Shutdown drain has a timeout: the serve task is aborted after it

pub mod reconciler;
pub mod server;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;
pub mod trigger;

pub use reconciler::{Reconciler, Reload, ReloadReport};
pub use server::{RestartOutcome, RouterFactory, ServeError, ServerLifecycle, ServerState};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{launch, Runtime, RuntimeOptions, StartupError};
pub use state::ProcessState;
pub use trigger::{ReloadError, ReloadSource, ReloadTrigger};
