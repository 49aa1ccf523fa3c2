//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env file (KEY=VALUE)
//!     → loader.rs (read & parse, per-field defaults)
//!     → Settings (immutable snapshot)
//!     → swapped into ProcessState by the Reconciler
//!
//! On change:
//!     watcher.rs detects change (events or polling, debounced)
//!     → ReloadTrigger
//!     → Reconciler reloads, diffs, reconciles resources
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; changes require a full reload
//! - A bad field falls back to its default, a bad file aborts the reload
//! - The file is never written, only read and watched

pub mod loader;
pub mod schema;
pub mod watcher;

pub use loader::{ConfigReadError, ConfigSource};
pub use schema::{EnvironmentMode, Settings, SettingsDiff};
pub use watcher::{ConfigWatcher, WatchHandle, WatchStrategy, WatcherConfig};
