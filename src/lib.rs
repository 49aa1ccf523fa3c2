//! Configuration hot-reload for a small web application server.
//!
//! # Architecture Overview
//!
//! ```text
//!   .env ──▶ config::ConfigWatcher ──┐
//!   POST /api/reload-env ────────────┼──▶ ReloadTrigger ──▶ lifecycle::Reconciler
//!   SIGHUP ──────────────────────────┘                         │
//!                                                              │ diff(previous, current)
//!                                  ┌───────────────────────────┴──────────────┐
//!                                  ▼                                          ▼
//!                         db::ResourcePool                        lifecycle::ServerLifecycle
//!                      (close old → open new)                   (stop old → bind new port)
//!                                  │                                          │
//!                                  └────────────▶ ProcessState ◀──────────────┘
//!                                                    │
//!                                                    ▼
//!                                       http handlers (/api/status, data, pages)
//! ```

// Core subsystems
pub mod config;
pub mod db;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::{ConfigSource, Settings};
pub use db::{PgConnector, ResourcePool};
pub use lifecycle::{launch, ProcessState, Reconciler, Runtime, RuntimeOptions, ServerLifecycle};
