//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection (owned by lifecycle::server)
//!     → request.rs (assign x-request-id)
//!     → middleware/ (request metrics)
//!     → api.rs (/api/status, /api/reload-env, data endpoints)
//!     → pages.rs (any other route: server-rendered HTML page)
//! ```
//!
//! Handlers only read process state. Reloads go through the
//! [`ReloadTrigger`](crate::lifecycle::ReloadTrigger) in [`AppState`].

pub mod api;
pub mod error;
pub mod middleware;
pub mod pages;
pub mod request;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use pages::PageOptions;
pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::build_router;
pub use state::AppState;
