//! State shared by every handler.

use std::sync::Arc;

use crate::db::ResourcePool;
use crate::http::pages::PageOptions;
use crate::lifecycle::state::ProcessState;
use crate::lifecycle::trigger::ReloadTrigger;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub process: Arc<ProcessState>,
    pub pool: Arc<ResourcePool>,
    pub reload: ReloadTrigger,
    pub pages: Arc<PageOptions>,
}
