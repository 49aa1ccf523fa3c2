//! Process-wide state read by request handlers.
//!
//! Written only by the Reconciler (settings, generation), the ResourcePool
//! (`db_connected`) and the ServerLifecycle (listening address).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::config::Settings;

#[derive(Debug)]
pub struct ProcessState {
    settings: ArcSwap<Settings>,
    generation: AtomicU64,
    db_connected: AtomicBool,
    listening: ArcSwapOption<SocketAddr>,
}

impl ProcessState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: ArcSwap::from_pointee(settings),
            generation: AtomicU64::new(0),
            db_connected: AtomicBool::new(false),
            listening: ArcSwapOption::empty(),
        }
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    /// Generation of the active snapshot; 0 until the first reload.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_db_connected(&self) -> bool {
        self.db_connected.load(Ordering::SeqCst)
    }

    pub fn listening_addr(&self) -> Option<SocketAddr> {
        self.listening.load_full().map(|addr| *addr)
    }

    /// Install a new snapshot and return its generation.
    pub(crate) fn install(&self, settings: Arc<Settings>) -> u64 {
        self.settings.store(settings);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn set_db_connected(&self, connected: bool) {
        self.db_connected.store(connected, Ordering::SeqCst);
        crate::observability::metrics::record_db_connected(connected);
    }

    pub(crate) fn set_listening(&self, addr: Option<SocketAddr>) {
        self.listening.store(addr.map(Arc::new));
    }
}
