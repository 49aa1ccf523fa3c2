//! OS signal handling.
//!
//! SIGINT/SIGTERM resolve [`shutdown_signal`]; SIGHUP becomes a reload
//! request.

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::ShutdownSignal;
use crate::lifecycle::trigger::{ReloadSource, ReloadTrigger};

/// Resolves on Ctrl+C, or on SIGTERM where supported.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Forward SIGHUP to `trigger` until shutdown.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(trigger: ReloadTrigger, mut shutdown: ShutdownSignal) -> JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(sighup) => sighup,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to register SIGHUP handler, signal reloads disabled");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                received = sighup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    tracing::info!("SIGHUP received, reloading configuration");
                    trigger.notify(ReloadSource::Signal);
                }
            }
        }
    })
}

#[cfg(not(unix))]
pub fn spawn_reload_on_hangup(_trigger: ReloadTrigger, mut shutdown: ShutdownSignal) -> JoinHandle<()> {
    tokio::spawn(async move { shutdown.recv().await })
}
