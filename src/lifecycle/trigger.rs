//! Reload requests.
//!
//! Every reload source (file watcher, HTTP endpoint, SIGHUP) goes through a
//! [`ReloadTrigger`]; the Reconciler drains the matching [`ReloadQueue`].

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::ConfigReadError;
use crate::lifecycle::reconciler::ReloadReport;

/// Where a reload request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadSource {
    FileWatch,
    Http,
    Signal,
}

impl ReloadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadSource::FileWatch => "file_watch",
            ReloadSource::Http => "http",
            ReloadSource::Signal => "signal",
        }
    }
}

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Config(#[from] ConfigReadError),

    #[error("reconciler is not running")]
    Unavailable,
}

pub type ReloadReply = oneshot::Sender<Result<ReloadReport, ConfigReadError>>;

/// A queued reload request, optionally awaiting its report.
#[derive(Debug)]
pub struct ReloadCommand {
    pub source: ReloadSource,
    pub reply: Option<ReloadReply>,
}

/// Sending half handed to reload sources.
#[derive(Debug, Clone)]
pub struct ReloadTrigger {
    tx: mpsc::Sender<ReloadCommand>,
}

/// Receiving half drained by the Reconciler.
#[derive(Debug)]
pub struct ReloadQueue {
    rx: mpsc::Receiver<ReloadCommand>,
}

impl ReloadTrigger {
    pub fn channel(capacity: usize) -> (ReloadTrigger, ReloadQueue) {
        let (tx, rx) = mpsc::channel(capacity);
        (ReloadTrigger { tx }, ReloadQueue { rx })
    }

    /// Fire-and-forget request. A full queue already holds a pending reload
    /// that will read the latest file, so the request is dropped.
    pub fn notify(&self, source: ReloadSource) -> bool {
        match self.tx.try_send(ReloadCommand {
            source,
            reply: None,
        }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(source = source.as_str(), "Reload already queued");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(source = source.as_str(), "Reload requested after reconciler stopped");
                false
            }
        }
    }

    /// Request a reload and wait for its report.
    pub async fn request(&self, source: ReloadSource) -> Result<ReloadReport, ReloadError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(ReloadCommand {
                source,
                reply: Some(reply),
            })
            .await
            .map_err(|_| ReloadError::Unavailable)?;

        match response.await {
            Ok(result) => result.map_err(ReloadError::from),
            Err(_) => Err(ReloadError::Unavailable),
        }
    }
}

impl ReloadQueue {
    pub async fn recv(&mut self) -> Option<ReloadCommand> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_drops_when_full() {
        let (trigger, mut queue) = ReloadTrigger::channel(1);
        assert!(trigger.notify(ReloadSource::FileWatch));
        assert!(!trigger.notify(ReloadSource::FileWatch));

        let command = queue.recv().await.unwrap();
        assert_eq!(command.source, ReloadSource::FileWatch);
        assert!(command.reply.is_none());
    }

    #[tokio::test]
    async fn request_fails_without_reconciler() {
        let (trigger, queue) = ReloadTrigger::channel(1);
        drop(queue);
        assert!(matches!(
            trigger.request(ReloadSource::Http).await,
            Err(ReloadError::Unavailable)
        ));
    }
}
