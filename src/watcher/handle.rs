use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::Error;
use crate::EventReceiver;
use crate::Result;
use crate::WatchStatus;

/// Control side of a running watch loop.
///
/// Dropping the handle stops the loop the same way [`WatchHandle::shutdown`]
/// does.
#[derive(Debug)]
pub struct WatchHandle {
    events: Option<EventReceiver>,
    status: watch::Receiver<WatchStatus>,
    shutdown_tx: watch::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl WatchHandle {
    pub(crate) fn new(
        events: EventReceiver,
        status: watch::Receiver<WatchStatus>,
        shutdown_tx: watch::Sender<()>,
        task: JoinHandle<Result<()>>,
    ) -> Self {
        Self {
            events: Some(events),
            status,
            shutdown_tx,
            task,
        }
    }

    /// Takes the change event stream. There is a single subscriber, so only
    /// the first call returns `Some`.
    pub fn subscribe(&mut self) -> Option<EventReceiver> {
        self.events.take()
    }

    pub fn status(&self) -> watch::Receiver<WatchStatus> {
        self.status.clone()
    }

    /// Signals the loop to stop. Returns immediately; use [`WatchHandle::join`]
    /// to wait for it.
    pub fn shutdown(&self) {
        if self.shutdown_tx.send(()).is_err() {
            debug!("watch loop already stopped");
        }
    }

    /// Waits for the loop to terminate and returns its result.
    pub async fn join(self) -> Result<()> {
        // keep the sender alive until the loop is done, dropping it would
        // count as a shutdown request
        let WatchHandle { shutdown_tx, task, .. } = self;
        let result = task
            .await
            .map_err(|e| Error::Fatal(format!("watch task failed: {}", e)))?;
        drop(shutdown_tx);
        result
    }
}
