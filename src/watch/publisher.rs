use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::warn;

use crate::Error;
use crate::Result;

/// A watched path changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEvent {
    pub path: String,
    pub value: Bytes,
}

/// Subscriber side of the event channel.
///
/// `recv()` returning `None` means the watch loop has terminated and no
/// further events will arrive.
pub type EventReceiver = mpsc::Receiver<SecretEvent>;

/// Delivers change events to the subscriber.
///
/// Delivery waits for channel capacity, so a slow subscriber slows the watch
/// loop down instead of losing updates. The wait is cut short by shutdown.
#[derive(Debug)]
pub struct EventPublisher {
    sender: mpsc::Sender<SecretEvent>,
    subscriber_gone: bool,
}

impl EventPublisher {
    pub fn channel(capacity: usize) -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                sender,
                subscriber_gone: false,
            },
            receiver,
        )
    }

    /// Sends `event`, waiting for the subscriber if the channel is full.
    ///
    /// Returns `Ok(false)` when the subscriber dropped its receiver, and
    /// `Err(Error::Exit)` if shutdown is signalled while waiting.
    pub async fn emit(
        &mut self,
        event: SecretEvent,
        shutdown: &mut watch::Receiver<()>,
    ) -> Result<bool> {
        if self.subscriber_gone {
            return Ok(false);
        }

        tokio::select! {
            biased;
            _ = shutdown.changed() => Err(Error::Exit),
            sent = self.sender.send(event) => match sent {
                Ok(()) => Ok(true),
                Err(mpsc::error::SendError(event)) => {
                    warn!(path = %event.path, "event subscriber is gone, further events are dropped");
                    self.subscriber_gone = true;
                    Ok(false)
                }
            },
        }
    }

    /// Closes the channel. Subscribers observe the end of the stream once
    /// buffered events are drained.
    pub fn terminate(self) {
        drop(self.sender);
    }
}
