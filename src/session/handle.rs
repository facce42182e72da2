use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::ledger::PaymentNotice;

use super::event::{SessionEvent, ToggleOutcome};

const SESSION_BUFFER: usize = 64;
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session controller is not running")]
    Disconnected,
    #[error("Session controller did not answer in time")]
    Timeout,
}

/// Create the session queue: a cloneable sender and the controller's receiver.
pub fn channel() -> (SessionHandle, mpsc::Receiver<SessionEvent>) {
    let (sender, receiver) = mpsc::channel(SESSION_BUFFER);
    (SessionHandle { sender }, receiver)
}

/// Cloneable entry point into the session queue.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Raise a toggle without waiting for its outcome (physical button).
    pub async fn toggle(&self) -> Result<(), SessionError> {
        self.send(SessionEvent::Toggle { respond_to: None }).await
    }

    /// Raise a toggle and wait until the controller has handled it.
    pub async fn toggle_and_wait(&self) -> Result<ToggleOutcome, SessionError> {
        let (respond_to, receiver) = oneshot::channel();
        self.send(SessionEvent::Toggle {
            respond_to: Some(respond_to),
        })
        .await?;
        recv_with_timeout(receiver).await
    }

    pub async fn tick(&self, epoch: u64) -> Result<(), SessionError> {
        self.send(SessionEvent::Tick { epoch }).await
    }

    pub async fn payment(&self, notice: PaymentNotice) -> Result<(), SessionError> {
        self.send(SessionEvent::Payment(notice)).await
    }

    /// Ask the controller to tear down and wait until it has.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let (respond_to, receiver) = oneshot::channel();
        self.send(SessionEvent::Shutdown { respond_to }).await?;
        recv_with_timeout(receiver).await
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// A handle that does not keep the session queue open.
    pub fn downgrade(&self) -> WeakSessionHandle {
        WeakSessionHandle {
            sender: self.sender.downgrade(),
        }
    }

    async fn send(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| SessionError::Disconnected)
    }
}

/// Non-owning counterpart of [`SessionHandle`].
///
/// Once every [`SessionHandle`] is dropped the controller sees its queue
/// close and tears down, whatever weak handles remain.
#[derive(Clone)]
pub struct WeakSessionHandle {
    sender: mpsc::WeakSender<SessionEvent>,
}

impl WeakSessionHandle {
    pub fn upgrade(&self) -> Option<SessionHandle> {
        self.sender.upgrade().map(|sender| SessionHandle { sender })
    }
}

async fn recv_with_timeout<T>(receiver: oneshot::Receiver<T>) -> Result<T, SessionError> {
    match tokio::time::timeout(RESPONSE_TIMEOUT, receiver).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(SessionError::Disconnected),
        Err(_) => Err(SessionError::Timeout),
    }
}
