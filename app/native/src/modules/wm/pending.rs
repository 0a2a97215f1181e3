//! Single-completion results for operations that finish after the call returns.
//!
//! A [`PendingOperation`] can be awaited, or waited on synchronously with
//! [`PendingOperation::wait`]. It resolves exactly once; dropping the
//! [`Completer`] without completing resolves it with `SystemAbnormally`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{WmError, WmResult};

/// The receiving half of a deferred operation.
#[must_use = "a pending operation does nothing unless awaited or waited on"]
#[derive(Debug)]
pub struct PendingOperation<T> {
    receiver: oneshot::Receiver<WmResult<T>>,
}

/// The completing half of a deferred operation.
#[derive(Debug)]
pub struct Completer<T> {
    sender: oneshot::Sender<WmResult<T>>,
}

impl<T> PendingOperation<T> {
    /// Create a linked completer and pending operation.
    pub fn channel() -> (Completer<T>, Self) {
        let (sender, receiver) = oneshot::channel();
        (Completer { sender }, Self { receiver })
    }

    /// An operation that has already finished.
    pub fn ready(result: WmResult<T>) -> Self {
        let (completer, pending) = Self::channel();
        completer.complete(result);
        pending
    }

    /// Block the current thread until the operation completes.
    ///
    /// # Errors
    ///
    /// Returns the operation's error, or `SystemAbnormally` if it was abandoned.
    pub fn wait(self) -> WmResult<T> { futures::executor::block_on(self) }

    /// Take the result if it is already available.
    pub fn try_take(&mut self) -> Option<WmResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(abandoned())),
        }
    }
}

impl<T> Future for PendingOperation<T> {
    type Output = WmResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Err(abandoned())))
    }
}

impl<T> Completer<T> {
    /// Resolve the linked operation. Later completions are impossible by construction.
    pub fn complete(self, result: WmResult<T>) {
        if self.sender.send(result).is_err() {
            tracing::trace!("pending operation dropped before completion");
        }
    }
}

fn abandoned() -> WmError { WmError::SystemAbnormally("operation abandoned".to_string()) }
