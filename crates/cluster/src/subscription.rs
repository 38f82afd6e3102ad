//! Cancellable handles for server-pushed streams.
//!
//! A [`Subscription`] owns the background task that reads a stream from a
//! host daemon and forwards decoded items into the caller's channel. The
//! task owns the connection, so ending the task releases it.

use std::future::Future;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::HostError;

/// Handle to a running event or progress stream.
///
/// - [`cancel`](Self::cancel) is idempotent and never blocks; no item is
///   delivered to the sink once it returns.
/// - Dropping the handle cancels the stream.
/// - [`finish`](Self::finish) waits for the terminal result: `Ok(())` when the
///   daemon closed the stream or the caller cancelled it, the stream error
///   otherwise.
#[derive(Debug)]
pub struct Subscription {
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<(), HostError>>>,
}

impl Subscription {
    /// Spawns `run` on the current runtime with a fresh cancellation token.
    pub fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), HostError>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(cancel.clone()));
        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Stops the stream and releases its connection.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called or the handle dropped.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns `true` once the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the stream to end and returns its terminal result.
    pub async fn finish(mut self) -> Result<(), HostError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Ok(()),
            Err(err) => Err(HostError::transport("stream task", err)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Forwards `items` into `sink` until the stream ends, fails, or `cancel` fires.
///
/// Returns `Ok(())` when the source is exhausted, the token is cancelled, or
/// the receiving side of `sink` has gone away. A stream error is returned as-is
/// and ends forwarding.
pub async fn forward<T, S>(
    items: S,
    sink: mpsc::Sender<T>,
    cancel: CancellationToken,
) -> Result<(), HostError>
where
    S: Stream<Item = Result<T, HostError>>,
{
    futures::pin_mut!(items);
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            next = items.next() => next,
        };
        let item = match next {
            None => return Ok(()),
            Some(item) => item?,
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            sent = sink.send(item) => {
                if sent.is_err() {
                    debug!("stream receiver dropped; stopping");
                    return Ok(());
                }
            }
        }
    }
}
