//! Observer-style consumption of push queries

use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::ClientError;
use crate::stream::QueryStream;

/// Receives the rows of a subscribed push query.
///
/// `on_error` and `on_completed` are terminal; neither is called when the
/// subscription itself was cancelled.
#[async_trait]
pub trait QueryObserver<T: Send + 'static>: Send + 'static {
    async fn on_next(&mut self, item: T);

    async fn on_error(&mut self, error: ClientError) {
        warn!(error = %error, "unhandled query error");
    }

    async fn on_completed(&mut self) {}
}

/// Handle to a running subscription. Dropping it cancels the query.
#[derive(Debug)]
pub struct Subscription {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn start<T, O>(stream: QueryStream<T>, observer: O) -> Self
    where
        T: Send + 'static,
        O: QueryObserver<T>,
    {
        let cancel = stream.cancellation_token();
        let handle = tokio::spawn(drive(stream, observer, cancel.clone()));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Signal cancellation without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait until the query has been closed on the server.
    pub async fn unsubscribe(mut self) {
        self.cancel.cancel();
        self.wait().await;
    }

    /// Wait for the query to end on its own.
    pub async fn join(mut self) {
        self.wait().await;
    }

    async fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "subscription task failed");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn drive<T, O>(mut stream: QueryStream<T>, mut observer: O, cancel: CancellationToken)
where
    T: Send + 'static,
    O: QueryObserver<T>,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                stream.close().await;
                return;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(item)) => observer.on_next(item).await,
            Some(Err(e)) => {
                if !cancel.is_cancelled() && !e.is_cancelled() {
                    observer.on_error(e).await;
                }
                return;
            }
            None => {
                if cancel.is_cancelled() {
                    stream.close().await;
                } else {
                    observer.on_completed().await;
                }
                return;
            }
        }
    }
}
