//! Push/pull query streams
//!
//! Every query gets one reader task. The task owns the HTTP response, turns
//! lines into frames and decoded rows, and forwards them in server order over
//! a bounded channel. [`QueryStream`] is the consuming end.
//!
//! On cancellation the task stops reading, sends `/close-query` for the query
//! id (once, failures are only logged), and only then drops the response.

use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::QueryEndpoint;
use crate::error::{ClientError, Result};
use crate::parameters::RequestParameters;
use crate::protocol::{Frame, FrameReader, LineBuffer, RowDecoder};
use crate::rest_client::KsqlRestClient;

/// What to post and how to read the answer.
#[derive(Debug, Clone)]
pub(crate) struct QueryRequest {
    pub endpoint: QueryEndpoint,
    pub parameters: RequestParameters,
    pub binary_rows: bool,
    /// Apply the request timeout; pull queries only.
    pub bounded: bool,
}

/// Decoded rows of one running query.
///
/// Dropping the stream cancels the query.
pub struct QueryStream<T> {
    receiver: mpsc::Receiver<Result<T>>,
    cancel: CancellationToken,
    query_id: Arc<OnceLock<String>>,
    task: Option<JoinHandle<()>>,
}

impl<T> std::fmt::Debug for QueryStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryStream")
            .field("query_id", &self.query_id.get())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl<T> QueryStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub(crate) fn open(
        client: KsqlRestClient,
        request: QueryRequest,
        decoder: RowDecoder,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, receiver) = mpsc::channel(capacity);
        let query_id = Arc::new(OnceLock::new());

        let reader = QueryReader {
            frames: FrameReader::new(request.endpoint),
            decoder,
            tx,
            cancel: cancel.clone(),
            query_id: Arc::clone(&query_id),
        };
        let task = tokio::spawn(reader.run(client, request));

        Self {
            receiver,
            cancel,
            query_id,
            task: Some(task),
        }
    }
}

impl<T> QueryStream<T> {
    /// Server-assigned id, known once the header has arrived.
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.get().map(String::as_str)
    }

    /// Stop the query without waiting for the reader to finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel and wait until the reader has closed the query.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "query reader task failed");
            }
        }
    }

    /// Drain the stream into a vector, stopping at the first error.
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        Ok(items)
    }
}

impl<T> Stream for QueryStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

impl<T> Drop for QueryStream<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Outcome {
    Completed,
    Cancelled,
    Failed(ClientError),
}

struct QueryReader<T> {
    frames: FrameReader,
    decoder: RowDecoder,
    tx: mpsc::Sender<Result<T>>,
    cancel: CancellationToken,
    query_id: Arc<OnceLock<String>>,
}

impl<T> QueryReader<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn run(mut self, client: KsqlRestClient, request: QueryRequest) {
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            response = client.open_query(
                request.endpoint,
                &request.parameters,
                request.binary_rows,
                request.bounded,
            ) => response,
        };
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "failed to open query");
                self.deliver(Err(e)).await;
                return;
            }
        };

        info!(endpoint = request.endpoint.path(), "query started");
        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::new();

        let outcome = 'read: loop {
            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Outcome::Cancelled,
                chunk = body.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    lines.extend(&bytes);
                    while let Some(line) = lines.next_line() {
                        if let Some(outcome) = self.handle(line).await {
                            break 'read outcome;
                        }
                    }
                }
                Some(Err(e)) => break Outcome::Failed(e.into()),
                None => {
                    if let Some(line) = lines.finish() {
                        if let Some(outcome) = self.handle(line).await {
                            break outcome;
                        }
                    }
                    break Outcome::Completed;
                }
            }
        };

        let query_id = self.query_id.get().cloned();
        match outcome {
            Outcome::Completed => {
                info!(query_id = ?query_id, "query completed");
            }
            Outcome::Failed(e) => {
                error!(query_id = ?query_id, error = %e, "query failed");
                let server_failed = matches!(e, ClientError::Statement { .. });
                self.deliver(Err(e)).await;
                if !server_failed {
                    close(&client, query_id.as_deref()).await;
                }
            }
            Outcome::Cancelled => {
                info!(query_id = ?query_id, "query cancelled");
                close(&client, query_id.as_deref()).await;
            }
        }

        drop(body);
    }

    /// Process one line; `Some` ends the query.
    async fn handle(&mut self, line: Result<String>) -> Option<Outcome> {
        let frame = match line.and_then(|l| self.frames.read(&l)) {
            Ok(frame) => frame,
            Err(e) => return Some(Outcome::Failed(e)),
        };

        match frame {
            Frame::Header(header) => {
                if let Some(id) = &header.query_id {
                    let _ = self.query_id.set(id.clone());
                }
                debug!(columns = ?header.columns, "query header");
                self.decoder.apply_header(&header);
                None
            }
            Frame::Row(payload) => match self.decoder.decode::<T>(&payload) {
                Ok(item) => self.send(item).await,
                Err(e) => Some(Outcome::Failed(e)),
            },
            Frame::Error(e) => Some(Outcome::Failed(e)),
            Frame::Final(message) => {
                debug!(message = %message, "final frame");
                Some(Outcome::Completed)
            }
            Frame::Skip => None,
        }
    }

    async fn send(&self, item: T) -> Option<Outcome> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Some(Outcome::Cancelled),
            sent = self.tx.send(Ok(item)) => match sent {
                Ok(()) => None,
                // Consumer went away.
                Err(_) => Some(Outcome::Cancelled),
            },
        }
    }

    /// Hand an error to the consumer unless it has stopped listening.
    async fn deliver(&self, item: Result<T>) {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            _ = self.tx.send(item) => {}
        }
    }
}

async fn close(client: &KsqlRestClient, query_id: Option<&str>) {
    let Some(query_id) = query_id else {
        return;
    };
    if let Err(e) = client.close_query(query_id).await {
        warn!(query_id = %query_id, error = %e, "failed to close query");
    }
}
