//! Caller-side handles for pending results.

use crate::engine::RequestId;
use crate::error::{ClientError, ClientResult};
use crate::request::Response;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

type Convert<T> = fn(Response) -> ClientResult<T>;

/// The eventual result of a one-shot operation.
///
/// Await it from async code or call [`PendingResult::wait`] from a plain
/// thread. Dropping it does not cancel the operation.
#[must_use = "the result of the operation is delivered here"]
pub struct PendingResult<T> {
    id: RequestId,
    rx: oneshot::Receiver<ClientResult<Response>>,
    convert: Convert<T>,
}

impl<T> PendingResult<T> {
    pub(crate) fn new(
        id: RequestId,
        rx: oneshot::Receiver<ClientResult<Response>>,
        convert: Convert<T>,
    ) -> Self {
        Self { id, rx, convert }
    }

    /// Engine request id.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Blocks the current thread until the result arrives.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn wait(self) -> ClientResult<T> {
        finish(self.rx.blocking_recv(), self.convert)
    }
}

fn finish<T>(
    received: Result<ClientResult<Response>, oneshot::error::RecvError>,
    convert: Convert<T>,
) -> ClientResult<T> {
    match received {
        Ok(result) => result.and_then(convert),
        // The sink was dropped without a result.
        Err(_) => Err(ClientError::Closed),
    }
}

impl<T> Future for PendingResult<T> {
    type Output = ClientResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let convert = this.convert;
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|received| finish(received, convert))
    }
}

/// The items of a streaming operation.
///
/// Items arrive in the order the engine reported them. The stream ends
/// after the last item or after the first error.
#[must_use = "streamed items are delivered here"]
pub struct ResultStream<T> {
    id: RequestId,
    rx: mpsc::UnboundedReceiver<ClientResult<Response>>,
    convert: Convert<T>,
}

impl<T> ResultStream<T> {
    pub(crate) fn new(
        id: RequestId,
        rx: mpsc::UnboundedReceiver<ClientResult<Response>>,
        convert: Convert<T>,
    ) -> Self {
        Self { id, rx, convert }
    }

    /// Engine request id.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Receives the next item, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<ClientResult<T>> {
        let convert = self.convert;
        self.rx.recv().await.map(|item| item.and_then(convert))
    }

    /// Blocking variant of [`ResultStream::recv`].
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_recv(&mut self) -> Option<ClientResult<T>> {
        let convert = self.convert;
        self.rx.blocking_recv().map(|item| item.and_then(convert))
    }

    /// Collects every item, stopping at the first error.
    pub async fn try_collect(mut self) -> ClientResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.recv().await {
            items.push(item?);
        }
        Ok(items)
    }

    /// Blocking variant of [`ResultStream::try_collect`].
    pub fn collect_all(self) -> ClientResult<Vec<T>> {
        Iterator::collect(self)
    }
}

impl<T> Iterator for ResultStream<T> {
    type Item = ClientResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.blocking_recv()
    }
}
