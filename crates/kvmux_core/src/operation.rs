//! In-flight operations and the sinks their results are delivered to.

use crate::engine::{Completion, RequestId};
use crate::error::{ClientError, ClientResult};
use crate::request::{OperationKind, Response};
use crate::status::Status;
use std::fmt;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

/// Receives the events of one operation.
///
/// For every operation, `on_success` and `on_failure` are called zero or
/// more times (at most once each for one-shot operations), followed by
/// exactly one `on_complete`. Calls for one operation are never concurrent
/// and arrive in the order the engine reported them.
pub trait OperationSink: Send + 'static {
    /// A successful completion or stream item.
    fn on_success(&mut self, response: Response);

    /// The operation failed.
    fn on_failure(&mut self, error: ClientError);

    /// No further events will follow.
    fn on_complete(&mut self);
}

/// Lifecycle of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Registered, waiting for the engine.
    Pending,
    /// An event is being delivered to the sink.
    Delivering,
    /// The terminal event was delivered.
    Done,
}

/// What the dispatcher does with an operation after a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Put it back in the pending table.
    Keep,
    /// Drop it.
    Remove,
}

/// One in-flight request.
pub struct Operation {
    id: RequestId,
    kind: OperationKind,
    state: OperationState,
    sink: Box<dyn OperationSink>,
}

impl Operation {
    /// Creates a pending operation.
    pub fn new(id: RequestId, kind: OperationKind, sink: Box<dyn OperationSink>) -> Self {
        Self {
            id,
            kind,
            state: OperationState::Pending,
            sink,
        }
    }

    /// Request id.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// One-shot or streaming.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Current state.
    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Delivers one completion and reports whether the operation stays pending.
    pub fn deliver(&mut self, completion: Completion) -> Disposition {
        if self.state == OperationState::Done {
            trace!(id = self.id, "ignoring completion for finished operation");
            return Disposition::Remove;
        }
        self.state = OperationState::Delivering;

        match (self.kind, completion.status) {
            (OperationKind::Streaming, Status::Success) => {
                self.sink.on_success(completion.response);
                self.state = OperationState::Pending;
                Disposition::Keep
            }
            (OperationKind::Streaming, Status::SearchDone) => {
                self.finish();
                Disposition::Remove
            }
            (OperationKind::OneShot, Status::Success) => {
                self.sink.on_success(completion.response);
                self.finish();
                Disposition::Remove
            }
            (_, status) => {
                self.sink.on_failure(ClientError::failed(
                    status,
                    completion.message,
                    completion.location,
                ));
                self.finish();
                Disposition::Remove
            }
        }
    }

    /// Fails the operation without an engine completion.
    pub fn resolve(&mut self, error: ClientError) {
        if self.state == OperationState::Done {
            return;
        }
        self.state = OperationState::Delivering;
        self.sink.on_failure(error);
        self.finish();
    }

    fn finish(&mut self) {
        self.sink.on_complete();
        self.state = OperationState::Done;
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Delivers a single result through a oneshot channel.
pub struct OneShotSink {
    tx: Option<oneshot::Sender<ClientResult<Response>>>,
}

impl OneShotSink {
    /// Creates a sink and the receiver it delivers to.
    pub fn channel() -> (Self, oneshot::Receiver<ClientResult<Response>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    fn send(&mut self, result: ClientResult<Response>) {
        if let Some(tx) = self.tx.take() {
            // The caller may have dropped the receiver.
            let _ = tx.send(result);
        }
    }
}

impl OperationSink for OneShotSink {
    fn on_success(&mut self, response: Response) {
        self.send(Ok(response));
    }

    fn on_failure(&mut self, error: ClientError) {
        self.send(Err(error));
    }

    fn on_complete(&mut self) {
        self.tx = None;
    }
}

/// Delivers stream items through an unbounded channel, closed on completion.
pub struct StreamSink {
    tx: Option<mpsc::UnboundedSender<ClientResult<Response>>>,
}

impl StreamSink {
    /// Creates a sink and the receiver it delivers to.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClientResult<Response>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    fn send(&mut self, result: ClientResult<Response>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(result);
        }
    }
}

impl OperationSink for StreamSink {
    fn on_success(&mut self, response: Response) {
        self.send(Ok(response));
    }

    fn on_failure(&mut self, error: ClientError) {
        self.send(Err(error));
    }

    fn on_complete(&mut self) {
        self.tx = None;
    }
}

type SuccessFn = Box<dyn FnMut(Response) + Send>;
type FailureFn = Box<dyn FnMut(ClientError) + Send>;
type CompleteFn = Box<dyn FnMut() + Send>;

/// A sink built from closures. Missing closures ignore their event.
#[derive(Default)]
pub struct CallbackSink {
    success: Option<SuccessFn>,
    failure: Option<FailureFn>,
    complete: Option<CompleteFn>,
}

impl CallbackSink {
    /// Creates a sink that ignores every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the success callback.
    pub fn with_success(mut self, f: impl FnMut(Response) + Send + 'static) -> Self {
        self.success = Some(Box::new(f));
        self
    }

    /// Sets the failure callback.
    pub fn with_failure(mut self, f: impl FnMut(ClientError) + Send + 'static) -> Self {
        self.failure = Some(Box::new(f));
        self
    }

    /// Sets the completion callback.
    pub fn with_complete(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }
}

impl OperationSink for CallbackSink {
    fn on_success(&mut self, response: Response) {
        if let Some(f) = self.success.as_mut() {
            f(response);
        }
    }

    fn on_failure(&mut self, error: ClientError) {
        if let Some(f) = self.failure.as_mut() {
            f(error);
        }
    }

    fn on_complete(&mut self) {
        if let Some(f) = self.complete.as_mut() {
            f();
        }
    }
}
