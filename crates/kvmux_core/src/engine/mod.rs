//! The boundary to the native client engine.
//!
//! An engine accepts requests, hands back request ids, and later reports
//! which request completed. It does no callback dispatch of its own; pairing
//! completions with their callers is the job of [`crate::Connection`].

mod mock;

pub use mock::MockEngine;

use crate::error::ClientResult;
use crate::request::{Request, Response};
use crate::status::Status;
use std::time::Duration;

/// Identifier the engine assigns to a submitted request.
pub type RequestId = i64;

/// A failure reported by the engine, either at submission or by `poll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    /// Engine status.
    pub status: Status,
    /// Engine message.
    pub message: String,
    /// Where in the engine the failure was raised.
    pub location: String,
}

impl EngineFailure {
    /// Creates a failure with the status's default message.
    pub fn new(status: Status) -> Self {
        Self {
            status,
            message: status.message().to_string(),
            location: String::new(),
        }
    }

    /// Sets the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

/// One request the engine reports as having progressed.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Request id.
    pub id: RequestId,
    /// Outcome.
    pub status: Status,
    /// Payload; meaningful only on success.
    pub response: Response,
    /// Engine message.
    pub message: String,
    /// Where in the engine the status was raised.
    pub location: String,
}

impl Completion {
    /// A successful completion carrying `response`.
    pub fn success(id: RequestId, response: Response) -> Self {
        Self {
            id,
            status: Status::Success,
            response,
            message: String::new(),
            location: String::new(),
        }
    }

    /// A completion with a non-success status and its default message.
    pub fn status(id: RequestId, status: Status) -> Self {
        Self {
            id,
            status,
            response: Response::None,
            message: status.message().to_string(),
            location: String::new(),
        }
    }

    /// End of a streaming request.
    pub fn done(id: RequestId) -> Self {
        Self::status(id, Status::SearchDone)
    }

    /// Sets the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

/// Result of one `poll` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A request progressed.
    Completed(Completion),
    /// Nothing completed within the timeout.
    Idle,
    /// The engine handle is unusable.
    Fatal(EngineFailure),
}

impl PollOutcome {
    /// Classifies a raw `(id, status)` pair as returned by a native loop call.
    ///
    /// A negative id means no request progressed: with a timeout or
    /// none-pending status the iteration was empty, with anything else the
    /// engine handle has failed.
    pub fn classify(id: RequestId, status: Status, response: Response) -> Self {
        if id >= 0 {
            return PollOutcome::Completed(Completion {
                id,
                status,
                response,
                message: status.message().to_string(),
                location: String::new(),
            });
        }
        if status.is_idle() {
            PollOutcome::Idle
        } else {
            PollOutcome::Fatal(EngineFailure::new(status))
        }
    }
}

/// A native client handle.
///
/// `submit` and `poll` are only ever called with the owning connection's
/// table lock held, so they never run concurrently with each other. `block`
/// runs without the lock and may overlap `submit`; `close` must wake a
/// thread blocked in `block`.
pub trait Engine: Send + Sync + 'static {
    /// Starts a request and returns its id, or fails without starting it.
    fn submit(&self, request: &Request) -> Result<RequestId, EngineFailure>;

    /// Waits until `poll` is likely to make progress or `timeout` elapses.
    fn block(&self, timeout: Duration);

    /// Reports at most one completion.
    fn poll(&self, timeout: Duration) -> PollOutcome;

    /// Releases the handle.
    fn close(&self);
}

/// Creates engine handles.
pub trait Connector: Send + Sync {
    /// Engine type produced.
    type Engine: Engine;

    /// Connects to the coordinator at `address:port`.
    fn connect(&self, address: &str, port: u16) -> ClientResult<Self::Engine>;
}
