//! A single engine handle with its pending table and dispatcher thread.

use crate::config::ClientConfig;
use crate::dispatcher;
use crate::engine::{Engine, EngineFailure, RequestId};
use crate::error::{ClientError, ClientResult};
use crate::operation::{Operation, OperationSink};
use crate::request::{OperationKind, Request};
use crate::state::{ConnectionState, ConnectionStats, StatsCounters};
use crate::status::Status;
use crate::table::PendingTable;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace};

/// State shared between a connection and its dispatcher thread.
pub(crate) struct Shared<E: Engine> {
    pub(crate) engine: E,
    pub(crate) inner: Mutex<Inner>,
    pub(crate) work_ready: Condvar,
    pub(crate) config: ClientConfig,
    pub(crate) stats: StatsCounters,
}

/// Everything guarded by the table lock.
pub(crate) struct Inner {
    pub(crate) table: PendingTable,
    pub(crate) state: ConnectionState,
    pub(crate) fatal: Option<ClientError>,
}

impl Inner {
    fn check_open(&self) -> ClientResult<()> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Closed => Err(ClientError::Closed),
            ConnectionState::Failed => Err(self.fatal.clone().unwrap_or(ClientError::Closed)),
        }
    }
}

/// One engine handle and the dispatcher thread that drains it.
///
/// Requests are submitted from any thread. The engine call and the
/// registration of the pending operation happen under one lock, so the
/// dispatcher can never see a completion for an id it does not know yet.
pub struct Connection<E: Engine> {
    shared: Arc<Shared<E>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    index: usize,
}

impl<E: Engine> Connection<E> {
    /// Takes ownership of `engine` and starts its dispatcher thread.
    pub fn new(engine: E, config: ClientConfig, index: usize) -> ClientResult<Self> {
        let shared = Arc::new(Shared {
            engine,
            inner: Mutex::new(Inner {
                table: PendingTable::new(),
                state: ConnectionState::Open,
                fatal: None,
            }),
            work_ready: Condvar::new(),
            config,
            stats: StatsCounters::default(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(format!("kvmux-dispatch-{index}"))
            .spawn(move || dispatcher::run(worker_shared, index))
            .map_err(|e| ClientError::Connect {
                address: shared.config.address.clone(),
                port: shared.config.port,
                message: format!("cannot start dispatcher: {e}"),
            })?;

        debug!(index, "connection opened");
        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
            index,
        })
    }

    /// Position of this connection in its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Submits `request` and registers `sink` for its results.
    pub fn submit(&self, request: Request, sink: Box<dyn OperationSink>) -> ClientResult<RequestId> {
        trace!(index = self.index, op = request.name(), "submit");
        self.submit_with(request.kind(), move |engine| engine.submit(&request), sink)
    }

    /// Runs `request_fn` against the engine and registers `sink` under the
    /// id it returns.
    ///
    /// If the engine refuses the request, nothing is registered and the
    /// refusal is returned. If the engine hands out an id that is already
    /// pending, the existing operation is left alone and `sink` is failed
    /// with [`Status::Internal`].
    pub fn submit_with<F>(
        &self,
        kind: OperationKind,
        request_fn: F,
        sink: Box<dyn OperationSink>,
    ) -> ClientResult<RequestId>
    where
        F: FnOnce(&E) -> Result<RequestId, EngineFailure>,
    {
        let mut inner = self.shared.inner.lock();
        inner.check_open()?;

        let id = match request_fn(&self.shared.engine) {
            Ok(id) => id,
            Err(failure) => {
                StatsCounters::bump(&self.shared.stats.rejected);
                debug!(index = self.index, status = %failure.status, "request rejected");
                return Err(ClientError::rejected(failure.status, failure.message));
            }
        };
        StatsCounters::bump(&self.shared.stats.submitted);

        match inner.table.register(Operation::new(id, kind, sink)) {
            Ok(()) => {
                drop(inner);
                self.shared.work_ready.notify_one();
            }
            Err(mut duplicate) => {
                drop(inner);
                error!(index = self.index, id, "engine reused a pending request id");
                duplicate.resolve(ClientError::failed(
                    Status::Internal,
                    format!("request id {id} is already pending"),
                    "",
                ));
            }
        }
        Ok(id)
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    /// Number of pending operations.
    pub fn pending_len(&self) -> usize {
        self.shared.inner.lock().table.len()
    }

    /// Returns true if `id` is pending.
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.shared.inner.lock().table.contains(id)
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> ConnectionStats {
        let pending = self.pending_len();
        self.shared.stats.snapshot(pending)
    }

    /// Stops the dispatcher and fails every pending operation with
    /// [`ClientError::Closed`]. Closing twice is a no-op.
    pub fn close(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        let drained = {
            let mut inner = self.shared.inner.lock();
            if inner.state == ConnectionState::Open {
                inner.state = ConnectionState::Closed;
            }
            inner.table.drain()
        };
        self.shared.work_ready.notify_all();
        self.shared.engine.close();

        for mut op in drained {
            op.resolve(ClientError::Closed);
        }

        // A sink may drop the last handle from the dispatcher thread itself.
        if worker.thread().id() != thread::current().id() && worker.join().is_err() {
            error!(index = self.index, "dispatcher thread panicked");
        }
        debug!(index = self.index, "connection closed");
    }
}

impl<E: Engine> Drop for Connection<E> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Completion, MockEngine};
    use crate::operation::{CallbackSink, OneShotSink};
    use crate::request::Response;
    use std::time::Duration;

    fn config() -> ClientConfig {
        ClientConfig::default()
            .with_block_timeout(Duration::from_millis(10))
            .with_idle_interval(Duration::from_millis(10))
    }

    #[test]
    fn rejected_submit_registers_nothing() {
        let engine = MockEngine::new();
        let conn = Connection::new(engine.clone(), config(), 0).unwrap();

        engine.reject_next(EngineFailure::new(Status::WrongType));
        let err = conn
            .submit(Request::DumpConfig, Box::new(CallbackSink::new()))
            .unwrap_err();

        assert_eq!(err.status(), Status::WrongType);
        assert_eq!(conn.pending_len(), 0);
        assert_eq!(conn.stats().rejected, 1);
    }

    #[test]
    fn one_shot_completes() {
        let engine = MockEngine::new();
        let conn = Connection::new(engine.clone(), config(), 0).unwrap();

        let (sink, rx) = OneShotSink::channel();
        let id = conn.submit(Request::DumpConfig, Box::new(sink)).unwrap();
        engine.complete(Completion::success(id, Response::Text("cfg".into())));

        assert_eq!(rx.blocking_recv().unwrap(), Ok(Response::Text("cfg".into())));
        assert_eq!(conn.stats().completions, 1);
    }

    #[test]
    fn duplicate_id_fails_new_operation_only() {
        let engine = MockEngine::new();
        let conn = Connection::new(engine.clone(), config(), 0).unwrap();

        engine.assign_next(5);
        let (first, first_rx) = OneShotSink::channel();
        conn.submit(Request::DumpConfig, Box::new(first)).unwrap();

        engine.assign_next(5);
        let (second, second_rx) = OneShotSink::channel();
        conn.submit(Request::DumpConfig, Box::new(second)).unwrap();

        let err = second_rx.blocking_recv().unwrap().unwrap_err();
        assert_eq!(err.status(), Status::Internal);
        assert!(conn.is_pending(5));

        engine.complete(Completion::success(5, Response::None));
        assert_eq!(first_rx.blocking_recv().unwrap(), Ok(Response::None));
    }

    #[test]
    fn close_is_idempotent() {
        let engine = MockEngine::new();
        let conn = Connection::new(engine.clone(), config(), 3).unwrap();

        let (sink, rx) = OneShotSink::channel();
        conn.submit(Request::DumpConfig, Box::new(sink)).unwrap();

        conn.close();
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(engine.is_closed());
        assert_eq!(rx.blocking_recv().unwrap(), Err(ClientError::Closed));
        assert_eq!(
            conn.submit(Request::DumpConfig, Box::new(CallbackSink::new())),
            Err(ClientError::Closed)
        );
    }
}
