//! An engine backed by an in-process object store.

use crate::store::{Reply, Store};
use kvmux_core::{
    ClientError, ClientResult, Completion, Connector, Engine, EngineFailure, PollOutcome, Request,
    RequestId, Response, Status,
};
use parking_lot::{Condvar, Mutex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct ClusterShared {
    store: Mutex<Store>,
    /// Seed for completion shuffling; `None` keeps submission order.
    shuffle: Option<u64>,
    /// Status the next `poll` of every engine reports as fatal.
    fatal: Mutex<Option<Status>>,
    unavailable: AtomicBool,
    opened: AtomicUsize,
}

/// A cluster held in memory. Connecting yields [`MemoryEngine`] handles
/// that share its spaces.
///
/// # Example
///
/// ```rust
/// use kvmux_core::{Client, ClientConfig, Value};
/// use kvmux_testkit::MemoryCluster;
///
/// let cluster = MemoryCluster::new();
/// cluster.add_space("space kv key k attributes int n").unwrap();
///
/// let client = Client::connect(&cluster, ClientConfig::default().with_workers(2)).unwrap();
/// let attrs = [("n".to_string(), Value::Int(1))].into_iter().collect();
/// client.put("kv", "a", &attrs).unwrap().wait().unwrap();
/// assert_eq!(client.get("kv", "a").unwrap().wait().unwrap()["n"], Value::Int(1));
/// client.close();
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    shared: Arc<ClusterShared>,
}

impl MemoryCluster {
    /// Creates an empty cluster that completes requests in submission order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cluster whose engines interleave completions of
    /// different requests pseudo-randomly. The items of one request keep
    /// their order.
    pub fn shuffled(seed: u64) -> Self {
        Self {
            shared: Arc::new(ClusterShared {
                shuffle: Some(seed),
                ..ClusterShared::default()
            }),
        }
    }

    /// Creates a space directly, bypassing any engine.
    pub fn add_space(&self, description: &str) -> Result<String, String> {
        self.shared.store.lock().add_space(description)
    }

    /// Names of every space.
    pub fn spaces(&self) -> Vec<String> {
        self.shared.store.lock().space_names()
    }

    /// Number of objects in a space.
    pub fn object_count(&self, space: &str) -> Option<usize> {
        self.shared.store.lock().object_count(space)
    }

    /// Makes the next `poll` on an engine of this cluster fail with `status`.
    pub fn inject_fatal(&self, status: Status) {
        *self.shared.fatal.lock() = Some(status);
    }

    /// Makes subsequent connection attempts fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of engines opened so far.
    pub fn engines_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryCluster {
    type Engine = MemoryEngine;

    fn connect(&self, address: &str, port: u16) -> ClientResult<MemoryEngine> {
        if self.shared.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::Connect {
                address: address.to_string(),
                port,
                message: "cluster unavailable".into(),
            });
        }
        let index = self.shared.opened.fetch_add(1, Ordering::SeqCst) as u64;
        let rng = self
            .shared
            .shuffle
            .map(|seed| StdRng::seed_from_u64(seed.wrapping_add(index)));
        Ok(MemoryEngine {
            cluster: Arc::clone(&self.shared),
            queues: Mutex::new(Queues {
                next_id: 1,
                pending: Vec::new(),
                rng,
            }),
            ready: Condvar::new(),
            closed: AtomicBool::new(false),
            executed: AtomicU64::new(0),
        })
    }
}

#[derive(Debug)]
struct Queues {
    next_id: RequestId,
    /// Outstanding replies, one queue per request in submission order.
    pending: Vec<(RequestId, VecDeque<Reply>)>,
    rng: Option<StdRng>,
}

impl Queues {
    fn pop(&mut self) -> Option<Completion> {
        if self.pending.is_empty() {
            return None;
        }
        let slot = match self.rng.as_mut() {
            Some(rng) => rng.gen_range(0..self.pending.len()),
            None => 0,
        };
        let (id, queue) = &mut self.pending[slot];
        let id = *id;
        let reply = queue.pop_front();
        if queue.is_empty() {
            self.pending.remove(slot);
        }
        reply.map(|reply| Completion {
            id,
            status: reply.status,
            response: reply.response,
            message: reply.message,
            location: String::new(),
        })
    }
}

/// An [`Engine`] handle on a [`MemoryCluster`].
///
/// Each request executes against the shared store when it is submitted;
/// `poll` then hands out its completions.
#[derive(Debug)]
pub struct MemoryEngine {
    cluster: Arc<ClusterShared>,
    queues: Mutex<Queues>,
    ready: Condvar,
    closed: AtomicBool,
    executed: AtomicU64,
}

impl MemoryEngine {
    /// Number of requests this engine accepted.
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Number of requests with undelivered completions.
    pub fn outstanding(&self) -> usize {
        self.queues.lock().pending.len()
    }
}

impl Engine for MemoryEngine {
    fn submit(&self, request: &Request) -> Result<RequestId, EngineFailure> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineFailure::new(Status::Interrupted));
        }
        let replies = self.cluster.store.lock().execute(request)?;
        let mut queues = self.queues.lock();
        let id = queues.next_id;
        queues.next_id += 1;
        queues.pending.push((id, replies.into()));
        self.executed.fetch_add(1, Ordering::Relaxed);
        drop(queues);
        self.ready.notify_all();
        Ok(id)
    }

    fn block(&self, timeout: Duration) {
        let mut queues = self.queues.lock();
        if queues.pending.is_empty()
            && !self.closed.load(Ordering::SeqCst)
            && self.cluster.fatal.lock().is_none()
        {
            self.ready.wait_for(&mut queues, timeout);
        }
    }

    fn poll(&self, _timeout: Duration) -> PollOutcome {
        if let Some(status) = self.cluster.fatal.lock().take() {
            return PollOutcome::Fatal(EngineFailure::new(status));
        }
        match self.queues.lock().pop() {
            Some(completion) => PollOutcome::Completed(completion),
            None => PollOutcome::classify(-1, Status::NonePending, Response::None),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _queues = self.queues.lock();
        self.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvmux_codec::{pack, pack_attributes, Attributes, Value};
    use kvmux_core::MutateOp;

    fn cluster() -> MemoryCluster {
        let cluster = MemoryCluster::new();
        cluster
            .add_space("space kv key k attributes int n")
            .unwrap();
        cluster
    }

    fn put(key: &str, n: i64) -> Request {
        let attrs: Attributes = [("n".to_string(), Value::Int(n))].into_iter().collect();
        Request::Mutate {
            op: MutateOp::Put,
            space: "kv".into(),
            key: pack(&key.into()).unwrap(),
            checks: vec![],
            attributes: pack_attributes(&attrs).unwrap(),
        }
    }

    #[test]
    fn completions_follow_submission_order() {
        let engine = cluster().connect("localhost", 1982).unwrap();
        let a = engine.submit(&put("a", 1)).unwrap();
        let b = engine.submit(&put("b", 2)).unwrap();
        assert_eq!((a, b), (1, 2));

        for expected in [a, b] {
            match engine.poll(Duration::ZERO) {
                PollOutcome::Completed(c) => {
                    assert_eq!(c.id, expected);
                    assert_eq!(c.status, Status::Success);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(engine.poll(Duration::ZERO), PollOutcome::Idle);
    }

    #[test]
    fn engines_share_the_store() {
        let cluster = cluster();
        let first = cluster.connect("localhost", 1982).unwrap();
        let second = cluster.connect("localhost", 1982).unwrap();
        first.submit(&put("a", 1)).unwrap();
        second.submit(&put("b", 1)).unwrap();
        assert_eq!(cluster.object_count("kv"), Some(2));
        assert_eq!(cluster.engines_opened(), 2);
    }

    #[test]
    fn shuffled_streams_keep_item_order() {
        let cluster = MemoryCluster::shuffled(7);
        cluster
            .add_space("space kv key k attributes int n")
            .unwrap();
        let engine = cluster.connect("localhost", 1982).unwrap();
        for i in 0..20 {
            engine.submit(&put(&format!("k{i:02}"), i)).unwrap();
        }
        let search = engine
            .submit(&Request::Search {
                space: "kv".into(),
                checks: vec![],
            })
            .unwrap();

        let mut items = 0;
        let mut done = false;
        while let PollOutcome::Completed(c) = engine.poll(Duration::ZERO) {
            if c.id == search {
                assert!(!done, "item after end of stream");
                match c.status {
                    Status::Success => items += 1,
                    Status::SearchDone => done = true,
                    other => panic!("unexpected {other}"),
                }
            }
        }
        assert_eq!(items, 20);
        assert!(done);
    }

    #[test]
    fn injected_failure_is_fatal_once() {
        let cluster = cluster();
        let engine = cluster.connect("localhost", 1982).unwrap();
        cluster.inject_fatal(Status::CoordFail);
        assert_eq!(
            engine.poll(Duration::ZERO),
            PollOutcome::Fatal(EngineFailure::new(Status::CoordFail))
        );
        assert_eq!(engine.poll(Duration::ZERO), PollOutcome::Idle);
    }

    #[test]
    fn closed_engine_refuses_work() {
        let engine = cluster().connect("localhost", 1982).unwrap();
        engine.close();
        assert_eq!(
            engine.submit(&put("a", 1)).unwrap_err().status,
            Status::Interrupted
        );
        // Does not wait once closed.
        engine.block(Duration::from_secs(60));
    }

    #[test]
    fn unavailable_cluster_refuses_connections() {
        let cluster = cluster();
        cluster.set_unavailable(true);
        let err = cluster.connect("10.0.0.1", 1982).unwrap_err();
        assert_eq!(err.status(), Status::CoordFail);
    }
}
