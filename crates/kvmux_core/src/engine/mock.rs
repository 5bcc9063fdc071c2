//! A scripted engine for testing.

use super::{Completion, Engine, EngineFailure, PollOutcome, RequestId};
use crate::request::Request;
use crate::status::Status;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A mock engine for testing.
///
/// Submissions are assigned increasing ids starting at 1 unless a result is
/// scripted with [`MockEngine::assign_next`] or [`MockEngine::reject_next`].
/// `poll` returns queued outcomes in order, then [`PollOutcome::Idle`].
/// Clones share state, so a test can keep one clone while a connection owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    inner: Arc<MockInner>,
}

#[derive(Debug, Default)]
struct MockInner {
    state: Mutex<MockState>,
    ready: Condvar,
    closed: AtomicBool,
    polls: AtomicU64,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: RequestId,
    scripted: VecDeque<Result<RequestId, EngineFailure>>,
    outcomes: VecDeque<PollOutcome>,
    submitted: Vec<(RequestId, Request)>,
}

impl MockEngine {
    /// Creates a new mock engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// The next submission gets `id`.
    pub fn assign_next(&self, id: RequestId) {
        self.inner.state.lock().scripted.push_back(Ok(id));
    }

    /// The next submission fails with `failure`.
    pub fn reject_next(&self, failure: EngineFailure) {
        self.inner.state.lock().scripted.push_back(Err(failure));
    }

    /// Queues an outcome for `poll`.
    pub fn push_outcome(&self, outcome: PollOutcome) {
        self.inner.state.lock().outcomes.push_back(outcome);
        self.inner.ready.notify_all();
    }

    /// Queues a completion.
    pub fn complete(&self, completion: Completion) {
        self.push_outcome(PollOutcome::Completed(completion));
    }

    /// Queues a fatal poll failure.
    pub fn fail(&self, status: Status) {
        self.push_outcome(PollOutcome::Fatal(EngineFailure::new(status)));
    }

    /// Requests accepted so far, with their ids.
    pub fn submitted(&self) -> Vec<(RequestId, Request)> {
        self.inner.state.lock().submitted.clone()
    }

    /// Number of accepted requests.
    pub fn submitted_len(&self) -> usize {
        self.inner.state.lock().submitted.len()
    }

    /// Number of `poll` calls.
    pub fn poll_count(&self) -> u64 {
        self.inner.polls.load(Ordering::SeqCst)
    }

    /// Outcomes not yet returned by `poll`.
    pub fn queued_outcomes(&self) -> usize {
        self.inner.state.lock().outcomes.len()
    }

    /// Returns true once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl Engine for MockEngine {
    fn submit(&self, request: &Request) -> Result<RequestId, EngineFailure> {
        if self.is_closed() {
            return Err(EngineFailure::new(Status::Interrupted));
        }
        let mut state = self.inner.state.lock();
        let id = match state.scripted.pop_front() {
            Some(scripted) => scripted?,
            None => {
                state.next_id += 1;
                state.next_id
            }
        };
        state.submitted.push((id, request.clone()));
        Ok(id)
    }

    fn block(&self, timeout: Duration) {
        let mut state = self.inner.state.lock();
        if state.outcomes.is_empty() && !self.is_closed() {
            self.inner.ready.wait_for(&mut state, timeout);
        }
    }

    fn poll(&self, _timeout: Duration) -> PollOutcome {
        self.inner.polls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .state
            .lock()
            .outcomes
            .pop_front()
            .unwrap_or(PollOutcome::Idle)
    }

    fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let _state = self.inner.state.lock();
        self.inner.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increment_unless_scripted() {
        let engine = MockEngine::new();
        assert_eq!(engine.submit(&Request::DumpConfig), Ok(1));
        engine.assign_next(7);
        assert_eq!(engine.submit(&Request::DumpConfig), Ok(7));
        assert_eq!(engine.submit(&Request::DumpConfig), Ok(2));
        assert_eq!(engine.submitted_len(), 3);
    }

    #[test]
    fn rejected_submission_is_not_recorded() {
        let engine = MockEngine::new();
        engine.reject_next(EngineFailure::new(Status::UnknownSpace));
        let err = engine.submit(&Request::ListSpaces).unwrap_err();
        assert_eq!(err.status, Status::UnknownSpace);
        assert!(engine.submitted().is_empty());
    }

    #[test]
    fn poll_drains_queue_then_idles() {
        let engine = MockEngine::new();
        engine.complete(Completion::done(3));
        assert_eq!(
            engine.poll(Duration::ZERO),
            PollOutcome::Completed(Completion::done(3))
        );
        assert_eq!(engine.poll(Duration::ZERO), PollOutcome::Idle);
        assert_eq!(engine.poll_count(), 2);
    }

    #[test]
    fn closed_engine_rejects() {
        let engine = MockEngine::new();
        engine.close();
        assert!(engine.is_closed());
        assert!(engine.submit(&Request::DumpConfig).is_err());
        // Returns immediately once closed.
        engine.block(Duration::from_secs(10));
    }
}
