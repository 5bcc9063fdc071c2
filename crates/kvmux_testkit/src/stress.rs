//! Stress runs for the client multiplexer.
//!
//! Each run drives a [`Client`] and counts how many operations resolved
//! successfully. Runs are generic over the engine so they work against any
//! backend; the CLI and the benches use the in-memory one.

use crate::fixtures::attrs;
use kvmux_core::{Client, ClientResult, Engine, PendingResult, Predicate, Value};
use serde::{Serialize, Serializer};
use std::thread;
use std::time::{Duration, Instant};

/// Space the stress runs write to.
pub const STRESS_SPACE: &str = "space stress key k attributes int n, string s";

/// Name of [`STRESS_SPACE`].
pub const STRESS_SPACE_NAME: &str = "stress";

/// Outcome of one stress run.
#[derive(Debug, Clone, Serialize)]
pub struct StressTestResult {
    /// Operations attempted.
    pub total_ops: usize,
    /// Operations that failed at submission or on completion.
    pub failed_ops: usize,
    /// Wall-clock time of the run.
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    /// Attempted operations per second.
    pub throughput: f64,
}

fn as_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64() * 1000.0)
}

impl StressTestResult {
    /// Builds a result from success and failure tallies.
    pub fn new(succeeded: usize, failed: usize, elapsed: Duration) -> Self {
        let total_ops = succeeded + failed;
        let secs = elapsed.as_secs_f64();
        Self {
            total_ops,
            failed_ops: failed,
            elapsed,
            throughput: if secs > 0.0 { total_ops as f64 / secs } else { 0.0 },
        }
    }

    /// Operations that resolved successfully.
    pub fn succeeded(&self) -> usize {
        self.total_ops - self.failed_ops
    }

    /// Prints one summary line for the run.
    pub fn print_summary(&self, name: &str) {
        println!(
            "{name:<18} {:>8} ops {:>6} failed {:>10.2?} {:>12.0} ops/s",
            self.total_ops, self.failed_ops, self.elapsed, self.throughput
        );
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of submitting threads.
    pub threads: usize,
    /// Number of distinct keys.
    pub keys: usize,
    /// Operations submitted before waiting on any of them.
    pub pipeline_depth: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            keys: 1_000,
            pipeline_depth: 64,
        }
    }
}

fn key(i: usize, config: &StressConfig) -> String {
    format!("k{:06}", i % config.keys.max(1))
}

fn tally<T>(results: impl IntoIterator<Item = ClientResult<T>>) -> (usize, usize) {
    results
        .into_iter()
        .fold((0, 0), |(ok, failed), result| match result {
            Ok(_) => (ok + 1, failed),
            Err(_) => (ok, failed + 1),
        })
}

fn settle<T>(pending: Vec<ClientResult<PendingResult<T>>>) -> (usize, usize) {
    tally(pending.into_iter().map(|p| p.and_then(PendingResult::wait)))
}

/// Puts one object at a time, waiting for each before the next.
pub fn stress_sequential_puts<E: Engine>(client: &Client<E>, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let results = (0..config.operations).map(|i| {
        client
            .put(STRESS_SPACE_NAME, key(i, config), &attrs([("n", i as i64)]))
            .and_then(PendingResult::wait)
    });
    let (ok, failed) = tally(results);
    StressTestResult::new(ok, failed, start.elapsed())
}

/// Keeps up to `pipeline_depth` puts in flight from a single thread.
pub fn stress_pipelined_puts<E: Engine>(client: &Client<E>, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let depth = config.pipeline_depth.max(1);
    let (mut ok, mut failed) = (0, 0);
    let mut base = 0;
    while base < config.operations {
        let end = (base + depth).min(config.operations);
        let batch: Vec<_> = (base..end)
            .map(|i| client.put(STRESS_SPACE_NAME, key(i, config), &attrs([("n", i as i64)])))
            .collect();
        let (o, f) = settle(batch);
        ok += o;
        failed += f;
        base = end;
    }
    StressTestResult::new(ok, failed, start.elapsed())
}

/// Runs puts, gets and atomic adds from `threads` threads at once.
///
/// A get of a key nobody has written yet counts as a successful read.
pub fn stress_concurrent_mixed<E: Engine>(client: &Client<E>, config: &StressConfig) -> StressTestResult {
    let threads = config.threads.max(1);
    let base = config.operations / threads;
    let extra = config.operations % threads;
    let start = Instant::now();

    let (ok, failed) = thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let share = base + usize::from(t < extra);
                let first = t * base + t.min(extra);
                let handle = scope.spawn(move || {
                    let (mut ok, mut failed) = (0usize, 0usize);
                    for n in first..first + share {
                        let k = key(n, config);
                        let result = match n % 3 {
                            0 => client
                                .put(STRESS_SPACE_NAME, k, &attrs([("n", 1i64)]))
                                .and_then(PendingResult::wait),
                            1 => match client.get(STRESS_SPACE_NAME, k).and_then(PendingResult::wait) {
                                Err(e) if e.is_not_found() => Ok(()),
                                other => other.map(|_| ()),
                            },
                            _ => match client
                                .atomic_add(STRESS_SPACE_NAME, k, &attrs([("n", 1i64)]))
                                .and_then(PendingResult::wait)
                            {
                                Err(e) if e.is_not_found() => Ok(()),
                                other => other,
                            },
                        };
                        match result {
                            Ok(()) => ok += 1,
                            Err(_) => failed += 1,
                        }
                    }
                    (ok, failed)
                });
                (handle, share)
            })
            .collect();
        handles
            .into_iter()
            .map(|(h, share)| h.join().unwrap_or((0, share)))
            .fold((0, 0), |(a, b), (c, d)| (a + c, b + d))
    });

    StressTestResult::new(ok, failed, start.elapsed())
}

/// Streams searches over the stress space; each delivered object counts
/// as one operation.
pub fn stress_search<E: Engine>(client: &Client<E>, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let (mut ok, mut failed) = (0, 0);
    let rounds = (config.operations / config.keys.max(1)).max(1);
    for round in 0..rounds {
        let checks = [Predicate::greater_equal("n", Value::Int((round % 2) as i64))];
        match client.search(STRESS_SPACE_NAME, &checks) {
            Ok(stream) => {
                let (o, f) = tally(stream);
                ok += o;
                failed += f;
            }
            Err(_) => failed += 1,
        }
    }
    StressTestResult::new(ok, failed, start.elapsed())
}
