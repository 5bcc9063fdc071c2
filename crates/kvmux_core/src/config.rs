//! Configuration for clients and connections.

use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

/// Default coordinator port.
pub const DEFAULT_PORT: u16 = 1982;

/// Configuration for a client pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Coordinator address.
    pub address: String,
    /// Coordinator port.
    pub port: u16,
    /// Number of connections, each with its own engine handle and dispatcher.
    pub workers: usize,
    /// Upper bound for one engine `block` call.
    pub block_timeout: Duration,
    /// Timeout passed to engine `poll`, which runs under the table lock.
    pub poll_timeout: Duration,
    /// How long an idle dispatcher sleeps before rechecking for work.
    pub idle_interval: Duration,
}

impl ClientConfig {
    /// Creates a configuration for the coordinator at `address:port`.
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            workers: default_workers(),
            block_timeout: Duration::from_millis(250),
            poll_timeout: Duration::ZERO,
            idle_interval: Duration::from_millis(100),
        }
    }

    /// Sets the number of connections. Zero is treated as one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets the engine block timeout.
    pub fn with_block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = timeout;
        self
    }

    /// Sets the engine poll timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Sets the idle interval.
    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

fn default_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
