//! Test fixtures and cluster helpers.
//!
//! Provides convenience functions for setting up an in-memory cluster with
//! a client pool and common test spaces.

use crate::engine::{MemoryCluster, MemoryEngine};
use kvmux_codec::{Attributes, Value};
use kvmux_core::{Admin, Client, ClientConfig};
use std::time::Duration;

/// A space exercising every attribute type.
pub const KV_SPACE: &str = "space kv
key k
attributes
    string v,
    int n,
    float f,
    list(string) l,
    set(string) s,
    map(string, int) m";

/// Client configuration with short timeouts, suited to tests.
pub fn test_config(workers: usize) -> ClientConfig {
    ClientConfig::default()
        .with_workers(workers)
        .with_block_timeout(Duration::from_millis(5))
        .with_idle_interval(Duration::from_millis(5))
}

/// An in-memory cluster with a connected client pool.
///
/// The client is closed when the fixture is dropped.
pub struct TestCluster {
    /// The cluster.
    pub cluster: MemoryCluster,
    /// A client connected to it.
    pub client: Client<MemoryEngine>,
}

impl TestCluster {
    /// Creates a cluster holding [`KV_SPACE`] and a client with `workers`
    /// connections.
    pub fn new(workers: usize) -> Self {
        Self::with_cluster(MemoryCluster::new(), workers)
    }

    /// Like [`TestCluster::new`] with completions interleaved pseudo-randomly.
    pub fn shuffled(workers: usize, seed: u64) -> Self {
        Self::with_cluster(MemoryCluster::shuffled(seed), workers)
    }

    fn with_cluster(cluster: MemoryCluster, workers: usize) -> Self {
        cluster
            .add_space(KV_SPACE)
            .expect("Failed to create test space");
        let client =
            Client::connect(&cluster, test_config(workers)).expect("Failed to connect client");
        Self { cluster, client }
    }

    /// Opens an admin handle on the same cluster.
    pub fn admin(&self) -> Admin<MemoryEngine> {
        Admin::connect(&self.cluster, test_config(1)).expect("Failed to connect admin")
    }
}

impl std::ops::Deref for TestCluster {
    type Target = Client<MemoryEngine>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl Drop for TestCluster {
    fn drop(&mut self) {
        self.client.close();
    }
}

/// Runs a test against a fresh single-worker cluster.
///
/// # Example
///
/// ```rust
/// use kvmux_testkit::{attrs, with_memory_client};
///
/// with_memory_client(|client| {
///     client.put("kv", "a", &attrs([("n", 1i64)])).unwrap().wait().unwrap();
///     assert_eq!(client.count("kv", &[]).unwrap().wait(), Ok(1));
/// });
/// ```
pub fn with_memory_client<F, R>(f: F) -> R
where
    F: FnOnce(&Client<MemoryEngine>) -> R,
{
    let fixture = TestCluster::new(1);
    f(&fixture.client)
}

/// Runs a test against a fresh cluster with a `workers`-connection pool.
pub fn with_memory_pool<F, R>(workers: usize, f: F) -> R
where
    F: FnOnce(&Client<MemoryEngine>, &MemoryCluster) -> R,
{
    let fixture = TestCluster::new(workers);
    f(&fixture.client, &fixture.cluster)
}

/// Builds an attribute map from name/value pairs.
pub fn attrs<I, K, V>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a cluster whose `kv` space holds `count` objects keyed
    /// `key-0000`, `key-0001`, ... with `n` set to the index.
    pub fn populated_cluster(count: usize, workers: usize) -> TestCluster {
        let fixture = TestCluster::new(workers);
        let pending: Vec<_> = (0..count)
            .map(|i| {
                fixture
                    .put(
                        "kv",
                        format!("key-{i:04}"),
                        &attrs([("n", Value::Int(i as i64)), ("v", Value::from(format!("v{i}")))]),
                    )
                    .expect("Failed to submit put")
            })
            .collect();
        for result in pending {
            result.wait().expect("Failed to populate cluster");
        }
        fixture
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populated_cluster_holds_every_object() {
        let fixture = scenarios::populated_cluster(25, 2);
        assert_eq!(fixture.cluster.object_count("kv"), Some(25));
        assert_eq!(fixture.count("kv", &[]).unwrap().wait(), Ok(25));
    }

    #[test]
    fn attrs_converts_pairs() {
        let a = attrs([("x", 1i64), ("y", 2i64)]);
        assert_eq!(a.len(), 2);
        assert_eq!(a["y"], Value::Int(2));
    }
}
