//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use kvmux_codec::{Attributes, Value};
use kvmux_core::{Client, ClientConfig};
use kvmux_testkit::{MemoryCluster, MemoryEngine, KV_SPACE};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::Duration;

/// Generate a random alphanumeric string of the specified length.
pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a list of `count` random strings.
pub fn string_list(count: usize, len: usize) -> Value {
    Value::List((0..count).map(|_| Value::String(random_string(len))).collect())
}

/// Generate a set of `count` random integers.
pub fn int_set(count: usize) -> Value {
    let mut rng = rand::thread_rng();
    Value::Set((0..count).map(|_| Value::Int(rng.gen())).collect())
}

/// Generate a string-to-int map with `count` entries.
pub fn string_int_map(count: usize) -> Value {
    let mut rng = rand::thread_rng();
    Value::Map(
        (0..count)
            .map(|i| (Value::String(format!("key_{i}")), Value::Int(rng.gen())))
            .collect(),
    )
}

/// Attributes filling every non-key attribute of `KV_SPACE`.
pub fn kv_object(elements: usize) -> Attributes {
    let mut rng = rand::thread_rng();
    let mut attrs = Attributes::new();
    attrs.insert("v".into(), Value::String(random_string(32)));
    attrs.insert("n".into(), Value::Int(rng.gen()));
    attrs.insert("f".into(), Value::Float(rng.gen()));
    attrs.insert("l".into(), string_list(elements, 8));
    attrs.insert(
        "s".into(),
        Value::Set((0..elements).map(|_| Value::String(random_string(8))).collect()),
    );
    attrs.insert("m".into(), string_int_map(elements));
    attrs
}

/// A cluster holding `KV_SPACE` and a client with `workers` connections.
///
/// # Panics
///
/// Panics if the in-memory cluster cannot be set up.
pub fn memory_client(workers: usize) -> (MemoryCluster, Client<MemoryEngine>) {
    let cluster = MemoryCluster::new();
    cluster.add_space(KV_SPACE).expect("Failed to create space");
    let config = ClientConfig::default()
        .with_workers(workers)
        .with_block_timeout(Duration::from_millis(1));
    let client = Client::connect(&cluster, config).expect("Failed to connect");
    (cluster, client)
}
