//! # kvmux Testkit
//!
//! Test utilities for kvmux.
//!
//! This crate provides:
//! - An in-memory cluster and engine that execute every request type
//! - Space description parsing for that cluster
//! - Test fixtures and client helpers
//! - Property-based test generators using proptest
//! - Stress runs for the multiplexer
//!
//! ## Usage
//!
//! ```rust
//! use kvmux_testkit::prelude::*;
//!
//! let fixture = TestCluster::new(2);
//! fixture.put("kv", "a", &attrs([("v", "hello")])).unwrap().wait().unwrap();
//! let object = fixture.get("kv", "a").unwrap().wait().unwrap();
//! assert_eq!(object["v"].as_str(), Some("hello"));
//! ```
//!
//! ## Key Invariants
//!
//! - A request is executed exactly once, when it is submitted
//! - Completions of one request are delivered in order, ending with
//!   `SearchDone` for streaming requests
//! - A failed mutation leaves the object unchanged

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod ops;
mod store;

pub mod fixtures;
pub mod generators;
pub mod schema;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::engine::{MemoryCluster, MemoryEngine};
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use engine::{MemoryCluster, MemoryEngine};
pub use fixtures::*;
pub use generators::*;
pub use schema::SpaceSchema;
pub use stress::*;
