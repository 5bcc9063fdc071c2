//! # kvmux Core
//!
//! Asynchronous operation multiplexer and typed client for a key-value
//! cluster driven through a native client engine.
//!
//! This crate provides:
//! - The engine boundary ([`Engine`], [`Connector`]) and a scripted
//!   [`MockEngine`]
//! - [`Connection`]: one engine handle, its pending table and dispatcher thread
//! - The operation state machine and result sinks
//! - [`Client`]: a round-robin pool of connections with typed operations
//! - [`Admin`]: space lifecycle over the same machinery
//!
//! ## Architecture
//!
//! Every call goes through the same path:
//! 1. Arguments are packed with `kvmux_codec`
//! 2. The engine accepts the request and returns an id, or refuses it
//! 3. An operation is registered under that id, under the same lock
//! 4. The dispatcher polls the engine and routes each completion to its
//!    operation, outside the lock
//! 5. One-shot operations finish on their first completion; streaming
//!    operations finish on `SearchDone` or the first failure
//!
//! ## Key Invariants
//!
//! - Every operation receives exactly one terminal event
//! - Events for one operation arrive in the order the engine reported them
//! - A refused request registers nothing
//! - After close, nothing is left pending

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod admin;
mod client;
mod config;
mod connection;
mod dispatcher;
mod engine;
mod error;
mod operation;
mod request;
mod result;
mod state;
mod status;
mod table;

pub use admin::Admin;
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_PORT};
pub use connection::Connection;
pub use engine::{
    Completion, Connector, Engine, EngineFailure, MockEngine, PollOutcome, RequestId,
};
pub use error::{ClientError, ClientResult};
pub use operation::{
    CallbackSink, Disposition, OneShotSink, Operation, OperationSink, OperationState, StreamSink,
};
pub use request::{MapOp, MutateOp, OperationKind, Request, Response, SortOrder};
pub use result::{PendingResult, ResultStream};
pub use state::{ConnectionState, ConnectionStats};
pub use status::Status;

pub use kvmux_codec::{Attributes, MapAttribute, Predicate, PredicateKind, Value};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
