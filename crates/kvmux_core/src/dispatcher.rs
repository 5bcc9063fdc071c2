//! The per-connection dispatcher loop.

use crate::connection::Shared;
use crate::engine::{Engine, PollOutcome};
use crate::error::ClientError;
use crate::operation::Disposition;
use crate::state::{ConnectionState, StatsCounters};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Drains completions from the engine until the connection closes or the
/// engine fails.
pub(crate) fn run<E: Engine>(shared: Arc<Shared<E>>, index: usize) {
    debug!(index, "dispatcher started");
    let config = &shared.config;

    loop {
        {
            let mut inner = shared.inner.lock();
            if !inner.state.is_open() {
                break;
            }
            if inner.table.is_empty() {
                shared
                    .work_ready
                    .wait_for(&mut inner, config.idle_interval);
                continue;
            }
        }

        shared.engine.block(config.block_timeout);

        let (mut op, completion) = {
            let mut inner = shared.inner.lock();
            if !inner.state.is_open() {
                break;
            }
            match shared.engine.poll(config.poll_timeout) {
                PollOutcome::Idle => {
                    StatsCounters::bump(&shared.stats.idle_polls);
                    continue;
                }
                PollOutcome::Fatal(failure) => {
                    error!(index, status = %failure.status, message = %failure.message, "engine failed");
                    let err = ClientError::connection_lost(failure.status, failure.message);
                    inner.state = ConnectionState::Failed;
                    inner.fatal = Some(err.clone());
                    let drained = inner.table.drain();
                    drop(inner);

                    for mut op in drained {
                        op.resolve(err.clone());
                    }
                    return;
                }
                PollOutcome::Completed(completion) => match inner.table.take(completion.id) {
                    Some(op) => (op, completion),
                    None => {
                        StatsCounters::bump(&shared.stats.orphaned);
                        trace!(index, id = completion.id, "completion for unknown request");
                        continue;
                    }
                },
            }
        };

        StatsCounters::bump(&shared.stats.completions);
        trace!(index, id = completion.id, status = %completion.status, "dispatch");

        if op.deliver(completion) == Disposition::Keep {
            let mut inner = shared.inner.lock();
            if inner.state.is_open() {
                inner.table.reinsert(op);
            } else {
                drop(inner);
                op.resolve(ClientError::Closed);
            }
        }
    }

    let drained = shared.inner.lock().table.drain();
    for mut op in drained {
        op.resolve(ClientError::Closed);
    }
    debug!(index, "dispatcher stopped");
}
