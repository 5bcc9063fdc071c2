//! Pending operations keyed by request id.

use crate::engine::RequestId;
use crate::operation::Operation;
use std::collections::HashMap;

/// Operations awaiting a completion from the engine.
#[derive(Debug, Default)]
pub(crate) struct PendingTable {
    ops: HashMap<RequestId, Operation>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts `op`. Hands it back if its id is already pending.
    pub(crate) fn register(&mut self, op: Operation) -> Result<(), Operation> {
        if self.ops.contains_key(&op.id()) {
            return Err(op);
        }
        self.ops.insert(op.id(), op);
        Ok(())
    }

    /// Removes and returns the operation for `id`.
    pub(crate) fn take(&mut self, id: RequestId) -> Option<Operation> {
        self.ops.remove(&id)
    }

    /// Returns a streaming operation after a non-terminal delivery.
    pub(crate) fn reinsert(&mut self, op: Operation) {
        self.ops.insert(op.id(), op);
    }

    /// Removes every operation.
    pub(crate) fn drain(&mut self) -> Vec<Operation> {
        self.ops.drain().map(|(_, op)| op).collect()
    }

    pub(crate) fn contains(&self, id: RequestId) -> bool {
        self.ops.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
