//! Accumulator for operations awaiting a flush

use super::pending::{OperationHandle, OperationRequest, PendingOperation};

/// Ordered set of enqueued operations. Dropping a scope without flushing it
/// drops the completion senders, which resolves every outstanding handle
/// with `ScopeDropped`.
#[derive(Debug, Default)]
pub struct BatchScope {
    operations: Vec<PendingOperation>,
}

impl BatchScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation and hand back its completion slot.
    pub fn enqueue(&mut self, request: OperationRequest) -> OperationHandle {
        let (pending, handle) = PendingOperation::new(request);
        self.operations.push(pending);
        handle
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Remove and return everything enqueued so far, in submission order.
    pub fn take(&mut self) -> Vec<PendingOperation> {
        std::mem::take(&mut self.operations)
    }
}
