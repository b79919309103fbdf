//! Request batching and dispatch
//!
//! Logical operations are enqueued against a coordinator and resolved through
//! per-operation completion slots when the batch is flushed. A flush
//! partitions the queue by protocol and host, assembles one physical request
//! per partition, and demultiplexes each response back onto the operations
//! that produced it, in submission order.

pub mod coordinator;
pub mod graph;
pub mod pending;
pub mod rest;
pub mod scope;

pub use coordinator::BatchCoordinator;
pub use pending::{
    OperationHandle, OperationKind, OperationPayload, OperationRequest, OperationTarget,
    PendingOperation,
};
pub use scope::BatchScope;

use serde_json::Value;

use crate::metadata::EntityMetadataRegistry;
use crate::protocol::Protocol;
use crate::tracking::FieldChange;

/// JSON mutation body from tracked changes, with field names translated to
/// the dialect's spelling.
pub(crate) fn changes_body(
    changes: &[FieldChange],
    model: &str,
    protocol: Protocol,
    registry: &EntityMetadataRegistry,
) -> Value {
    let mut map = serde_json::Map::with_capacity(changes.len());
    for change in changes {
        let name = registry.field_name(model, &change.field, protocol);
        map.insert(name.to_string(), change.value.to_json());
    }
    Value::Object(map)
}
