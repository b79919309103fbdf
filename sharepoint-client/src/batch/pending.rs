//! Logical operations and their completion slots

use serde_json::Value;
use tokio::sync::oneshot;

use crate::csom::{CsomValue, ObjectIdentity};
use crate::error::ClientError;
use crate::metadata::EntityMetadataRegistry;
use crate::protocol::Protocol;
use crate::query::Query;
use crate::tracking::FieldChange;

/// What the operation does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Create,
    Update,
    Delete,
    Invoke,
}

/// Operation-specific data carried alongside the kind.
#[derive(Debug, Clone)]
pub enum OperationPayload {
    /// Field selection and filtering for a read.
    Query(Query),
    /// Tracked field changes for an update.
    Changes(Vec<FieldChange>),
    /// Raw body for a create. Field names must already be wire names.
    Create(Value),
    /// Server-side method invocation (stateful protocol only).
    Invoke {
        method: String,
        parameters: Vec<CsomValue>,
    },
    None,
}

/// Where the operation lands.
///
/// `path` is interpreted per protocol: a URL path relative to the host for
/// the OData dialects, a property chain (slash-separated) for stateful-
/// protocol reads.
#[derive(Debug, Clone)]
pub struct OperationTarget {
    pub host: String,
    pub model: String,
    pub path: String,
    pub identity: Option<ObjectIdentity>,
}

impl OperationTarget {
    pub fn new(host: impl Into<String>, model: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            model: model.into(),
            path: path.into(),
            identity: None,
        }
    }

    /// Target addressing the model's registered collection under `base`
    /// (e.g. `_api` plus an entity set of `web/lists`). `None` when the model
    /// has no collection segment registered for the dialect.
    pub fn collection(
        host: impl Into<String>,
        base: &str,
        model: impl Into<String>,
        protocol: Protocol,
        registry: &EntityMetadataRegistry,
    ) -> Option<Self> {
        let model = model.into();
        let segment = registry.collection_segment(&model, protocol)?;
        let path = if base.is_empty() {
            segment.to_string()
        } else {
            format!("{}/{}", base.trim_end_matches('/'), segment)
        };
        Some(Self::new(host, model, path))
    }

    pub fn with_identity(mut self, identity: ObjectIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Property chain for stateful-protocol reads.
    pub fn property_chain(&self) -> Vec<String> {
        self.path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// One logical operation, complete and immutable once enqueued.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub protocol: Protocol,
    pub kind: OperationKind,
    pub target: OperationTarget,
    pub payload: OperationPayload,
}

impl OperationRequest {
    pub fn read(protocol: Protocol, target: OperationTarget, query: Query) -> Self {
        Self {
            protocol,
            kind: OperationKind::Read,
            target,
            payload: OperationPayload::Query(query),
        }
    }

    pub fn create(protocol: Protocol, target: OperationTarget, data: Value) -> Self {
        Self {
            protocol,
            kind: OperationKind::Create,
            target,
            payload: OperationPayload::Create(data),
        }
    }

    pub fn update(protocol: Protocol, target: OperationTarget, changes: Vec<FieldChange>) -> Self {
        Self {
            protocol,
            kind: OperationKind::Update,
            target,
            payload: OperationPayload::Changes(changes),
        }
    }

    pub fn delete(protocol: Protocol, target: OperationTarget) -> Self {
        Self {
            protocol,
            kind: OperationKind::Delete,
            target,
            payload: OperationPayload::None,
        }
    }

    /// Method invocations only exist in the stateful protocol.
    pub fn invoke(
        target: OperationTarget,
        method: impl Into<String>,
        parameters: Vec<CsomValue>,
    ) -> Self {
        Self {
            protocol: Protocol::Csom,
            kind: OperationKind::Invoke,
            target,
            payload: OperationPayload::Invoke {
                method: method.into(),
                parameters,
            },
        }
    }
}

/// An enqueued operation waiting for its result. The sender side is consumed
/// exactly once during flush.
#[derive(Debug)]
pub struct PendingOperation {
    pub request: OperationRequest,
    pub sender: oneshot::Sender<Result<Value, ClientError>>,
}

impl PendingOperation {
    pub fn new(request: OperationRequest) -> (Self, OperationHandle) {
        let (sender, receiver) = oneshot::channel();
        (Self { request, sender }, OperationHandle { receiver })
    }

    /// Resolve the completion slot. A dropped handle is not an error.
    pub fn resolve(self, result: Result<Value, ClientError>) {
        let _ = self.sender.send(result);
    }
}

/// Caller-side completion slot for one enqueued operation.
#[derive(Debug)]
pub struct OperationHandle {
    receiver: oneshot::Receiver<Result<Value, ClientError>>,
}

impl OperationHandle {
    /// Waits for the operation's result. If the owning scope was dropped
    /// without a flush the slot never fires and this reports `ScopeDropped`.
    pub async fn resolve(self) -> Result<Value, ClientError> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(ClientError::ScopeDropped),
        }
    }
}
