//! Client facade
//!
//! Thin context wiring the metadata registry, transport, and batch
//! coordinator together. All protocol work happens in the layers below; the
//! facade only owns construction and the persist/clear contract for change
//! trackers.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::auth::TokenProvider;
use crate::batch::{
    BatchCoordinator, BatchScope, OperationHandle, OperationRequest, OperationTarget,
};
use crate::error::{ClientError, TransportError};
use crate::metadata::EntityMetadataRegistry;
use crate::protocol::Protocol;
use crate::resilience::ClientConfig;
use crate::tracking::ChangeTracker;
use crate::transport::{HttpTransport, Transport};

pub struct SharePointClient {
    registry: Arc<EntityMetadataRegistry>,
    coordinator: BatchCoordinator,
}

impl SharePointClient {
    /// Client over a caller-provided transport. Test seam and extension
    /// point; production callers normally use [`SharePointClient::connect`].
    pub fn new(transport: Arc<dyn Transport>, registry: EntityMetadataRegistry) -> Self {
        let registry = Arc::new(registry);
        Self {
            coordinator: BatchCoordinator::new(transport, registry.clone()),
            registry,
        }
    }

    /// Client over the reqwest transport with the given token provider.
    pub fn connect(
        auth: Arc<dyn TokenProvider>,
        config: ClientConfig,
        registry: EntityMetadataRegistry,
    ) -> Result<Self, TransportError> {
        let transport = Arc::new(HttpTransport::new(auth, config)?);
        Ok(Self::new(transport, registry))
    }

    pub fn registry(&self) -> &Arc<EntityMetadataRegistry> {
        &self.registry
    }

    /// Change tracker bound to this client's metadata.
    pub fn tracker(&self, model: impl Into<String>) -> ChangeTracker {
        ChangeTracker::new(model, self.registry.clone())
    }

    /// Queue an operation for the next flush.
    pub fn enqueue(&self, request: OperationRequest) -> OperationHandle {
        self.coordinator.enqueue(request)
    }

    /// Queue a single operation and flush immediately.
    pub async fn execute(&self, request: OperationRequest) -> Result<Value, ClientError> {
        self.coordinator.execute(request).await
    }

    pub async fn flush(&self) {
        self.coordinator.flush().await;
    }

    pub async fn flush_with_cancel(&self, cancel: CancellationToken) {
        self.coordinator.flush_with_cancel(cancel).await;
    }

    /// Independent accumulator for callers that batch explicitly instead of
    /// using the client-wide queue.
    pub fn scope(&self) -> BatchScope {
        BatchScope::new()
    }

    pub async fn flush_scope(&self, scope: &mut BatchScope) {
        self.coordinator.flush_scope(scope).await;
    }

    /// Persist a tracker's pending changes as one update operation. The
    /// tracker is cleared only on confirmed success; on any failure the
    /// change set is left intact so the caller can retry.
    pub async fn persist(
        &self,
        protocol: Protocol,
        target: OperationTarget,
        tracker: &mut ChangeTracker,
    ) -> Result<Value, ClientError> {
        if !tracker.is_dirty() {
            return Ok(Value::Null);
        }
        let request =
            OperationRequest::update(protocol, target, tracker.changes().to_vec());
        let result = self.coordinator.execute(request).await?;
        tracker.clear();
        Ok(result)
    }
}
