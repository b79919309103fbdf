//! Batch coordination and dispatch
//!
//! Owns the operation queue. A flush drains it, partitions by protocol then
//! host, assembles one physical request per partition, and resolves every
//! operation's completion slot exactly once, success or failure. Partitions
//! are dispatched sequentially in first-submission order.

use std::sync::{Arc, Mutex};

use log::{debug, warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::csom::{ObjectPathBuilder, UpdateMode};
use crate::error::{BuildError, ClientError};
use crate::metadata::EntityMetadataRegistry;
use crate::protocol::Protocol;
use crate::response::{map_csom_response, map_graph_batch, map_rest_batch};
use crate::tracking::FieldChange;
use crate::transport::{Transport, TransportRequest, TransportResponse};

use super::graph::build_graph_batch;
use super::pending::{OperationKind, OperationPayload, OperationRequest, PendingOperation};
use super::rest::build_rest_batch;
use super::scope::BatchScope;
use super::OperationHandle;

const PROCESS_QUERY_PATH: &str = "_vti_bin/client.svc/ProcessQuery";

/// Accepts logical operations and turns each flush into the minimal set of
/// physical requests.
pub struct BatchCoordinator {
    transport: Arc<dyn Transport>,
    registry: Arc<EntityMetadataRegistry>,
    queue: Mutex<BatchScope>,
}

impl BatchCoordinator {
    pub fn new(transport: Arc<dyn Transport>, registry: Arc<EntityMetadataRegistry>) -> Self {
        Self {
            transport,
            registry,
            queue: Mutex::new(BatchScope::new()),
        }
    }

    pub fn registry(&self) -> &Arc<EntityMetadataRegistry> {
        &self.registry
    }

    /// Queue an operation for the next flush.
    pub fn enqueue(&self, request: OperationRequest) -> OperationHandle {
        self.queue
            .lock()
            .expect("operation queue poisoned")
            .enqueue(request)
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().expect("operation queue poisoned").len()
    }

    /// Queue a single operation and flush immediately.
    pub async fn execute(&self, request: OperationRequest) -> Result<Value, ClientError> {
        let handle = self.enqueue(request);
        self.flush().await;
        handle.resolve().await
    }

    /// Dispatch everything queued so far.
    pub async fn flush(&self) {
        self.flush_with_cancel(CancellationToken::new()).await;
    }

    /// Dispatch everything queued so far, abandoning undispatched work when
    /// the token fires. Operations cut off by cancellation resolve with
    /// `Cancelled`; already-answered partitions keep their results.
    pub async fn flush_with_cancel(&self, cancel: CancellationToken) {
        let operations = self
            .queue
            .lock()
            .expect("operation queue poisoned")
            .take();
        self.dispatch_all(operations, cancel).await;
    }

    /// Dispatch a caller-owned scope. Scopes are independent; flushing one
    /// leaves the coordinator's own queue and any other scope untouched.
    pub async fn flush_scope(&self, scope: &mut BatchScope) {
        self.dispatch_all(scope.take(), CancellationToken::new()).await;
    }

    pub async fn flush_scope_with_cancel(&self, scope: &mut BatchScope, cancel: CancellationToken) {
        self.dispatch_all(scope.take(), cancel).await;
    }

    async fn dispatch_all(&self, operations: Vec<PendingOperation>, cancel: CancellationToken) {
        if operations.is_empty() {
            return;
        }

        let partitions = partition(operations);
        debug!("flushing {} partition(s)", partitions.len());

        for ((protocol, host), pending) in partitions {
            if cancel.is_cancelled() {
                resolve_all(pending, &ClientError::Cancelled);
                continue;
            }
            self.dispatch(protocol, &host, pending, &cancel).await;
        }
    }

    async fn dispatch(
        &self,
        protocol: Protocol,
        host: &str,
        pending: Vec<PendingOperation>,
        cancel: &CancellationToken,
    ) {
        let requests: Vec<&OperationRequest> = pending.iter().map(|p| &p.request).collect();

        // Build failures are local to the partition; nothing is sent.
        let built = match protocol {
            Protocol::Rest => build_rest_batch(host, &requests, &self.registry).map(|r| (r, vec![])),
            Protocol::Graph => {
                build_graph_batch(host, &requests, &self.registry).map(|r| (r, vec![]))
            }
            Protocol::Csom => self.build_csom(host, &requests),
        };
        let (request, slots) = match built {
            Ok(built) => built,
            Err(err) => {
                warn!("batch assembly failed for {protocol} partition on {host}: {err}");
                resolve_all(pending, &ClientError::Build(err));
                return;
            }
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                resolve_all(pending, &ClientError::Cancelled);
                return;
            }
            result = self.transport.send(request) => result,
        };
        let response = match response {
            Ok(response) => response,
            Err(err) => {
                resolve_all(pending, &ClientError::Transport(err));
                return;
            }
        };
        if !response.is_success() {
            resolve_all(
                pending,
                &ClientError::protocol(response.status.to_string(), body_snippet(&response)),
            );
            return;
        }

        let mapped = match protocol {
            Protocol::Rest => map_rest_batch(&response.body, pending.len()),
            Protocol::Graph => map_graph_batch(&response.body, pending.len()),
            Protocol::Csom => map_csom_response(&response.body, &slots),
        };
        match mapped {
            Ok(results) => {
                for (operation, result) in pending.into_iter().zip(results) {
                    operation.resolve(result);
                }
            }
            Err(err) => resolve_all(pending, &ClientError::Mapping(err)),
        }
    }

    /// One ProcessQuery request for a partition. Every operation contributes
    /// exactly one response-consuming action, so the finished slot manifest
    /// lines up with the partition's submission order.
    fn build_csom(
        &self,
        host: &str,
        operations: &[&OperationRequest],
    ) -> Result<(TransportRequest, Vec<i32>), BuildError> {
        let mut builder = ObjectPathBuilder::new();

        for operation in operations {
            let target = &operation.target;
            match (&operation.kind, &operation.payload) {
                (OperationKind::Read, OperationPayload::Query(query)) => {
                    if query.has_filters() || query.top.is_some() || query.skip.is_some() {
                        warn!(
                            "stateful-protocol read on '{}' ignores filter and paging options",
                            target.model
                        );
                    }
                    let fields: Vec<String> = query
                        .select
                        .iter()
                        .map(|f| {
                            self.registry
                                .field_name(&target.model, f, Protocol::Csom)
                                .to_string()
                        })
                        .collect();
                    builder.add_read(&target.property_chain(), &fields);
                }
                (OperationKind::Update, OperationPayload::Changes(changes)) => {
                    let identity = target.identity.as_ref().ok_or_else(|| {
                        BuildError::MissingIdentity {
                            model: target.model.clone(),
                        }
                    })?;
                    let wire_changes: Vec<FieldChange> = changes
                        .iter()
                        .map(|change| FieldChange {
                            field: self
                                .registry
                                .field_name(&target.model, &change.field, Protocol::Csom)
                                .to_string(),
                            value: change.value.clone(),
                            declared_type: change.declared_type.clone(),
                        })
                        .collect();
                    builder.add_update(identity, &wire_changes, UpdateMode::Update)?;
                }
                (OperationKind::Delete, _) => {
                    let identity = target.identity.as_ref().ok_or_else(|| {
                        BuildError::MissingIdentity {
                            model: target.model.clone(),
                        }
                    })?;
                    builder.add_delete(identity)?;
                }
                (OperationKind::Invoke, OperationPayload::Invoke { method, parameters }) => {
                    let identity = target.identity.as_ref().ok_or_else(|| {
                        BuildError::MissingIdentity {
                            model: target.model.clone(),
                        }
                    })?;
                    builder.add_invoke(identity, method, parameters.clone())?;
                }
                (kind, _) => {
                    return Err(BuildError::UnsupportedOperation {
                        kind: format!("{kind:?}"),
                        protocol: Protocol::Csom.label().to_string(),
                    });
                }
            }
        }

        let csom = builder.finish()?;
        let request = TransportRequest::new(
            Protocol::Csom,
            "POST",
            format!("{host}/{PROCESS_QUERY_PATH}"),
        )
        .with_header("Content-Type", "text/xml")
        .with_body(csom.body);
        Ok((request, csom.slots))
    }
}

/// Group operations by protocol then host, preserving first-submission order
/// both across partitions and within each partition.
fn partition(
    operations: Vec<PendingOperation>,
) -> Vec<((Protocol, String), Vec<PendingOperation>)> {
    let mut partitions: Vec<((Protocol, String), Vec<PendingOperation>)> = Vec::new();
    for operation in operations {
        let key = (
            operation.request.protocol,
            operation.request.target.host.clone(),
        );
        match partitions.iter_mut().find(|(k, _)| *k == key) {
            Some((_, bucket)) => bucket.push(operation),
            None => partitions.push((key, vec![operation])),
        }
    }
    partitions
}

fn resolve_all(pending: Vec<PendingOperation>, error: &ClientError) {
    for operation in pending {
        operation.resolve(Err(error.clone()));
    }
}

/// First line of a failed response body, for the error message.
fn body_snippet(response: &TransportResponse) -> String {
    let line = response.body.lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        "unspecified server fault".to_string()
    } else {
        line.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::batch::pending::OperationTarget;
    use crate::error::{MappingError, TransportError};
    use crate::metadata::{EntityMetadata, FieldMetadata, FieldType};
    use crate::query::Query;
    use crate::transport::testing::MockTransport;

    const SP_HOST: &str = "https://contoso.sharepoint.com";
    const GRAPH_HOST: &str = "https://graph.microsoft.com";

    fn registry() -> Arc<EntityMetadataRegistry> {
        let mut registry = EntityMetadataRegistry::new();
        registry.register(
            EntityMetadata::new("List")
                .with_field(FieldMetadata::new("Title", FieldType::String)),
        );
        Arc::new(registry)
    }

    fn coordinator(transport: Arc<MockTransport>) -> BatchCoordinator {
        BatchCoordinator::new(transport, registry())
    }

    fn rest_read(host: &str) -> OperationRequest {
        OperationRequest::read(
            Protocol::Rest,
            OperationTarget::new(host, "List", "_api/web/lists"),
            Query::new(),
        )
    }

    fn graph_read(host: &str) -> OperationRequest {
        OperationRequest::read(
            Protocol::Graph,
            OperationTarget::new(host, "List", "sites/site-a/lists"),
            Query::new(),
        )
    }

    fn csom_read(chain: &str) -> OperationRequest {
        OperationRequest::read(
            Protocol::Csom,
            OperationTarget::new(SP_HOST, "List", chain),
            Query::new(),
        )
    }

    fn rest_batch_body(parts: &[(u16, &str)]) -> String {
        let mut body = String::new();
        for (status, payload) in parts {
            body.push_str("--batchresponse_x\r\n");
            body.push_str("Content-Type: application/http\r\n\r\n");
            body.push_str(&format!("HTTP/1.1 {status} STATUS\r\n\r\n"));
            body.push_str(payload);
            body.push_str("\r\n");
        }
        body.push_str("--batchresponse_x--\r\n");
        body
    }

    #[tokio::test]
    async fn test_partitioning_by_protocol_and_host() {
        let transport = MockTransport::new();
        transport.push_response(200, rest_batch_body(&[(200, r#"{"a":1}"#), (200, r#"{"b":2}"#)]));
        transport.push_response(
            200,
            json!({"responses": [{"id": "1", "status": 200, "body": {}}]}).to_string(),
        );
        let coordinator = coordinator(transport.clone());

        // Interleaved submission; same-partition order must survive.
        let first = coordinator.enqueue(rest_read(SP_HOST));
        let graph = coordinator.enqueue(graph_read(GRAPH_HOST));
        let second = coordinator.enqueue(rest_read(SP_HOST));
        coordinator.flush().await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].protocol, Protocol::Rest);
        assert_eq!(sent[0].url, format!("{SP_HOST}/_api/$batch"));
        assert_eq!(sent[1].protocol, Protocol::Graph);

        assert_eq!(first.resolve().await.unwrap()["a"], 1);
        assert_eq!(second.resolve().await.unwrap()["b"], 2);
        assert!(graph.resolve().await.is_ok());
    }

    #[tokio::test]
    async fn test_csom_partition_shares_one_request() {
        let transport = MockTransport::new();
        // Read of ["Web"] takes ids 1..=3, ["Web","Lists"] ids 4..=6.
        transport.push_response(
            200,
            json!([
                {"ErrorInfo": null},
                3, {"Title": "Root web"},
                6, {"Title": "Lists"}
            ])
            .to_string(),
        );
        let coordinator = coordinator(transport.clone());

        let first = coordinator.enqueue(csom_read("Web"));
        let second = coordinator.enqueue(csom_read("Web/Lists"));
        coordinator.flush().await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].url.ends_with("_vti_bin/client.svc/ProcessQuery"));

        assert_eq!(first.resolve().await.unwrap()["Title"], "Root web");
        assert_eq!(second.resolve().await.unwrap()["Title"], "Lists");
    }

    #[tokio::test]
    async fn test_csom_partial_success() {
        let transport = MockTransport::new();
        transport.push_response(
            200,
            json!([
                {"ErrorInfo": {"ErrorCode": -1, "ErrorMessage": "List does not exist."}},
                3, {"Title": "Root web"}
            ])
            .to_string(),
        );
        let coordinator = coordinator(transport.clone());

        let answered = coordinator.enqueue(csom_read("Web"));
        let failed = coordinator.enqueue(csom_read("Web/Lists"));
        coordinator.flush().await;

        assert!(answered.resolve().await.is_ok());
        assert_eq!(
            failed.resolve().await.unwrap_err(),
            ClientError::protocol("-1", "List does not exist.")
        );
    }

    #[tokio::test]
    async fn test_rest_sub_failure_is_independent() {
        let transport = MockTransport::new();
        transport.push_response(
            200,
            rest_batch_body(&[
                (404, r#"{"error":{"message":{"value":"Not found"}}}"#),
                (200, r#"{"ok":true}"#),
            ]),
        );
        let coordinator = coordinator(transport.clone());

        let failed = coordinator.enqueue(rest_read(SP_HOST));
        let fine = coordinator.enqueue(rest_read(SP_HOST));
        coordinator.flush().await;

        assert_eq!(
            failed.resolve().await.unwrap_err(),
            ClientError::protocol("404", "Not found")
        );
        assert_eq!(fine.resolve().await.unwrap()["ok"], true);
    }

    #[tokio::test]
    async fn test_build_error_fans_out_to_its_partition_only() {
        let transport = MockTransport::new();
        transport.push_response(200, rest_batch_body(&[(200, "{}")]));
        let coordinator = coordinator(transport.clone());

        // Delete without an identity cannot be assembled.
        let broken = coordinator.enqueue(OperationRequest::delete(
            Protocol::Csom,
            OperationTarget::new(SP_HOST, "List", ""),
        ));
        let fine = coordinator.enqueue(rest_read(SP_HOST));
        coordinator.flush().await;

        assert_eq!(
            broken.resolve().await.unwrap_err(),
            ClientError::Build(BuildError::MissingIdentity {
                model: "List".to_string()
            })
        );
        assert!(fine.resolve().await.is_ok());
        // The broken partition never reached the wire.
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_create_over_stateful_protocol_is_rejected() {
        let transport = MockTransport::new();
        let coordinator = coordinator(transport.clone());

        let handle = coordinator.enqueue(OperationRequest::create(
            Protocol::Csom,
            OperationTarget::new(SP_HOST, "List", ""),
            json!({"Title": "New list"}),
        ));
        coordinator.flush().await;

        assert_eq!(
            handle.resolve().await.unwrap_err(),
            ClientError::Build(BuildError::UnsupportedOperation {
                kind: "Create".to_string(),
                protocol: "CSOM".to_string(),
            })
        );
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_fans_out() {
        let transport = MockTransport::new();
        transport.push_error(TransportError::ThrottleExhausted { attempts: 3 });
        let coordinator = coordinator(transport.clone());

        let first = coordinator.enqueue(rest_read(SP_HOST));
        let second = coordinator.enqueue(rest_read(SP_HOST));
        coordinator.flush().await;

        let expected =
            ClientError::Transport(TransportError::ThrottleExhausted { attempts: 3 });
        assert_eq!(first.resolve().await.unwrap_err(), expected);
        assert_eq!(second.resolve().await.unwrap_err(), expected);
    }

    #[tokio::test]
    async fn test_top_level_failure_fails_whole_partition() {
        let transport = MockTransport::new();
        transport.push_response(500, "Internal Server Error");
        let coordinator = coordinator(transport.clone());

        let handle = coordinator.enqueue(rest_read(SP_HOST));
        coordinator.flush().await;

        assert_eq!(
            handle.resolve().await.unwrap_err(),
            ClientError::protocol("500", "Internal Server Error")
        );
    }

    #[tokio::test]
    async fn test_truncated_batch_fails_unanswered_operations() {
        let transport = MockTransport::new();
        transport.push_response(200, rest_batch_body(&[(200, r#"{"answered":true}"#)]));
        let coordinator = coordinator(transport.clone());

        let first = coordinator.enqueue(rest_read(SP_HOST));
        let second = coordinator.enqueue(rest_read(SP_HOST));
        coordinator.flush().await;

        // The answered operation keeps its payload; only the one the
        // response never covered fails.
        assert_eq!(first.resolve().await.unwrap()["answered"], true);
        assert_eq!(
            second.resolve().await.unwrap_err(),
            ClientError::Mapping(MappingError::TruncatedResponse {
                expected: 2,
                received: 1,
            })
        );
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_dispatch() {
        let transport = MockTransport::new();
        let coordinator = coordinator(transport.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let handle = coordinator.enqueue(rest_read(SP_HOST));
        coordinator.flush_with_cancel(cancel).await;

        assert_eq!(handle.resolve().await.unwrap_err(), ClientError::Cancelled);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_flush_scope_leaves_coordinator_queue_untouched() {
        let transport = MockTransport::new();
        transport.push_response(200, rest_batch_body(&[(200, r#"{"scoped":true}"#)]));
        transport.push_response(200, rest_batch_body(&[(200, r#"{"queued":true}"#)]));
        let coordinator = coordinator(transport.clone());

        let queued = coordinator.enqueue(rest_read(SP_HOST));
        let mut scope = BatchScope::new();
        let scoped = scope.enqueue(rest_read(SP_HOST));

        coordinator.flush_scope(&mut scope).await;
        assert_eq!(scoped.resolve().await.unwrap()["scoped"], true);
        assert!(scope.is_empty());
        assert_eq!(coordinator.queued(), 1);

        coordinator.flush().await;
        assert_eq!(queued.resolve().await.unwrap()["queued"], true);
    }

    #[tokio::test]
    async fn test_execute_round_trip() {
        let transport = MockTransport::new();
        transport.push_response(200, rest_batch_body(&[(200, r#"{"d":{"Title":"Docs"}}"#)]));
        let coordinator = coordinator(transport.clone());

        let result = coordinator.execute(rest_read(SP_HOST)).await.unwrap();
        assert_eq!(result["d"]["Title"], "Docs");
        assert_eq!(coordinator.queued(), 0);
    }
}
