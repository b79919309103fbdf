//! JSON $batch assembly (Graph dialect)
//!
//! A flush partition becomes one `POST {host}/v1.0/$batch` whose body lists
//! the embedded requests with 1-based ids matching submission order. The
//! response mapper restores order by those ids, so the service is free to
//! answer out of order.

use serde_json::{Value, json};

use crate::error::BuildError;
use crate::metadata::EntityMetadataRegistry;
use crate::protocol::Protocol;
use crate::query::render;
use crate::transport::TransportRequest;

use super::changes_body;
use super::pending::{OperationKind, OperationPayload, OperationRequest};

/// Assemble one JSON batch for operations sharing a host.
pub fn build_graph_batch(
    host: &str,
    operations: &[&OperationRequest],
    registry: &EntityMetadataRegistry,
) -> Result<TransportRequest, BuildError> {
    let mut requests = Vec::with_capacity(operations.len());
    for (index, operation) in operations.iter().enumerate() {
        requests.push(embedded_request(index + 1, operation, registry)?);
    }

    let body = json!({ "requests": requests });
    Ok(
        TransportRequest::new(Protocol::Graph, "POST", format!("{host}/v1.0/$batch"))
            .with_header("Content-Type", "application/json")
            .with_header("Accept", "application/json")
            .with_body(body.to_string()),
    )
}

fn embedded_request(
    id: usize,
    operation: &OperationRequest,
    registry: &EntityMetadataRegistry,
) -> Result<Value, BuildError> {
    let target = &operation.target;
    let url = format!("/{}", target.path);

    let request = match (&operation.kind, &operation.payload) {
        (OperationKind::Read, OperationPayload::Query(query)) => {
            let options = render(query, &target.model, Protocol::Graph, registry)?;
            let url = if options.is_empty() {
                url
            } else {
                format!("{url}?{options}")
            };
            json!({ "id": id.to_string(), "method": "GET", "url": url })
        }
        (OperationKind::Create, OperationPayload::Create(data)) => json!({
            "id": id.to_string(),
            "method": "POST",
            "url": url,
            "headers": { "Content-Type": "application/json" },
            "body": data,
        }),
        (OperationKind::Update, OperationPayload::Changes(changes)) => {
            let data = changes_body(changes, &target.model, Protocol::Graph, registry);
            json!({
                "id": id.to_string(),
                "method": "PATCH",
                "url": url,
                "headers": { "Content-Type": "application/json" },
                "body": data,
            })
        }
        (OperationKind::Delete, _) => {
            json!({ "id": id.to_string(), "method": "DELETE", "url": url })
        }
        (kind, _) => {
            return Err(BuildError::UnsupportedOperation {
                kind: format!("{kind:?}"),
                protocol: Protocol::Graph.label().to_string(),
            });
        }
    };
    Ok(request)
}
