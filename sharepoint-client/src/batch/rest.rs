//! Multipart $batch assembly (legacy REST dialect)
//!
//! Every flush partition becomes one `POST {host}/_api/$batch` with a
//! multipart/mixed body: reads ride as bare embedded GETs, mutations are each
//! wrapped in a single-operation changeset so one failure never aborts its
//! neighbours server-side.

use uuid::Uuid;

use crate::error::BuildError;
use crate::metadata::EntityMetadataRegistry;
use crate::protocol::Protocol;
use crate::query::render;
use crate::transport::TransportRequest;

use super::changes_body;
use super::pending::{OperationKind, OperationPayload, OperationRequest};

const ACCEPT: &str = "application/json;odata=verbose";

/// Assemble one multipart batch for operations sharing a host. Operations
/// are emitted in slice order; the response mapper relies on that.
pub fn build_rest_batch(
    host: &str,
    operations: &[&OperationRequest],
    registry: &EntityMetadataRegistry,
) -> Result<TransportRequest, BuildError> {
    let batch_boundary = format!("batch_{}", Uuid::new_v4());
    let mut body = String::new();

    for operation in operations {
        let embedded = embedded_request(operation, registry)?;
        body.push_str(&format!("--{batch_boundary}\r\n"));
        if operation.kind == OperationKind::Read {
            body.push_str("Content-Type: application/http\r\n");
            body.push_str("Content-Transfer-Encoding: binary\r\n\r\n");
            body.push_str(&embedded);
        } else {
            // One changeset per mutation keeps failures independent.
            let changeset_boundary = format!("changeset_{}", Uuid::new_v4());
            body.push_str(&format!(
                "Content-Type: multipart/mixed; boundary={changeset_boundary}\r\n\r\n"
            ));
            body.push_str(&format!("--{changeset_boundary}\r\n"));
            body.push_str("Content-Type: application/http\r\n");
            body.push_str("Content-Transfer-Encoding: binary\r\n\r\n");
            body.push_str(&embedded);
            body.push_str(&format!("--{changeset_boundary}--\r\n"));
        }
    }
    body.push_str(&format!("--{batch_boundary}--\r\n"));

    Ok(
        TransportRequest::new(Protocol::Rest, "POST", format!("{host}/_api/$batch"))
            .with_header(
                "Content-Type",
                format!("multipart/mixed; boundary={batch_boundary}"),
            )
            .with_header("Accept", ACCEPT)
            .with_body(body),
    )
}

/// Render one embedded HTTP request, headers and body included.
fn embedded_request(
    operation: &OperationRequest,
    registry: &EntityMetadataRegistry,
) -> Result<String, BuildError> {
    let target = &operation.target;
    let base_url = format!("{}/{}", target.host, target.path);

    let mut text = String::new();
    match (&operation.kind, &operation.payload) {
        (OperationKind::Read, OperationPayload::Query(query)) => {
            let options = render(query, &target.model, Protocol::Rest, registry)?;
            let url = if options.is_empty() {
                base_url
            } else {
                format!("{base_url}?{options}")
            };
            text.push_str(&format!("GET {url} HTTP/1.1\r\n"));
            text.push_str(&format!("Accept: {ACCEPT}\r\n\r\n"));
        }
        (OperationKind::Create, OperationPayload::Create(data)) => {
            text.push_str(&format!("POST {base_url} HTTP/1.1\r\n"));
            text.push_str(&format!("Content-Type: {ACCEPT}\r\n"));
            text.push_str(&format!("Accept: {ACCEPT}\r\n\r\n"));
            text.push_str(&data.to_string());
            text.push_str("\r\n");
        }
        (OperationKind::Update, OperationPayload::Changes(changes)) => {
            let data = changes_body(changes, &target.model, Protocol::Rest, registry);
            text.push_str(&format!("PATCH {base_url} HTTP/1.1\r\n"));
            text.push_str(&format!("Content-Type: {ACCEPT}\r\n"));
            text.push_str(&format!("Accept: {ACCEPT}\r\n"));
            text.push_str("IF-MATCH: *\r\n\r\n");
            text.push_str(&data.to_string());
            text.push_str("\r\n");
        }
        (OperationKind::Delete, _) => {
            text.push_str(&format!("DELETE {base_url} HTTP/1.1\r\n"));
            text.push_str(&format!("Accept: {ACCEPT}\r\n"));
            text.push_str("IF-MATCH: *\r\n\r\n");
        }
        (kind, _) => {
            return Err(BuildError::UnsupportedOperation {
                kind: format!("{kind:?}"),
                protocol: Protocol::Rest.label().to_string(),
            });
        }
    }
    Ok(text)
}
