//! JSON $batch response demultiplexing (Graph dialect)
//!
//! A Graph batch answers with `{"responses": [...]}` where each element
//! carries the request id it answers. The service is free to reorder
//! elements, so results are matched by id, not position. Request ids are the
//! 1-based submission index rendered as a string.

use serde_json::Value;

use crate::error::{ClientError, MappingError};

use super::MappedResults;

/// Maps a JSON batch body onto `expected` operations, restoring submission
/// order by request id.
pub fn map_graph_batch(body: &str, expected: usize) -> Result<MappedResults, MappingError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| MappingError::MalformedResponse(format!("invalid JSON: {e}")))?;
    let responses = root
        .get("responses")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            MappingError::MalformedResponse("missing 'responses' array".to_string())
        })?;

    let mut slots: Vec<Option<Result<Value, ClientError>>> = vec![None; expected];
    let mut received = 0usize;
    for element in responses {
        let id = element
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| {
                MappingError::MalformedResponse("response element without a numeric id".to_string())
            })?;
        if id == 0 || id > expected {
            return Err(MappingError::MalformedResponse(format!(
                "response id {id} is outside the submitted range 1..={expected}"
            )));
        }
        let slot = &mut slots[id - 1];
        if slot.is_some() {
            return Err(MappingError::MalformedResponse(format!(
                "response id {id} appeared twice"
            )));
        }
        *slot = Some(element_result(element));
        received += 1;
    }

    // Answered operations keep their results; only the ids the service never
    // echoed fail, each with the truncation error.
    Ok(slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(ClientError::Mapping(MappingError::TruncatedResponse {
                    expected,
                    received,
                }))
            })
        })
        .collect())
}

fn element_result(element: &Value) -> Result<Value, ClientError> {
    let status = element
        .get("status")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u16;
    let body = element.get("body").cloned().unwrap_or(Value::Null);

    if (200..300).contains(&status) {
        return Ok(body);
    }

    let message = body
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("unspecified server fault")
        .to_string();
    Err(ClientError::protocol(status.to_string(), message))
}
