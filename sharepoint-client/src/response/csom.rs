//! Action/object-path response demultiplexing
//!
//! The server answers a ProcessQuery call with a JSON array: element zero is
//! a header object carrying `ErrorInfo`, followed by flat (action id,
//! payload) pairs for every action that produced data. Actions that only
//! mutate state never echo a payload, which is why the builder's slot
//! manifest lists only the response-consuming action ids.

use std::collections::HashMap;

use log::debug;
use serde_json::Value;

use crate::error::{ClientError, MappingError};

use super::MappedResults;

/// Maps a raw ProcessQuery body onto the slot manifest. Returns one result
/// per slot, in manifest order. Answered slots keep their payloads; a slot
/// the server did not answer gets the header fault when one is present, or a
/// `TruncatedResponse` when the response was simply cut short.
pub fn map_csom_response(body: &str, slots: &[i32]) -> Result<MappedResults, MappingError> {
    let elements: Vec<Value> = serde_json::from_str(body)
        .map_err(|e| MappingError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let mut iter = elements.into_iter();
    let header = iter
        .next()
        .ok_or_else(|| MappingError::MalformedResponse("empty response array".to_string()))?;
    let fault = header_fault(&header);

    // Remaining elements come in (id, payload) pairs.
    let mut payloads: HashMap<i64, Value> = HashMap::new();
    loop {
        let Some(id_value) = iter.next() else { break };
        let id = id_value.as_i64().ok_or_else(|| {
            MappingError::MalformedResponse(format!("expected an action id, got {id_value}"))
        })?;
        let payload = iter.next().ok_or_else(|| {
            MappingError::MalformedResponse(format!("action id {id} has no payload"))
        })?;
        payloads.insert(id, payload);
    }

    let received = payloads.len();
    let mut results = Vec::with_capacity(slots.len());
    for &slot in slots {
        match payloads.remove(&i64::from(slot)) {
            Some(payload) => results.push(Ok(payload)),
            None => match &fault {
                Some(error) => results.push(Err(error.clone())),
                None => results.push(Err(ClientError::Mapping(
                    MappingError::TruncatedResponse {
                        expected: slots.len(),
                        received,
                    },
                ))),
            },
        }
    }

    if !payloads.is_empty() {
        debug!(
            "server echoed {} payload(s) with no matching slot",
            payloads.len()
        );
    }

    Ok(results)
}

/// Extracts the server fault from the header element, when present.
fn header_fault(header: &Value) -> Option<ClientError> {
    let info = header.get("ErrorInfo")?;
    if info.is_null() {
        return None;
    }
    let code = info
        .get("ErrorCode")
        .and_then(Value::as_i64)
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-1".to_string());
    let message = info
        .get("ErrorMessage")
        .and_then(Value::as_str)
        .unwrap_or("unspecified server fault")
        .to_string();
    Some(ClientError::protocol(code, message))
}
