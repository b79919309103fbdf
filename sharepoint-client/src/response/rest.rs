//! Multipart $batch response demultiplexing (legacy REST dialect)
//!
//! The service answers a multipart/mixed batch with one embedded HTTP
//! response per submitted operation, in submission order, each introduced by
//! an `HTTP/1.1 <status>` status line. Changeset nesting only adds extra MIME
//! framing around those status lines, so the parser keys on the status lines
//! themselves rather than on boundary bookkeeping.

use serde_json::Value;

use crate::error::{ClientError, MappingError};

use super::MappedResults;

/// Maps a multipart batch body onto `expected` operations, in submission
/// order. Each embedded 2xx becomes that operation's payload; any other
/// status becomes a server fault for that operation alone.
pub fn map_rest_batch(body: &str, expected: usize) -> Result<MappedResults, MappingError> {
    let mut results = Vec::with_capacity(expected);
    let mut lines = body.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(status) = parse_status_line(line) else {
            continue;
        };

        // Skip the embedded response headers.
        for header in lines.by_ref() {
            if header.trim().is_empty() {
                break;
            }
        }

        // Body runs until the next MIME boundary or status line.
        let mut payload = String::new();
        while let Some(next) = lines.peek() {
            if next.starts_with("--") || parse_status_line(next).is_some() {
                break;
            }
            payload.push_str(lines.next().unwrap_or_default());
            payload.push('\n');
        }

        results.push(embedded_result(status, payload.trim()));
        if results.len() == expected {
            break;
        }
    }

    // A short body fails only the operations it never answered; parsed
    // results stay attached to their operations.
    let received = results.len();
    while results.len() < expected {
        results.push(Err(ClientError::Mapping(MappingError::TruncatedResponse {
            expected,
            received,
        })));
    }
    Ok(results)
}

fn parse_status_line(line: &str) -> Option<u16> {
    let rest = line.trim().strip_prefix("HTTP/1.1 ")?;
    rest.split_whitespace().next()?.parse().ok()
}

fn embedded_result(status: u16, payload: &str) -> Result<Value, ClientError> {
    if (200..300).contains(&status) {
        if payload.is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(payload).map_err(|e| {
            ClientError::Mapping(MappingError::MalformedResponse(format!(
                "embedded response is not valid JSON: {e}"
            )))
        });
    }
    Err(ClientError::protocol(
        status.to_string(),
        fault_message(payload),
    ))
}

/// Best-effort extraction of the OData error message. Falls back to the raw
/// payload when the shape is unfamiliar.
fn fault_message(payload: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(payload) {
        let error = value.get("error").or_else(|| value.get("odata.error"));
        if let Some(error) = error {
            if let Some(message) = error.get("message") {
                if let Some(text) = message.as_str() {
                    return text.to_string();
                }
                if let Some(text) = message.get("value").and_then(Value::as_str) {
                    return text.to_string();
                }
            }
        }
    }
    if payload.is_empty() {
        "unspecified server fault".to_string()
    } else {
        payload.to_string()
    }
}
