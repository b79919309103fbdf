//! Response demultiplexing
//!
//! Each mapper takes a physical response body plus the manifest recorded at
//! build time and produces exactly one result per expected operation, in
//! submission order. A mapper never invents results and never drops one:
//! answered operations keep their payloads even when the response is cut
//! short, the unanswered ones each fail with `TruncatedResponse`, and a
//! garbled body fails the whole map with `MalformedResponse`.

pub mod csom;
pub mod graph;
pub mod rest;

pub use csom::map_csom_response;
pub use graph::map_graph_batch;
pub use rest::map_rest_batch;

use serde_json::Value;

use crate::error::ClientError;

/// Per-operation outcome of a physical response, in submission order.
pub type MappedResults = Vec<Result<Value, ClientError>>;
