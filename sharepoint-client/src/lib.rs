//! Protocol translation and request batching for SharePoint-style services.
//!
//! The engine accepts logical operations expressed against model metadata and
//! turns each flush into the minimal set of physical requests across three
//! wire protocols: the legacy OData REST dialect, the Graph OData dialect,
//! and the stateful XML action/object-path protocol. Responses are
//! demultiplexed back onto per-operation completion slots, so every enqueued
//! operation resolves exactly once with its own payload or failure.
//!
//! The main entry point is [`SharePointClient`]; operations are described
//! with [`batch::OperationRequest`] and queried data shaped with
//! [`query::Query`].

pub mod auth;
pub mod batch;
pub mod client;
pub mod csom;
pub mod error;
pub mod metadata;
pub mod protocol;
pub mod query;
pub mod resilience;
pub mod response;
pub mod tracking;
pub mod transport;

pub use auth::{StaticTokenProvider, TokenProvider};
pub use batch::{
    BatchCoordinator, BatchScope, OperationHandle, OperationRequest, OperationTarget,
};
pub use client::SharePointClient;
pub use error::{BuildError, ClientError, MappingError, TransportError};
pub use metadata::{EntityMetadata, EntityMetadataRegistry, FieldMetadata, FieldType};
pub use protocol::Protocol;
pub use query::{Filter, FilterValue, OrderBy, Query, SortDirection};
pub use resilience::{ClientConfig, RetryConfig};
pub use tracking::ChangeTracker;
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};
