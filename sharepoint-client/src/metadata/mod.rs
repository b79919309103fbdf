//! Entity metadata lookup
//!
//! Read-only mapping from a model type + logical field name to the
//! protocol-specific field names and wire type hints. Populated once during
//! initialization and then shared behind an `Arc` for unsynchronized
//! concurrent reads.

pub mod models;
pub mod registry;

pub use models::{EntityMetadata, FieldMetadata, FieldType};
pub use registry::{EntityMetadataRegistry, ResolvedField};
