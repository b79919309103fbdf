//! Field-name resolution against registered model metadata

use std::collections::HashMap;

use super::models::{EntityMetadata, FieldType};
use crate::error::BuildError;
use crate::protocol::Protocol;

/// Protocol-specific names and wire type hint for one logical field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedField<'a> {
    pub rest_name: &'a str,
    pub graph_name: &'a str,
    pub field_type: &'a FieldType,
    pub readonly: bool,
}

/// Registry of model metadata, keyed by model type name.
///
/// Explicitly constructed and registered during initialization, then treated
/// as read-only. There is no ambient global instance; share it via `Arc`.
#[derive(Debug, Default)]
pub struct EntityMetadataRegistry {
    models: HashMap<String, EntityMetadata>,
}

impl EntityMetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one model's metadata. Last registration wins for a model name.
    pub fn register(&mut self, metadata: EntityMetadata) {
        self.models.insert(metadata.model.clone(), metadata);
    }

    pub fn model(&self, model: &str) -> Option<&EntityMetadata> {
        self.models.get(model)
    }

    pub fn is_known_model(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    /// Resolve a logical field to its protocol-specific names. Missing
    /// per-protocol names fall back to the logical name.
    pub fn resolve(&self, model: &str, logical_name: &str) -> Option<ResolvedField<'_>> {
        let field = self.models.get(model)?.field(logical_name)?;
        Some(ResolvedField {
            rest_name: field.rest_name.as_deref().unwrap_or(&field.logical_name),
            graph_name: field.graph_name.as_deref().unwrap_or(&field.logical_name),
            field_type: &field.field_type,
            readonly: field.readonly,
        })
    }

    /// Like [`resolve`](Self::resolve), but a missing model or field is an
    /// error instead of triggering the logical-name fallback.
    pub fn resolve_strict(
        &self,
        model: &str,
        logical_name: &str,
    ) -> Result<ResolvedField<'_>, BuildError> {
        self.resolve(model, logical_name)
            .ok_or_else(|| BuildError::InvalidFieldReference {
                model: model.to_string(),
                field: logical_name.to_string(),
            })
    }

    /// Protocol-specific field name, falling back to the logical name
    /// unchanged when no mapping exists.
    pub fn field_name<'a>(
        &'a self,
        model: &str,
        logical_name: &'a str,
        protocol: Protocol,
    ) -> &'a str {
        match self.resolve(model, logical_name) {
            Some(resolved) => match protocol {
                Protocol::Graph => resolved.graph_name,
                // CSOM property names follow the REST spelling.
                Protocol::Rest | Protocol::Csom => resolved.rest_name,
            },
            None => logical_name,
        }
    }

    /// Declared type of a field, if the model and field are registered.
    pub fn declared_type(&self, model: &str, logical_name: &str) -> Option<&FieldType> {
        self.resolve(model, logical_name).map(|r| r.field_type)
    }

    /// URL segment of the model's collection in the given dialect. The
    /// stateful protocol addresses objects by identity, not by collection.
    pub fn collection_segment(&self, model: &str, protocol: Protocol) -> Option<&str> {
        let metadata = self.models.get(model)?;
        match protocol {
            Protocol::Rest => metadata.entity_set.as_deref(),
            Protocol::Graph => metadata.graph_collection.as_deref(),
            Protocol::Csom => None,
        }
    }
}
