//! Static model descriptions for the metadata registry

use serde::{Deserialize, Serialize};

use crate::query::FilterValue;

/// Declared field data types, doubling as the capability table that picks the
/// CSOM wire type tag for mutation values. Enum-backed fields serialize as
/// integer `Enum` parameters rather than raw strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Int32,
    Double,
    Boolean,
    DateTime,
    Guid,
    Enum,
    Lookup,
    Other(String),
}

impl FieldType {
    /// CSOM `Type` attribute for a SetProperty/method parameter of this type.
    pub fn wire_tag(&self) -> &'static str {
        match self {
            Self::String | Self::Other(_) => "String",
            Self::Int32 | Self::Lookup => "Int32",
            Self::Double => "Double",
            Self::Boolean => "Boolean",
            Self::DateTime => "DateTime",
            Self::Guid => "Guid",
            Self::Enum => "Enum",
        }
    }

    /// Fallback declared type inferred from a pending value, used when a
    /// field has no registry entry.
    pub fn from_value(value: &FilterValue) -> Self {
        match value {
            FilterValue::String(_) | FilterValue::Null => Self::String,
            FilterValue::Int(_) => Self::Int32,
            FilterValue::Double(_) => Self::Double,
            FilterValue::Bool(_) => Self::Boolean,
            FilterValue::Guid(_) => Self::Guid,
            FilterValue::DateTime(_) => Self::DateTime,
        }
    }
}

/// Per-field metadata: the logical name plus its protocol-specific spellings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub logical_name: String,
    /// Field name in the legacy REST dialect (e.g. "Title").
    pub rest_name: Option<String>,
    /// Field name in the Graph dialect (e.g. "displayName").
    pub graph_name: Option<String>,
    pub field_type: FieldType,
    pub readonly: bool,
}

impl FieldMetadata {
    pub fn new(logical_name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            logical_name: logical_name.into(),
            rest_name: None,
            graph_name: None,
            field_type,
            readonly: false,
        }
    }

    pub fn with_rest_name(mut self, name: impl Into<String>) -> Self {
        self.rest_name = Some(name.into());
        self
    }

    pub fn with_graph_name(mut self, name: impl Into<String>) -> Self {
        self.graph_name = Some(name.into());
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }
}

/// Complete metadata for one model type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Model type name (e.g. "List", "ListItem", "Web").
    pub model: String,
    /// REST entity set segment (e.g. "lists").
    pub entity_set: Option<String>,
    /// Graph collection segment (e.g. "lists").
    pub graph_collection: Option<String>,
    pub fields: Vec<FieldMetadata>,
}

impl EntityMetadata {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_entity_set(mut self, segment: impl Into<String>) -> Self {
        self.entity_set = Some(segment.into());
        self
    }

    pub fn with_graph_collection(mut self, segment: impl Into<String>) -> Self {
        self.graph_collection = Some(segment.into());
        self
    }

    pub fn with_field(mut self, field: FieldMetadata) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, logical_name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.logical_name == logical_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tags() {
        assert_eq!(FieldType::String.wire_tag(), "String");
        assert_eq!(FieldType::Enum.wire_tag(), "Enum");
        assert_eq!(FieldType::Lookup.wire_tag(), "Int32");
        assert_eq!(FieldType::Other("Taxonomy".to_string()).wire_tag(), "String");
    }

    #[test]
    fn test_field_lookup() {
        let meta = EntityMetadata::new("List")
            .with_field(FieldMetadata::new("Title", FieldType::String))
            .with_field(FieldMetadata::new("Hidden", FieldType::Boolean));

        assert!(meta.field("Title").is_some());
        assert!(meta.field("NoSuchField").is_none());
    }
}
