//! Per-entity change tracking
//!
//! Records which fields were assigned since the last save and exposes the
//! minimal field/value set an update operation must transmit. The coordinator
//! clears the tracker only after the owning mutation is confirmed successful;
//! on failure the change set is retained so the caller can retry.

use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::metadata::{EntityMetadataRegistry, FieldType};
use crate::query::FilterValue;

/// One pending field assignment together with its declared wire type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub value: FilterValue,
    pub declared_type: FieldType,
}

/// Ordered, deduplicated set of pending field assignments for one entity
/// instance. Re-assigning a field before flush overwrites the pending value
/// (last write wins) without duplicating the entry.
#[derive(Debug, Clone)]
pub struct ChangeTracker {
    model: String,
    registry: Arc<EntityMetadataRegistry>,
    changes: Vec<FieldChange>,
}

impl ChangeTracker {
    pub fn new(model: impl Into<String>, registry: Arc<EntityMetadataRegistry>) -> Self {
        let model = model.into();
        if !registry.is_known_model(&model) {
            warn!("tracking changes for unregistered model '{model}'; declared types will be inferred from values");
        }
        Self {
            model,
            registry,
            changes: Vec::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Record a field assignment. The declared type is looked up once, on the
    /// field's first assignment; unknown fields fall back to a type inferred
    /// from the value. Assignments to fields the metadata marks readonly are
    /// dropped rather than sent to a server that would reject them.
    pub fn mark_changed(&mut self, field: &str, value: impl Into<FilterValue>) {
        let value = value.into();
        if let Some(resolved) = self.registry.resolve(&self.model, field) {
            if resolved.readonly {
                warn!(
                    "ignoring assignment to readonly field '{field}' on model '{}'",
                    self.model
                );
                return;
            }
        }
        if let Some(existing) = self.changes.iter_mut().find(|c| c.field == field) {
            existing.value = value;
            return;
        }
        let declared_type = self
            .registry
            .declared_type(&self.model, field)
            .cloned()
            .unwrap_or_else(|| FieldType::from_value(&value));
        self.changes.push(FieldChange {
            field: field.to_string(),
            value,
            declared_type,
        });
    }

    /// Pending changes in first-assignment order.
    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    pub fn is_dirty(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Forget all pending changes. Called by the coordinator after a
    /// confirmed successful persist, never on failure.
    pub fn clear(&mut self) {
        self.changes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{EntityMetadata, FieldMetadata};

    fn registry() -> Arc<EntityMetadataRegistry> {
        let mut registry = EntityMetadataRegistry::new();
        registry.register(
            EntityMetadata::new("List")
                .with_field(FieldMetadata::new("Title", FieldType::String))
                .with_field(FieldMetadata::new("TemplateType", FieldType::Enum))
                .with_field(FieldMetadata::new("ItemCount", FieldType::Int32).readonly()),
        );
        Arc::new(registry)
    }

    #[test]
    fn test_last_write_wins() {
        let mut tracker = ChangeTracker::new("List", registry());
        tracker.mark_changed("Title", "A");
        tracker.mark_changed("Title", "B");

        let changes = tracker.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "Title");
        assert_eq!(changes[0].value, FilterValue::String("B".to_string()));
    }

    #[test]
    fn test_declared_type_from_registry() {
        let mut tracker = ChangeTracker::new("List", registry());
        tracker.mark_changed("TemplateType", 100);
        assert_eq!(tracker.changes()[0].declared_type, FieldType::Enum);
    }

    #[test]
    fn test_unknown_field_infers_type_from_value() {
        let mut tracker = ChangeTracker::new("List", registry());
        tracker.mark_changed("SomethingCustom", true);
        assert_eq!(tracker.changes()[0].declared_type, FieldType::Boolean);
    }

    #[test]
    fn test_readonly_field_assignment_is_dropped() {
        let mut tracker = ChangeTracker::new("List", registry());
        tracker.mark_changed("ItemCount", 5);
        assert!(!tracker.is_dirty());

        tracker.mark_changed("Title", "A");
        let fields: Vec<&str> = tracker.changes().iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["Title"]);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut tracker = ChangeTracker::new("List", registry());
        tracker.mark_changed("Title", "A");
        tracker.mark_changed("TemplateType", 100);
        tracker.mark_changed("Title", "B");

        let fields: Vec<&str> = tracker.changes().iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["Title", "TemplateType"]);
    }

    #[test]
    fn test_clear() {
        let mut tracker = ChangeTracker::new("List", registry());
        tracker.mark_changed("Title", "A");
        assert!(tracker.is_dirty());
        tracker.clear();
        assert!(!tracker.is_dirty());
        assert!(tracker.changes().is_empty());
    }
}
