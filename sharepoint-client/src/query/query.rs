//! Reusable in-memory query aggregate

use serde::{Deserialize, Serialize};

use super::builder::QueryBuilder;
use super::filters::{ConcatOperator, Filter};
use super::orderby::OrderBy;

/// One top-level filter entry with the operator that joins it to the
/// preceding entry. The first entry's operator is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterItem {
    pub concat: ConcatOperator,
    pub filter: Filter,
}

/// Declarative field-selection / filter / order expression, prior to any
/// protocol-specific encoding. Field names are logical names; translation
/// happens at render time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Field projection (`$select`). Empty means "all fields".
    pub select: Vec<String>,
    /// Ordered top-level filter list (`$filter`).
    pub filters: Vec<FilterItem>,
    /// `$orderby` entries in significance order.
    pub order_by: Vec<OrderBy>,
    pub top: Option<u32>,
    pub skip: Option<u32>,
    /// When set, field names that are not registered for the model fail the
    /// render with `InvalidFieldReference` instead of falling back to the
    /// logical name.
    #[serde(default)]
    pub strict_fields: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Whether any filter entry would actually render output.
    pub fn has_filters(&self) -> bool {
        self.filters.iter().any(|item| !item.filter.is_empty())
    }
}
