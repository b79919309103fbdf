//! Filter tree for OData `$filter` rendering

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Comparison operators with their fixed OData token table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Not,
}

impl ComparisonOperator {
    /// OData operator token. `Not` has a token but is unary and cannot be
    /// rendered as a binary comparison; the renderer rejects it.
    pub fn token(self) -> &'static str {
        match self {
            Self::Equal => "eq",
            Self::NotEqual => "ne",
            Self::GreaterThan => "gt",
            Self::GreaterOrEqual => "ge",
            Self::LessThan => "lt",
            Self::LessOrEqual => "le",
            Self::Not => "not",
        }
    }
}

/// Concatenation operator between filter nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcatOperator {
    And,
    Or,
}

impl ConcatOperator {
    pub fn token(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Typed literal used in comparisons and change sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Guid(Uuid),
    DateTime(DateTime<Utc>),
    Null,
}

impl FilterValue {
    /// Short kind name used in error reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "integer",
            Self::Double(_) => "double",
            Self::Bool(_) => "boolean",
            Self::Guid(_) => "guid",
            Self::DateTime(_) => "datetime",
            Self::Null => "null",
        }
    }

    /// JSON representation used in REST/Graph request bodies.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Double(d) => serde_json::Value::from(*d),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Guid(g) => serde_json::Value::String(g.to_string()),
            Self::DateTime(dt) => serde_json::Value::String(
                dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            ),
            Self::Null => serde_json::Value::Null,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        Self::Guid(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

/// A filter node: either a single comparison or a parenthesized group of
/// child nodes joined by one concatenation operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Comparison {
        field: String,
        operator: ComparisonOperator,
        value: FilterValue,
    },
    Group {
        concat: ConcatOperator,
        children: Vec<Filter>,
    },
}

impl Filter {
    pub fn compare(
        field: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self::Comparison {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, ComparisonOperator::Equal, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, ComparisonOperator::NotEqual, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, ComparisonOperator::GreaterThan, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, ComparisonOperator::GreaterOrEqual, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, ComparisonOperator::LessThan, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::compare(field, ComparisonOperator::LessOrEqual, value)
    }

    pub fn and(children: Vec<Filter>) -> Self {
        Self::Group {
            concat: ConcatOperator::And,
            children,
        }
    }

    pub fn or(children: Vec<Filter>) -> Self {
        Self::Group {
            concat: ConcatOperator::Or,
            children,
        }
    }

    /// A group with zero renderable children renders to the empty string and
    /// must be elided by the renderer.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Comparison { .. } => false,
            Self::Group { children, .. } => children.iter().all(Filter::is_empty),
        }
    }
}
