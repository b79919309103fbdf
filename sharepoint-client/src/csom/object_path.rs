//! Object-path and action node types
//!
//! A physical CSOM request is an ordered list of entries, each pairing an
//! optional action with an optional object path. Object paths form a
//! reference graph (identity, property access, constructor, static
//! property); actions operate on a path by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BuildError;
use crate::query::FilterValue;
use crate::tracking::FieldChange;

/// Typed parameter value for method calls, constructors and property sets.
/// `ObjectReference` points at another object-path node in the same request;
/// forward references are legal as long as the node is emitted somewhere in
/// the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CsomValue {
    String(String),
    Boolean(bool),
    Int32(i32),
    Double(f64),
    Guid(Uuid),
    DateTime(DateTime<Utc>),
    /// Integer-backed enum value; serializes with the `Enum` wire tag.
    Enum(i64),
    Null,
    ObjectReference { object_path_id: i32 },
}

impl CsomValue {
    /// CSOM `Type` attribute. Object references carry an `ObjectPathId`
    /// attribute instead of a type tag.
    pub fn type_tag(&self) -> Option<&'static str> {
        match self {
            Self::String(_) => Some("String"),
            Self::Boolean(_) => Some("Boolean"),
            Self::Int32(_) => Some("Int32"),
            Self::Double(_) => Some("Double"),
            Self::Guid(_) => Some("Guid"),
            Self::DateTime(_) => Some("DateTime"),
            Self::Enum(_) => Some("Enum"),
            Self::Null => Some("Null"),
            Self::ObjectReference { .. } => None,
        }
    }

    /// Element text content, if the value carries one.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Boolean(b) => Some(b.to_string()),
            Self::Int32(i) => Some(i.to_string()),
            Self::Double(d) => Some(d.to_string()),
            Self::Guid(g) => Some(format!("{{{}}}", g)),
            Self::DateTime(dt) => {
                Some(dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            }
            Self::Enum(v) => Some(v.to_string()),
            Self::Null | Self::ObjectReference { .. } => None,
        }
    }

    /// Wire value for one tracked field change. The declared field type picks
    /// the tag: enum- and lookup-typed fields serialize their integer backing
    /// value with the declared tag rather than the value's own shape, and
    /// integers assigned to a double-typed field widen. A value whose shape
    /// has no declared counterpart keeps its own tag.
    pub fn from_change(change: &FieldChange) -> Result<Self, BuildError> {
        match (change.declared_type.wire_tag(), &change.value) {
            ("Enum", FilterValue::Int(v)) => Ok(Self::Enum(*v)),
            ("Int32", FilterValue::Int(v)) => Self::int32(&change.field, *v),
            ("Double", FilterValue::Int(v)) => Ok(Self::Double(*v as f64)),
            (_, FilterValue::String(s)) => Ok(Self::String(s.clone())),
            (_, FilterValue::Int(v)) => Self::int32(&change.field, *v),
            (_, FilterValue::Double(d)) => Ok(Self::Double(*d)),
            (_, FilterValue::Bool(b)) => Ok(Self::Boolean(*b)),
            (_, FilterValue::Guid(g)) => Ok(Self::Guid(*g)),
            (_, FilterValue::DateTime(dt)) => Ok(Self::DateTime(*dt)),
            (_, FilterValue::Null) => Ok(Self::Null),
        }
    }

    /// `Int32` parameters are 32-bit on the wire; anything wider is a build
    /// error rather than a silent truncation.
    fn int32(field: &str, value: i64) -> Result<Self, BuildError> {
        let value = i32::try_from(value).map_err(|_| {
            BuildError::Serialization(format!(
                "value {value} for field '{field}' does not fit the Int32 wire type"
            ))
        })?;
        Ok(Self::Int32(value))
    }

    /// Id of the referenced object path, for reference parameters.
    pub fn object_path_id(&self) -> Option<i32> {
        match self {
            Self::ObjectReference { object_path_id } => Some(*object_path_id),
            _ => None,
        }
    }
}

/// A node in the object reference graph. Each carries a request-local id
/// assigned at construction time, never reused, strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectPath {
    /// Resolves an opaque server object name (the identity template).
    Identity { id: i32, name: String },
    /// Static property of a server type (e.g. the current client context).
    StaticProperty {
        id: i32,
        type_id: String,
        name: String,
    },
    /// Instance property access on an earlier node.
    Property { id: i32, parent_id: i32, name: String },
    /// Server-side constructor invocation.
    Constructor {
        id: i32,
        type_id: String,
        parameters: Vec<CsomValue>,
    },
}

impl ObjectPath {
    pub fn id(&self) -> i32 {
        match self {
            Self::Identity { id, .. }
            | Self::StaticProperty { id, .. }
            | Self::Property { id, .. }
            | Self::Constructor { id, .. } => *id,
        }
    }
}

/// An operation node referencing an object path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Method {
        id: i32,
        object_path_id: i32,
        name: String,
        parameters: Vec<CsomValue>,
    },
    SetProperty {
        id: i32,
        object_path_id: i32,
        name: String,
        value: CsomValue,
    },
    Query {
        id: i32,
        object_path_id: i32,
        select_all: bool,
        fields: Vec<String>,
    },
    IdentityQuery { id: i32, object_path_id: i32 },
}

impl Action {
    pub fn id(&self) -> i32 {
        match self {
            Self::Method { id, .. }
            | Self::SetProperty { id, .. }
            | Self::Query { id, .. }
            | Self::IdentityQuery { id, .. } => *id,
        }
    }

    pub fn object_path_id(&self) -> i32 {
        match self {
            Self::Method { object_path_id, .. }
            | Self::SetProperty { object_path_id, .. }
            | Self::Query { object_path_id, .. }
            | Self::IdentityQuery { object_path_id, .. } => *object_path_id,
        }
    }

    /// Whether the server echoes a result element for this action. Property
    /// sets produce no directly queryable output and consume no response
    /// cursor slot.
    pub fn consumes_response_slot(&self) -> bool {
        !matches!(self, Self::SetProperty { .. })
    }
}

/// One entry of the physical request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionObjectPath {
    pub action: Option<Action>,
    pub object_path: Option<ObjectPath>,
}

impl ActionObjectPath {
    pub fn action(action: Action) -> Self {
        Self {
            action: Some(action),
            object_path: None,
        }
    }

    pub fn path(object_path: ObjectPath) -> Self {
        Self {
            action: None,
            object_path: Some(object_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FieldType;

    #[test]
    fn test_type_tags() {
        assert_eq!(CsomValue::String("x".to_string()).type_tag(), Some("String"));
        assert_eq!(CsomValue::Enum(3).type_tag(), Some("Enum"));
        assert_eq!(CsomValue::Null.type_tag(), Some("Null"));
        assert_eq!(
            CsomValue::ObjectReference { object_path_id: 4 }.type_tag(),
            None
        );
    }

    fn change(field: &str, value: FilterValue, declared_type: FieldType) -> FieldChange {
        FieldChange {
            field: field.to_string(),
            value,
            declared_type,
        }
    }

    #[test]
    fn test_enum_change_serializes_as_integer() {
        let change = change("TemplateType", FilterValue::Int(100), FieldType::Enum);
        assert_eq!(
            CsomValue::from_change(&change).unwrap(),
            CsomValue::Enum(100)
        );
    }

    #[test]
    fn test_plain_change_keeps_primitive_tag() {
        let change = change("Title", FilterValue::String("A".to_string()), FieldType::String);
        assert_eq!(
            CsomValue::from_change(&change).unwrap(),
            CsomValue::String("A".to_string())
        );
    }

    #[test]
    fn test_declared_type_picks_the_tag() {
        // Lookup fields share the Int32 wire tag.
        let lookup = change("AuthorId", FilterValue::Int(7), FieldType::Lookup);
        assert_eq!(CsomValue::from_change(&lookup).unwrap(), CsomValue::Int32(7));

        // Integers assigned to a double-typed field widen instead of keeping
        // the runtime shape's tag.
        let ratio = change("Ratio", FilterValue::Int(2), FieldType::Double);
        assert_eq!(
            CsomValue::from_change(&ratio).unwrap(),
            CsomValue::Double(2.0)
        );
    }

    #[test]
    fn test_oversized_int32_rejected() {
        let change = change("ItemCount", FilterValue::Int(i64::MAX), FieldType::Int32);
        let err = CsomValue::from_change(&change).unwrap_err();
        assert!(matches!(err, BuildError::Serialization(_)));
    }

    #[test]
    fn test_guid_text_is_braced() {
        let value = CsomValue::Guid(Uuid::nil());
        assert_eq!(
            value.text().unwrap(),
            "{00000000-0000-0000-0000-000000000000}"
        );
    }

    #[test]
    fn test_response_slot_accounting() {
        let set = Action::SetProperty {
            id: 2,
            object_path_id: 1,
            name: "Title".to_string(),
            value: CsomValue::String("A".to_string()),
        };
        let query = Action::Query {
            id: 3,
            object_path_id: 1,
            select_all: true,
            fields: vec![],
        };
        assert!(!set.consumes_response_slot());
        assert!(query.consumes_response_slot());
    }
}
