//! Object-path request builder
//!
//! Converts logical operations into the ordered action/object-path entry
//! list of one physical CSOM request and renders it as XML. The builder owns
//! the request-local [`IdProvider`]; a fresh builder is required per flush.

use std::collections::{HashMap, HashSet};

use std::borrow::Cow;

use log::debug;
use quick_xml::Writer;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;

use super::id_provider::IdProvider;
use super::identity::ObjectIdentity;
use super::object_path::{Action, ActionObjectPath, CsomValue, ObjectPath};
use crate::error::BuildError;
use crate::tracking::FieldChange;

const XML_NAMESPACE: &str = "http://schemas.microsoft.com/sharepoint/clientquery/2009";
const SCHEMA_VERSION: &str = "15.0.0.0";
const LIBRARY_VERSION: &str = "16.0.0.0";
const APPLICATION_NAME: &str = "sharepoint-client";

/// TypeId of the static client-context object the read chains hang off.
const CLIENT_CONTEXT_TYPE_ID: &str = "{3747adcd-a3c3-41b9-bfab-4a64dd2f1e0a}";

/// Persist method flavor for mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Lightweight update.
    Update,
    /// Full update that pushes changes down to existing content.
    UpdateAndPush,
}

impl UpdateMode {
    pub fn method_name(self) -> &'static str {
        match self {
            Self::Update => "Update",
            Self::UpdateAndPush => "UpdateAndPushChanges",
        }
    }
}

/// Finished physical request: the XML body plus the action ids that consume
/// a response slot, in emission order.
#[derive(Debug, Clone)]
pub struct CsomRequest {
    pub body: String,
    pub slots: Vec<i32>,
}

/// Builds the entry list for one physical request. Thread-confined: all
/// methods take `&mut self` and the id sequence is order-sensitive.
#[derive(Debug, Default)]
pub struct ObjectPathBuilder {
    ids: IdProvider,
    entries: Vec<ActionObjectPath>,
    /// Opaque identity name -> (path id, object type); used both to reuse
    /// nodes and to detect conflicting registrations.
    identities: HashMap<String, (i32, String)>,
    root_id: Option<i32>,
}

impl ObjectPathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push_path(&mut self, path: ObjectPath) -> i32 {
        let id = path.id();
        self.entries.push(ActionObjectPath::path(path));
        id
    }

    fn push_action(&mut self, action: Action) -> i32 {
        let id = action.id();
        self.entries.push(ActionObjectPath::action(action));
        id
    }

    /// Static-property node for the current client context, emitted once per
    /// request and shared by every read chain.
    fn root(&mut self) -> i32 {
        if let Some(id) = self.root_id {
            return id;
        }
        let id = self.ids.next_id();
        self.push_path(ObjectPath::StaticProperty {
            id,
            type_id: CLIENT_CONTEXT_TYPE_ID.to_string(),
            name: "Current".to_string(),
        });
        self.root_id = Some(id);
        id
    }

    /// Identity node for an opaque object name. Nodes are deduplicated by
    /// name; re-registering a name with a different object type is an error.
    pub fn named_identity(
        &mut self,
        name: &str,
        object_type: &str,
    ) -> Result<i32, BuildError> {
        if let Some((id, registered_type)) = self.identities.get(name) {
            if registered_type != object_type {
                return Err(BuildError::DuplicateIdentity {
                    name: name.to_string(),
                });
            }
            return Ok(*id);
        }
        let id = self.ids.next_id();
        self.push_path(ObjectPath::Identity {
            id,
            name: name.to_string(),
        });
        self.identities
            .insert(name.to_string(), (id, object_type.to_string()));
        Ok(id)
    }

    pub fn identity(&mut self, identity: &ObjectIdentity) -> Result<i32, BuildError> {
        self.named_identity(&identity.canonical(), identity.object_type())
    }

    /// Constructor path node. Parameters may reference nodes emitted later
    /// in the same request; the reference is validated at `finish` time.
    pub fn add_constructor(&mut self, type_id: &str, parameters: Vec<CsomValue>) -> i32 {
        let id = self.ids.next_id();
        self.push_path(ObjectPath::Constructor {
            id,
            type_id: type_id.to_string(),
            parameters,
        })
    }

    /// Read chain: root static property, one property node per path segment,
    /// then a query action selecting all properties or an explicit field
    /// list. Returns the query action id.
    pub fn add_read(&mut self, property_chain: &[String], fields: &[String]) -> i32 {
        let mut parent = self.root();
        for segment in property_chain {
            let id = self.ids.next_id();
            parent = self.push_path(ObjectPath::Property {
                id,
                parent_id: parent,
                name: segment.clone(),
            });
        }
        let id = self.ids.next_id();
        self.push_action(Action::Query {
            id,
            object_path_id: parent,
            select_all: fields.is_empty(),
            fields: fields.to_vec(),
        })
    }

    /// Mutation: identity node, one SetProperty per changed field (typed per
    /// the declared wire tag), then the persist method. Returns the method
    /// action id.
    pub fn add_update(
        &mut self,
        identity: &ObjectIdentity,
        changes: &[FieldChange],
        mode: UpdateMode,
    ) -> Result<i32, BuildError> {
        let path_id = self.identity(identity)?;
        for change in changes {
            let id = self.ids.next_id();
            self.push_action(Action::SetProperty {
                id,
                object_path_id: path_id,
                name: change.field.clone(),
                value: CsomValue::from_change(change)?,
            });
        }
        let id = self.ids.next_id();
        Ok(self.push_action(Action::Method {
            id,
            object_path_id: path_id,
            name: mode.method_name().to_string(),
            parameters: Vec::new(),
        }))
    }

    /// Delete: identity node plus the server-side `DeleteObject` method.
    pub fn add_delete(&mut self, identity: &ObjectIdentity) -> Result<i32, BuildError> {
        let path_id = self.identity(identity)?;
        let id = self.ids.next_id();
        Ok(self.push_action(Action::Method {
            id,
            object_path_id: path_id,
            name: "DeleteObject".to_string(),
            parameters: Vec::new(),
        }))
    }

    /// Generic server-side method invocation on an identified object.
    pub fn add_invoke(
        &mut self,
        identity: &ObjectIdentity,
        method: &str,
        parameters: Vec<CsomValue>,
    ) -> Result<i32, BuildError> {
        let path_id = self.identity(identity)?;
        let id = self.ids.next_id();
        Ok(self.push_action(Action::Method {
            id,
            object_path_id: path_id,
            name: method.to_string(),
            parameters,
        }))
    }

    /// Request the server-resolved identity of an object.
    pub fn add_identity_query(
        &mut self,
        identity: &ObjectIdentity,
    ) -> Result<i32, BuildError> {
        let path_id = self.identity(identity)?;
        let id = self.ids.next_id();
        Ok(self.push_action(Action::IdentityQuery {
            id,
            object_path_id: path_id,
        }))
    }

    /// Validate the reference graph and render the XML body.
    pub fn finish(self) -> Result<CsomRequest, BuildError> {
        let defined: HashSet<i32> = self
            .entries
            .iter()
            .filter_map(|e| e.object_path.as_ref())
            .map(ObjectPath::id)
            .collect();

        for entry in &self.entries {
            let mut parameters: Vec<&CsomValue> = Vec::new();
            match &entry.action {
                Some(Action::Method { parameters: p, .. }) => parameters.extend(p),
                Some(Action::SetProperty { value, .. }) => parameters.push(value),
                _ => {}
            }
            if let Some(ObjectPath::Constructor { parameters: p, .. }) = &entry.object_path {
                parameters.extend(p);
            }
            for parameter in parameters {
                if let Some(id) = parameter.object_path_id() {
                    if !defined.contains(&id) {
                        return Err(BuildError::DanglingReference { id });
                    }
                }
            }
        }

        let slots: Vec<i32> = self
            .entries
            .iter()
            .filter_map(|e| e.action.as_ref())
            .filter(|a| a.consumes_response_slot())
            .map(Action::id)
            .collect();
        debug!(
            "assembled request: {} node id(s) across {} entries, {} response slot(s)",
            self.ids.issued(),
            self.entries.len(),
            slots.len()
        );

        Ok(CsomRequest {
            body: render_xml(&self.entries)?,
            slots,
        })
    }

    /// The entry list built so far, in emission order.
    pub fn entries(&self) -> &[ActionObjectPath] {
        &self.entries
    }
}

fn ser(err: impl std::fmt::Display) -> BuildError {
    BuildError::Serialization(err.to_string())
}

/// Attribute with an owned value, for ids rendered from integers.
fn attr_owned(key: &'static str, value: String) -> Attribute<'static> {
    Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Owned(value.into_bytes()),
    }
}

fn render_xml(entries: &[ActionObjectPath]) -> Result<String, BuildError> {
    let mut writer = Writer::new(Vec::new());

    let mut request = BytesStart::new("Request");
    request.push_attribute(("AddExpandoFieldTypeSuffix", "true"));
    request.push_attribute(("SchemaVersion", SCHEMA_VERSION));
    request.push_attribute(("LibraryVersion", LIBRARY_VERSION));
    request.push_attribute(("ApplicationName", APPLICATION_NAME));
    request.push_attribute(("xmlns", XML_NAMESPACE));
    writer.write_event(Event::Start(request)).map_err(ser)?;

    writer
        .write_event(Event::Start(BytesStart::new("Actions")))
        .map_err(ser)?;
    for entry in entries {
        if let Some(action) = &entry.action {
            write_action(&mut writer, action)?;
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new("Actions")))
        .map_err(ser)?;

    writer
        .write_event(Event::Start(BytesStart::new("ObjectPaths")))
        .map_err(ser)?;
    for entry in entries {
        if let Some(path) = &entry.object_path {
            write_path(&mut writer, path)?;
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new("ObjectPaths")))
        .map_err(ser)?;

    writer
        .write_event(Event::End(BytesEnd::new("Request")))
        .map_err(ser)?;

    String::from_utf8(writer.into_inner()).map_err(ser)
}

fn write_action<W: std::io::Write>(
    writer: &mut Writer<W>,
    action: &Action,
) -> Result<(), BuildError> {
    match action {
        Action::Method {
            id,
            object_path_id,
            name,
            parameters,
        } => {
            let mut element = BytesStart::new("Method");
            element.push_attribute(("Name", name.as_str()));
            element.push_attribute(attr_owned("Id", id.to_string()));
            element.push_attribute(attr_owned("ObjectPathId", object_path_id.to_string()));
            if parameters.is_empty() {
                writer.write_event(Event::Empty(element)).map_err(ser)?;
            } else {
                writer.write_event(Event::Start(element)).map_err(ser)?;
                write_parameters(writer, parameters)?;
                writer
                    .write_event(Event::End(BytesEnd::new("Method")))
                    .map_err(ser)?;
            }
        }
        Action::SetProperty {
            id,
            object_path_id,
            name,
            value,
        } => {
            let mut element = BytesStart::new("SetProperty");
            element.push_attribute(attr_owned("Id", id.to_string()));
            element.push_attribute(attr_owned("ObjectPathId", object_path_id.to_string()));
            element.push_attribute(("Name", name.as_str()));
            writer.write_event(Event::Start(element)).map_err(ser)?;
            write_parameter(writer, value)?;
            writer
                .write_event(Event::End(BytesEnd::new("SetProperty")))
                .map_err(ser)?;
        }
        Action::Query {
            id,
            object_path_id,
            select_all,
            fields,
        } => {
            let mut element = BytesStart::new("Query");
            element.push_attribute(attr_owned("Id", id.to_string()));
            element.push_attribute(attr_owned("ObjectPathId", object_path_id.to_string()));
            writer.write_event(Event::Start(element)).map_err(ser)?;

            let mut inner = BytesStart::new("Query");
            inner.push_attribute(("SelectAllProperties", if *select_all { "true" } else { "false" }));
            writer.write_event(Event::Start(inner)).map_err(ser)?;
            if fields.is_empty() {
                writer
                    .write_event(Event::Empty(BytesStart::new("Properties")))
                    .map_err(ser)?;
            } else {
                writer
                    .write_event(Event::Start(BytesStart::new("Properties")))
                    .map_err(ser)?;
                for field in fields {
                    let mut property = BytesStart::new("Property");
                    property.push_attribute(("Name", field.as_str()));
                    property.push_attribute(("ScalarProperty", "true"));
                    writer.write_event(Event::Empty(property)).map_err(ser)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new("Properties")))
                    .map_err(ser)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("Query")))
                .map_err(ser)?;
            writer
                .write_event(Event::End(BytesEnd::new("Query")))
                .map_err(ser)?;
        }
        Action::IdentityQuery { id, object_path_id } => {
            let mut element = BytesStart::new("ObjectIdentityQuery");
            element.push_attribute(attr_owned("Id", id.to_string()));
            element.push_attribute(attr_owned("ObjectPathId", object_path_id.to_string()));
            writer.write_event(Event::Empty(element)).map_err(ser)?;
        }
    }
    Ok(())
}

fn write_path<W: std::io::Write>(
    writer: &mut Writer<W>,
    path: &ObjectPath,
) -> Result<(), BuildError> {
    match path {
        ObjectPath::Identity { id, name } => {
            let mut element = BytesStart::new("Identity");
            element.push_attribute(attr_owned("Id", id.to_string()));
            element.push_attribute(("Name", name.as_str()));
            writer.write_event(Event::Empty(element)).map_err(ser)?;
        }
        ObjectPath::StaticProperty { id, type_id, name } => {
            let mut element = BytesStart::new("StaticProperty");
            element.push_attribute(attr_owned("Id", id.to_string()));
            element.push_attribute(("TypeId", type_id.as_str()));
            element.push_attribute(("Name", name.as_str()));
            writer.write_event(Event::Empty(element)).map_err(ser)?;
        }
        ObjectPath::Property { id, parent_id, name } => {
            let mut element = BytesStart::new("Property");
            element.push_attribute(attr_owned("Id", id.to_string()));
            element.push_attribute(attr_owned("ParentId", parent_id.to_string()));
            element.push_attribute(("Name", name.as_str()));
            writer.write_event(Event::Empty(element)).map_err(ser)?;
        }
        ObjectPath::Constructor {
            id,
            type_id,
            parameters,
        } => {
            let mut element = BytesStart::new("Constructor");
            element.push_attribute(attr_owned("Id", id.to_string()));
            element.push_attribute(("TypeId", type_id.as_str()));
            if parameters.is_empty() {
                writer.write_event(Event::Empty(element)).map_err(ser)?;
            } else {
                writer.write_event(Event::Start(element)).map_err(ser)?;
                write_parameters(writer, parameters)?;
                writer
                    .write_event(Event::End(BytesEnd::new("Constructor")))
                    .map_err(ser)?;
            }
        }
    }
    Ok(())
}

fn write_parameters<W: std::io::Write>(
    writer: &mut Writer<W>,
    parameters: &[CsomValue],
) -> Result<(), BuildError> {
    writer
        .write_event(Event::Start(BytesStart::new("Parameters")))
        .map_err(ser)?;
    for parameter in parameters {
        write_parameter(writer, parameter)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("Parameters")))
        .map_err(ser)?;
    Ok(())
}

fn write_parameter<W: std::io::Write>(
    writer: &mut Writer<W>,
    value: &CsomValue,
) -> Result<(), BuildError> {
    let mut element = BytesStart::new("Parameter");
    match value.type_tag() {
        Some(tag) => element.push_attribute(("Type", tag)),
        None => {
            // Object reference parameter.
            if let Some(id) = value.object_path_id() {
                element.push_attribute(attr_owned("ObjectPathId", id.to_string()));
            }
        }
    }
    match value.text() {
        Some(text) => {
            writer.write_event(Event::Start(element)).map_err(ser)?;
            writer
                .write_event(Event::Text(BytesText::new(&text)))
                .map_err(ser)?;
            writer
                .write_event(Event::End(BytesEnd::new("Parameter")))
                .map_err(ser)?;
        }
        None => {
            writer.write_event(Event::Empty(element)).map_err(ser)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::metadata::FieldType;
    use crate::query::FilterValue;

    fn change(field: &str, value: FilterValue, declared_type: FieldType) -> FieldChange {
        FieldChange {
            field: field.to_string(),
            value,
            declared_type,
        }
    }

    fn item_identity() -> ObjectIdentity {
        ObjectIdentity::item(Uuid::nil(), Uuid::nil(), Uuid::nil(), 1)
    }

    #[test]
    fn test_read_chain_emission_order() {
        let mut builder = ObjectPathBuilder::new();
        builder.add_read(
            &["Web".to_string(), "Lists".to_string()],
            &["Title".to_string()],
        );
        let entries = builder.entries();

        // StaticProperty root, two Property nodes, then the Query action.
        assert!(matches!(
            entries[0].object_path,
            Some(ObjectPath::StaticProperty { .. })
        ));
        assert!(matches!(
            entries[1].object_path,
            Some(ObjectPath::Property { .. })
        ));
        assert!(matches!(
            entries[2].object_path,
            Some(ObjectPath::Property { .. })
        ));
        assert!(matches!(entries[3].action, Some(Action::Query { .. })));
    }

    #[test]
    fn test_property_defined_before_referencing_action() {
        let mut builder = ObjectPathBuilder::new();
        builder.add_read(&["Web".to_string()], &[]);
        builder
            .add_update(
                &item_identity(),
                &[change("Title", FilterValue::String("A".to_string()), FieldType::String)],
                UpdateMode::Update,
            )
            .unwrap();
        let entries = builder.entries();

        let mut defined = std::collections::HashSet::new();
        for entry in entries {
            if let Some(path) = &entry.object_path {
                defined.insert(path.id());
            }
            if let Some(action) = &entry.action {
                assert!(
                    defined.contains(&action.object_path_id()),
                    "action {} targets a path defined later",
                    action.id()
                );
            }
        }
    }

    #[test]
    fn test_ids_strictly_increase_across_whole_request() {
        let mut builder = ObjectPathBuilder::new();
        builder.add_read(&["Web".to_string()], &[]);
        builder.add_constructor(
            "{guid}",
            vec![CsomValue::ObjectReference { object_path_id: 1 }],
        );
        builder
            .add_invoke(&item_identity(), "Recycle", vec![CsomValue::Int32(1)])
            .unwrap();

        let mut ids: Vec<i32> = Vec::new();
        for entry in builder.entries() {
            if let Some(path) = &entry.object_path {
                ids.push(path.id());
            }
            if let Some(action) = &entry.action {
                ids.push(action.id());
            }
        }
        for window in ids.windows(2) {
            assert!(window[1] > window[0]);
        }
    }

    #[test]
    fn test_update_emits_set_properties_then_method() {
        let mut builder = ObjectPathBuilder::new();
        builder
            .add_update(
                &item_identity(),
                &[
                    change("Title", FilterValue::String("A".to_string()), FieldType::String),
                    change("TemplateType", FilterValue::Int(100), FieldType::Enum),
                ],
                UpdateMode::UpdateAndPush,
            )
            .unwrap();
        let entries = builder.entries();

        assert!(matches!(
            entries[0].object_path,
            Some(ObjectPath::Identity { .. })
        ));
        assert!(matches!(
            entries[1].action,
            Some(Action::SetProperty { .. })
        ));
        match &entries[2].action {
            Some(Action::SetProperty { value, .. }) => {
                assert_eq!(*value, CsomValue::Enum(100));
            }
            other => panic!("expected SetProperty, got {:?}", other),
        }
        match &entries[3].action {
            Some(Action::Method { name, .. }) => assert_eq!(name, "UpdateAndPushChanges"),
            other => panic!("expected Method, got {:?}", other),
        }
    }

    #[test]
    fn test_identity_nodes_deduplicated() {
        let mut builder = ObjectPathBuilder::new();
        let identity = item_identity();
        let first = builder.identity(&identity).unwrap();
        let second = builder.identity(&identity).unwrap();
        assert_eq!(first, second);
        assert_eq!(builder.entries().len(), 1);
    }

    #[test]
    fn test_duplicate_identity_with_conflicting_type() {
        let mut builder = ObjectPathBuilder::new();
        builder.named_identity("same-name", "list").unwrap();
        let err = builder.named_identity("same-name", "item").unwrap_err();
        assert_eq!(
            err,
            BuildError::DuplicateIdentity {
                name: "same-name".to_string()
            }
        );
    }

    #[test]
    fn test_forward_reference_is_legal() {
        let mut builder = ObjectPathBuilder::new();
        // Constructor parameter references a path emitted after it.
        builder.add_constructor(
            "{type-a}",
            vec![CsomValue::ObjectReference { object_path_id: 2 }],
        );
        builder.add_constructor("{type-b}", vec![]);
        let request = builder.finish().unwrap();
        assert!(request.body.contains("Constructor"));
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut builder = ObjectPathBuilder::new();
        builder
            .add_invoke(
                &item_identity(),
                "MoveTo",
                vec![CsomValue::ObjectReference { object_path_id: 99 }],
            )
            .unwrap();
        let err = builder.finish().unwrap_err();
        assert_eq!(err, BuildError::DanglingReference { id: 99 });
    }

    #[test]
    fn test_manifest_skips_set_property_slots() {
        let mut builder = ObjectPathBuilder::new();
        let read_id = builder.add_read(&["Web".to_string()], &[]);
        let update_id = builder
            .add_update(
                &item_identity(),
                &[change("Title", FilterValue::String("A".to_string()), FieldType::String)],
                UpdateMode::Update,
            )
            .unwrap();
        let request = builder.finish().unwrap();

        // Only the query and the method consume response slots.
        assert_eq!(request.slots, vec![read_id, update_id]);
    }

    #[test]
    fn test_rendered_xml_shape() {
        let mut builder = ObjectPathBuilder::new();
        builder.add_read(&["Web".to_string()], &["Title".to_string()]);
        builder
            .add_update(
                &item_identity(),
                &[change("Title", FilterValue::String("A&B".to_string()), FieldType::String)],
                UpdateMode::Update,
            )
            .unwrap();
        let request = builder.finish().unwrap();

        assert!(request.body.starts_with("<Request "));
        assert!(request.body.contains("xmlns=\"http://schemas.microsoft.com/sharepoint/clientquery/2009\""));
        assert!(request.body.contains("<Actions>"));
        assert!(request.body.contains("<ObjectPaths>"));
        assert!(request.body.contains("<Property Name=\"Title\" ScalarProperty=\"true\"/>"));
        assert!(request.body.contains("<Parameter Type=\"String\">A&amp;B</Parameter>"));
        assert!(request.body.contains("Name=\"Update\""));
        assert!(request.body.ends_with("</Request>"));
    }
}
