//! Core data types for schemapack and datapack documents.
//!
//! A [`SchemaPack`] describes classes, their content schemas, and the typed
//! relations between them. A [`DataPack`] holds [`Resource`]s that conform to
//! a schemapack. All types serialise to and from the camelCase wire format of
//! both documents (version `0.3.0`).
//!
//! Maps and sets are ordered (`BTreeMap`/`BTreeSet`) so that iteration,
//! serialisation, and error reporting are deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

pub type ClassName = String;
pub type ResourceId = String;
pub type RelationName = String;

/// Schemapack versions this crate understands.
pub const SUPPORTED_SCHEMAPACK_VERSIONS: &[&str] = &["0.3.0"];

/// Datapack versions this crate understands.
pub const SUPPORTED_DATAPACK_VERSIONS: &[&str] = &["0.3.0"];

/// Whether each end of a relation must participate in it.
///
/// `origin: true` means every target resource must be referenced by at least
/// one origin. `target: true` means every origin must name at least one
/// target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(deny_unknown_fields)]
pub struct Mandatory {
    pub origin: bool,
    pub target: bool,
}

/// Whether each end of a relation may contribute more than one resource.
///
/// `origin: false` is a "one-to-*" relation: a target may be claimed by at
/// most one origin. `target: true` is a "*-to-many" relation: an origin holds
/// a set of target ids.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(deny_unknown_fields)]
pub struct Multiple {
    pub origin: bool,
    pub target: bool,
}

/// A relation from the owning class to `target_class`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Relation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub target_class: ClassName,
    pub mandatory: Mandatory,
    pub multiple: Multiple,
}

impl Relation {
    pub fn new(target_class: impl Into<ClassName>, mandatory: Mandatory, multiple: Multiple) -> Self {
        Self {
            description: None,
            target_class: target_class.into(),
            mandatory,
            multiple,
        }
    }
}

/// The id property of a class, i.e. the key under which a resource's id is
/// placed in a denormalized representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IdSpec {
    pub property_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A JSON Schema describing the content of a class's resources.
///
/// Kept as an opaque mapping; conformance checking is delegated to the
/// `jsonschema` crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct ContentSchema(pub Map<String, Value>);

impl ContentSchema {
    /// Names declared under `properties`. Empty if the schema declares none.
    pub fn properties(&self) -> BTreeSet<&str> {
        match self.0.get("properties") {
            Some(Value::Object(props)) => props.keys().map(String::as_str).collect(),
            _ => BTreeSet::new(),
        }
    }

    /// True if the schema's `type` is `"object"`.
    pub fn describes_object(&self) -> bool {
        self.0.get("type").and_then(Value::as_str) == Some("object")
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Value> for ContentSchema {
    /// Non-object values produce an empty schema.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

/// A class of a schemapack: id property, content schema, and relations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClassDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub id: IdSpec,
    pub content: ContentSchema,
    #[serde(default)]
    pub relations: BTreeMap<RelationName, Relation>,
}

impl ClassDefinition {
    pub fn new(id_property: impl Into<String>, content: ContentSchema) -> Self {
        Self {
            description: None,
            id: IdSpec {
                property_name: id_property.into(),
                description: None,
            },
            content,
            relations: BTreeMap::new(),
        }
    }

    /// Builder-style helper to attach a relation.
    pub fn with_relation(mut self, name: impl Into<RelationName>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }
}

/// A schemapack document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SchemaPack {
    /// Identifies the document as a schemapack and names the spec version.
    #[serde(rename = "schemapack")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub classes: BTreeMap<ClassName, ClassDefinition>,

    /// When set, corresponding datapacks must name a root resource of this class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_class: Option<ClassName>,
}

impl SchemaPack {
    pub fn class(&self, name: &str) -> Option<&ClassDefinition> {
        self.classes.get(name)
    }
}

/// The value of one relation property of a resource.
///
/// On the wire: `null` for [`RelationValue::None`], a string for
/// [`RelationValue::One`], and an array of unique strings for
/// [`RelationValue::Many`]. Duplicate ids in an array are rejected during
/// deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationValue {
    None,
    One(ResourceId),
    Many(BTreeSet<ResourceId>),
}

impl RelationValue {
    pub fn many<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ResourceId>,
    {
        RelationValue::Many(ids.into_iter().map(Into::into).collect())
    }

    /// The target ids as a set, regardless of shape.
    pub fn target_ids(&self) -> BTreeSet<&str> {
        match self {
            RelationValue::None => BTreeSet::new(),
            RelationValue::One(id) => BTreeSet::from([id.as_str()]),
            RelationValue::Many(ids) => ids.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, RelationValue::Many(_))
    }

    /// The bare JSON form: `null`, an id, or a sorted list of ids.
    ///
    /// An absent value stays `null` even for to-many relations; it is not
    /// widened to `[]`. An explicit empty list stays `[]`.
    pub fn to_json(&self) -> Value {
        match self {
            RelationValue::None => Value::Null,
            RelationValue::One(id) => Value::String(id.clone()),
            RelationValue::Many(ids) => {
                Value::Array(ids.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

impl From<&str> for RelationValue {
    fn from(id: &str) -> Self {
        RelationValue::One(id.to_owned())
    }
}

impl Serialize for RelationValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RelationValue::None => serializer.serialize_none(),
            RelationValue::One(id) => serializer.serialize_str(id),
            RelationValue::Many(ids) => serializer.collect_seq(ids),
        }
    }
}

impl<'de> Deserialize<'de> for RelationValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RelationValueVisitor)
    }
}

struct RelationValueVisitor;

impl<'de> Visitor<'de> for RelationValueVisitor {
    type Value = RelationValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, a target resource id, or a list of unique target resource ids")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(RelationValue::None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(RelationValue::None)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(RelationValue::One(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(RelationValue::One(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut ids = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        while let Some(id) = seq.next_element::<String>()? {
            if ids.contains(&id) {
                duplicates.insert(id);
            } else {
                ids.insert(id);
            }
        }
        if !duplicates.is_empty() {
            let listed: Vec<String> = duplicates.into_iter().collect();
            return Err(de::Error::custom(format!(
                "the given sequence of target ids contains duplicates: {}",
                listed.join(", ")
            )));
        }
        Ok(RelationValue::Many(ids))
    }
}

/// One instance of a class: its content plus its relation values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Resource {
    pub content: Map<String, Value>,
    #[serde(default)]
    pub relations: BTreeMap<RelationName, RelationValue>,
}

impl Resource {
    pub fn new(content: Map<String, Value>) -> Self {
        Self {
            content,
            relations: BTreeMap::new(),
        }
    }

    pub fn with_relation(mut self, name: impl Into<RelationName>, value: RelationValue) -> Self {
        self.relations.insert(name.into(), value);
        self
    }

    /// Target ids of `relation` as a set. Empty if the relation is absent.
    pub fn target_ids(&self, relation: &str) -> BTreeSet<&str> {
        self.relations
            .get(relation)
            .map(RelationValue::target_ids)
            .unwrap_or_default()
    }
}

/// A datapack document: resources grouped by class name and resource id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DataPack {
    /// Identifies the document as a datapack and names the spec version.
    #[serde(rename = "datapack")]
    pub version: String,

    pub resources: BTreeMap<ClassName, BTreeMap<ResourceId, Resource>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_resource: Option<ResourceId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_class: Option<ClassName>,
}

impl DataPack {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            resources: BTreeMap::new(),
            root_resource: None,
            root_class: None,
        }
    }

    pub fn resource(&self, class_name: &str, resource_id: &str) -> Option<&Resource> {
        self.resources.get(class_name)?.get(resource_id)
    }

    /// The `(root class, root resource)` pair, if both are set.
    pub fn root(&self) -> Option<(&str, &str)> {
        match (&self.root_class, &self.root_resource) {
            (Some(class), Some(id)) => Some((class.as_str(), id.as_str())),
            _ => None,
        }
    }

    /// Total number of resources across all classes.
    pub fn len(&self) -> usize {
        self.resources.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn relation_value_shapes_deserialize() {
        let none: RelationValue = serde_json::from_value(json!(null)).unwrap();
        let one: RelationValue = serde_json::from_value(json!("ds1")).unwrap();
        let many: RelationValue = serde_json::from_value(json!(["b", "a"])).unwrap();
        assert_eq!(none, RelationValue::None);
        assert_eq!(one, RelationValue::One("ds1".into()));
        assert_eq!(many, RelationValue::many(["a", "b"]));
    }

    #[test]
    fn duplicate_target_ids_rejected() {
        let err = serde_json::from_value::<RelationValue>(json!(["a", "b", "a"])).unwrap_err();
        assert!(err.to_string().contains("duplicates: a"));
    }

    #[test]
    fn many_serializes_sorted() {
        let value = RelationValue::many(["z", "m", "a"]);
        assert_eq!(serde_json::to_value(&value).unwrap(), json!(["a", "m", "z"]));
    }

    #[test]
    fn bare_json_keeps_absent_distinct_from_empty() {
        assert_eq!(RelationValue::None.to_json(), Value::Null);
        assert_eq!(RelationValue::many(Vec::<String>::new()).to_json(), json!([]));
        assert_eq!(RelationValue::from("ds1").to_json(), json!("ds1"));
    }

    #[test]
    fn target_ids_normalizes_shape() {
        assert!(RelationValue::None.target_ids().is_empty());
        assert_eq!(RelationValue::from("x").target_ids(), BTreeSet::from(["x"]));
        let resource = Resource::default().with_relation("files", RelationValue::many(["f1", "f2"]));
        assert_eq!(resource.target_ids("files").len(), 2);
        assert!(resource.target_ids("missing").is_empty());
    }

    #[test]
    fn schemapack_wire_names() {
        let schemapack: SchemaPack = serde_json::from_value(json!({
            "schemapack": "0.3.0",
            "rootClass": "File",
            "classes": {
                "File": {
                    "id": { "propertyName": "alias" },
                    "content": { "type": "object", "properties": { "size": { "type": "integer" } } },
                    "relations": {
                        "dataset": {
                            "targetClass": "File",
                            "mandatory": { "origin": false, "target": true },
                            "multiple": { "origin": false, "target": false }
                        }
                    }
                }
            }
        }))
        .unwrap();
        let class = schemapack.class("File").unwrap();
        assert_eq!(class.id.property_name, "alias");
        assert_eq!(class.content.properties(), BTreeSet::from(["size"]));
        assert!(class.content.describes_object());
        assert!(class.relations["dataset"].mandatory.target);
        assert_eq!(schemapack.root_class.as_deref(), Some("File"));
    }

    #[test]
    fn unknown_fields_rejected() {
        let result = serde_json::from_value::<DataPack>(json!({
            "datapack": "0.3.0",
            "resources": {},
            "surprise": true
        }));
        assert!(result.is_err());
    }

    #[test]
    fn datapack_root_pair() {
        let mut datapack = DataPack::new("0.3.0");
        assert_eq!(datapack.root(), None);
        datapack.root_class = Some("File".into());
        assert_eq!(datapack.root(), None);
        datapack.root_resource = Some("f1".into());
        assert_eq!(datapack.root(), Some(("File", "f1")));
    }
}
