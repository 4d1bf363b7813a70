//! Loading and specification checks for schemapack and datapack documents.
//!
//! Documents may be JSON or YAML; both are parsed into a `serde_json::Value`
//! mapping before being deserialised into the typed model. A schemapack class
//! may give its content schema as a string, which is read as a path to a
//! JSON/YAML file relative to the schemapack's own directory.
//!
//! Deserialisation catches structural problems (unknown fields, wrong shapes,
//! duplicate target ids). The checks in [`check_schemapack`] and
//! [`check_datapack`] cover the cross-field constraints serde cannot express.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, LoadError, ParsingError, SpecError, SpecType};
use crate::types::{
    DataPack, SchemaPack, SUPPORTED_DATAPACK_VERSIONS, SUPPORTED_SCHEMAPACK_VERSIONS,
};
use crate::validation::SchemaPackValidator;

/// Read a JSON or YAML file whose top level must be a mapping.
///
/// YAML is a superset of JSON, so a single YAML parse handles both formats.
pub fn read_json_or_yaml_mapping(path: &Path) -> Result<Map<String, Value>, ParsingError> {
    let text = fs::read_to_string(path).map_err(|e| ParsingError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_mapping(&text).map_err(|message| ParsingError {
        path: path.to_path_buf(),
        message,
    })
}

/// Load a schemapack from `path`, resolving external content schemas and
/// running all specification checks.
pub fn load_schemapack(path: &Path) -> Result<SchemaPack, LoadError> {
    let mut document = read_json_or_yaml_mapping(path).map_err(|source| LoadError::Parsing {
        spec_type: SpecType::SchemaPack,
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    resolve_content_paths(&mut document, base_dir)?;
    let schemapack = SchemaPack::from_value(Value::Object(document))?;
    debug!(path = %path.display(), classes = schemapack.classes.len(), "loaded schemapack");
    Ok(schemapack)
}

/// Load a datapack from `path` and run all specification checks.
pub fn load_datapack(path: &Path) -> Result<DataPack, LoadError> {
    let document = read_json_or_yaml_mapping(path).map_err(|source| LoadError::Parsing {
        spec_type: SpecType::DataPack,
        source,
    })?;
    let datapack = DataPack::from_value(Value::Object(document))?;
    debug!(path = %path.display(), resources = datapack.len(), "loaded datapack");
    Ok(datapack)
}

/// Load both documents and validate the datapack against the schemapack.
pub fn load_and_validate(
    schemapack_path: &Path,
    datapack_path: &Path,
) -> Result<(SchemaPack, DataPack), Error> {
    let schemapack = load_schemapack(schemapack_path)?;
    let datapack = load_datapack(datapack_path)?;
    SchemaPackValidator::new(&schemapack).validate(&datapack)?;
    Ok((schemapack, datapack))
}

impl SchemaPack {
    /// Deserialise and check a schemapack held in memory. String content
    /// schemas are not resolved here; use [`load_schemapack`] for that.
    pub fn from_value(value: Value) -> Result<Self, SpecError> {
        let schemapack: SchemaPack = serde_json::from_value(value)
            .map_err(|e| SpecError::single(SpecType::SchemaPack, e.to_string()))?;
        let violations = check_schemapack(&schemapack);
        if violations.is_empty() {
            Ok(schemapack)
        } else {
            Err(SpecError::new(SpecType::SchemaPack, violations))
        }
    }
}

impl DataPack {
    /// Deserialise and check a datapack held in memory.
    pub fn from_value(value: Value) -> Result<Self, SpecError> {
        let datapack: DataPack = serde_json::from_value(value)
            .map_err(|e| SpecError::single(SpecType::DataPack, e.to_string()))?;
        let violations = check_datapack(&datapack);
        if violations.is_empty() {
            Ok(datapack)
        } else {
            Err(SpecError::new(SpecType::DataPack, violations))
        }
    }
}

/// Cross-field schemapack checks. Returns every violation found, in class
/// order; an empty vector means the schemapack is conformant.
pub fn check_schemapack(schemapack: &SchemaPack) -> Vec<String> {
    let mut violations = Vec::new();

    if !SUPPORTED_SCHEMAPACK_VERSIONS.contains(&schemapack.version.as_str()) {
        violations.push(format!(
            "unsupported schemapack version {:?}, expected one of: {}",
            schemapack.version,
            SUPPORTED_SCHEMAPACK_VERSIONS.join(", ")
        ));
    }

    if schemapack.classes.is_empty() {
        violations.push("a schemapack must define at least one class".to_owned());
    }

    for (class_name, class) in &schemapack.classes {
        if !is_identifier(class_name) {
            violations.push(format!("class name {class_name:?} is not a valid identifier"));
        }
        if !is_identifier(&class.id.property_name) {
            violations.push(format!(
                "id property name {:?} of class '{class_name}' is not a valid identifier",
                class.id.property_name
            ));
        }

        if !class.content.describes_object() {
            violations.push(format!(
                "content schema of class '{class_name}' must declare type \"object\""
            ));
        }
        if let Err(e) = jsonschema::validator_for(&class.content.to_value()) {
            violations.push(format!(
                "content schema of class '{class_name}' is not a valid JSON Schema: {e}"
            ));
        }

        let content_properties = class.content.properties();
        let relation_names: BTreeSet<&str> = class.relations.keys().map(String::as_str).collect();
        let id_property = class.id.property_name.as_str();

        let overlap: Vec<&str> = content_properties.intersection(&relation_names).copied().collect();
        if !overlap.is_empty() {
            violations.push(format!(
                "class '{class_name}' uses the same names for content properties and relations: {}",
                overlap.join(", ")
            ));
        }
        if content_properties.contains(id_property) {
            violations.push(format!(
                "id property '{id_property}' of class '{class_name}' is also a content property"
            ));
        }
        if relation_names.contains(id_property) {
            violations.push(format!(
                "id property '{id_property}' of class '{class_name}' is also a relation name"
            ));
        }

        for (relation_name, relation) in &class.relations {
            if !is_identifier(relation_name) {
                violations.push(format!(
                    "relation name {relation_name:?} of class '{class_name}' is not a valid identifier"
                ));
            }
            if !schemapack.classes.contains_key(&relation.target_class) {
                violations.push(format!(
                    "relation '{relation_name}' of class '{class_name}' targets unknown class '{}'",
                    relation.target_class
                ));
            }
        }
    }

    if let Some(root_class) = &schemapack.root_class {
        if !schemapack.classes.contains_key(root_class) {
            violations.push(format!("root class '{root_class}' is not defined"));
        }
    }

    violations
}

/// Cross-field datapack checks. Conformance to a particular schemapack is the
/// job of [`crate::validation`], not this function.
pub fn check_datapack(datapack: &DataPack) -> Vec<String> {
    let mut violations = Vec::new();

    if !SUPPORTED_DATAPACK_VERSIONS.contains(&datapack.version.as_str()) {
        violations.push(format!(
            "unsupported datapack version {:?}, expected one of: {}",
            datapack.version,
            SUPPORTED_DATAPACK_VERSIONS.join(", ")
        ));
    }

    match (&datapack.root_resource, &datapack.root_class) {
        (Some(_), None) => violations.push("rootResource is set but rootClass is missing".to_owned()),
        (None, Some(_)) => violations.push("rootClass is set but rootResource is missing".to_owned()),
        _ => {}
    }

    for (class_name, resources) in &datapack.resources {
        if class_name.is_empty() {
            violations.push("class names must not be empty".to_owned());
        }
        if resources.contains_key("") {
            violations.push(format!("resource ids of class '{class_name}' must not be empty"));
        }
    }

    violations
}

// --- helpers -----------------------------------------------------------------

static IDENTIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap()
});

fn is_identifier(s: &str) -> bool {
    IDENTIFIER_RE.is_match(s)
}

fn parse_mapping(text: &str) -> Result<Map<String, Value>, String> {
    match serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string())? {
        Value::Object(map) => Ok(map),
        other => Err(format!(
            "expected a mapping at the top level, found {}",
            value_kind(&other)
        )),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// Replace every string-valued `classes.<name>.content` with the mapping read
/// from that path, relative to `base_dir`.
fn resolve_content_paths(document: &mut Map<String, Value>, base_dir: &Path) -> Result<(), SpecError> {
    let Some(Value::Object(classes)) = document.get_mut("classes") else {
        return Ok(());
    };
    let mut violations = Vec::new();
    for (class_name, class) in classes.iter_mut() {
        let Some(content) = class.get_mut("content") else {
            continue;
        };
        let Value::String(relative) = &*content else {
            continue;
        };
        let schema_path: PathBuf = base_dir.join(relative);
        match read_json_or_yaml_mapping(&schema_path) {
            Ok(schema) => *content = Value::Object(schema),
            Err(e) => violations.push(format!(
                "content schema of class '{class_name}' could not be loaded: {e}"
            )),
        }
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(SpecError::new(SpecType::SchemaPack, violations))
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schemapack_value() -> Value {
        json!({
            "schemapack": "0.3.0",
            "classes": {
                "File": {
                    "id": { "propertyName": "alias" },
                    "content": { "type": "object", "properties": { "size": { "type": "integer" } } },
                    "relations": {
                        "dataset": {
                            "targetClass": "Dataset",
                            "mandatory": { "origin": false, "target": true },
                            "multiple": { "origin": true, "target": false }
                        }
                    }
                },
                "Dataset": {
                    "id": { "propertyName": "alias" },
                    "content": { "type": "object" }
                }
            }
        })
    }

    #[test]
    fn valid_schemapack_accepted() {
        let schemapack = SchemaPack::from_value(schemapack_value()).unwrap();
        assert_eq!(schemapack.classes.len(), 2);
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut value = schemapack_value();
        value["schemapack"] = json!("9.9.9");
        let err = SchemaPack::from_value(value).unwrap_err();
        assert!(err.violations[0].contains("unsupported schemapack version"));
    }

    #[test]
    fn empty_classes_rejected() {
        let err = SchemaPack::from_value(json!({ "schemapack": "0.3.0", "classes": {} })).unwrap_err();
        assert_eq!(err.spec_type, SpecType::SchemaPack);
    }

    #[test]
    fn unknown_target_class_rejected() {
        let mut value = schemapack_value();
        value["classes"]["File"]["relations"]["dataset"]["targetClass"] = json!("Nope");
        let err = SchemaPack::from_value(value).unwrap_err();
        assert!(err.violations.iter().any(|v| v.contains("unknown class 'Nope'")));
    }

    #[test]
    fn content_relation_collision_rejected() {
        let mut value = schemapack_value();
        value["classes"]["File"]["content"]["properties"]["dataset"] = json!({ "type": "string" });
        let err = SchemaPack::from_value(value).unwrap_err();
        assert!(err.violations.iter().any(|v| v.contains("same names")));
    }

    #[test]
    fn id_property_collision_rejected() {
        let mut value = schemapack_value();
        value["classes"]["File"]["id"]["propertyName"] = json!("size");
        let err = SchemaPack::from_value(value).unwrap_err();
        assert!(err.violations.iter().any(|v| v.contains("is also a content property")));
    }

    #[test]
    fn non_object_content_schema_rejected() {
        let mut value = schemapack_value();
        value["classes"]["Dataset"]["content"] = json!({ "type": "string" });
        let err = SchemaPack::from_value(value).unwrap_err();
        assert!(err.violations.iter().any(|v| v.contains("must declare type")));
    }

    #[test]
    fn invalid_class_name_rejected() {
        let mut value = schemapack_value();
        let dataset = value["classes"]["Dataset"].clone();
        value["classes"]["1bad"] = dataset;
        let err = SchemaPack::from_value(value).unwrap_err();
        assert!(err.violations.iter().any(|v| v.contains("not a valid identifier")));
    }

    #[test]
    fn invalid_id_property_name_rejected() {
        let mut value = schemapack_value();
        value["classes"]["File"]["id"]["propertyName"] = json!("not an id!");
        let err = SchemaPack::from_value(value).unwrap_err();
        assert!(err
            .violations
            .iter()
            .any(|v| v.contains("id property name \"not an id!\" of class 'File'")));

        let mut value = schemapack_value();
        value["classes"]["File"]["id"]["propertyName"] = json!("");
        assert!(SchemaPack::from_value(value).is_err());
    }

    #[test]
    fn undefined_root_class_rejected() {
        let mut value = schemapack_value();
        value["rootClass"] = json!("Missing");
        let err = SchemaPack::from_value(value).unwrap_err();
        assert!(err.violations.iter().any(|v| v.contains("root class 'Missing'")));
    }

    #[test]
    fn half_rooted_datapack_rejected() {
        let err = DataPack::from_value(json!({
            "datapack": "0.3.0",
            "resources": {},
            "rootResource": "f1"
        }))
        .unwrap_err();
        assert_eq!(err.spec_type, SpecType::DataPack);
        assert!(err.violations[0].contains("rootClass is missing"));
    }

    #[test]
    fn duplicate_relation_ids_rejected_at_load() {
        let err = DataPack::from_value(json!({
            "datapack": "0.3.0",
            "resources": {
                "Dataset": {
                    "ds1": { "content": {}, "relations": { "files": ["f1", "f1"] } }
                }
            }
        }))
        .unwrap_err();
        assert!(err.violations[0].contains("duplicates"));
    }

    #[test]
    fn yaml_and_json_both_parse() {
        let yaml = parse_mapping("datapack: 0.3.0\nresources: {}\n").unwrap();
        let json = parse_mapping(r#"{"datapack": "0.3.0", "resources": {}}"#).unwrap();
        assert_eq!(yaml, json);
    }

    #[test]
    fn non_mapping_document_rejected() {
        let err = parse_mapping("- a\n- b\n").unwrap_err();
        assert!(err.contains("found a sequence"));
    }

    #[test]
    fn content_schema_path_resolved_relative_to_schemapack() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("file.schema.yaml"),
            "type: object\nproperties:\n  size:\n    type: integer\n",
        )
        .unwrap();
        let mut value = schemapack_value();
        value["classes"]["File"]["content"] = json!("file.schema.yaml");
        let path = dir.path().join("schemapack.json");
        fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        let schemapack = load_schemapack(&path).unwrap();
        assert!(schemapack.classes["File"].content.properties().contains("size"));
    }

    #[test]
    fn missing_content_schema_file_is_spec_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut value = schemapack_value();
        value["classes"]["File"]["content"] = json!("absent.json");
        let path = dir.path().join("schemapack.json");
        fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        let err = load_schemapack(&path).unwrap_err();
        assert!(matches!(err, LoadError::Spec(ref e) if e.spec_type == SpecType::SchemaPack));
    }

    #[test]
    fn missing_file_is_parsing_error() {
        let err = load_datapack(Path::new("/nonexistent/datapack.yaml")).unwrap_err();
        assert!(matches!(err, LoadError::Parsing { spec_type: SpecType::DataPack, .. }));
    }
}
