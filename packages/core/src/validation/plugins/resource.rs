use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};

use super::quoted;
use crate::types::{ClassDefinition, ClassName, DataPack, Relation, RelationName, Resource};
use crate::validation::{PluginError, ResourcePlugin};

/// Resource content must conform to the class's content schema.
///
/// The schema is compiled once per class. A schema that fails to compile
/// (only possible for schemapacks built in memory without the loader's checks)
/// turns every content check for that class into an error.
pub struct ContentSchemaPlugin {
    validator: Result<jsonschema::Validator, String>,
}

impl ResourcePlugin for ContentSchemaPlugin {
    fn does_apply(_class: &ClassDefinition) -> bool {
        true
    }

    fn new(class: &ClassDefinition) -> Self {
        Self {
            validator: jsonschema::validator_for(&class.content.to_value()).map_err(|e| e.to_string()),
        }
    }

    fn validate(
        &self,
        resource: &Resource,
        _resource_id: &str,
        _datapack: &DataPack,
    ) -> Result<(), PluginError> {
        let validator = match &self.validator {
            Ok(validator) => validator,
            Err(reason) => {
                return Err(PluginError::new(
                    "ContentValidationError",
                    format!("the content schema of the class could not be compiled: {reason}"),
                ))
            }
        };

        let content = Value::Object(resource.content.clone());
        let errors: Vec<String> = validator
            .iter_errors(&content)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();
        if errors.is_empty() {
            return Ok(());
        }
        Err(PluginError::new(
            "ContentValidationError",
            format!("the content of the resource does not conform to its schema: {}", errors.join("; ")),
        )
        .with_detail("errors", json!(errors)))
    }
}

/// Relation properties must be declared by the class.
pub struct UnknownRelationPlugin {
    expected: BTreeSet<RelationName>,
}

impl ResourcePlugin for UnknownRelationPlugin {
    fn does_apply(_class: &ClassDefinition) -> bool {
        true
    }

    fn new(class: &ClassDefinition) -> Self {
        Self {
            expected: class.relations.keys().cloned().collect(),
        }
    }

    fn validate(
        &self,
        resource: &Resource,
        _resource_id: &str,
        _datapack: &DataPack,
    ) -> Result<(), PluginError> {
        let unknown: Vec<&str> = resource
            .relations
            .keys()
            .filter(|name| !self.expected.contains(*name))
            .map(String::as_str)
            .collect();
        if unknown.is_empty() {
            return Ok(());
        }
        Err(PluginError::new(
            "UnknownRelationPropertyError",
            format!(
                "the resource has relation properties not defined by its class: {}",
                quoted(unknown.iter().copied())
            ),
        )
        .with_detail("unknown_relations", json!(unknown))
        .with_detail("expected_relations", json!(self.expected)))
    }
}

/// Every referenced target id must exist in the target class's slot.
pub struct TargetIdPlugin {
    target_classes: BTreeMap<RelationName, ClassName>,
}

impl ResourcePlugin for TargetIdPlugin {
    fn does_apply(class: &ClassDefinition) -> bool {
        !class.relations.is_empty()
    }

    fn new(class: &ClassDefinition) -> Self {
        Self {
            target_classes: class
                .relations
                .iter()
                .map(|(name, r)| (name.clone(), r.target_class.clone()))
                .collect(),
        }
    }

    fn validate(
        &self,
        resource: &Resource,
        _resource_id: &str,
        datapack: &DataPack,
    ) -> Result<(), PluginError> {
        let mut not_found: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (relation, target_class) in &self.target_classes {
            let targets = datapack.resources.get(target_class);
            let missing: Vec<&str> = resource
                .target_ids(relation)
                .into_iter()
                .filter(|id| !targets.is_some_and(|t| t.contains_key(*id)))
                .collect();
            if !missing.is_empty() {
                not_found.insert(relation, missing);
            }
        }

        if not_found.is_empty() {
            return Ok(());
        }
        let summary: Vec<String> = not_found
            .iter()
            .map(|(relation, ids)| format!("{relation}: {}", quoted(ids.iter().copied())))
            .collect();
        Err(PluginError::new(
            "TargetIdNotFoundError",
            format!(
                "the resource references target ids that do not exist in the datapack ({})",
                summary.join("; ")
            ),
        )
        .with_detail("non_found_target_ids_by_relation", json!(not_found)))
    }
}

/// The shape of a relation value must match `multiple.target`: a list for
/// to-many relations, a single id or null otherwise.
pub struct MultipleTargetPlugin {
    relations: BTreeMap<RelationName, Relation>,
}

impl ResourcePlugin for MultipleTargetPlugin {
    fn does_apply(class: &ClassDefinition) -> bool {
        !class.relations.is_empty()
    }

    fn new(class: &ClassDefinition) -> Self {
        Self {
            relations: class.relations.clone(),
        }
    }

    fn validate(
        &self,
        resource: &Resource,
        _resource_id: &str,
        _datapack: &DataPack,
    ) -> Result<(), PluginError> {
        let wrong: Vec<&str> = resource
            .relations
            .iter()
            .filter(|(name, value)| {
                self.relations
                    .get(*name)
                    .is_some_and(|relation| relation.multiple.target != value.is_many())
            })
            .map(|(name, _)| name.as_str())
            .collect();
        if wrong.is_empty() {
            return Ok(());
        }
        Err(PluginError::new(
            "CardinalityPluralityError",
            format!(
                "the following relations do not match the expected plurality of targets \
                 (a list for multiple targets, a single id otherwise): {}",
                quoted(wrong.iter().copied())
            ),
        )
        .with_detail("wrong_relations", json!(wrong)))
    }
}

/// Relations with `mandatory.target` must name at least one target.
///
/// An absent relation property, `null`, and an empty list all count as
/// missing.
pub struct MissingMandatoryTargetPlugin {
    mandatory: Vec<RelationName>,
}

impl ResourcePlugin for MissingMandatoryTargetPlugin {
    fn does_apply(class: &ClassDefinition) -> bool {
        class.relations.values().any(|r| r.mandatory.target)
    }

    fn new(class: &ClassDefinition) -> Self {
        Self {
            mandatory: class
                .relations
                .iter()
                .filter(|(_, r)| r.mandatory.target)
                .map(|(name, _)| name.clone())
                .collect(),
        }
    }

    fn validate(
        &self,
        resource: &Resource,
        _resource_id: &str,
        _datapack: &DataPack,
    ) -> Result<(), PluginError> {
        let missing: Vec<&str> = self
            .mandatory
            .iter()
            .filter(|relation| resource.target_ids(relation).is_empty())
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(PluginError::new(
            "MissingMandatoryTargetError",
            format!(
                "the following mandatory relations have no targets: {}",
                quoted(missing.iter().copied())
            ),
        )
        .with_detail("relations_with_missing_targets", json!(missing)))
    }
}

// --- tests -------------------------------------------------------------------
