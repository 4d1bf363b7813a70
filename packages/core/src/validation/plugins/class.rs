use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;

use super::quoted;
use crate::types::{ClassDefinition, ClassName, DataPack, RelationName, Resource, ResourceId};
use crate::validation::{ClassPlugin, PluginError};

/// For relations with `mandatory.origin`, every resource of the target class
/// must be referenced by at least one resource of this class.
pub struct MissingMandatoryOriginPlugin {
    targets_by_relation: BTreeMap<RelationName, ClassName>,
}

impl ClassPlugin for MissingMandatoryOriginPlugin {
    fn does_apply(class: &ClassDefinition) -> bool {
        class.relations.values().any(|r| r.mandatory.origin)
    }

    fn new(class: &ClassDefinition) -> Self {
        Self {
            targets_by_relation: class
                .relations
                .iter()
                .filter(|(_, r)| r.mandatory.origin)
                .map(|(name, r)| (name.clone(), r.target_class.clone()))
                .collect(),
        }
    }

    fn validate(
        &self,
        class_resources: &BTreeMap<ResourceId, Resource>,
        datapack: &DataPack,
    ) -> Result<(), PluginError> {
        let mut not_referenced: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (relation, target_class) in &self.targets_by_relation {
            let referenced: BTreeSet<&str> = class_resources
                .values()
                .flat_map(|resource| resource.target_ids(relation))
                .collect();
            let unreferenced: Vec<&str> = datapack
                .resources
                .get(target_class)
                .into_iter()
                .flat_map(|targets| targets.keys())
                .map(String::as_str)
                .filter(|id| !referenced.contains(id))
                .collect();
            if !unreferenced.is_empty() {
                not_referenced.insert(relation, unreferenced);
            }
        }

        if not_referenced.is_empty() {
            return Ok(());
        }
        let summary: Vec<String> = not_referenced
            .iter()
            .map(|(relation, ids)| format!("{relation}: {}", quoted(ids.iter().copied())))
            .collect();
        Err(PluginError::new(
            "MissingMandatoryOriginError",
            format!(
                "some target resources are not referenced by any origin although the relation \
                 is mandatory on the origin side ({})",
                summary.join("; ")
            ),
        )
        .with_detail("not_referenced_targets_by_relation", json!(not_referenced)))
    }
}

/// For relations with `multiple.origin == false`, a target id may appear in
/// at most one resource of this class.
pub struct TargetOverlapPlugin {
    relations: Vec<RelationName>,
}

impl ClassPlugin for TargetOverlapPlugin {
    fn does_apply(class: &ClassDefinition) -> bool {
        class.relations.values().any(|r| !r.multiple.origin)
    }

    fn new(class: &ClassDefinition) -> Self {
        Self {
            relations: class
                .relations
                .iter()
                .filter(|(_, r)| !r.multiple.origin)
                .map(|(name, _)| name.clone())
                .collect(),
        }
    }

    fn validate(
        &self,
        class_resources: &BTreeMap<ResourceId, Resource>,
        _datapack: &DataPack,
    ) -> Result<(), PluginError> {
        let mut overlapping: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for relation in &self.relations {
            let mut claims: BTreeMap<&str, usize> = BTreeMap::new();
            for resource in class_resources.values() {
                for target in resource.target_ids(relation) {
                    *claims.entry(target).or_default() += 1;
                }
            }
            let repeated: Vec<&str> = claims
                .into_iter()
                .filter(|(_, count)| *count > 1)
                .map(|(id, _)| id)
                .collect();
            if !repeated.is_empty() {
                overlapping.insert(relation, repeated);
            }
        }

        if overlapping.is_empty() {
            return Ok(());
        }
        let summary: Vec<String> = overlapping
            .iter()
            .map(|(relation, ids)| format!("{relation}: {}", quoted(ids.iter().copied())))
            .collect();
        Err(PluginError::new(
            "CardinalityOverlapError",
            format!(
                "some target resources are referenced by more than one origin although the \
                 relation does not allow multiple origins ({})",
                summary.join("; ")
            ),
        )
        .with_detail("overlapping_ids_by_relation", json!(overlapping)))
    }
}

// --- tests -------------------------------------------------------------------
