//! Dependency analysis and isolation of rooted subsets.
//!
//! Relations form a directed graph over resources (and, one level up, over
//! classes). Isolation extracts the part of that graph reachable from one
//! resource (or class) and packages it as a self-contained datapack (or
//! schemapack) rooted at the starting point.
//!
//! Traversal is depth-first with a visited set, so cyclic relations
//! terminate. All functions assume the datapack has already been validated
//! against the schemapack; inconsistencies surface as
//! [`ValidationAssumptionError`] rather than being re-diagnosed.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, trace};

use crate::error::{NotFoundError, SpecType, ValidationAssumptionError};
use crate::types::{ClassDefinition, ClassName, DataPack, ResourceId, SchemaPack};

/// Resource ids grouped by class name.
pub type ResourceMap = BTreeMap<ClassName, BTreeSet<ResourceId>>;

/// Errors produced by dependency analysis and isolation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IsolationError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    ValidationAssumption(#[from] ValidationAssumptionError),
}

/// All resources reachable from `(class_name, resource_id)` by following
/// relations transitively.
///
/// The start resource is included only if `include_target` is set, even when
/// a cycle leads back to it.
pub fn identify_resource_dependencies(
    schemapack: &SchemaPack,
    datapack: &DataPack,
    class_name: &str,
    resource_id: &str,
    include_target: bool,
) -> Result<ResourceMap, IsolationError> {
    let mut visited = BTreeSet::from([(class_name.to_owned(), resource_id.to_owned())]);
    let mut dependencies = ResourceMap::new();
    collect_resource_dependencies(
        schemapack,
        datapack,
        (class_name, resource_id),
        (class_name, resource_id),
        &mut visited,
        &mut dependencies,
    )?;
    if include_target {
        dependencies
            .entry(class_name.to_owned())
            .or_default()
            .insert(resource_id.to_owned());
    }
    debug!(
        class = class_name,
        resource = resource_id,
        dependencies = dependencies.values().map(BTreeSet::len).sum::<usize>(),
        "identified resource dependencies"
    );
    Ok(dependencies)
}

/// All classes reachable from `class_name` by following relation target
/// classes transitively, excluding `class_name` itself.
pub fn identify_class_dependencies(
    schemapack: &SchemaPack,
    class_name: &str,
) -> Result<BTreeSet<ClassName>, NotFoundError> {
    let mut visited = BTreeSet::from([class_name.to_owned()]);
    let mut stack = vec![class_name.to_owned()];

    while let Some(current) = stack.pop() {
        let class = schemapack
            .classes
            .get(&current)
            .ok_or_else(|| NotFoundError::class(&current, SpecType::SchemaPack))?;
        for relation in class.relations.values() {
            if visited.insert(relation.target_class.clone()) {
                stack.push(relation.target_class.clone());
            }
        }
    }

    visited.remove(class_name);
    Ok(visited)
}

/// A copy of `datapack` containing only the resources named in
/// `resource_map`. Class slots not named in the map are dropped; root fields
/// are preserved.
///
/// With `ignore_missing`, names absent from the datapack are skipped instead
/// of producing a [`NotFoundError`].
pub fn downscope_datapack(
    datapack: &DataPack,
    resource_map: &ResourceMap,
    ignore_missing: bool,
) -> Result<DataPack, NotFoundError> {
    let mut resources = BTreeMap::new();
    for (class_name, ids) in resource_map {
        let Some(class_resources) = datapack.resources.get(class_name) else {
            if ignore_missing {
                continue;
            }
            return Err(NotFoundError::class(class_name, SpecType::DataPack));
        };
        let mut kept = BTreeMap::new();
        for id in ids {
            match class_resources.get(id) {
                Some(resource) => {
                    kept.insert(id.clone(), resource.clone());
                }
                None if ignore_missing => {}
                None => return Err(NotFoundError::resource(class_name, id)),
            }
        }
        resources.insert(class_name.clone(), kept);
    }

    Ok(DataPack {
        version: datapack.version.clone(),
        resources,
        root_resource: datapack.root_resource.clone(),
        root_class: datapack.root_class.clone(),
    })
}

/// A copy of `schemapack` containing only the named classes. The root class
/// is preserved.
pub fn downscope_schemapack(
    schemapack: &SchemaPack,
    class_names: &BTreeSet<ClassName>,
) -> Result<SchemaPack, NotFoundError> {
    let classes: BTreeMap<ClassName, ClassDefinition> = class_names
        .iter()
        .map(|name| {
            schemapack
                .classes
                .get(name)
                .map(|class| (name.clone(), class.clone()))
                .ok_or_else(|| NotFoundError::class(name, SpecType::SchemaPack))
        })
        .collect::<Result<_, _>>()?;

    Ok(SchemaPack {
        version: schemapack.version.clone(),
        description: schemapack.description.clone(),
        classes,
        root_class: schemapack.root_class.clone(),
    })
}

/// The datapack of everything `(class_name, resource_id)` depends on, rooted
/// at that resource.
pub fn isolate_resource(
    schemapack: &SchemaPack,
    datapack: &DataPack,
    class_name: &str,
    resource_id: &str,
) -> Result<DataPack, IsolationError> {
    let dependencies =
        identify_resource_dependencies(schemapack, datapack, class_name, resource_id, true)?;
    let mut isolated = downscope_datapack(datapack, &dependencies, false)?;
    isolated.root_class = Some(class_name.to_owned());
    isolated.root_resource = Some(resource_id.to_owned());
    Ok(isolated)
}

/// The schemapack of `class_name` and every class it depends on, rooted at
/// `class_name`.
pub fn isolate_class(schemapack: &SchemaPack, class_name: &str) -> Result<SchemaPack, IsolationError> {
    let mut classes = identify_class_dependencies(schemapack, class_name)?;
    classes.insert(class_name.to_owned());
    let mut isolated = downscope_schemapack(schemapack, &classes)?;
    isolated.root_class = Some(class_name.to_owned());
    Ok(isolated)
}

/// Isolate both documents around one resource.
///
/// The rooted datapack receives an empty slot for every class of the rooted
/// schemapack that none of the isolated resources belong to.
pub fn isolate(
    schemapack: &SchemaPack,
    datapack: &DataPack,
    class_name: &str,
    resource_id: &str,
) -> Result<(SchemaPack, DataPack), IsolationError> {
    let rooted_schemapack = isolate_class(schemapack, class_name)?;
    let mut rooted_datapack = isolate_resource(schemapack, datapack, class_name, resource_id)?;
    for class in rooted_schemapack.classes.keys() {
        rooted_datapack.resources.entry(class.clone()).or_default();
    }
    Ok((rooted_schemapack, rooted_datapack))
}

// --- helpers -----------------------------------------------------------------

fn collect_resource_dependencies(
    schemapack: &SchemaPack,
    datapack: &DataPack,
    start: (&str, &str),
    (class_name, resource_id): (&str, &str),
    visited: &mut BTreeSet<(ClassName, ResourceId)>,
    dependencies: &mut ResourceMap,
) -> Result<(), IsolationError> {
    let class_resources = datapack
        .resources
        .get(class_name)
        .ok_or_else(|| NotFoundError::class(class_name, SpecType::DataPack))?;
    let resource = class_resources
        .get(resource_id)
        .ok_or_else(|| NotFoundError::resource(class_name, resource_id))?;
    let class = schemapack
        .classes
        .get(class_name)
        .ok_or_else(|| NotFoundError::class(class_name, SpecType::SchemaPack))?;
    trace!(class = class_name, resource = resource_id, "expanding resource");

    for (relation_name, value) in &resource.relations {
        let relation = class
            .relations
            .get(relation_name)
            .ok_or_else(|| ValidationAssumptionError::new("relation resolution in schemapack"))?;
        let target_class = relation.target_class.as_str();

        for target_id in value.target_ids() {
            if (target_class, target_id) != start {
                dependencies
                    .entry(target_class.to_owned())
                    .or_default()
                    .insert(target_id.to_owned());
            }
            if visited.insert((target_class.to_owned(), target_id.to_owned())) {
                collect_resource_dependencies(
                    schemapack,
                    datapack,
                    start,
                    (target_class, target_id),
                    visited,
                    dependencies,
                )?;
            }
        }
    }
    Ok(())
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentSchema, Mandatory, Multiple, Relation, RelationValue, Resource};
    use serde_json::json;

    fn relation(target: &str, many: bool) -> Relation {
        Relation::new(
            target,
            Mandatory { origin: false, target: false },
            Multiple { origin: true, target: many },
        )
    }

    /// A -> B (many), B -> C (one), C -> A (one), D unrelated.
    fn schemapack() -> SchemaPack {
        let object = ContentSchema::from(json!({ "type": "object" }));
        SchemaPack {
            version: "0.3.0".into(),
            description: None,
            classes: BTreeMap::from([
                ("A".to_owned(), ClassDefinition::new("id", object.clone()).with_relation("bs", relation("B", true))),
                ("B".to_owned(), ClassDefinition::new("id", object.clone()).with_relation("c", relation("C", false))),
                ("C".to_owned(), ClassDefinition::new("id", object.clone()).with_relation("a", relation("A", false))),
                ("D".to_owned(), ClassDefinition::new("id", object)),
            ]),
            root_class: None,
        }
    }

    fn datapack() -> DataPack {
        let mut datapack = DataPack::new("0.3.0");
        datapack.resources = BTreeMap::from([
            (
                "A".to_owned(),
                BTreeMap::from([
                    ("a1".to_owned(), Resource::default().with_relation("bs", RelationValue::many(["b1", "b2"]))),
                    ("a2".to_owned(), Resource::default().with_relation("bs", RelationValue::many(Vec::<String>::new()))),
                ]),
            ),
            (
                "B".to_owned(),
                BTreeMap::from([
                    ("b1".to_owned(), Resource::default().with_relation("c", RelationValue::from("c1"))),
                    ("b2".to_owned(), Resource::default().with_relation("c", RelationValue::None)),
                ]),
            ),
            (
                "C".to_owned(),
                BTreeMap::from([("c1".to_owned(), Resource::default().with_relation("a", RelationValue::from("a1")))]),
            ),
            ("D".to_owned(), BTreeMap::from([("d1".to_owned(), Resource::default())])),
        ]);
        datapack
    }

    fn ids(map: &ResourceMap, class: &str) -> Vec<String> {
        map.get(class).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    #[test]
    fn resource_dependencies_follow_cycle_without_start() {
        let deps = identify_resource_dependencies(&schemapack(), &datapack(), "A", "a1", false).unwrap();
        assert_eq!(ids(&deps, "A"), Vec::<String>::new());
        assert_eq!(ids(&deps, "B"), ["b1", "b2"]);
        assert_eq!(ids(&deps, "C"), ["c1"]);
        assert!(!deps.contains_key("D"));
    }

    #[test]
    fn resource_dependencies_include_target_on_request() {
        let deps = identify_resource_dependencies(&schemapack(), &datapack(), "A", "a1", true).unwrap();
        assert_eq!(ids(&deps, "A"), ["a1"]);
    }

    #[test]
    fn leaf_resource_has_no_dependencies() {
        let deps = identify_resource_dependencies(&schemapack(), &datapack(), "D", "d1", false).unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn unknown_start_resource() {
        let err = identify_resource_dependencies(&schemapack(), &datapack(), "A", "a9", false).unwrap_err();
        assert_eq!(err, IsolationError::NotFound(NotFoundError::resource("A", "a9")));
    }

    #[test]
    fn undeclared_relation_breaks_assumption() {
        let mut dp = datapack();
        dp.resources.get_mut("D").unwrap().insert(
            "d2".into(),
            Resource::default().with_relation("ghost", RelationValue::from("a1")),
        );
        let err = identify_resource_dependencies(&schemapack(), &dp, "D", "d2", false).unwrap_err();
        assert!(matches!(err, IsolationError::ValidationAssumption(_)));
    }

    #[test]
    fn class_dependencies_are_transitive() {
        let deps = identify_class_dependencies(&schemapack(), "B").unwrap();
        assert_eq!(deps, BTreeSet::from(["A".to_owned(), "C".to_owned()]));
        assert!(identify_class_dependencies(&schemapack(), "D").unwrap().is_empty());
    }

    #[test]
    fn downscope_strict_and_lenient() {
        let map = ResourceMap::from([("B".to_owned(), BTreeSet::from(["b1".to_owned(), "b9".to_owned()]))]);
        let err = downscope_datapack(&datapack(), &map, false).unwrap_err();
        assert_eq!(err, NotFoundError::resource("B", "b9"));

        let lenient = downscope_datapack(&datapack(), &map, true).unwrap();
        assert_eq!(lenient.resources.len(), 1);
        assert_eq!(lenient.resources["B"].len(), 1);
    }

    #[test]
    fn isolate_resource_is_rooted() {
        let isolated = isolate_resource(&schemapack(), &datapack(), "B", "b2").unwrap();
        assert_eq!(isolated.root(), Some(("B", "b2")));
        assert_eq!(isolated.len(), 1);
    }

    #[test]
    fn isolate_class_keeps_closure() {
        let isolated = isolate_class(&schemapack(), "D").unwrap();
        assert_eq!(isolated.root_class.as_deref(), Some("D"));
        assert_eq!(isolated.classes.keys().collect::<Vec<_>>(), ["D"]);
    }

    #[test]
    fn isolate_pads_empty_slots() {
        let (sp, dp) = isolate(&schemapack(), &datapack(), "A", "a2").unwrap();
        assert_eq!(sp.classes.len(), 3);
        assert_eq!(dp.resources.keys().collect::<Vec<_>>(), ["A", "B", "C"]);
        assert!(dp.resources["B"].is_empty());
        assert_eq!(dp.len(), 1);
    }
}
