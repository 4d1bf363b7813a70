//! Denormalization: turn a rooted datapack into a nested JSON document.
//!
//! Starting from the root resource, each resource becomes an object holding
//! its id (under the class's id property), its content, and one entry per
//! relation. Embedded relations are replaced by the target resources'
//! denormalized objects; the rest keep their bare ids.
//!
//! Each resource is expanded independently per path, so a resource reachable
//! along two paths appears twice. A resource that would contain itself is a
//! [`DenormalizationError::CircularRelation`]; an embedding profile can break
//! such cycles by switching embedding off for one of the relations.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, trace};

use crate::embedding::EmbeddingProfile;
use crate::error::ValidationAssumptionError;
use crate::types::{DataPack, RelationValue, SchemaPack};

/// Errors produced by [`denormalize`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DenormalizationError {
    #[error("the datapack must be rooted to be denormalized: {0}")]
    NotRooted(&'static str),

    #[error(transparent)]
    ValidationAssumption(#[from] ValidationAssumptionError),

    #[error(
        "cannot denormalize a datapack with circular relations; the circle passes through \
         resource '{resource_id}' of class '{class_name}'"
    )]
    CircularRelation {
        class_name: String,
        resource_id: String,
    },
}

/// Denormalize the rooted `datapack`.
///
/// The datapack is assumed to be valid against `schemapack`. Without an
/// `embedding_profile`, every relation is embedded.
pub fn denormalize(
    schemapack: &SchemaPack,
    datapack: &DataPack,
    embedding_profile: Option<&EmbeddingProfile>,
) -> Result<Map<String, Value>, DenormalizationError> {
    let root_resource = datapack
        .root_resource
        .as_deref()
        .ok_or(DenormalizationError::NotRooted("no root resource is set"))?;
    let root_class = datapack
        .root_class
        .as_deref()
        .ok_or(DenormalizationError::NotRooted("no root class is set"))?;

    debug!(class = root_class, resource = root_resource, "denormalizing datapack");
    let denormalizer = Denormalizer {
        schemapack,
        datapack,
    };
    denormalizer.resource(root_class, root_resource, embedding_profile, &BTreeSet::new())
}

/// `(class name, resource id)` pairs on the current path that must not be
/// embedded again.
type Ancestors<'a> = BTreeSet<(&'a str, &'a str)>;

struct Denormalizer<'a> {
    schemapack: &'a SchemaPack,
    datapack: &'a DataPack,
}

impl<'a> Denormalizer<'a> {
    fn resource(
        &self,
        class_name: &'a str,
        resource_id: &'a str,
        profile: Option<&EmbeddingProfile>,
        ancestors: &Ancestors<'a>,
    ) -> Result<Map<String, Value>, DenormalizationError> {
        trace!(class = class_name, resource = resource_id, "denormalizing resource");
        // A non-empty profile lets the resource reappear below itself; the
        // profile shrinks with depth, so the recursion still ends.
        let mut ancestors = ancestors.clone();
        if profile.map_or(true, EmbeddingProfile::is_empty) {
            ancestors.insert((class_name, resource_id));
        }

        let resource = self
            .datapack
            .resources
            .get(class_name)
            .ok_or_else(|| ValidationAssumptionError::new("root class lookup"))?
            .get(resource_id)
            .ok_or_else(|| ValidationAssumptionError::new("root resource lookup"))?;
        let class = self
            .schemapack
            .classes
            .get(class_name)
            .ok_or_else(|| ValidationAssumptionError::new("class lookup in schemapack"))?;

        let mut out = Map::new();
        out.insert(class.id.property_name.clone(), Value::String(resource_id.to_owned()));
        for (key, value) in &resource.content {
            out.insert(key.clone(), value.clone());
        }

        for (relation_name, value) in &resource.relations {
            let relation = class
                .relations
                .get(relation_name)
                .ok_or_else(|| ValidationAssumptionError::new("relation resolution in schemapack"))?;

            if !profile.map_or(true, |p| p.should_embed(relation_name)) {
                out.insert(relation_name.clone(), value.to_json());
                continue;
            }

            let nested = profile.and_then(|p| p.nested(relation_name));
            let target_class = relation.target_class.as_str();
            let embedded = match value {
                RelationValue::None => Value::Null,
                RelationValue::One(id) => {
                    Value::Object(self.embed(target_class, id, nested, &ancestors)?)
                }
                RelationValue::Many(ids) => Value::Array(
                    ids.iter()
                        .map(|id| self.embed(target_class, id, nested, &ancestors).map(Value::Object))
                        .collect::<Result<_, _>>()?,
                ),
            };
            out.insert(relation_name.clone(), embedded);
        }

        Ok(out)
    }

    fn embed(
        &self,
        class_name: &'a str,
        resource_id: &'a str,
        profile: Option<&EmbeddingProfile>,
        ancestors: &Ancestors<'a>,
    ) -> Result<Map<String, Value>, DenormalizationError> {
        if ancestors.contains(&(class_name, resource_id)) {
            return Err(DenormalizationError::CircularRelation {
                class_name: class_name.to_owned(),
                resource_id: resource_id.to_owned(),
            });
        }
        self.resource(class_name, resource_id, profile, ancestors)
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use serde_json::json;

    use crate::types::{ClassDefinition, ContentSchema, Mandatory, Multiple, Relation, Resource};

    fn schemapack_ab() -> SchemaPack {
        let object = ContentSchema::from(json!({ "type": "object" }));
        let to = |target: &str| {
            Relation::new(
                target,
                Mandatory { origin: false, target: false },
                Multiple { origin: true, target: false },
            )
        };
        SchemaPack {
            version: "0.3.0".into(),
            description: None,
            classes: BTreeMap::from([
                ("A".to_owned(), ClassDefinition::new("id", object.clone()).with_relation("b", to("B"))),
                ("B".to_owned(), ClassDefinition::new("id", object).with_relation("a", to("A"))),
            ]),
            root_class: Some("A".into()),
        }
    }

    fn rooted(resources: Vec<(&str, &str, Resource)>) -> DataPack {
        let mut datapack = DataPack::new("0.3.0");
        for (class, id, resource) in resources {
            datapack
                .resources
                .entry(class.to_owned())
                .or_default()
                .insert(id.to_owned(), resource);
        }
        datapack.root_class = Some("A".into());
        datapack.root_resource = Some("a1".into());
        datapack
    }

    #[test]
    fn unrooted_datapack_rejected() {
        let err = denormalize(&schemapack_ab(), &DataPack::new("0.3.0"), None).unwrap_err();
        assert!(matches!(err, DenormalizationError::NotRooted(_)));
    }

    #[test]
    fn missing_root_breaks_assumption() {
        let mut dp = rooted(vec![("A", "a2", Resource::default())]);
        dp.root_resource = Some("a1".into());
        let err = denormalize(&schemapack_ab(), &dp, None).unwrap_err();
        assert_eq!(
            err,
            DenormalizationError::ValidationAssumption(ValidationAssumptionError::new("root resource lookup"))
        );
    }

    #[test]
    fn two_cycle_detected() {
        let dp = rooted(vec![
            ("A", "a1", Resource::default().with_relation("b", RelationValue::from("b1"))),
            ("B", "b1", Resource::default().with_relation("a", RelationValue::from("a1"))),
        ]);
        let err = denormalize(&schemapack_ab(), &dp, None).unwrap_err();
        assert_eq!(
            err,
            DenormalizationError::CircularRelation {
                class_name: "A".into(),
                resource_id: "a1".into()
            }
        );
    }

    #[test]
    fn profile_breaks_cycle() {
        let dp = rooted(vec![
            ("A", "a1", Resource::default().with_relation("b", RelationValue::from("b1"))),
            ("B", "b1", Resource::default().with_relation("a", RelationValue::from("a1"))),
        ]);
        let profile = EmbeddingProfile::new().with_nested("b", EmbeddingProfile::new().with_flag("a", false));
        let out = denormalize(&schemapack_ab(), &dp, Some(&profile)).unwrap();
        assert_eq!(Value::Object(out), json!({ "id": "a1", "b": { "id": "b1", "a": "a1" } }));
    }

    #[test]
    fn null_relation_stays_null() {
        let dp = rooted(vec![("A", "a1", Resource::default().with_relation("b", RelationValue::None))]);
        let out = denormalize(&schemapack_ab(), &dp, None).unwrap();
        assert_eq!(out["b"], Value::Null);

        let profile = EmbeddingProfile::new().with_flag("b", false);
        let out = denormalize(&schemapack_ab(), &dp, Some(&profile)).unwrap();
        assert_eq!(out["b"], Value::Null);
    }
}
