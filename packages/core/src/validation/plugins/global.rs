use std::collections::BTreeSet;

use serde_json::json;

use super::quoted;
use crate::types::{ClassName, DataPack, SchemaPack};
use crate::validation::{GlobalPlugin, PluginError};

/// Every schemapack class must have a slot in `resources`, even if empty.
pub struct MissingClassSlotPlugin {
    classes: BTreeSet<ClassName>,
}

impl GlobalPlugin for MissingClassSlotPlugin {
    fn does_apply(_schemapack: &SchemaPack) -> bool {
        true
    }

    fn new(schemapack: &SchemaPack) -> Self {
        Self {
            classes: schemapack.classes.keys().cloned().collect(),
        }
    }

    fn validate(&self, datapack: &DataPack) -> Result<(), PluginError> {
        let missing: Vec<&str> = self
            .classes
            .iter()
            .filter(|class| !datapack.resources.contains_key(*class))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(PluginError::new(
            "MissingClassSlotError",
            format!(
                "the datapack is missing slots for the following classes: {}",
                quoted(missing.iter().copied())
            ),
        )
        .with_detail("missing_classes", json!(missing)))
    }
}

/// `resources` must not contain classes the schemapack does not define.
pub struct UnknownClassSlotPlugin {
    classes: BTreeSet<ClassName>,
}

impl GlobalPlugin for UnknownClassSlotPlugin {
    fn does_apply(_schemapack: &SchemaPack) -> bool {
        true
    }

    fn new(schemapack: &SchemaPack) -> Self {
        Self {
            classes: schemapack.classes.keys().cloned().collect(),
        }
    }

    fn validate(&self, datapack: &DataPack) -> Result<(), PluginError> {
        let unknown: Vec<&str> = datapack
            .resources
            .keys()
            .filter(|class| !self.classes.contains(*class))
            .map(String::as_str)
            .collect();
        if unknown.is_empty() {
            return Ok(());
        }
        Err(PluginError::new(
            "UnknownClassSlotError",
            format!(
                "the datapack contains slots for classes not defined in the schemapack: {}",
                quoted(unknown.iter().copied())
            ),
        )
        .with_detail("unknown_classes", json!(unknown)))
    }
}

/// Without a schemapack root, the datapack must not declare one.
pub struct UnexpectedRootPlugin;

impl GlobalPlugin for UnexpectedRootPlugin {
    fn does_apply(schemapack: &SchemaPack) -> bool {
        schemapack.root_class.is_none()
    }

    fn new(_schemapack: &SchemaPack) -> Self {
        UnexpectedRootPlugin
    }

    fn validate(&self, datapack: &DataPack) -> Result<(), PluginError> {
        if datapack.root_resource.is_none() && datapack.root_class.is_none() {
            return Ok(());
        }
        Err(PluginError::new(
            "UnexpectedRootDefinitionError",
            "the schemapack does not define a root class, but the datapack defines a root",
        )
        .with_detail("root_resource", json!(datapack.root_resource))
        .with_detail("root_class", json!(datapack.root_class)))
    }
}

/// With a schemapack root, the datapack must name a root resource of that
/// class.
pub struct ExpectedRootPlugin {
    root_class: ClassName,
}

impl GlobalPlugin for ExpectedRootPlugin {
    fn does_apply(schemapack: &SchemaPack) -> bool {
        schemapack.root_class.is_some()
    }

    fn new(schemapack: &SchemaPack) -> Self {
        Self {
            root_class: schemapack.root_class.clone().unwrap_or_default(),
        }
    }

    fn validate(&self, datapack: &DataPack) -> Result<(), PluginError> {
        if datapack.root_resource.is_none() {
            return Err(PluginError::new(
                "ExpectedRootResourceError",
                format!(
                    "the schemapack defines the root class '{}', but the datapack has no root resource",
                    self.root_class
                ),
            ));
        }
        if datapack.root_class.as_deref() != Some(self.root_class.as_str()) {
            return Err(PluginError::new(
                "RootClassMismatchError",
                format!(
                    "the datapack's root class does not match the schemapack's root class '{}'",
                    self.root_class
                ),
            )
            .with_detail("expected_root_class", json!(self.root_class))
            .with_detail("root_class", json!(datapack.root_class)));
        }
        Ok(())
    }
}

/// A declared root resource must exist among the root class's resources.
///
/// A missing root resource or a missing class slot is reported by the plugins
/// above, so both are ignored here.
pub struct RootResourceExistencePlugin {
    root_class: ClassName,
}

impl GlobalPlugin for RootResourceExistencePlugin {
    fn does_apply(schemapack: &SchemaPack) -> bool {
        schemapack.root_class.is_some()
    }

    fn new(schemapack: &SchemaPack) -> Self {
        Self {
            root_class: schemapack.root_class.clone().unwrap_or_default(),
        }
    }

    fn validate(&self, datapack: &DataPack) -> Result<(), PluginError> {
        let Some(root_resource) = &datapack.root_resource else {
            return Ok(());
        };
        let Some(resources) = datapack.resources.get(&self.root_class) else {
            return Ok(());
        };
        if resources.contains_key(root_resource) {
            return Ok(());
        }
        Err(PluginError::new(
            "UnknownRootResourceError",
            format!(
                "the root resource '{root_resource}' does not exist among the resources of class '{}'",
                self.root_class
            ),
        )
        .with_detail("root_resource", json!(root_resource))
        .with_detail("root_class", json!(self.root_class)))
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::types::{ClassDefinition, ContentSchema, Resource};

    fn schemapack(classes: &[&str], root_class: Option<&str>) -> SchemaPack {
        SchemaPack {
            version: "0.3.0".into(),
            description: None,
            classes: classes
                .iter()
                .map(|c| {
                    (
                        c.to_string(),
                        ClassDefinition::new("id", ContentSchema::from(json!({ "type": "object" }))),
                    )
                })
                .collect(),
            root_class: root_class.map(str::to_owned),
        }
    }

    fn datapack(slots: &[(&str, &[&str])]) -> DataPack {
        let mut datapack = DataPack::new("0.3.0");
        for (class, ids) in slots {
            datapack.resources.insert(
                class.to_string(),
                ids.iter().map(|id| (id.to_string(), Resource::default())).collect::<BTreeMap<_, _>>(),
            );
        }
        datapack
    }

    #[test]
    fn missing_slots_listed() {
        let plugin = MissingClassSlotPlugin::new(&schemapack(&["A", "B", "C"], None));
        let err = plugin.validate(&datapack(&[("B", &[])])).unwrap_err();
        assert_eq!(err.type_, "MissingClassSlotError");
        assert_eq!(err.details["missing_classes"], json!(["A", "C"]));
    }

    #[test]
    fn empty_slot_is_enough() {
        let plugin = MissingClassSlotPlugin::new(&schemapack(&["A"], None));
        plugin.validate(&datapack(&[("A", &[])])).unwrap();
    }

    #[test]
    fn unknown_slots_listed() {
        let plugin = UnknownClassSlotPlugin::new(&schemapack(&["A"], None));
        let err = plugin.validate(&datapack(&[("A", &[]), ("Z", &[])])).unwrap_err();
        assert_eq!(err.details["unknown_classes"], json!(["Z"]));
    }

    #[test]
    fn unexpected_root_reported() {
        let sp = schemapack(&["A"], None);
        assert!(UnexpectedRootPlugin::does_apply(&sp));
        let mut dp = datapack(&[("A", &["a1"])]);
        dp.root_class = Some("A".into());
        dp.root_resource = Some("a1".into());
        let err = UnexpectedRootPlugin::new(&sp).validate(&dp).unwrap_err();
        assert_eq!(err.type_, "UnexpectedRootDefinitionError");
    }

    #[test]
    fn expected_root_missing() {
        let sp = schemapack(&["A"], Some("A"));
        assert!(!UnexpectedRootPlugin::does_apply(&sp));
        let err = ExpectedRootPlugin::new(&sp).validate(&datapack(&[("A", &["a1"])])).unwrap_err();
        assert_eq!(err.type_, "ExpectedRootResourceError");
    }

    #[test]
    fn root_class_mismatch() {
        let sp = schemapack(&["A", "B"], Some("A"));
        let mut dp = datapack(&[("A", &[]), ("B", &["b1"])]);
        dp.root_class = Some("B".into());
        dp.root_resource = Some("b1".into());
        let err = ExpectedRootPlugin::new(&sp).validate(&dp).unwrap_err();
        assert_eq!(err.type_, "RootClassMismatchError");
    }

    #[test]
    fn unknown_root_resource() {
        let sp = schemapack(&["A"], Some("A"));
        let mut dp = datapack(&[("A", &["a1"])]);
        dp.root_class = Some("A".into());
        dp.root_resource = Some("a2".into());
        let err = RootResourceExistencePlugin::new(&sp).validate(&dp).unwrap_err();
        assert_eq!(err.type_, "UnknownRootResourceError");
        assert_eq!(err.details["root_resource"], json!("a2"));

        dp.root_resource = Some("a1".into());
        RootResourceExistencePlugin::new(&sp).validate(&dp).unwrap();
    }
}
