//! Validation of datapacks against a schemapack.
//!
//! Validation is a pipeline of small checks ("plugins") at three scopes:
//!
//! | Scope | Trait | Sees |
//! |-------|-------|------|
//! | global | [`GlobalPlugin`] | the whole datapack |
//! | class | [`ClassPlugin`] | all resources of one class |
//! | resource | [`ResourcePlugin`] | one resource |
//!
//! Phases run in that order. A phase only runs if every earlier phase
//! produced no error records, so later plugins may rely on the structural
//! guarantees of earlier ones (e.g. that every class slot exists).
//!
//! Plugins are described by a [`PluginRegistry`]. Each entry carries a static
//! applicability test and a constructor, so a [`SchemaPackValidator`] only
//! instantiates the plugins relevant to its schemapack. The built-in checks
//! live in [`plugins`]; callers may append their own.

pub mod plugins;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::types::{ClassDefinition, ClassName, DataPack, Resource, ResourceId, SchemaPack};

/// Structured, plugin-specific context attached to an error record.
pub type Details = BTreeMap<String, Value>;

/// The outcome of one plugin finding a violation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{type_}: {message}")]
pub struct PluginError {
    pub type_: String,
    pub message: String,
    pub details: Details,
}

impl PluginError {
    pub fn new(type_: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            message: message.into(),
            details: Details::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// One validation issue, with its subject.
///
/// Global records carry neither class nor resource; class records carry the
/// class; resource records carry both. Absent subjects serialise as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(default)]
    pub subject_class: Option<ClassName>,
    #[serde(default)]
    pub subject_resource: Option<ResourceId>,
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
    #[serde(default)]
    pub details: Details,
}

impl ErrorRecord {
    fn from_plugin(error: PluginError, subject_class: Option<&str>, subject_resource: Option<&str>) -> Self {
        Self {
            subject_class: subject_class.map(str::to_owned),
            subject_resource: subject_resource.map(str::to_owned),
            type_: error.type_,
            message: error.message,
            details: error.details,
        }
    }

    /// Human-readable subject line, e.g. `resource 'File.f1'`.
    pub fn subject(&self) -> String {
        match (&self.subject_class, &self.subject_resource) {
            (Some(class), Some(resource)) => format!("resource '{class}.{resource}'"),
            (Some(class), None) => format!("class '{class}'"),
            _ => "global datapack".to_owned(),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.subject(), self.type_, self.message)
    }
}

/// The datapack does not comply with the schemapack.
///
/// Holds at least one record, sorted by subject class, subject resource, and
/// type.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("validation failed with {} issue(s)", .records.len())]
pub struct ValidationError {
    records: Vec<ErrorRecord>,
}

impl ValidationError {
    /// Sort the records into canonical order. Returns `None` for an empty list.
    pub fn from_records(mut records: Vec<ErrorRecord>) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        records.sort_by(|a, b| {
            (&a.subject_class, &a.subject_resource, &a.type_)
                .cmp(&(&b.subject_class, &b.subject_resource, &b.type_))
        });
        Some(Self { records })
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ErrorRecord> {
        self.records
    }
}

// --- plugin traits -----------------------------------------------------------

/// A check over the whole datapack.
pub trait GlobalPlugin: Send + Sync {
    /// Whether this check is relevant for `schemapack` at all.
    fn does_apply(schemapack: &SchemaPack) -> bool
    where
        Self: Sized;

    fn new(schemapack: &SchemaPack) -> Self
    where
        Self: Sized;

    fn validate(&self, datapack: &DataPack) -> Result<(), PluginError>;
}

/// A check over all resources of one class.
pub trait ClassPlugin: Send + Sync {
    fn does_apply(class: &ClassDefinition) -> bool
    where
        Self: Sized;

    fn new(class: &ClassDefinition) -> Self
    where
        Self: Sized;

    fn validate(
        &self,
        class_resources: &BTreeMap<ResourceId, Resource>,
        datapack: &DataPack,
    ) -> Result<(), PluginError>;
}

/// A check over one resource, given together with its id.
pub trait ResourcePlugin: Send + Sync {
    fn does_apply(class: &ClassDefinition) -> bool
    where
        Self: Sized;

    fn new(class: &ClassDefinition) -> Self
    where
        Self: Sized;

    fn validate(
        &self,
        resource: &Resource,
        resource_id: &str,
        datapack: &DataPack,
    ) -> Result<(), PluginError>;
}

// --- registry ----------------------------------------------------------------

/// Registry entry for a [`GlobalPlugin`] type.
#[derive(Clone, Copy)]
pub struct GlobalPluginEntry {
    pub name: &'static str,
    applies: fn(&SchemaPack) -> bool,
    create: fn(&SchemaPack) -> Box<dyn GlobalPlugin>,
}

impl GlobalPluginEntry {
    pub fn of<P: GlobalPlugin + 'static>() -> Self {
        Self {
            name: short_type_name::<P>(),
            applies: P::does_apply,
            create: create_global::<P>,
        }
    }
}

/// Registry entry for a [`ClassPlugin`] type.
#[derive(Clone, Copy)]
pub struct ClassPluginEntry {
    pub name: &'static str,
    applies: fn(&ClassDefinition) -> bool,
    create: fn(&ClassDefinition) -> Box<dyn ClassPlugin>,
}

impl ClassPluginEntry {
    pub fn of<P: ClassPlugin + 'static>() -> Self {
        Self {
            name: short_type_name::<P>(),
            applies: P::does_apply,
            create: create_class::<P>,
        }
    }
}

/// Registry entry for a [`ResourcePlugin`] type.
#[derive(Clone, Copy)]
pub struct ResourcePluginEntry {
    pub name: &'static str,
    applies: fn(&ClassDefinition) -> bool,
    create: fn(&ClassDefinition) -> Box<dyn ResourcePlugin>,
}

impl ResourcePluginEntry {
    pub fn of<P: ResourcePlugin + 'static>() -> Self {
        Self {
            name: short_type_name::<P>(),
            applies: P::does_apply,
            create: create_resource::<P>,
        }
    }
}

/// Ordered lists of plugin types, one per scope.
///
/// Order within a scope is the order records are produced in before the final
/// sort, and the order plugins are instantiated in.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    pub global: Vec<GlobalPluginEntry>,
    pub class: Vec<ClassPluginEntry>,
    pub resource: Vec<ResourcePluginEntry>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in checks.
    pub fn builtin() -> Self {
        plugins::default_registry()
    }

    pub fn with_global<P: GlobalPlugin + 'static>(mut self) -> Self {
        self.global.push(GlobalPluginEntry::of::<P>());
        self
    }

    pub fn with_class<P: ClassPlugin + 'static>(mut self) -> Self {
        self.class.push(ClassPluginEntry::of::<P>());
        self
    }

    pub fn with_resource<P: ResourcePlugin + 'static>(mut self) -> Self {
        self.resource.push(ResourcePluginEntry::of::<P>());
        self
    }

    /// Append all entries of `other` after this registry's entries.
    pub fn extend(&mut self, other: PluginRegistry) {
        self.global.extend(other.global);
        self.class.extend(other.class);
        self.resource.extend(other.resource);
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.class.len() + self.resource.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("global", &self.global.iter().map(|e| e.name).collect::<Vec<_>>())
            .field("class", &self.class.iter().map(|e| e.name).collect::<Vec<_>>())
            .field("resource", &self.resource.iter().map(|e| e.name).collect::<Vec<_>>())
            .finish()
    }
}

// --- validator ---------------------------------------------------------------

/// Validates datapacks against one schemapack.
///
/// Construction instantiates every applicable plugin once. The validator is
/// then immutable and may be shared between threads.
pub struct SchemaPackValidator {
    global: Vec<Box<dyn GlobalPlugin>>,
    class: BTreeMap<ClassName, Vec<Box<dyn ClassPlugin>>>,
    resource: BTreeMap<ClassName, Vec<Box<dyn ResourcePlugin>>>,
}

impl SchemaPackValidator {
    /// A validator running the built-in checks.
    pub fn new(schemapack: &SchemaPack) -> Self {
        Self::with_plugins(schemapack, &PluginRegistry::builtin())
    }

    /// A validator running exactly the plugins in `registry`.
    pub fn with_plugins(schemapack: &SchemaPack, registry: &PluginRegistry) -> Self {
        let global = registry
            .global
            .iter()
            .filter(|entry| (entry.applies)(schemapack))
            .map(|entry| (entry.create)(schemapack))
            .collect();

        let mut class = BTreeMap::new();
        let mut resource = BTreeMap::new();
        for (class_name, definition) in &schemapack.classes {
            let class_plugins: Vec<Box<dyn ClassPlugin>> = registry
                .class
                .iter()
                .filter(|entry| (entry.applies)(definition))
                .map(|entry| (entry.create)(definition))
                .collect();
            let resource_plugins: Vec<Box<dyn ResourcePlugin>> = registry
                .resource
                .iter()
                .filter(|entry| (entry.applies)(definition))
                .map(|entry| (entry.create)(definition))
                .collect();
            class.insert(class_name.clone(), class_plugins);
            resource.insert(class_name.clone(), resource_plugins);
        }

        Self {
            global,
            class,
            resource,
        }
    }

    /// Validate `datapack`, returning every issue of the first failing phase.
    pub fn validate(&self, datapack: &DataPack) -> Result<(), ValidationError> {
        let mut records = self.run_global(datapack);
        debug!(records = records.len(), "global validation phase finished");

        if records.is_empty() {
            records = self.run_class(datapack);
            debug!(records = records.len(), "class validation phase finished");
        }
        if records.is_empty() {
            records = self.run_resource(datapack);
            debug!(records = records.len(), "resource validation phase finished");
        }

        match ValidationError::from_records(records) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn run_global(&self, datapack: &DataPack) -> Vec<ErrorRecord> {
        self.global
            .iter()
            .filter_map(|plugin| plugin.validate(datapack).err())
            .map(|err| ErrorRecord::from_plugin(err, None, None))
            .collect()
    }

    fn run_class(&self, datapack: &DataPack) -> Vec<ErrorRecord> {
        let mut records = Vec::new();
        for (class_name, class_resources) in &datapack.resources {
            let Some(plugins) = self.class.get(class_name) else {
                continue;
            };
            for plugin in plugins {
                if let Err(err) = plugin.validate(class_resources, datapack) {
                    records.push(ErrorRecord::from_plugin(err, Some(class_name), None));
                }
            }
        }
        records
    }

    fn run_resource(&self, datapack: &DataPack) -> Vec<ErrorRecord> {
        let mut records = Vec::new();
        for (class_name, class_resources) in &datapack.resources {
            let Some(plugins) = self.resource.get(class_name) else {
                continue;
            };
            for (resource_id, resource) in class_resources {
                for plugin in plugins {
                    if let Err(err) = plugin.validate(resource, resource_id, datapack) {
                        records.push(ErrorRecord::from_plugin(
                            err,
                            Some(class_name),
                            Some(resource_id),
                        ));
                    }
                }
            }
        }
        records
    }
}

impl fmt::Debug for SchemaPackValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaPackValidator")
            .field("global_plugins", &self.global.len())
            .field("classes", &self.class.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Validate `datapack` against `schemapack` with the built-in checks plus any
/// `additional` plugins.
pub fn validate(
    schemapack: &SchemaPack,
    datapack: &DataPack,
    additional: Option<PluginRegistry>,
) -> Result<(), ValidationError> {
    let mut registry = PluginRegistry::builtin();
    if let Some(extra) = additional {
        registry.extend(extra);
    }
    SchemaPackValidator::with_plugins(schemapack, &registry).validate(datapack)
}

// --- helpers -----------------------------------------------------------------

fn create_global<P: GlobalPlugin + 'static>(schemapack: &SchemaPack) -> Box<dyn GlobalPlugin> {
    Box::new(P::new(schemapack))
}

fn create_class<P: ClassPlugin + 'static>(class: &ClassDefinition) -> Box<dyn ClassPlugin> {
    Box::new(P::new(class))
}

fn create_resource<P: ResourcePlugin + 'static>(class: &ClassDefinition) -> Box<dyn ResourcePlugin> {
    Box::new(P::new(class))
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

// --- tests -------------------------------------------------------------------
