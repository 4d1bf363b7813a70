//! Built-in validation plugins.
//!
//! Each plugin checks one rule and reports a stable error type tag (e.g.
//! `MissingClassSlotError`) so callers can react to specific failures.

mod class;
mod global;
mod resource;

pub use class::{MissingMandatoryOriginPlugin, TargetOverlapPlugin};
pub use global::{
    ExpectedRootPlugin, MissingClassSlotPlugin, RootResourceExistencePlugin,
    UnexpectedRootPlugin, UnknownClassSlotPlugin,
};
pub use resource::{
    ContentSchemaPlugin, MissingMandatoryTargetPlugin, MultipleTargetPlugin, TargetIdPlugin,
    UnknownRelationPlugin,
};

use super::PluginRegistry;

/// The registry used by [`super::SchemaPackValidator::new`].
pub fn default_registry() -> PluginRegistry {
    PluginRegistry::new()
        .with_global::<MissingClassSlotPlugin>()
        .with_global::<UnknownClassSlotPlugin>()
        .with_global::<UnexpectedRootPlugin>()
        .with_global::<ExpectedRootPlugin>()
        .with_global::<RootResourceExistencePlugin>()
        .with_class::<MissingMandatoryOriginPlugin>()
        .with_class::<TargetOverlapPlugin>()
        .with_resource::<ContentSchemaPlugin>()
        .with_resource::<UnknownRelationPlugin>()
        .with_resource::<TargetIdPlugin>()
        .with_resource::<MultipleTargetPlugin>()
        .with_resource::<MissingMandatoryTargetPlugin>()
}

// --- helpers -----------------------------------------------------------------

/// Quote and comma-join names for error messages: `'a', 'b'`.
fn quoted<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
