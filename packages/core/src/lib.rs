//! Validation, isolation, and denormalization of schemapacks and datapacks.
//!
//! A *schemapack* defines classes of resources: an id property, a JSON Schema
//! for the content, and typed relations to other classes with cardinality
//! constraints. A *datapack* holds resources conforming to a schemapack. This
//! crate loads both documents, validates a datapack against a schemapack,
//! extracts self-contained rooted subsets, and renders rooted datapacks as
//! nested JSON. It is the foundation for the `schemapack` CLI.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | Document model: [`SchemaPack`], [`ClassDefinition`], [`Relation`], [`DataPack`], [`Resource`], [`RelationValue`] |
//! | [`load`] | JSON/YAML loading and specification checks via [`load_schemapack`] and [`load_datapack`] |
//! | [`validation`] | Plugin-based validation via [`SchemaPackValidator`] and [`validate`] |
//! | [`isolate`] | Dependency analysis and rooted extraction via [`isolate`](isolate::isolate) |
//! | [`embedding`] | [`EmbeddingProfile`]s controlling which relations are inlined |
//! | [`denormalize`] | Nested JSON rendering of rooted datapacks via [`denormalize`](denormalize::denormalize) |
//! | [`render`] | Human-readable validation reports |
//! | [`error`] | Shared error types and the crate-level [`Error`] |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use schemapack::{denormalize, isolate, load_and_validate};
//!
//! let (schemapack, datapack) =
//!     load_and_validate(Path::new("schemapack.yaml"), Path::new("datapack.yaml"))?;
//!
//! // Extract everything dataset "ds1" depends on and nest it into one document.
//! let (rooted_schemapack, rooted_datapack) = isolate(&schemapack, &datapack, "Dataset", "ds1")?;
//! let document = denormalize(&rooted_schemapack, &rooted_datapack, None)?;
//! println!("{}", serde_json::to_string_pretty(&document)?);
//! ```

pub mod denormalize;
pub mod embedding;
pub mod error;
pub mod isolate;
pub mod load;
pub mod render;
pub mod types;
pub mod validation;

pub use denormalize::{denormalize, DenormalizationError};
pub use embedding::{Embedding, EmbeddingProfile, InvalidEmbeddingProfileError};
pub use error::{
    Error, LoadError, NotFoundError, ParsingError, SpecError, SpecType, ValidationAssumptionError,
};
pub use isolate::{
    downscope_datapack, downscope_schemapack, identify_class_dependencies,
    identify_resource_dependencies, isolate, isolate_class, isolate_resource, IsolationError,
    ResourceMap,
};
pub use load::{load_and_validate, load_datapack, load_schemapack, read_json_or_yaml_mapping};
pub use render::render_validation_error;
pub use types::{
    ClassDefinition, ContentSchema, DataPack, IdSpec, Mandatory, Multiple, Relation,
    RelationValue, Resource, SchemaPack,
};
pub use validation::{
    validate, ErrorRecord, PluginError, PluginRegistry, SchemaPackValidator, ValidationError,
};
