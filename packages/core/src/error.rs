//! Error types shared across the crate.
//!
//! Each operation module owns its own error enum (`LoadError`,
//! `ValidationError`, `IsolationError`, `DenormalizationError`); the types here
//! are the building blocks those enums are made of, plus the crate-level
//! [`Error`] that unifies them for callers who chain several operations.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::denormalize::DenormalizationError;
use crate::isolate::IsolationError;
use crate::validation::ValidationError;

/// Which of the two document kinds an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecType {
    SchemaPack,
    DataPack,
}

impl fmt::Display for SpecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecType::SchemaPack => f.write_str("schemapack"),
            SpecType::DataPack => f.write_str("datapack"),
        }
    }
}

/// A file could not be read or is not a JSON/YAML mapping.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to parse {}: {message}", path.display())]
pub struct ParsingError {
    pub path: PathBuf,
    pub message: String,
}

/// A document violates the schemapack or datapack specification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "the provided object was not compatible with the {spec_type} specification: {}",
    violations.join("; ")
)]
pub struct SpecError {
    pub spec_type: SpecType,
    pub violations: Vec<String>,
}

impl SpecError {
    pub fn new(spec_type: SpecType, violations: Vec<String>) -> Self {
        Self {
            spec_type,
            violations,
        }
    }

    pub fn single(spec_type: SpecType, violation: impl Into<String>) -> Self {
        Self::new(spec_type, vec![violation.into()])
    }
}

/// Errors produced while loading a schemapack or datapack.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("{spec_type} could not be loaded: {source}")]
    Parsing {
        spec_type: SpecType,
        #[source]
        source: ParsingError,
    },

    #[error(transparent)]
    Spec(#[from] SpecError),
}

impl LoadError {
    /// The document kind that failed to load.
    pub fn spec_type(&self) -> SpecType {
        match self {
            LoadError::Parsing { spec_type, .. } => *spec_type,
            LoadError::Spec(err) => err.spec_type,
        }
    }
}

/// A named class or resource does not exist.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("class '{class_name}' not found in the provided {spec_type}")]
    Class {
        class_name: String,
        spec_type: SpecType,
    },

    #[error("resource of class '{class_name}' with id '{resource_id}' not found in the provided datapack")]
    Resource {
        class_name: String,
        resource_id: String,
    },
}

impl NotFoundError {
    pub fn class(class_name: &str, spec_type: SpecType) -> Self {
        NotFoundError::Class {
            class_name: class_name.to_owned(),
            spec_type,
        }
    }

    pub fn resource(class_name: &str, resource_id: &str) -> Self {
        NotFoundError::Resource {
            class_name: class_name.to_owned(),
            resource_id: resource_id.to_owned(),
        }
    }
}

/// An operation that requires a validated datapack met an inconsistency that
/// validation would have reported.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "it was assumed that the provided datapack has already been validated against the \
     provided schemapack, however, this assumption failed in the context of {context}; \
     validate the datapack against the schemapack to get further details"
)]
pub struct ValidationAssumptionError {
    pub context: String,
}

impl ValidationAssumptionError {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }
}

/// Any error this crate can produce.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Isolation(#[from] IsolationError),

    #[error(transparent)]
    Denormalization(#[from] DenormalizationError),
}

// --- tests -------------------------------------------------------------------
