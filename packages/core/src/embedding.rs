//! Embedding profiles: which relations to inline during denormalization.
//!
//! A profile maps relation names to either a flag or a nested profile:
//!
//! ```json
//! { "files": false, "dataset": { "owner": false } }
//! ```
//!
//! A relation absent from the profile is embedded. A nested profile embeds
//! the relation and applies to the embedded resources. A flag of `true` and an
//! empty nested profile mean the same thing.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::RelationName;

/// The profile has a value that is neither a boolean nor a nested profile.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid embedding profile at '{path}': expected a boolean or a mapping, found {found}")]
pub struct InvalidEmbeddingProfileError {
    pub path: String,
    pub found: String,
}

/// How one relation is treated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Embedding {
    Flag(bool),
    Nested(EmbeddingProfile),
}

/// Per-relation embedding decisions for one level of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct EmbeddingProfile(BTreeMap<RelationName, Embedding>);

impl EmbeddingProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag(mut self, relation: impl Into<RelationName>, embed: bool) -> Self {
        self.0.insert(relation.into(), Embedding::Flag(embed));
        self
    }

    pub fn with_nested(mut self, relation: impl Into<RelationName>, profile: EmbeddingProfile) -> Self {
        self.0.insert(relation.into(), Embedding::Nested(profile));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `relation` should be embedded at this level.
    pub fn should_embed(&self, relation: &str) -> bool {
        match self.0.get(relation) {
            None | Some(Embedding::Nested(_)) => true,
            Some(Embedding::Flag(embed)) => *embed,
        }
    }

    /// The profile to apply to resources embedded via `relation`.
    pub fn nested(&self, relation: &str) -> Option<&EmbeddingProfile> {
        match self.0.get(relation) {
            Some(Embedding::Nested(profile)) => Some(profile),
            _ => None,
        }
    }

    /// Parse a profile from JSON, reporting the path of the first bad value.
    pub fn from_value(value: &Value) -> Result<Self, InvalidEmbeddingProfileError> {
        parse_profile(value, "")
    }
}

impl<'de> Deserialize<'de> for EmbeddingProfile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        EmbeddingProfile::from_value(&value).map_err(de::Error::custom)
    }
}

// --- helpers -----------------------------------------------------------------

fn parse_profile(value: &Value, path: &str) -> Result<EmbeddingProfile, InvalidEmbeddingProfileError> {
    let Value::Object(map) = value else {
        return Err(invalid(path, value));
    };
    let mut profile = BTreeMap::new();
    for (relation, entry) in map {
        let entry_path = format!("{path}/{relation}");
        let embedding = match entry {
            Value::Bool(embed) => Embedding::Flag(*embed),
            Value::Object(_) => Embedding::Nested(parse_profile(entry, &entry_path)?),
            other => return Err(invalid(&entry_path, other)),
        };
        profile.insert(relation.clone(), embedding);
    }
    Ok(EmbeddingProfile(profile))
}

fn invalid(path: &str, value: &Value) -> InvalidEmbeddingProfileError {
    InvalidEmbeddingProfileError {
        path: if path.is_empty() { "/".to_owned() } else { path.to_owned() },
        found: value.to_string(),
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_relation_is_embedded() {
        let profile = EmbeddingProfile::new();
        assert!(profile.should_embed("files"));
        assert!(profile.nested("files").is_none());
    }

    #[test]
    fn flags_and_nested() {
        let profile = EmbeddingProfile::from_value(&json!({
            "files": false,
            "dataset": { "owner": false },
            "study": true
        }))
        .unwrap();
        assert!(!profile.should_embed("files"));
        assert!(profile.should_embed("study"));
        assert!(profile.should_embed("dataset"));
        assert!(!profile.nested("dataset").unwrap().should_embed("owner"));
    }

    #[test]
    fn invalid_value_reports_path() {
        let err = EmbeddingProfile::from_value(&json!({ "dataset": { "owner": "no" } })).unwrap_err();
        assert_eq!(err.path, "/dataset/owner");
        assert_eq!(err.found, "\"no\"");
    }

    #[test]
    fn non_mapping_root_rejected() {
        let err = EmbeddingProfile::from_value(&json!([true])).unwrap_err();
        assert_eq!(err.path, "/");
    }

    #[test]
    fn deserializes_via_serde() {
        let profile: EmbeddingProfile = serde_json::from_str(r#"{"files": false}"#).unwrap();
        assert_eq!(profile, EmbeddingProfile::new().with_flag("files", false));
        assert!(serde_json::from_str::<EmbeddingProfile>(r#"{"files": 1}"#).is_err());
    }

    #[test]
    fn serializes_back() {
        let profile = EmbeddingProfile::new()
            .with_flag("files", false)
            .with_nested("dataset", EmbeddingProfile::new());
        assert_eq!(serde_json::to_value(&profile).unwrap(), json!({ "dataset": {}, "files": false }));
    }
}
