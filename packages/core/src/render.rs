//! Human-readable text rendering of validation reports and datapacks.
//!
//! The output is stable plain text suitable for terminals and logs. It is not
//! a canonical format; only the JSON/YAML documents are normative.

use crate::types::DataPack;
use crate::validation::{ErrorRecord, ValidationError};

/// Render a [`ValidationError`] as a multi-line report.
///
/// ```text
/// Validation failed with 2 issue(s):
///   - Error in resource 'File.f1':
///       Type: ContentValidationError
///       Message: the content of the resource does not conform to its schema: ...
///   - Error in global datapack:
///       Type: MissingClassSlotError
///       Message: the datapack is missing slots for the following classes: 'Dataset'
/// ```
pub fn render_validation_error(error: &ValidationError) -> String {
    let mut out = format!("Validation failed with {} issue(s):\n", error.records().len());
    for record in error.records() {
        out.push_str(&render_record(record));
    }
    out
}

/// Render one [`ErrorRecord`] as an indented block.
pub fn render_record(record: &ErrorRecord) -> String {
    format!(
        "  - Error in {}:\n      Type: {}\n      Message: {}\n",
        record.subject(),
        record.type_,
        record.message
    )
}

/// Summarise a datapack: one line per class slot with its resource count.
///
/// ```text
/// Datapack 0.3.0  3 resources  root: Dataset.ds1
/// ──────────────────────────────────────────────
///   Dataset  1
///   File     2
/// ```
pub fn render_datapack_summary(datapack: &DataPack) -> String {
    let total = datapack.len();
    let root = datapack
        .root()
        .map(|(class, id)| format!("  root: {class}.{id}"))
        .unwrap_or_default();
    let header = format!(
        "Datapack {}  {} resource{}{}",
        datapack.version,
        total,
        if total == 1 { "" } else { "s" },
        root
    );
    let rule = "─".repeat(header.chars().count());
    let mut out = format!("{header}\n{rule}\n");

    let width = datapack.resources.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    for (class, resources) in &datapack.resources {
        out.push_str(&format!("  {class:<width$}  {}\n", resources.len()));
    }
    out
}

// --- tests -------------------------------------------------------------------
