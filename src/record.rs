//! Clinical record tree and display-value rules.
//!
//! The persistence layer hands the engine one JSON tree per consultation:
//! patient info, vitals, specialty sub-objects, free-text fields from the
//! transcription system. There is no fixed schema. The tree is kept as
//! `serde_json::Value` and read through the conversion rules here, which
//! decide how a value is displayed inside a report (and whether it is
//! displayed at all).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aliases::{self, Concept};
use crate::config::PREFERRED_TEXT_KEYS;

/// One consultation's structured data. Immutable for the duration of a
/// generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClinicalRecord {
    root: Value,
}

impl ClinicalRecord {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Display value of the first top-level field spelling `concept`.
    /// Used to seed the symbol table with patient metadata before the
    /// recursive walk.
    pub fn concept_value(&self, concept: &Concept, uppercase: bool) -> Option<String> {
        let map = self.root.as_object()?;
        map.iter()
            .find(|(key, _)| concept.matches(key))
            .and_then(|(_, value)| display_value(value, uppercase))
    }
}

impl From<Value> for ClinicalRecord {
    fn from(root: Value) -> Self {
        Self::new(root)
    }
}

/// Convert one tree value into its report display form.
///
/// `None` means the field produces no symbol at all:
/// - `null`, empty/whitespace strings, empty arrays;
/// - objects whose flattening comes out empty (the `{}` / `[]` guard).
///
/// Booleans become the localized yes/no tokens and are never upper-cased
/// further. Other scalars are upper-cased when `uppercase` is set, the
/// presentation convention for clinical body text.
pub fn display_value(value: &Value, uppercase: bool) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(if *b { "Sí" } else { "No" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            Some(if uppercase {
                trimmed.to_uppercase()
            } else {
                trimmed.to_string()
            })
        }
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| display_value(item, uppercase))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Object(map) => {
            // Preferred-text extraction first: a `{ descripcion: ... }`
            // object IS its description.
            for preferred in PREFERRED_TEXT_KEYS {
                let hit = map
                    .iter()
                    .find(|(key, _)| aliases::fold(key) == aliases::fold(preferred))
                    .and_then(|(_, inner)| display_value(inner, uppercase));
                if hit.is_some() {
                    return hit;
                }
            }
            // Best-effort flattening: members that resolve, joined.
            // Unresolvable nested members drop out.
            let parts: Vec<String> = map
                .values()
                .filter_map(|member| display_value(member, uppercase))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
    }
}
