//! Symbol table: flat variable map built from one clinical record.
//!
//! Templates reference variables as `{{identifier}}`, but the producers of
//! clinical data never agree on naming: the same field arrives qualified
//! (`paciente_edad`), short (`edad`), upper-cased by one UI and
//! lower-cased by another, with or without underscores. The builder walks
//! the record once and emits every naming variant up front, so the
//! renderer does cheap map hits instead of fuzzy matching.
//!
//! Insert discipline is first-writer-wins: whoever writes a name first
//! keeps it. The orchestrator seeds system concepts (patient, date,
//! doctor) before the walk so they win short-form collisions against
//! deeply nested fields.

use std::collections::HashMap;

use serde_json::Value;

use crate::aliases::{self, Concept};
use crate::record::{display_value, ClinicalRecord};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    entries: HashMap<String, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a record with the clinical upper-casing convention on.
    pub fn from_record(record: &ClinicalRecord) -> Self {
        let mut table = Self::new();
        table.extend_from_record(record, true);
        table
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact-name read, no fallback.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Renderer lookup ladder: exact, then case-insensitive, then with
    /// separators stripped. First rung that hits wins. The fallback rungs
    /// work off the lower-cased and compacted variants the builder
    /// emitted, so each rung is a single map read.
    pub fn lookup(&self, identifier: &str) -> Option<&str> {
        let identifier = identifier.trim();
        if let Some(value) = self.entries.get(identifier) {
            return Some(value);
        }
        let lowered = identifier.to_lowercase();
        if let Some(value) = self.entries.get(&lowered) {
            return Some(value);
        }
        self.entries
            .get(&aliases::strip_separators(&lowered))
            .map(String::as_str)
    }

    /// Insert one name only if nothing holds it yet.
    pub fn insert_if_absent(&mut self, name: &str, value: &str) {
        if !self.entries.contains_key(name) {
            self.entries.insert(name.to_string(), value.to_string());
        }
    }

    /// Insert a name under all of its naming variants: as written,
    /// upper-cased, lower-cased, and each of those with separators
    /// stripped. Every variant is first-writer-wins.
    pub fn insert_variants(&mut self, name: &str, value: &str) {
        let stripped = aliases::strip_separators(name);
        self.insert_if_absent(name, value);
        self.insert_if_absent(&name.to_uppercase(), value);
        self.insert_if_absent(&name.to_lowercase(), value);
        self.insert_if_absent(&stripped, value);
        self.insert_if_absent(&stripped.to_uppercase(), value);
        self.insert_if_absent(&stripped.to_lowercase(), value);
    }

    /// Insert a value under every accepted spelling of a concept.
    pub fn insert_concept(&mut self, concept: &Concept, value: &str) {
        for spelling in concept.spellings {
            self.insert_variants(spelling, value);
        }
    }

    /// Recursively flatten `record` into the table. Never fails: fields
    /// whose display form is empty simply produce no entries.
    pub fn extend_from_record(&mut self, record: &ClinicalRecord, uppercase: bool) {
        self.walk("", record.root(), uppercase);
    }

    fn walk(&mut self, prefix: &str, value: &Value, uppercase: bool) {
        let Value::Object(map) = value else {
            return;
        };
        for (key, member) in map {
            let qualified = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}_{key}")
            };
            // The field itself first (objects resolve through their
            // preferred-text key or flatten), then its children under
            // the qualified prefix.
            if let Some(display) = display_value(member, uppercase) {
                self.insert_variants(&qualified, &display);
                self.insert_variants(key, &display);
            }
            if member.is_object() {
                self.walk(&qualified, member, uppercase);
            }
        }
    }
}
