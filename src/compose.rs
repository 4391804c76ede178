//! Draft body composition over plain text.
//!
//! Two substitution passes that run before any document is assembled.
//! Both leave unresolved `{{…}}` markers in place: composed text is a
//! draft the doctor can still finish by hand, unlike the final document
//! renderer, which blanks unknown variables because its output is
//! terminal.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::aliases;
use crate::symbols::SymbolTable;

/// `{{identifier}}` in plain text. Identifiers never contain braces.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid regex"));

/// Substitute every placeholder the table can resolve; keep the rest
/// verbatim.
pub fn compose_body(text: &str, symbols: &SymbolTable) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures| {
            match symbols.lookup(&caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Substitute only patient/date/doctor metadata markers, leaving every
/// clinical marker untouched. Applied to caller-supplied pre-rendered
/// content, whose body text is already final.
pub fn resolve_metadata(text: &str, symbols: &SymbolTable) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures| {
            let identifier = &caps[1];
            if aliases::is_metadata_identifier(identifier) {
                if let Some(value) = symbols.lookup(identifier) {
                    return value.to_string();
                }
            }
            caps[0].to_string()
        })
        .into_owned()
}
