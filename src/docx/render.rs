//! Placeholder substitution inside the content part.
//!
//! The renderer is the terminal substitution step: its output goes to
//! the clinic unreviewed, so a variable the table cannot resolve becomes
//! an empty string rather than a leftover `{{marker}}` in a finished
//! report. Draft-stage composition ([`crate::compose`]) makes the
//! opposite choice.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

use super::{package, xml_escape, DocxError};
use crate::symbols::SymbolTable;

/// A placeholder span. `[^{}]` deliberately crosses markup: the word
/// processor splits text across runs mid-identifier, so the span between
/// the braces may contain whole tags (`{{pa</w:t>…<w:t>ciente}}`).
static PLACEHOLDER_SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]*?)\}\}").expect("valid regex"));

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template has an unclosed placeholder near \"{context}\"")]
    UnclosedPlaceholder { context: String },

    #[error(transparent)]
    Docx(#[from] DocxError),
}

/// Render the content-part XML against the symbol table.
pub fn render_xml(xml: &str, symbols: &SymbolTable) -> Result<String, RenderError> {
    check_balanced(xml)?;
    let rendered = PLACEHOLDER_SPAN_RE.replace_all(xml, |caps: &Captures| {
        let identifier = recover_identifier(&caps[1]);
        match symbols.lookup(&identifier) {
            Some(value) => value_runs(value),
            None => String::new(),
        }
    });
    Ok(rendered.into_owned())
}

/// Render a whole container: read the content part, substitute, write
/// it back.
pub fn render_document(bytes: &[u8], symbols: &SymbolTable) -> Result<Vec<u8>, RenderError> {
    let xml = package::read_content_part(bytes)?;
    let rendered = render_xml(&xml, symbols)?;
    Ok(package::replace_content_part(bytes, &rendered)?)
}

/// Strip the markup and whitespace the word processor injected into a
/// split placeholder span, leaving the identifier as authored.
fn recover_identifier(span: &str) -> String {
    TAG_RE
        .replace_all(span, "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Escape a value and turn embedded newlines into explicit line breaks.
/// The replacement sits inside a `<w:t>` element, so a break closes the
/// text run and opens a new one.
fn value_runs(value: &str) -> String {
    value
        .split('\n')
        .map(|line| xml_escape(line.trim_end_matches('\r')))
        .collect::<Vec<_>>()
        .join("</w:t><w:br/><w:t>")
}

/// A `{{` that no well-formed span accounts for is template-author
/// error, reported before any substitution happens.
fn check_balanced(xml: &str) -> Result<(), RenderError> {
    let stripped = PLACEHOLDER_SPAN_RE.replace_all(xml, "");
    if let Some(index) = stripped.find("{{") {
        let tail: String = stripped[index..].chars().take(96).collect();
        let context: String = TAG_RE
            .replace_all(&tail, " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(48)
            .collect();
        return Err(RenderError::UnclosedPlaceholder { context });
    }
    Ok(())
}
