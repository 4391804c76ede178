//! The document container: a zip archive whose `word/document.xml` entry
//! holds the textual content.
//!
//! Everything in the archive except that one part is treated as opaque
//! bytes. The submodules cover the four operations the engine performs
//! on a container: open/rewrite the content part ([`package`]), fill
//! placeholders ([`render`]), enforce house typography ([`typography`]),
//! and synthesize a whole document from a text template ([`builder`]).

pub mod builder;
pub mod package;
pub mod render;
pub mod typography;

pub use render::{render_document, RenderError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("container is not a readable zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("container I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("document content part (word/document.xml) is missing")]
    MissingContentPart,

    #[error("document content part is not valid UTF-8")]
    NonUtf8ContentPart,
}

/// Escape a value for insertion into XML text or attribute content.
pub fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_escape_covers_markup_characters() {
        assert_eq!(
            xml_escape(r#"Dieta & reposo <48h> "estricto""#),
            "Dieta &amp; reposo &lt;48h&gt; &quot;estricto&quot;"
        );
    }

    #[test]
    fn xml_escape_leaves_accents_alone() {
        assert_eq!(xml_escape("EVALUACIÓN"), "EVALUACIÓN");
    }
}
