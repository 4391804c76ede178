//! House typography enforcement on rendered content XML.
//!
//! Clinic templates arrive with whatever fonts and sizes the authoring
//! machine had. After rendering, every run is forced to the house size
//! and the resolved font, heading-styled paragraphs are centered, and
//! everything else is justified. The pass operates on the raw markup
//! with targeted rewrites; each rewrite forces a fixed value, so
//! applying the pass twice produces the same document as applying it
//! once.
//!
//! The caller treats any failure here as a logged warning, not an
//! error: a mis-styled report with correct content still goes out.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{package, xml_escape, DocxError};
use crate::aliases;
use crate::config::{HEADING_STYLE_TOKENS, HOUSE_SIZE_HALF_POINTS};

static SZ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<w:sz\s+w:val="[^"]*"\s*/>"#).expect("valid regex"));

static SZCS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<w:szCs\s+w:val="[^"]*"\s*/>"#).expect("valid regex"));

static RFONTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<w:rFonts\b[^>]*/>").expect("valid regex"));

static RPR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:rPr>(.*?)</w:rPr>").expect("valid regex"));

static PARA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*)?>.*?</w:p>").expect("valid regex"));

static PSTYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<w:pStyle\s+w:val="([^"]*)""#).expect("valid regex"));

static JC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<w:jc\s+w:val="[^"]*"\s*/>"#).expect("valid regex"));

/// Apply the typography rules to content-part XML.
pub fn apply_xml(xml: &str, font: &str) -> String {
    // 1. Normalize self-closed property blocks so the injection passes
    //    see them.
    let mut text = xml
        .replace("<w:rPr/>", "<w:rPr></w:rPr>")
        .replace("<w:pPr/>", "<w:pPr></w:pPr>");

    // 2. Force every explicit size to the house value.
    let sz = format!(r#"<w:sz w:val="{HOUSE_SIZE_HALF_POINTS}"/>"#);
    let szcs = format!(r#"<w:szCs w:val="{HOUSE_SIZE_HALF_POINTS}"/>"#);
    text = SZ_RE.replace_all(&text, sz.as_str()).into_owned();
    text = SZCS_RE.replace_all(&text, szcs.as_str()).into_owned();

    // 3. Force every explicit font to the resolved family.
    let fonts = font_element(font);
    text = RFONTS_RE.replace_all(&text, fonts.as_str()).into_owned();

    // 4. Inject font and size into run-properties blocks lacking them.
    //    rFonts leads the block; sizes trail it.
    text = RPR_RE
        .replace_all(&text, |caps: &Captures| {
            let inner = &caps[1];
            let mut block = String::with_capacity(inner.len() + 96);
            block.push_str("<w:rPr>");
            if !inner.contains("<w:rFonts") {
                block.push_str(&fonts);
            }
            block.push_str(inner);
            if !inner.contains("<w:sz ") {
                block.push_str(&sz);
            }
            if !inner.contains("<w:szCs") {
                block.push_str(&szcs);
            }
            block.push_str("</w:rPr>");
            block
        })
        .into_owned();

    // 5. Alignment: heading-styled paragraphs center, the rest justify.
    PARA_RE
        .replace_all(&text, |caps: &Captures| {
            let paragraph = &caps[0];
            let alignment = if is_heading(paragraph) { "center" } else { "both" };
            restyle_paragraph(paragraph, alignment)
        })
        .into_owned()
}

/// Apply the typography rules to a whole container.
pub fn apply_document(bytes: &[u8], font: &str) -> Result<Vec<u8>, DocxError> {
    let xml = package::read_content_part(bytes)?;
    let styled = apply_xml(&xml, font);
    package::replace_content_part(bytes, &styled)
}

fn font_element(font: &str) -> String {
    let family = xml_escape(font);
    format!(r#"<w:rFonts w:ascii="{family}" w:hAnsi="{family}" w:cs="{family}"/>"#)
}

/// A paragraph is a heading when its style name contains one of the
/// localized heading tokens, compared accent- and case-insensitively.
fn is_heading(paragraph: &str) -> bool {
    PSTYLE_RE
        .captures(paragraph)
        .map(|caps| {
            let style = aliases::fold(&caps[1]);
            HEADING_STYLE_TOKENS.iter().any(|token| style.contains(token))
        })
        .unwrap_or(false)
}

/// Force or inject the alignment of one paragraph. Injection keeps the
/// justification element ahead of the paragraph-mark run properties.
fn restyle_paragraph(paragraph: &str, alignment: &str) -> String {
    let jc = format!(r#"<w:jc w:val="{alignment}"/>"#);

    if JC_RE.is_match(paragraph) {
        return JC_RE.replace_all(paragraph, jc.as_str()).into_owned();
    }

    if let Some(ppr_open) = paragraph.find("<w:pPr>") {
        if let Some(offset) = paragraph[ppr_open..].find("</w:pPr>") {
            let ppr_close = ppr_open + offset;
            let block = &paragraph[ppr_open..ppr_close];
            let insert_at = block.find("<w:rPr").map_or(ppr_close, |i| ppr_open + i);
            let mut out = String::with_capacity(paragraph.len() + jc.len());
            out.push_str(&paragraph[..insert_at]);
            out.push_str(&jc);
            out.push_str(&paragraph[insert_at..]);
            return out;
        }
    }

    // No properties block at all.
    if let Some(tag_end) = paragraph.find('>') {
        let mut out = String::with_capacity(paragraph.len() + jc.len() + 16);
        out.push_str(&paragraph[..=tag_end]);
        out.push_str("<w:pPr>");
        out.push_str(&jc);
        out.push_str("</w:pPr>");
        out.push_str(&paragraph[tag_end + 1..]);
        return out;
    }
    paragraph.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::package::{make_container, read_content_part};

    const FONT: &str = "Arial";

    #[test]
    fn explicit_sizes_are_forced_to_house_value() {
        let xml = r#"<w:rPr><w:sz w:val="36"/><w:szCs w:val="36"/></w:rPr>"#;
        let out = apply_xml(xml, FONT);
        assert!(out.contains(r#"<w:sz w:val="24"/>"#), "out: {out}");
        assert!(out.contains(r#"<w:szCs w:val="24"/>"#), "out: {out}");
        assert!(!out.contains("36"), "out: {out}");
    }

    #[test]
    fn missing_sizes_are_injected() {
        let out = apply_xml("<w:rPr><w:b/></w:rPr>", FONT);
        assert!(out.contains(r#"<w:sz w:val="24"/>"#), "out: {out}");
        assert!(out.contains(r#"<w:szCs w:val="24"/>"#), "out: {out}");
    }

    #[test]
    fn explicit_fonts_are_forced() {
        let xml = r#"<w:rPr><w:rFonts w:ascii="Comic Sans MS" w:hAnsi="Comic Sans MS"/></w:rPr>"#;
        let out = apply_xml(xml, "Calibri");
        assert!(
            out.contains(r#"<w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:cs="Calibri"/>"#),
            "out: {out}"
        );
        assert!(!out.contains("Comic Sans"), "out: {out}");
    }

    #[test]
    fn injected_fonts_lead_the_run_properties() {
        let out = apply_xml("<w:rPr><w:b/></w:rPr>", "Calibri");
        assert!(
            out.starts_with(r#"<w:rPr><w:rFonts w:ascii="Calibri""#),
            "out: {out}"
        );
    }

    #[test]
    fn self_closed_run_properties_are_filled() {
        let out = apply_xml("<w:rPr/>", FONT);
        assert!(out.contains("<w:rFonts"), "out: {out}");
        assert!(out.contains("<w:sz "), "out: {out}");
    }

    #[test]
    fn heading_styles_are_centered() {
        let xml = r#"<w:p><w:pPr><w:pStyle w:val="Titulo1"/></w:pPr><w:r><w:t>HALLAZGOS</w:t></w:r></w:p>"#;
        let out = apply_xml(xml, FONT);
        assert!(out.contains(r#"<w:jc w:val="center"/>"#), "out: {out}");
    }

    #[test]
    fn heading_vocabulary_folds_accents() {
        let xml = r#"<w:p><w:pPr><w:pStyle w:val="Título"/></w:pPr><w:r><w:t>X</w:t></w:r></w:p>"#;
        let out = apply_xml(xml, FONT);
        assert!(out.contains(r#"<w:jc w:val="center"/>"#), "out: {out}");
    }

    #[test]
    fn body_paragraphs_are_justified() {
        let xml = "<w:p><w:r><w:t>Texto corrido.</w:t></w:r></w:p>";
        let out = apply_xml(xml, FONT);
        assert!(
            out.starts_with(r#"<w:p><w:pPr><w:jc w:val="both"/></w:pPr>"#),
            "out: {out}"
        );
    }

    #[test]
    fn existing_alignment_is_forced() {
        let xml = r#"<w:p><w:pPr><w:jc w:val="left"/></w:pPr><w:r><w:t>X</w:t></w:r></w:p>"#;
        let out = apply_xml(xml, FONT);
        assert!(out.contains(r#"<w:jc w:val="both"/>"#), "out: {out}");
        assert!(!out.contains("left"), "out: {out}");
    }

    #[test]
    fn alignment_lands_before_paragraph_mark_properties() {
        let xml = r#"<w:p><w:pPr><w:rPr><w:b/></w:rPr></w:pPr><w:r><w:t>X</w:t></w:r></w:p>"#;
        let out = apply_xml(xml, FONT);
        let jc = out.find(r#"<w:jc w:val="both"/>"#).expect("jc injected");
        let rpr = out.find("<w:rPr>").expect("rPr kept");
        assert!(jc < rpr, "out: {out}");
    }

    #[test]
    fn pass_is_idempotent() {
        let xml = concat!(
            r#"<w:document><w:body>"#,
            r#"<w:p><w:pPr><w:pStyle w:val="Titulo1"/></w:pPr>"#,
            r#"<w:r><w:rPr><w:sz w:val="40"/></w:rPr><w:t>DIAGNÓSTICO</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t>Texto corrido del informe.</w:t></w:r></w:p>"#,
            r#"</w:body></w:document>"#,
        );
        let once = apply_xml(xml, "Calibri");
        let twice = apply_xml(&once, "Calibri");
        assert_eq!(once, twice);
    }

    #[test]
    fn styles_a_whole_container() {
        let bytes = make_container("<w:document><w:p><w:r><w:t>X</w:t></w:r></w:p></w:document>");
        let out = apply_document(&bytes, FONT).unwrap();
        let xml = read_content_part(&out).unwrap();
        assert!(xml.contains(r#"<w:jc w:val="both"/>"#), "xml: {xml}");
    }
}
