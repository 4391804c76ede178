//! Fallback document assembly.
//!
//! When a doctor has no binary template, the engine builds a complete
//! container from their inline text template and branding: header with
//! logo and a ruled line, muted footer, title, a patient-info grid, and
//! the classified body. The grid and the body keep their `{{…}}`
//! placeholders as literal text: the assembled document still goes
//! through the renderer, which is what fills them in.
//!
//! Body classification is a line heuristic clinic templates rely on: a
//! line with at least one placeholder is content, a line without is a
//! section title. It is not a grammar; do not make it one.

use std::io::{Cursor, Write};

use zip::write::{SimpleFileOptions, ZipWriter};

use super::{xml_escape, DocxError};
use crate::catalog::Branding;
use crate::config::{
    DEFAULT_PRIMARY_COLOR, DEFAULT_SECONDARY_COLOR, DOCUMENT_PART, HOUSE_SIZE_HALF_POINTS,
};

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

/// Half-point sizes for the fixed regions. Body text uses the house size.
const TITLE_SIZE: u32 = 32;
const HEADER_SIZE: u32 = 20;
const FOOTER_SIZE: u32 = 16;
const FOOTER_COLOR: &str = "808080";

/// Logo display box in EMU (4.0 x 1.5 cm).
const LOGO_CX: u32 = 1_440_000;
const LOGO_CY: u32 = 540_000;

/// Build a complete container from an inline text template.
pub fn assemble(
    text: &str,
    branding: &Branding,
    logo: Option<&[u8]>,
    font: &str,
) -> Result<Vec<u8>, DocxError> {
    let primary = color_hex(branding.primary_color.as_deref(), DEFAULT_PRIMARY_COLOR);
    let secondary = color_hex(branding.secondary_color.as_deref(), DEFAULT_SECONDARY_COLOR);
    let has_logo = logo.is_some();

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    let part = |writer: &mut ZipWriter<Cursor<Vec<u8>>>,
                name: &str,
                content: &[u8]|
     -> Result<(), DocxError> {
        writer.start_file(name, options)?;
        writer.write_all(content)?;
        Ok(())
    };

    part(&mut writer, "[Content_Types].xml", content_types(has_logo).as_bytes())?;
    part(&mut writer, "_rels/.rels", ROOT_RELS.as_bytes())?;
    part(
        &mut writer,
        DOCUMENT_PART,
        document_xml(text, font, &primary, &secondary).as_bytes(),
    )?;
    part(&mut writer, "word/_rels/document.xml.rels", DOCUMENT_RELS.as_bytes())?;
    part(
        &mut writer,
        "word/header1.xml",
        header_xml(branding, font, &secondary, has_logo).as_bytes(),
    )?;
    part(&mut writer, "word/footer1.xml", footer_xml(branding, font).as_bytes())?;
    if let Some(bytes) = logo {
        part(&mut writer, "word/_rels/header1.xml.rels", HEADER_RELS.as_bytes())?;
        part(&mut writer, "word/media/logo.png", bytes)?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Normalize a configured color: RRGGBB hex with or without `#`.
/// Anything else falls back to the default.
fn color_hex(value: Option<&str>, default: &str) -> String {
    let candidate = value.unwrap_or("").trim().trim_start_matches('#');
    if candidate.len() == 6 && candidate.chars().all(|c| c.is_ascii_hexdigit()) {
        candidate.to_uppercase()
    } else {
        default.to_string()
    }
}

// ─── Runs and paragraphs ────────────────────────────────────────────────────

fn run_props(font: &str, size: u32, bold: bool, color: Option<&str>) -> String {
    let family = xml_escape(font);
    let mut props = format!(r#"<w:rPr><w:rFonts w:ascii="{family}" w:hAnsi="{family}" w:cs="{family}"/>"#);
    if bold {
        props.push_str("<w:b/>");
    }
    if let Some(color) = color {
        props.push_str(&format!(r#"<w:color w:val="{color}"/>"#));
    }
    props.push_str(&format!(r#"<w:sz w:val="{size}"/><w:szCs w:val="{size}"/></w:rPr>"#));
    props
}

fn text_run(text: &str, props: &str) -> String {
    format!(
        r#"<w:r>{props}<w:t xml:space="preserve">{}</w:t></w:r>"#,
        xml_escape(text)
    )
}

fn spacing_paragraph() -> String {
    r#"<w:p><w:pPr><w:spacing w:after="120"/></w:pPr></w:p>"#.to_string()
}

fn title_paragraph(font: &str, primary: &str) -> String {
    let run = text_run(
        "INFORME MÉDICO",
        &run_props(font, TITLE_SIZE, true, Some(primary)),
    );
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="Titulo"/><w:jc w:val="center"/><w:spacing w:after="240"/></w:pPr>{run}</w:p>"#
    )
}

fn body_paragraph(line: &str, font: &str) -> String {
    let run = text_run(line, &run_props(font, HOUSE_SIZE_HALF_POINTS, false, None));
    format!(r#"<w:p><w:pPr><w:jc w:val="both"/></w:pPr>{run}</w:p>"#)
}

fn section_title_paragraph(line: &str, font: &str, primary: &str, secondary: &str) -> String {
    let run = text_run(line, &run_props(font, HOUSE_SIZE_HALF_POINTS, true, Some(primary)));
    format!(
        r#"<w:p><w:pPr><w:pBdr><w:bottom w:val="single" w:sz="6" w:space="1" w:color="{secondary}"/></w:pBdr><w:spacing w:before="240" w:after="120"/></w:pPr>{run}</w:p>"#
    )
}

/// A line with a placeholder is content; a line without is a section
/// title.
fn has_placeholder(line: &str) -> bool {
    line.find("{{").is_some_and(|i| line[i..].contains("}}"))
}

fn template_body(text: &str, font: &str, primary: &str, secondary: &str) -> String {
    // Clinic-stored templates carry literal escape sequences.
    let normalized = text.replace("\\r\\n", "\n").replace("\\n", "\n");
    let mut xml = String::new();
    for raw_line in normalized.lines() {
        let line = raw_line.trim_end_matches('\r').trim();
        if line.is_empty() {
            xml.push_str(&spacing_paragraph());
        } else if has_placeholder(line) {
            xml.push_str(&body_paragraph(line, font));
        } else {
            xml.push_str(&section_title_paragraph(line, font, primary, secondary));
        }
    }
    xml
}

// ─── Patient grid ───────────────────────────────────────────────────────────

fn grid_cell(label: &str, placeholder: &str, font: &str) -> String {
    let label_run = text_run(label, &run_props(font, HOUSE_SIZE_HALF_POINTS, true, None));
    let value_run = text_run(placeholder, &run_props(font, HOUSE_SIZE_HALF_POINTS, false, None));
    format!(
        r#"<w:tc><w:tcPr><w:tcW w:w="4820" w:type="dxa"/></w:tcPr><w:p>{label_run}{value_run}</w:p></w:tc>"#
    )
}

/// Two-by-two key/value grid. The values are placeholders on purpose:
/// the grid participates in the later render step like any other
/// template text.
fn patient_grid(font: &str) -> String {
    let rows = [
        [("Paciente: ", "{{paciente}}"), ("Edad: ", "{{edad}}")],
        [
            ("Identificación: ", "{{identificacion}}"),
            ("Fecha: ", "{{fecha}}"),
        ],
    ];
    let mut xml = String::from(
        r#"<w:tbl><w:tblPr><w:tblW w:w="9640" w:type="dxa"/><w:tblLayout w:type="fixed"/></w:tblPr><w:tblGrid><w:gridCol w:w="4820"/><w:gridCol w:w="4820"/></w:tblGrid>"#,
    );
    for row in rows {
        xml.push_str("<w:tr>");
        for (label, placeholder) in row {
            xml.push_str(&grid_cell(label, placeholder, font));
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
    xml
}

// ─── Parts ──────────────────────────────────────────────────────────────────

fn document_xml(text: &str, font: &str, primary: &str, secondary: &str) -> String {
    let mut body = String::new();
    body.push_str(&title_paragraph(font, primary));
    body.push_str(&patient_grid(font));
    body.push_str(&spacing_paragraph());
    body.push_str(&template_body(text, font, primary, secondary));
    body.push_str(
        r#"<w:sectPr><w:headerReference w:type="default" r:id="rId1"/><w:footerReference w:type="default" r:id="rId2"/><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1417" w:right="1134" w:bottom="1417" w:left="1134" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr>"#,
    );
    format!(
        r#"{XML_DECL}<w:document xmlns:w="{NS_W}" xmlns:r="{NS_R}"><w:body>{body}</w:body></w:document>"#
    )
}

fn logo_run() -> String {
    format!(
        r#"<w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{LOGO_CX}" cy="{LOGO_CY}"/><wp:docPr id="1" name="Logo"/><a:graphic><a:graphicData uri="{NS_PIC}"><pic:pic><pic:nvPicPr><pic:cNvPr id="1" name="Logo"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="rId1"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{LOGO_CX}" cy="{LOGO_CY}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#
    )
}

fn header_xml(branding: &Branding, font: &str, secondary: &str, has_logo: bool) -> String {
    let date = chrono::Local::now().format("%d/%m/%Y").to_string();
    let mut runs = String::new();
    if has_logo {
        runs.push_str(&logo_run());
        runs.push_str(&text_run("  ", &run_props(font, HEADER_SIZE, false, None)));
    }
    if let Some(title) = branding.header_text.as_deref().filter(|t| !t.trim().is_empty()) {
        runs.push_str(&text_run(title.trim(), &run_props(font, HEADER_SIZE, true, None)));
        runs.push_str(&text_run(
            &format!("  ·  {date}"),
            &run_props(font, HEADER_SIZE, false, None),
        ));
    } else {
        runs.push_str(&text_run(&date, &run_props(font, HEADER_SIZE, false, None)));
    }
    let rule = format!(
        r#"<w:p><w:pPr><w:pBdr><w:bottom w:val="single" w:sz="12" w:space="1" w:color="{secondary}"/></w:pBdr><w:spacing w:after="60"/></w:pPr></w:p>"#
    );
    format!(
        r#"{XML_DECL}<w:hdr xmlns:w="{NS_W}" xmlns:r="{NS_R}" xmlns:wp="{NS_WP}" xmlns:a="{NS_A}" xmlns:pic="{NS_PIC}"><w:p><w:pPr><w:spacing w:after="60"/></w:pPr>{runs}</w:p>{rule}</w:hdr>"#
    )
}

fn footer_xml(branding: &Branding, font: &str) -> String {
    let text = branding.footer_text.as_deref().unwrap_or("").trim();
    let run = text_run(
        text,
        &run_props(font, FOOTER_SIZE, false, Some(FOOTER_COLOR)),
    );
    format!(
        r#"{XML_DECL}<w:ftr xmlns:w="{NS_W}"><w:p><w:pPr><w:jc w:val="center"/></w:pPr>{run}</w:p></w:ftr>"#
    )
}

fn content_types(has_logo: bool) -> String {
    let png_default = if has_logo {
        r#"<Default Extension="png" ContentType="image/png"/>"#
    } else {
        ""
    };
    format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>{png_default}<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/><Override PartName="/word/footer1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"/></Types>"#
    )
}

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#,
);

const DOCUMENT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer" Target="footer1.xml"/>"#,
    r#"</Relationships>"#,
);

const HEADER_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/logo.png"/>"#,
    r#"</Relationships>"#,
);
