//! Doctor-configured template catalog and the resolved template source.
//!
//! The catalog is clinic-authored JSON: one entry per specialty or report
//! type, each naming a binary document address, a font, an inline text
//! template, or any mix of the three. Obstetric entries may nest
//! per-trimester variants. Field names accept the Spanish spellings the
//! configuration UI historically wrote.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which report the caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    General,
    FirstTrimester,
    SecondThirdTrimester,
}

impl ReportKind {
    /// Timed obstetric kinds resolve through the obstetric catalog entry
    /// before anything else.
    pub fn is_obstetric(&self) -> bool {
        matches!(self, Self::FirstTrimester | Self::SecondThirdTrimester)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::FirstTrimester => "first_trimester",
            Self::SecondThirdTrimester => "second_third_trimester",
        }
    }

    /// Human phrasing used in not-found errors.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::FirstTrimester => "primer trimestre",
            Self::SecondThirdTrimester => "segundo/tercer trimestre",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One configured template bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Address of the binary document: signed storage URL, public URL,
    /// or storage-relative path.
    #[serde(default, alias = "url")]
    pub document_url: Option<String>,
    #[serde(default, alias = "fuente")]
    pub font: Option<String>,
    /// Inline text template, used when no binary document exists.
    #[serde(default, alias = "texto")]
    pub text: Option<String>,
    #[serde(default, alias = "nombre")]
    pub name: Option<String>,
    /// Per-trimester sub-descriptors for obstetric entries.
    #[serde(default, alias = "variantes")]
    pub variants: Option<TrimesterVariants>,
}

impl CatalogEntry {
    /// An entry is usable when it can actually produce a document.
    pub fn is_usable(&self) -> bool {
        self.document_url.is_some() || self.text.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrimesterVariants {
    #[serde(default, alias = "primer_trimestre")]
    pub first: Option<Box<CatalogEntry>>,
    #[serde(default, alias = "segundo_tercer_trimestre")]
    pub second_third: Option<Box<CatalogEntry>>,
}

impl TrimesterVariants {
    pub fn for_kind(&self, kind: ReportKind) -> Option<&CatalogEntry> {
        match kind {
            ReportKind::FirstTrimester => self.first.as_deref(),
            ReportKind::SecondThirdTrimester => self.second_third.as_deref(),
            ReportKind::General => None,
        }
    }
}

/// Everything one doctor has configured. Keys are specialty-or-type
/// names as the clinic wrote them; ordered so resolution scans are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateCatalog {
    #[serde(default, alias = "plantillas")]
    pub entries: BTreeMap<String, CatalogEntry>,
    /// The single general-purpose fallback template.
    #[serde(default)]
    pub general: Option<CatalogEntry>,
}

/// Clinic branding applied by the fallback assembler: colors, header
/// and footer text, optional logo. Colors are RRGGBB hex, with or
/// without a leading `#`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branding {
    #[serde(default, alias = "color_primario")]
    pub primary_color: Option<String>,
    #[serde(default, alias = "color_secundario")]
    pub secondary_color: Option<String>,
    #[serde(default, alias = "fuente")]
    pub font: Option<String>,
    #[serde(default, alias = "encabezado")]
    pub header_text: Option<String>,
    #[serde(default, alias = "pie_pagina")]
    pub footer_text: Option<String>,
    /// Logo address, any of the shapes the template loader accepts.
    #[serde(default, alias = "logo")]
    pub logo_url: Option<String>,
}

/// The resolved template for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateDescriptor {
    pub document_url: Option<String>,
    pub font: Option<String>,
    pub text: Option<String>,
    pub name: Option<String>,
}

impl TemplateDescriptor {
    pub fn from_entry(entry: &CatalogEntry) -> Self {
        Self {
            document_url: entry.document_url.clone(),
            font: entry.font.clone(),
            text: entry.text.clone(),
            name: entry.name.clone(),
        }
    }

    /// Variant descriptor inheriting font and display name from its
    /// parent obstetric entry where the variant leaves them unset.
    pub fn from_variant(variant: &CatalogEntry, parent: &CatalogEntry) -> Self {
        Self {
            document_url: variant.document_url.clone(),
            font: variant.font.clone().or_else(|| parent.font.clone()),
            text: variant.text.clone(),
            name: variant.name.clone().or_else(|| parent.name.clone()),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.document_url.is_some() || self.text.is_some()
    }

    /// Collapse into the path the engine will take. Binary wins when
    /// both a document address and inline text are present.
    pub fn into_source(self) -> Option<TemplateSource> {
        if let Some(address) = self.document_url {
            return Some(TemplateSource::Binary {
                address,
                font: self.font,
                name: self.name,
            });
        }
        self.text.map(|body| TemplateSource::Text {
            body,
            font: self.font,
            name: self.name,
        })
    }
}

/// Which generation path a resolved template takes.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSource {
    /// Download the binary document and render placeholders inside it.
    Binary {
        address: String,
        font: Option<String>,
        name: Option<String>,
    },
    /// No binary document: assemble one from the inline text template.
    Text {
        body: String,
        font: Option<String>,
        name: Option<String>,
    },
}

impl TemplateSource {
    pub fn font(&self) -> Option<&str> {
        match self {
            Self::Binary { font, .. } | Self::Text { font, .. } => font.as_deref(),
        }
    }
}
