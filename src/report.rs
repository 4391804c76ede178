//! Report generation orchestrator.
//!
//! Single entry point that drives the full pipeline:
//! symbol table → template resolution → fetch → render or assemble →
//! upload. Storage sits behind a trait so the orchestrator stays fully
//! testable with the in-memory mock.

use std::sync::Arc;

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

use crate::aliases::{METADATA_CONCEPTS, REPORT_CONTENT};
use crate::catalog::{Branding, ReportKind, TemplateCatalog, TemplateSource};
use crate::compose;
use crate::config::{DOCX_CONTENT_TYPE, HOUSE_FONT, REPORT_BUCKET};
use crate::docx::{builder, render_document, typography, RenderError};
use crate::fetch::{DownloadError, TemplateFetcher};
use crate::record::ClinicalRecord;
use crate::resolver::{self, ResolveError};
use crate::storage::{
    object_key, HttpStorageClient, StorageClient, StorageError, UploadError,
};
use crate::symbols::SymbolTable;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while generating one report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Template resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Template download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("Storage client error: {0}")]
    Storage(#[from] StorageError),
}

// ---------------------------------------------------------------------------
// Request and outcome types
// ---------------------------------------------------------------------------

/// Who is writing: name, specialties and the template catalog the
/// doctor has configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorProfile {
    #[serde(alias = "nombre", alias = "nombre_completo")]
    pub full_name: String,
    #[serde(default, alias = "especialidades")]
    pub specialties: Vec<String>,
    #[serde(default, alias = "fuente")]
    pub font: Option<String>,
    #[serde(default, alias = "plantillas")]
    pub catalog: TemplateCatalog,
}

/// Everything one generation needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(alias = "consulta_id")]
    pub consultation_id: String,
    #[serde(alias = "tipo")]
    pub kind: ReportKind,
    #[serde(alias = "registro")]
    pub record: ClinicalRecord,
    #[serde(alias = "medico")]
    pub doctor: DoctorProfile,
    #[serde(default, alias = "marca")]
    pub branding: Branding,
    /// Wins over the template's and the doctor's font when set.
    #[serde(default, alias = "fuente")]
    pub font_override: Option<String>,
    /// Pre-written report body, treated as final prose. Only metadata
    /// markers inside it are resolved; the result becomes the assembled
    /// body on the text path and feeds the `{{contenido}}` placeholder
    /// on the binary path.
    #[serde(default, alias = "contenido")]
    pub prepared_content: Option<String>,
}

/// Summary returned to the caller after a successful generation.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedReport {
    pub object_key: String,
    pub retrieval_url: String,
    pub size: usize,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives one report from clinical record to uploaded document.
pub struct ReportGenerator {
    storage: Arc<dyn StorageClient>,
    fetcher: TemplateFetcher,
}

impl ReportGenerator {
    pub fn new(storage: Arc<dyn StorageClient>, fetcher: TemplateFetcher) -> Self {
        Self { storage, fetcher }
    }

    /// Full pipeline for one request.
    ///
    /// 1. Flatten the record into a symbol table (identity seeds first)
    /// 2. Resolve the template source from the doctor's catalog
    /// 3. Binary source → download, render, restyle
    ///    Text source → assemble a branded document, render
    /// 4. Upload under a fresh collision-free key
    pub fn generate(&self, request: &ReportRequest) -> Result<GeneratedReport, ReportError> {
        let mut symbols = seed_symbols(request);

        // Caller-supplied content is final prose: resolve only its
        // metadata markers, preserve the rest.
        let prepared = request
            .prepared_content
            .as_deref()
            .map(|content| compose::resolve_metadata(content, &symbols));
        if let Some(resolved) = prepared.as_deref() {
            symbols.insert_concept(&REPORT_CONTENT, resolved);
        }
        symbols.extend_from_record(&request.record, true);

        tracing::info!(
            consultation = %request.consultation_id,
            kind = %request.kind,
            symbols = symbols.len(),
            "Report: resolving template"
        );
        let source = resolver::resolve(
            request.kind,
            &request.doctor.specialties,
            &request.doctor.catalog,
        )?;

        let font = request
            .font_override
            .as_deref()
            .or_else(|| source.font())
            .or(request.doctor.font.as_deref())
            .unwrap_or(HOUSE_FONT)
            .to_string();

        let bytes = match &source {
            TemplateSource::Binary { address, name, .. } => {
                tracing::info!(
                    consultation = %request.consultation_id,
                    template = name.as_deref().unwrap_or("sin nombre"),
                    "Report: rendering stored template"
                );
                let template = self.fetcher.fetch(address, self.storage.as_ref())?;
                let rendered = render_document(&template, &symbols)?;
                restyle_best_effort(&request.consultation_id, rendered, &font)
            }
            TemplateSource::Text { body, .. } => {
                tracing::info!(
                    consultation = %request.consultation_id,
                    "Report: assembling document from text template"
                );
                let logo = match request.branding.logo_url.as_deref() {
                    Some(url) => Some(self.fetcher.fetch(url, self.storage.as_ref())?),
                    None => None,
                };
                let body = prepared.as_deref().unwrap_or(body.as_str());
                let assembled =
                    builder::assemble(body, &request.branding, logo.as_deref(), &font)
                        .map_err(RenderError::Docx)?;
                // Assembled documents already carry house styling; the
                // typography pass would flatten the title sizing.
                render_document(&assembled, &symbols)?
            }
        };

        let key = object_key(&request.consultation_id, Utc::now());
        self.storage
            .upload(REPORT_BUCKET, &key, &bytes, DOCX_CONTENT_TYPE, false)?;
        let retrieval_url = self.storage.public_url(REPORT_BUCKET, &key);

        tracing::info!(
            consultation = %request.consultation_id,
            key = %key,
            size = bytes.len(),
            "Report complete"
        );

        Ok(GeneratedReport {
            object_key: key,
            retrieval_url,
            size: bytes.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Styling never blocks delivery: a typography failure downgrades to a
/// warning and the rendered document goes out unstyled.
fn restyle_best_effort(consultation: &str, rendered: Vec<u8>, font: &str) -> Vec<u8> {
    match typography::apply_document(&rendered, font) {
        Ok(styled) => styled,
        Err(e) => {
            tracing::warn!(
                consultation = %consultation,
                error = %e,
                "Typography pass failed, keeping rendered document"
            );
            rendered
        }
    }
}

/// Identity concepts go in before anything else so they win the
/// first-writer rule. They keep the casing the clinic wrote; the later
/// record walk uppercases clinical values.
fn seed_symbols(request: &ReportRequest) -> SymbolTable {
    let mut symbols = SymbolTable::new();

    for concept in METADATA_CONCEPTS {
        if let Some(value) = request.record.concept_value(concept, false) {
            symbols.insert_concept(concept, &value);
        }
    }
    if !request.doctor.full_name.is_empty() {
        symbols.insert_concept(&crate::aliases::DOCTOR_NAME, &request.doctor.full_name);
    }
    symbols.insert_concept(
        &crate::aliases::REPORT_DATE,
        &Local::now().format("%d/%m/%Y").to_string(),
    );
    symbols
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build a `ReportGenerator` against the clinic's storage API.
pub fn build_generator(storage_url: &str, api_key: &str) -> Result<ReportGenerator, ReportError> {
    let storage = HttpStorageClient::new(storage_url, api_key)?;
    let fetcher = TemplateFetcher::new()?;
    Ok(ReportGenerator::new(Arc::new(storage), fetcher))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
