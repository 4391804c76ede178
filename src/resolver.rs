//! Template source resolution.
//!
//! Given the requested report kind, the doctor's specialties, and their
//! configured catalog, pick the one template the request will use. The
//! ladder is fixed: obstetric trimester entries first (for timed
//! obstetric reports), then the primary specialty, then the general
//! template. The first usable match wins; a trimester entry is never
//! borrowed across trimesters.

use thiserror::Error;

use crate::aliases;
use crate::catalog::{ReportKind, TemplateCatalog, TemplateDescriptor, TemplateSource};

/// Substring identifying obstetric catalog keys, in folded form.
const OBSTETRIC_MARKER: &str = "obstetr";

/// Flat-key trimester markers, folded. A key must carry a marker of the
/// requested trimester to match; markers of the other trimester never do.
const FIRST_TRIMESTER_MARKERS: &[&str] = &["primer", "first"];
const SECOND_THIRD_MARKERS: &[&str] = &["segundo", "tercer", "second", "third"];

#[derive(Debug, Error)]
pub enum ResolveError {
    /// No usable template anywhere in the ladder. The reason is shown to
    /// the clinic as-is.
    #[error("{reason}")]
    TemplateNotFound { reason: String },
}

/// Resolve the template source for one request. First match wins.
pub fn resolve(
    kind: ReportKind,
    specialties: &[String],
    catalog: &TemplateCatalog,
) -> Result<TemplateSource, ResolveError> {
    if kind.is_obstetric() {
        if let Some(source) = resolve_obstetric(kind, catalog) {
            tracing::debug!(kind = %kind, "Template resolution: obstetric entry matched");
            return Ok(source);
        }
    }

    if let Some(source) = resolve_specialty(specialties, catalog) {
        tracing::debug!(kind = %kind, "Template resolution: specialty entry matched");
        return Ok(source);
    }

    if let Some(general) = catalog.general.as_ref().filter(|e| e.is_usable()) {
        if let Some(source) = TemplateDescriptor::from_entry(general).into_source() {
            tracing::debug!(kind = %kind, "Template resolution: general template used");
            return Ok(source);
        }
    }

    Err(ResolveError::TemplateNotFound {
        reason: not_found_reason(kind),
    })
}

fn not_found_reason(kind: ReportKind) -> String {
    if kind.is_obstetric() {
        format!(
            "no hay plantilla configurada para informes de obstetricia ({}) ni plantilla general",
            kind.describe()
        )
    } else {
        "no hay plantilla configurada para la especialidad ni una plantilla general".to_string()
    }
}

/// Obstetric step: nested per-trimester variants on an obstetric entry
/// are preferred; otherwise a flat key carrying the right trimester
/// marker. Returns `None` when neither exists for this trimester, which
/// sends the ladder on to the specialty and general steps.
fn resolve_obstetric(kind: ReportKind, catalog: &TemplateCatalog) -> Option<TemplateSource> {
    for (key, entry) in &catalog.entries {
        if !aliases::fold(key).contains(OBSTETRIC_MARKER) {
            continue;
        }
        if let Some(variant) = entry.variants.as_ref().and_then(|v| v.for_kind(kind)) {
            let descriptor = TemplateDescriptor::from_variant(variant, entry);
            if descriptor.is_usable() {
                return descriptor.into_source();
            }
        }
    }

    let markers = match kind {
        ReportKind::FirstTrimester => FIRST_TRIMESTER_MARKERS,
        ReportKind::SecondThirdTrimester => SECOND_THIRD_MARKERS,
        ReportKind::General => return None,
    };
    for (key, entry) in &catalog.entries {
        let folded = aliases::fold(key);
        if folded.contains(OBSTETRIC_MARKER)
            && markers.iter().any(|m| folded.contains(m))
            && entry.is_usable()
        {
            return TemplateDescriptor::from_entry(entry).into_source();
        }
    }
    None
}

/// Specialty step: exact key match on the primary specialty, then a
/// diacritic-stripped lower-cased comparison against every key.
fn resolve_specialty(specialties: &[String], catalog: &TemplateCatalog) -> Option<TemplateSource> {
    let primary = specialties.iter().find(|s| !s.trim().is_empty())?;

    if let Some(entry) = catalog.entries.get(primary.as_str()).filter(|e| e.is_usable()) {
        return TemplateDescriptor::from_entry(entry).into_source();
    }

    let folded = aliases::fold(primary);
    catalog
        .entries
        .iter()
        .find(|(key, entry)| aliases::fold(key) == folded && entry.is_usable())
        .and_then(|(_, entry)| TemplateDescriptor::from_entry(entry).into_source())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, TrimesterVariants};

    fn binary_entry(url: &str) -> CatalogEntry {
        CatalogEntry {
            document_url: Some(url.into()),
            ..Default::default()
        }
    }

    fn text_entry(text: &str) -> CatalogEntry {
        CatalogEntry {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn address(source: TemplateSource) -> String {
        match source {
            TemplateSource::Binary { address, .. } => address,
            TemplateSource::Text { .. } => panic!("expected binary source"),
        }
    }

    // -- obstetric step ------------------------------------------------

    #[test]
    fn nested_variant_matches_its_own_trimester() {
        let mut catalog = TemplateCatalog::default();
        catalog.entries.insert(
            "Ginecología y Obstetricia".into(),
            CatalogEntry {
                font: Some("Georgia".into()),
                variants: Some(TrimesterVariants {
                    first: Some(Box::new(binary_entry("plantillas/obs-t1.docx"))),
                    second_third: Some(Box::new(binary_entry("plantillas/obs-t23.docx"))),
                }),
                ..Default::default()
            },
        );

        let source = resolve(ReportKind::SecondThirdTrimester, &[], &catalog).unwrap();
        match source {
            TemplateSource::Binary { address, font, .. } => {
                assert_eq!(address, "plantillas/obs-t23.docx");
                // Font inherited from the obstetric parent.
                assert_eq!(font.as_deref(), Some("Georgia"));
            }
            other => panic!("expected binary source, got {other:?}"),
        }
    }

    #[test]
    fn trimester_entry_is_never_borrowed_across_kinds() {
        // Catalog holds only a first-trimester obstetric binary; a
        // second/third-trimester request must fall through to the
        // general template.
        let mut catalog = TemplateCatalog::default();
        catalog.entries.insert(
            "Obstetricia".into(),
            CatalogEntry {
                variants: Some(TrimesterVariants {
                    first: Some(Box::new(binary_entry("plantillas/obs-t1.docx"))),
                    second_third: None,
                }),
                ..Default::default()
            },
        );
        catalog.general = Some(binary_entry("plantillas/general.docx"));

        let source = resolve(ReportKind::SecondThirdTrimester, &[], &catalog).unwrap();
        assert_eq!(address(source), "plantillas/general.docx");
    }

    #[test]
    fn trimester_miss_without_general_is_not_found() {
        let mut catalog = TemplateCatalog::default();
        catalog.entries.insert(
            "Obstetricia".into(),
            CatalogEntry {
                variants: Some(TrimesterVariants {
                    first: Some(Box::new(binary_entry("plantillas/obs-t1.docx"))),
                    second_third: None,
                }),
                ..Default::default()
            },
        );

        let err = resolve(ReportKind::SecondThirdTrimester, &[], &catalog).unwrap_err();
        let ResolveError::TemplateNotFound { reason } = err;
        assert!(reason.contains("obstetricia"), "reason: {reason}");
        assert!(reason.contains("segundo/tercer trimestre"), "reason: {reason}");
    }

    #[test]
    fn flat_trimester_keys_match_by_marker() {
        let mut catalog = TemplateCatalog::default();
        catalog.entries.insert(
            "obstetricia_primer_trimestre".into(),
            binary_entry("plantillas/obs-t1.docx"),
        );
        catalog.entries.insert(
            "obstetricia_segundo_tercer_trimestre".into(),
            binary_entry("plantillas/obs-t23.docx"),
        );

        let first = resolve(ReportKind::FirstTrimester, &[], &catalog).unwrap();
        assert_eq!(address(first), "plantillas/obs-t1.docx");

        let later = resolve(ReportKind::SecondThirdTrimester, &[], &catalog).unwrap();
        assert_eq!(address(later), "plantillas/obs-t23.docx");
    }

    #[test]
    fn obstetric_match_folds_key_case() {
        let mut catalog = TemplateCatalog::default();
        catalog.entries.insert(
            "OBSTETRICIA PRIMER TRIMESTRE".into(),
            binary_entry("plantillas/obs-t1.docx"),
        );
        let source = resolve(ReportKind::FirstTrimester, &[], &catalog).unwrap();
        assert_eq!(address(source), "plantillas/obs-t1.docx");
    }

    // -- specialty and general steps -----------------------------------

    #[test]
    fn exact_specialty_match_wins() {
        let mut catalog = TemplateCatalog::default();
        catalog
            .entries
            .insert("Pediatría".into(), binary_entry("plantillas/pediatria.docx"));

        let source = resolve(
            ReportKind::General,
            &["Pediatría".to_string()],
            &catalog,
        )
        .unwrap();
        assert_eq!(address(source), "plantillas/pediatria.docx");
    }

    #[test]
    fn specialty_match_retries_without_diacritics() {
        let mut catalog = TemplateCatalog::default();
        catalog
            .entries
            .insert("pediatria".into(), binary_entry("plantillas/pediatria.docx"));

        let source = resolve(
            ReportKind::General,
            &["PEDIATRÍA".to_string()],
            &catalog,
        )
        .unwrap();
        assert_eq!(address(source), "plantillas/pediatria.docx");
    }

    #[test]
    fn unusable_specialty_entry_falls_through_to_general() {
        let mut catalog = TemplateCatalog::default();
        // Entry exists but has neither document nor text.
        catalog.entries.insert("Pediatría".into(), CatalogEntry::default());
        catalog.general = Some(text_entry("Paciente: {{paciente}}"));

        let source = resolve(
            ReportKind::General,
            &["Pediatría".to_string()],
            &catalog,
        )
        .unwrap();
        assert!(matches!(source, TemplateSource::Text { .. }));
    }

    #[test]
    fn text_only_general_signals_the_fallback_assembler() {
        let mut catalog = TemplateCatalog::default();
        catalog.general = Some(text_entry("Paciente: {{paciente}}\nDIAGNÓSTICO"));

        let source = resolve(ReportKind::General, &[], &catalog).unwrap();
        match source {
            TemplateSource::Text { body, .. } => assert!(body.contains("{{paciente}}")),
            other => panic!("expected text source, got {other:?}"),
        }
    }

    #[test]
    fn empty_catalog_reports_general_phrasing() {
        let err = resolve(ReportKind::General, &[], &TemplateCatalog::default()).unwrap_err();
        let ResolveError::TemplateNotFound { reason } = err;
        assert!(reason.contains("general"), "reason: {reason}");
        assert!(!reason.contains("obstetricia"), "reason: {reason}");
    }
}
