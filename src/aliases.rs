//! Key folding and the concept alias table.
//!
//! Clinical records reach the engine with inconsistently spelled keys: the
//! form UI writes `identificación`, the extraction system writes
//! `identificacion`, older records carry `cedula`. Rather than scattering
//! literal alternatives through the code, each concept owns a list of
//! accepted spellings, and every comparison goes through the folding
//! helpers here (lower-case, diacritics stripped, separators optional).

/// Strip diacritics from Latin letters, leaving everything else untouched.
/// Covers the Spanish set plus the common French/Portuguese marks that
/// show up in imported records.
pub fn strip_diacritics(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
            'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ç' => 'c',
            'Ç' => 'C',
            _ => c,
        })
        .collect()
}

/// Case- and accent-insensitive canonical form of a key.
pub fn fold(input: &str) -> String {
    strip_diacritics(input).to_lowercase()
}

/// Remove the separators key variants disagree on: underscores and spaces.
pub fn strip_separators(input: &str) -> String {
    input.chars().filter(|c| *c != '_' && *c != ' ').collect()
}

/// Folded form with separators removed as well. The loosest comparison
/// the engine ever performs.
pub fn fold_compact(input: &str) -> String {
    strip_separators(&fold(input))
}

// ─── Concept alias table ──────────────────────────────────────────────

/// A named concept plus every spelling producers are known to use for it.
#[derive(Debug, Clone, Copy)]
pub struct Concept {
    /// The spelling templates are documented to use (`{{paciente}}`, ...).
    pub canonical: &'static str,
    pub spellings: &'static [&'static str],
}

impl Concept {
    /// Whether `identifier` is an accepted spelling of this concept,
    /// compared in compact folded form.
    pub fn matches(&self, identifier: &str) -> bool {
        let folded = fold_compact(identifier);
        self.spellings.iter().any(|s| fold_compact(s) == folded)
    }
}

pub const PATIENT_NAME: Concept = Concept {
    canonical: "paciente",
    spellings: &[
        "paciente",
        "nombre_paciente",
        "nombre",
        "nombre_completo",
        "patient",
    ],
};

pub const PATIENT_AGE: Concept = Concept {
    canonical: "edad",
    spellings: &["edad", "age"],
};

pub const PATIENT_ID: Concept = Concept {
    canonical: "identificacion",
    spellings: &[
        "identificacion",
        "identificación",
        "cedula",
        "cédula",
        "documento",
        "numero_documento",
    ],
};

pub const REPORT_DATE: Concept = Concept {
    canonical: "fecha",
    spellings: &["fecha", "fecha_consulta", "fecha_informe", "date"],
};

pub const DOCTOR_NAME: Concept = Concept {
    canonical: "doctor",
    spellings: &["doctor", "medico", "médico", "profesional", "nombre_doctor"],
};

/// The report body when the caller supplies pre-rendered content.
pub const REPORT_CONTENT: Concept = Concept {
    canonical: "contenido",
    spellings: &["contenido", "content", "cuerpo", "texto_informe"],
};

/// The metadata concepts the orchestrator seeds before the recursive
/// walk, and the only ones still resolved inside caller-supplied
/// pre-rendered content.
pub const METADATA_CONCEPTS: &[Concept] = &[
    PATIENT_NAME,
    PATIENT_AGE,
    PATIENT_ID,
    REPORT_DATE,
    DOCTOR_NAME,
];

/// Whether `identifier` spells any metadata concept.
pub fn is_metadata_identifier(identifier: &str) -> bool {
    METADATA_CONCEPTS.iter().any(|c| c.matches(identifier))
}
