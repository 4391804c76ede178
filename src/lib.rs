//! Escriba: clinical report generation for Spanish-language clinics.
//!
//! Takes one consultation's clinical record (schemaless JSON), the
//! doctor's template catalog and the clinic's branding, and produces a
//! finished `.docx` report in storage. Stored binary templates are
//! rendered in place; doctors without one get a document assembled from
//! scratch with the clinic's styling.

pub mod aliases;
pub mod catalog;
pub mod compose;
pub mod config;
pub mod docx;
pub mod fetch;
pub mod record;
pub mod report; // orchestrator: record → template → upload
pub mod resolver;
pub mod storage;
pub mod symbols;

pub use catalog::{Branding, ReportKind, TemplateCatalog};
pub use record::ClinicalRecord;
pub use report::{
    build_generator, DoctorProfile, GeneratedReport, ReportError, ReportGenerator, ReportRequest,
};
pub use symbols::SymbolTable;
