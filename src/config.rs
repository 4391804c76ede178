use std::time::Duration;

/// Engine-level constants
pub const ENGINE_NAME: &str = "Escriba";
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// House font used when neither the request, the template, nor the doctor
/// profile names one.
pub const HOUSE_FONT: &str = "Arial";

/// House font size in half-points (24 = 12pt), the unit the document
/// format uses for `<w:sz>`.
pub const HOUSE_SIZE_HALF_POINTS: u32 = 24;

/// Default branding colors (RRGGBB, no leading `#`).
pub const DEFAULT_PRIMARY_COLOR: &str = "1F4E79";
pub const DEFAULT_SECONDARY_COLOR: &str = "2E74B5";

/// Zip entry holding the document's textual content.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// Content type of a finished report.
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Bucket holding clinic-uploaded binary templates.
pub const TEMPLATE_BUCKET: &str = "plantillas";

/// Bucket receiving finished reports.
pub const REPORT_BUCKET: &str = "informes";

/// Marker segment identifying a signed storage URL; the object path
/// follows it.
pub const SIGN_MARKER: &str = "/object/sign/";

/// Wrapper segment sometimes left at the front of storage-relative paths
/// copied out of signed URLs.
pub const SIGN_PREFIX: &str = "sign/";

/// Lifetime of re-minted signed template URLs. Short: the URL is fetched
/// immediately.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(300);

/// Timeout for every outbound HTTP call (template fetch, logo fetch,
/// storage API).
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on a downloaded template or logo. Anything larger is a
/// corrupt upload, not a document.
pub const MAX_DOWNLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Keys treated as the "preferred text" of a nested object, in lookup
/// order. Mixed Spanish/English because the form UI and the extraction
/// system disagree on spelling.
pub const PREFERRED_TEXT_KEYS: &[&str] = &[
    "descripcion",
    "descripción",
    "description",
    "contenido",
    "content",
    "valor",
    "value",
    "texto",
    "text",
];

/// Substrings that mark a paragraph style as a heading/title style.
/// Compared accent- and case-insensitively.
pub const HEADING_STYLE_TOKENS: &[&str] = &["titulo", "title", "heading", "encabezado", "subtitulo"];
