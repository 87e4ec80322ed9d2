//! Export formats accepted for Drive-native document types.
//!
//! Each native type has a whitelist; the first entry is its default. A
//! request for an unlisted format falls back to that default.

pub const DOCUMENT_MIME: &str = "application/vnd.google-apps.document";
pub const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
pub const DRAWING_MIME: &str = "application/vnd.google-apps.drawing";
pub const PRESENTATION_MIME: &str = "application/vnd.google-apps.presentation";

const DOCUMENT_FORMATS: &[&str] = &[
    "application/pdf",
    "text/html",
    "application/zip",
    "text/plain",
    "application/rtf",
    "application/vnd.oasis.opendocument.text",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/epub+zip",
];

const SPREADSHEET_FORMATS: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/x-vnd.oasis.opendocument.spreadsheet",
    "application/pdf",
    "text/csv",
    "text/tab-separated-values",
    "application/zip",
];

const DRAWING_FORMATS: &[&str] = &["image/jpeg", "image/png", "image/svg+xml", "application/pdf"];

const PRESENTATION_FORMATS: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.oasis.opendocument.presentation",
    "application/pdf",
    "text/plain",
];

/// Accepted export formats for a source MIME type, default first.
/// Empty for types without an export whitelist.
pub fn export_formats(source_mime: &str) -> &'static [&'static str] {
    match source_mime {
        DOCUMENT_MIME => DOCUMENT_FORMATS,
        SPREADSHEET_MIME => SPREADSHEET_FORMATS,
        DRAWING_MIME => DRAWING_FORMATS,
        PRESENTATION_MIME => PRESENTATION_FORMATS,
        _ => &[],
    }
}

/// Validate a requested export format against the source type's whitelist.
///
/// Unlisted formats are silently replaced by the default. Source types
/// without a whitelist pass the request through unchanged.
pub fn validated_export_format(source_mime: &str, requested: &str) -> String {
    let formats = export_formats(source_mime);
    match formats.first() {
        Some(default) if !formats.contains(&requested) => default.to_string(),
        _ => requested.to_string(),
    }
}
