//! Content-type resolution from keys, filenames and declared MIME types.

/// Fallback for extensions with no known mapping.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Resolve the content type for a key or filename.
///
/// A non-empty declared type wins verbatim; otherwise the lowercase extension
/// after the last `.` is mapped, falling back to `application/octet-stream`.
#[must_use]
pub fn resolve_content_type(key_or_filename: &str, declared: Option<&str>) -> String {
    if let Some(declared) = declared.filter(|d| !d.trim().is_empty()) {
        return declared.to_string();
    }

    let extension = key_or_filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        _ => OCTET_STREAM,
    }
    .to_string()
}

/// File extension to use for an image when the source name carries none.
///
/// Parameters such as `; charset=...` are ignored.
#[must_use]
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/bmp" => "bmp",
        "application/pdf" => "pdf",
        _ => "jpg",
    }
}
