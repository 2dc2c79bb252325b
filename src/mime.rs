//! Content-type inference from filename extensions.

/// Fallback type for unknown extensions and forced downloads.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Map a filename to the MIME type sent as `Content-Type`.
///
/// `force_download` short-circuits to `application/octet-stream` so
/// browsers save the file instead of rendering it inline. The
/// extension match is deliberately case-sensitive: `photo.PNG` is
/// served as an opaque blob, not an image.
pub fn resolve_type(filename: &str, force_download: bool) -> &'static str {
    if force_download {
        return OCTET_STREAM;
    }

    let Some((_, extension)) = filename.rsplit_once('.') else {
        return OCTET_STREAM;
    };

    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "gif" => "image/gif",
        _ => OCTET_STREAM,
    }
}
