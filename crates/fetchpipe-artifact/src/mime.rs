//! Mimetype sniffing and mimetype ↔ extension mapping
//!
//! Extensions are stored without their leading dot. The primary extension
//! of a mimetype is the one used to name intermediate artifacts.

use image::ImageFormat;

/// Primary extension where the registry's first entry is not the usual one
const PRIMARY: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/tiff", "tiff"),
    ("image/svg+xml", "svg"),
    ("text/html", "html"),
    ("text/plain", "txt"),
    ("application/octet-stream", "bin"),
];

/// Strip parameters and normalize case: `Image/JPEG; q=1` → `image/jpeg`.
fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// All extensions associated with `mime_type`.
///
/// Empty for unknown mimetypes.
#[must_use]
pub fn extensions_for(mime_type: &str) -> &'static [&'static str] {
    let essence = essence(mime_type);
    mime_guess::get_mime_extensions_str(&essence)
        .or_else(|| ImageFormat::from_mime_type(&essence).map(ImageFormat::extensions_str))
        .unwrap_or(&[])
}

/// Extension used when naming an artifact of this mimetype
#[must_use]
pub fn primary_extension(mime_type: &str) -> Option<&'static str> {
    let essence = essence(mime_type);
    PRIMARY
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
        .or_else(|| extensions_for(&essence).first().copied())
}

/// Whether `extension` (with or without leading dot, any case) belongs to
/// `mime_type`.
#[must_use]
pub fn accepts_extension(mime_type: &str, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.').to_ascii_lowercase();
    primary_extension(mime_type) == Some(wanted.as_str())
        || extensions_for(mime_type).iter().any(|ext| *ext == wanted)
}

/// Guess a mimetype from the leading bytes of a resource.
///
/// Raster formats are recognized by their magic numbers; a few textual
/// formats by their opening markup. Anything else that decodes as text is
/// `text/plain`, the rest (including an empty head) is
/// `application/octet-stream`.
#[must_use]
pub fn sniff(head: &[u8]) -> &'static str {
    if head.is_empty() {
        return "application/octet-stream";
    }
    if let Ok(format) = image::guess_format(head) {
        return format.to_mime_type();
    }
    if head.starts_with(b"%PDF-") {
        return "application/pdf";
    }

    let text = match std::str::from_utf8(head) {
        Ok(text) => text,
        // A multi-byte character cut at the sniff boundary is still text.
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&head[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return "application/octet-stream",
    };
    let lead = text
        .trim_start_matches('\u{feff}')
        .trim_start()
        .to_ascii_lowercase();

    if lead.starts_with("<svg") || (lead.starts_with("<?xml") && lead.contains("<svg")) {
        "image/svg+xml"
    } else if lead.starts_with("<!doctype html") || lead.starts_with("<html") {
        "text/html"
    } else if lead.starts_with("<?xml") {
        "application/xml"
    } else if text
        .chars()
        .all(|c| !c.is_control() || c.is_ascii_whitespace())
    {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF\0";

    #[test]
    fn sniffs_raster_formats() {
        assert_eq!(sniff(PNG_MAGIC), "image/png");
        assert_eq!(sniff(JPEG_MAGIC), "image/jpeg");
        assert_eq!(sniff(b"GIF89a\x01\0\x01\0"), "image/gif");
    }

    #[test]
    fn sniffs_markup() {
        assert_eq!(sniff(b"  <!DOCTYPE html><html></html>"), "text/html");
        assert_eq!(sniff(b"<svg xmlns='http://www.w3.org/2000/svg'/>"), "image/svg+xml");
        assert_eq!(sniff(b"<?xml version='1.0'?><svg/>"), "image/svg+xml");
        assert_eq!(sniff(b"<?xml version='1.0'?><feed/>"), "application/xml");
        assert_eq!(sniff(b"%PDF-1.7\n"), "application/pdf");
    }

    #[test]
    fn falls_back_to_text_or_octet_stream() {
        assert_eq!(sniff(b"hello, world\n"), "text/plain");
        assert_eq!(sniff(b"\0\x01\x02\x03binary"), "application/octet-stream");
        assert_eq!(sniff(&[0xC3]), "text/plain");
    }

    #[test]
    fn empty_head_is_octet_stream() {
        assert_eq!(sniff(&[]), "application/octet-stream");
    }

    #[test]
    fn jpeg_extensions_start_with_jpg() {
        assert_eq!(primary_extension("image/jpeg"), Some("jpg"));
        assert!(extensions_for("image/jpeg").contains(&"jpeg"));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(accepts_extension("image/jpeg", ".JPG"));
        assert!(accepts_extension("image/jpeg", "jpeg"));
        assert!(!accepts_extension("image/jpeg", ".png"));
        assert!(accepts_extension("IMAGE/PNG; charset=binary", ".png"));
    }

    #[test]
    fn registry_covers_other_types() {
        assert_eq!(primary_extension("image/webp"), Some("webp"));
        assert_eq!(primary_extension("image/bmp"), Some("bmp"));
        assert_eq!(primary_extension("text/plain"), Some("txt"));
        assert!(accepts_extension("image/png", "PNG"));
        assert!(accepts_extension("image/tiff", "tif"));
    }

    #[test]
    fn unknown_mimetype_has_no_extension() {
        assert!(extensions_for("application/x-made-up").is_empty());
        assert_eq!(primary_extension("application/x-made-up"), None);
    }
}
