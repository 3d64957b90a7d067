//! Extension-to-MIME mapping and wildcard type groups.

use super::*;

/// Extensions and the MIME type they claim. Only extensions whose type the
/// detector can actually produce are listed, so strict mode never rejects a
/// well-formed file for a naming reason alone. `.mkv` is absent because EBML
/// detection always reports WebM.
static EXTENSION_TABLE: &[(&str, &str)] = &[
    ("jpg", IMAGE_JPEG),
    ("jpeg", IMAGE_JPEG),
    ("jpe", IMAGE_JPEG),
    ("png", IMAGE_PNG),
    ("gif", IMAGE_GIF),
    ("webp", IMAGE_WEBP),
    ("bmp", IMAGE_BMP),
    ("tif", IMAGE_TIFF),
    ("tiff", IMAGE_TIFF),
    ("ico", IMAGE_ICO),
    ("svg", IMAGE_SVG),
    ("avif", IMAGE_AVIF),
    ("heic", IMAGE_HEIC),
    ("psd", IMAGE_PSD),
    ("pdf", APPLICATION_PDF),
    ("rtf", APPLICATION_RTF),
    ("ps", APPLICATION_POSTSCRIPT),
    ("docx", DOCX),
    ("xlsx", XLSX),
    ("pptx", PPTX),
    ("epub", EPUB),
    ("odt", ODT),
    ("ods", ODS),
    ("odp", ODP),
    ("json", APPLICATION_JSON),
    ("xml", APPLICATION_XML),
    ("csv", TEXT_CSV),
    ("txt", TEXT_PLAIN),
    ("text", TEXT_PLAIN),
    ("log", TEXT_PLAIN),
    ("md", TEXT_MARKDOWN),
    ("markdown", TEXT_MARKDOWN),
    ("html", TEXT_HTML),
    ("htm", TEXT_HTML),
    ("zip", APPLICATION_ZIP),
    ("gz", APPLICATION_GZIP),
    ("tgz", APPLICATION_GZIP),
    ("tar", APPLICATION_TAR),
    ("bz2", APPLICATION_BZIP2),
    ("xz", APPLICATION_XZ),
    ("7z", APPLICATION_7Z),
    ("rar", APPLICATION_RAR),
    ("zst", APPLICATION_ZSTD),
    ("exe", APPLICATION_PE),
    ("dll", APPLICATION_PE),
    ("wasm", APPLICATION_WASM),
    ("sqlite", APPLICATION_SQLITE),
    ("woff", FONT_WOFF),
    ("woff2", FONT_WOFF2),
    ("otf", FONT_OTF),
    ("mp3", AUDIO_MPEG),
    ("wav", AUDIO_WAV),
    ("ogg", AUDIO_OGG),
    ("oga", AUDIO_OGG),
    ("flac", AUDIO_FLAC),
    ("aac", AUDIO_AAC),
    ("m4a", AUDIO_MP4),
    ("mid", AUDIO_MIDI),
    ("midi", AUDIO_MIDI),
    ("mp4", VIDEO_MP4),
    ("m4v", VIDEO_M4V),
    ("mov", VIDEO_QUICKTIME),
    ("3gp", VIDEO_3GPP),
    ("webm", VIDEO_WEBM),
    ("avi", VIDEO_AVI),
];

static IMAGE_GROUP: &[&str] = &[
    IMAGE_JPEG, IMAGE_PNG, IMAGE_GIF, IMAGE_WEBP, IMAGE_BMP, IMAGE_TIFF, IMAGE_ICO, IMAGE_SVG,
    IMAGE_AVIF, IMAGE_HEIC,
];

static AUDIO_GROUP: &[&str] = &[
    AUDIO_MPEG, AUDIO_WAV, AUDIO_OGG, AUDIO_FLAC, AUDIO_AAC, AUDIO_MP4, AUDIO_MIDI,
];

static VIDEO_GROUP: &[&str] = &[
    VIDEO_MP4,
    VIDEO_M4V,
    VIDEO_QUICKTIME,
    VIDEO_3GPP,
    VIDEO_WEBM,
    VIDEO_MKV,
    VIDEO_AVI,
];

static TEXT_GROUP: &[&str] = &[TEXT_PLAIN, TEXT_CSV, TEXT_HTML, TEXT_XML, TEXT_MARKDOWN];

/// Wildcard accepting every type.
pub const ANY: &str = "*/*";

/// Lower-cased extension of `file_name` without the dot, if it has one.
///
/// Only the final component counts (`backup.tar.gz` → `gz`); a leading dot
/// (`.bashrc`) is not an extension.
#[must_use]
pub fn extension_of(file_name: &str) -> Option<String> {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// MIME type implied by an extension (case-insensitive, leading dot optional).
#[must_use]
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.');
    EXTENSION_TABLE
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
}

/// Concrete types a wildcard group stands for, if `pattern` is a known group.
#[must_use]
pub fn expand_group(pattern: &str) -> Option<&'static [&'static str]> {
    match pattern {
        "image/*" => Some(IMAGE_GROUP),
        "audio/*" => Some(AUDIO_GROUP),
        "video/*" => Some(VIDEO_GROUP),
        "text/*" => Some(TEXT_GROUP),
        _ => None,
    }
}

/// Does the accepted type or group `accepted` admit `detected`?
///
/// Exact matches compare case-insensitively and ignore MIME parameters. Known
/// groups expand to their fixed lists; other `type/*` patterns fall back to a
/// prefix comparison on the top-level type.
#[must_use]
pub fn mime_matches(accepted: &str, detected: &str) -> bool {
    let accepted = essence(accepted);
    let detected = essence(detected);

    if accepted == ANY {
        return true;
    }
    if accepted.eq_ignore_ascii_case(detected) {
        return true;
    }
    if let Some(group) = expand_group(accepted) {
        return group.iter().any(|m| m.eq_ignore_ascii_case(detected));
    }
    if let Some(top) = accepted.strip_suffix("/*") {
        return detected
            .split_once('/')
            .is_some_and(|(t, _)| t.eq_ignore_ascii_case(top));
    }
    false
}

fn essence(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension_of("backup.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of("dir.d/README"), None);
        assert_eq!(extension_of(".bashrc"), None);
        assert_eq!(extension_of("trailing."), None);
        assert_eq!(extension_of("C:\\uploads\\report.pdf").as_deref(), Some("pdf"));
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for_extension("png"), Some(IMAGE_PNG));
        assert_eq!(mime_for_extension(".PNG"), Some(IMAGE_PNG));
        assert_eq!(mime_for_extension("mkv"), None);
        assert_eq!(mime_for_extension("unknown"), None);
    }

    #[test]
    fn test_group_matching() {
        assert!(mime_matches("image/*", IMAGE_PNG));
        assert!(mime_matches("image/*", IMAGE_SVG));
        assert!(!mime_matches("image/*", APPLICATION_PDF));
        assert!(mime_matches("*/*", APPLICATION_PE));
        assert!(mime_matches("font/*", FONT_WOFF2));
        assert!(mime_matches("application/pdf", "application/pdf; charset=binary"));
        assert!(mime_matches("Image/PNG", IMAGE_PNG));
        assert!(!mime_matches("image/png", IMAGE_JPEG));
    }
}
