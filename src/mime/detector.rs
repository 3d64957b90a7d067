//! Content-based MIME detection.
//!
//! Detection reads at most [`DETECTION_WINDOW`] bytes regardless of how large
//! the upload is. A signature match produces a candidate type which is then
//! refined for shared containers using bytes already in the window:
//!
//! - RIFF: the form type at bytes 8..12 (`WAVE`, `AVI `, `WEBP`)
//! - ZIP: literal entry-name markers in the prefix (OOXML, OpenDocument, EPUB, JAR)
//! - ISO-BMFF: the major brand at bytes 8..12
//! - XML: an `<svg` root within the prefix
//!
//! When nothing matches, the `infer` crate gets a second look before a
//! text/binary heuristic decides between `text/plain` (or a recognised text
//! format) and `application/octet-stream`.

use super::signatures;
use super::*;
use std::io::{self, Read};

/// Maximum number of bytes inspected for detection.
pub const DETECTION_WINDOW: usize = 512;

/// Detect the MIME type of a content prefix.
///
/// Only the first [`DETECTION_WINDOW`] bytes of `data` are considered.
#[must_use]
pub fn detect(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(DETECTION_WINDOW)];
    if data.is_empty() {
        return OCTET_STREAM;
    }

    if let Some(sig) = signatures::find(data) {
        return refine(sig.mime, data);
    }

    // infer's BMP matcher is the bare "BM" prefix, which the table already
    // rejected for nonzero reserved bytes.
    if let Some(kind) = infer::get(data) {
        if kind.mime_type() != IMAGE_BMP {
            return kind.mime_type();
        }
    }

    sniff_text(data)
}

/// Read up to [`DETECTION_WINDOW`] bytes from `reader` and detect their type.
///
/// The reader is left positioned after the bytes consumed; callers that need
/// to re-read the content must seek back themselves.
///
/// # Errors
/// Returns an error if reading from `reader` fails.
pub fn detect_reader<R: Read + ?Sized>(reader: &mut R) -> io::Result<&'static str> {
    let mut buf = [0u8; DETECTION_WINDOW];
    let filled = read_prefix(reader, &mut buf)?;
    Ok(detect(&buf[..filled]))
}

/// Fill `buf` as far as the reader allows, stopping early only at EOF.
pub(crate) fn read_prefix<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn refine(candidate: &'static str, data: &[u8]) -> &'static str {
    match candidate {
        APPLICATION_RIFF => refine_riff(data),
        APPLICATION_ZIP => refine_zip(data),
        VIDEO_MP4 => refine_ftyp(data),
        APPLICATION_XML if contains(data, b"<svg") => IMAGE_SVG,
        // Matroska and WebM share the EBML magic; telling them apart needs the
        // DocType element, which is not parsed here.
        other => other,
    }
}

fn refine_riff(data: &[u8]) -> &'static str {
    match data.get(8..12) {
        Some(b"WAVE") => AUDIO_WAV,
        Some(b"AVI ") => VIDEO_AVI,
        Some(b"WEBP") => IMAGE_WEBP,
        _ => APPLICATION_RIFF,
    }
}

fn refine_zip(data: &[u8]) -> &'static str {
    if contains(data, b"mimetypeapplication/epub+zip") {
        return EPUB;
    }
    if contains(data, b"mimetypeapplication/vnd.oasis.opendocument.text") {
        return ODT;
    }
    if contains(data, b"mimetypeapplication/vnd.oasis.opendocument.spreadsheet") {
        return ODS;
    }
    if contains(data, b"mimetypeapplication/vnd.oasis.opendocument.presentation") {
        return ODP;
    }
    if contains(data, b"word/") {
        return DOCX;
    }
    if contains(data, b"xl/") {
        return XLSX;
    }
    if contains(data, b"ppt/") {
        return PPTX;
    }
    if contains(data, b"[Content_Types]") {
        return DOCX;
    }
    if contains(data, b"META-INF/MANIFEST.MF") {
        return APPLICATION_JAR;
    }
    APPLICATION_ZIP
}

fn refine_ftyp(data: &[u8]) -> &'static str {
    let Some(brand) = data.get(8..12) else {
        return VIDEO_MP4;
    };
    match brand {
        b"M4A " | b"M4B " => AUDIO_MP4,
        b"M4V " | b"M4VH" | b"M4VP" => VIDEO_M4V,
        b"qt  " => VIDEO_QUICKTIME,
        b"avif" | b"avis" => IMAGE_AVIF,
        b"heic" | b"heix" | b"mif1" | b"msf1" => IMAGE_HEIC,
        b if b.starts_with(b"3gp") => VIDEO_3GPP,
        _ => VIDEO_MP4,
    }
}

/// Classify a prefix without a signature as text or opaque binary.
fn sniff_text(data: &[u8]) -> &'static str {
    if data.iter().any(|&b| is_binary_byte(b)) {
        return OCTET_STREAM;
    }

    let trimmed = trim_leading_whitespace(data);
    match trimmed.first() {
        Some(b'{' | b'[') => APPLICATION_JSON,
        Some(b'<') => sniff_markup(trimmed),
        _ => TEXT_PLAIN,
    }
}

fn sniff_markup(data: &[u8]) -> &'static str {
    const HTML_TAGS: &[&[u8]] = &[
        b"<!doctype html",
        b"<html",
        b"<head",
        b"<body",
        b"<script",
        b"<iframe",
        b"<div",
        b"<table",
        b"<p>",
        b"<!--",
    ];
    if starts_with_ignore_case(data, b"<svg") {
        return IMAGE_SVG;
    }
    if HTML_TAGS.iter().any(|tag| starts_with_ignore_case(data, tag)) {
        return TEXT_HTML;
    }
    TEXT_PLAIN
}

/// Control bytes that never appear in text (tab, LF, FF, CR and ESC excluded).
const fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

fn starts_with_ignore_case(data: &[u8], prefix: &[u8]) -> bool {
    data.len() >= prefix.len() && data[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
