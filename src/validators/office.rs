//! OOXML document validation (DOCX, XLSX, PPTX and their macro-enabled
//! variants).
//!
//! An Office Open XML file is a ZIP package, so the same central-directory
//! scan as [`super::archive`] applies, with looser entry limits and two
//! package-level requirements: the `[Content_Types].xml` manifest and the
//! `_rels/.rels` relationship part must both be present. VBA project parts are
//! rejected unless macros are explicitly allowed.

use super::archive::{ZipLimits, scan_zip};
use super::{
    ContentInput, ContentValidator, NON_SEEKABLE_BUFFER_LIMIT, check_declared_size, with_seekable,
};
use crate::error::{Result, ValidationError};
use crate::mime;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 10_000;
pub const DEFAULT_MAX_UNCOMPRESSED_SIZE: u64 = 1024 * 1024 * 1024;
pub const DEFAULT_MAX_COMPRESSION_RATIO: f64 = 100.0;

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const RELATIONSHIPS_PART: &str = "_rels/.rels";

/// Entry name suffixes that carry VBA code.
const MACRO_PARTS: &[&str] = &["vbaproject.bin", "vbadata.xml"];

const SUPPORTED: &[&str] = &[
    mime::DOCX,
    mime::XLSX,
    mime::PPTX,
    "application/vnd.ms-word.document.macroEnabled.12",
    "application/vnd.ms-excel.sheet.macroEnabled.12",
    "application/vnd.ms-powerpoint.presentation.macroEnabled.12",
];

#[derive(Debug, Clone)]
pub struct OfficeValidator {
    pub max_file_size: u64,
    pub max_files: usize,
    pub max_uncompressed_size: u64,
    pub max_compression_ratio: f64,
    pub allow_macros: bool,
}

impl Default for OfficeValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl OfficeValidator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
            max_uncompressed_size: DEFAULT_MAX_UNCOMPRESSED_SIZE,
            max_compression_ratio: DEFAULT_MAX_COMPRESSION_RATIO,
            allow_macros: false,
        }
    }

    #[must_use]
    pub const fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    #[must_use]
    pub const fn with_max_uncompressed_size(mut self, bytes: u64) -> Self {
        self.max_uncompressed_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_max_compression_ratio(mut self, ratio: f64) -> Self {
        self.max_compression_ratio = ratio;
        self
    }

    #[must_use]
    pub const fn allow_macros(mut self, allow: bool) -> Self {
        self.allow_macros = allow;
        self
    }
}

impl ContentValidator for OfficeValidator {
    fn validate(&self, input: ContentInput<'_>, declared_size: u64) -> Result<()> {
        check_declared_size(declared_size, self.max_file_size, "document")?;

        let limits = ZipLimits {
            max_compression_ratio: self.max_compression_ratio,
            max_files: self.max_files,
            max_uncompressed_size: self.max_uncompressed_size,
            max_nested_archives: None,
        };

        with_seekable(
            input,
            declared_size,
            NON_SEEKABLE_BUFFER_LIMIT,
            "document",
            |reader| {
                let mut has_content_types = false;
                let mut has_relationships = false;

                scan_zip(reader, &limits, |name| {
                    if name == CONTENT_TYPES_PART {
                        has_content_types = true;
                    } else if name == RELATIONSHIPS_PART {
                        has_relationships = true;
                    }
                    if !self.allow_macros && is_macro_part(name) {
                        return Err(ValidationError::content(format!(
                            "document contains VBA macros ({name}) which are not allowed"
                        )));
                    }
                    Ok(())
                })?;

                if !has_content_types {
                    return Err(ValidationError::content(format!(
                        "not a valid Office document: missing {CONTENT_TYPES_PART}"
                    )));
                }
                if !has_relationships {
                    return Err(ValidationError::content(format!(
                        "not a valid Office document: missing {RELATIONSHIPS_PART}"
                    )));
                }
                Ok(())
            },
        )
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    fn name(&self) -> &'static str {
        "office"
    }
}

fn is_macro_part(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    MACRO_PARTS.iter().any(|part| lower.ends_with(part))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    const CONTENT_TYPES: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#;
    const RELS: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#;

    pub(crate) fn build_package(extra: &[(&str, &[u8])], with_rels: bool) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        writer.start_file(CONTENT_TYPES_PART, options).unwrap();
        writer.write_all(CONTENT_TYPES).unwrap();
        if with_rels {
            writer.start_file(RELATIONSHIPS_PART, options).unwrap();
            writer.write_all(RELS).unwrap();
        }
        for (name, data) in extra {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn validate(validator: &OfficeValidator, data: &[u8]) -> Result<()> {
        let mut cursor = Cursor::new(data);
        validator.validate(ContentInput::seekable(&mut cursor), data.len() as u64)
    }

    #[test]
    fn test_accepts_minimal_package() {
        let data = build_package(&[("word/document.xml", b"<w:document/>")], true);
        assert!(validate(&OfficeValidator::new(), &data).is_ok());
    }

    #[test]
    fn test_requires_relationships_part() {
        let data = build_package(&[("word/document.xml", b"<w:document/>")], false);
        let err = validate(&OfficeValidator::new(), &data).unwrap_err();
        assert!(err.message().contains("_rels/.rels"));
    }

    #[test]
    fn test_macro_policy() {
        let data = build_package(&[("word/vbaProject.bin", b"\x00\x01VBA")], true);

        let err = validate(&OfficeValidator::new(), &data).unwrap_err();
        assert!(err.message().contains("macros"));

        assert!(validate(&OfficeValidator::new().allow_macros(true), &data).is_ok());
    }

    #[test]
    fn test_declared_size_checked_before_reading() {
        let mut empty = Cursor::new(Vec::new());
        let err = OfficeValidator::new()
            .with_max_file_size(10)
            .validate(ContentInput::seekable(&mut empty), 11)
            .unwrap_err();
        assert!(err.message().contains("exceeds maximum"));
    }

    #[test]
    fn test_rejects_traversal_entries() {
        let data = build_package(&[("../evil.xml", b"<x/>")], true);
        let err = validate(&OfficeValidator::new(), &data).unwrap_err();
        assert!(err.message().contains("path traversal"));
    }
}
