//! PDF structural check: header at the front, `%%EOF` marker near the end.

use super::{
    ContentInput, ContentValidator, NON_SEEKABLE_BUFFER_LIMIT, check_declared_size, read_error,
    with_seekable,
};
use crate::error::{Result, ValidationError};
use crate::mime;
use crate::mime::detector::read_prefix;
use std::io::SeekFrom;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// How far from each end the header and trailer are searched for.
const SCAN_WINDOW: u64 = 1024;

const SUPPORTED: &[&str] = &[mime::APPLICATION_PDF, "application/x-pdf"];

#[derive(Debug, Clone)]
pub struct PdfValidator {
    pub max_file_size: u64,
}

impl Default for PdfValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfValidator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    #[must_use]
    pub const fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }
}

impl ContentValidator for PdfValidator {
    fn validate(&self, input: ContentInput<'_>, declared_size: u64) -> Result<()> {
        check_declared_size(declared_size, self.max_file_size, "PDF")?;

        with_seekable(input, declared_size, NON_SEEKABLE_BUFFER_LIMIT, "PDF", |reader| {
            let len = reader.seek(SeekFrom::End(0)).map_err(read_error)?;
            if len == 0 {
                return Err(ValidationError::content("PDF is empty"));
            }

            let window = usize::try_from(len.min(SCAN_WINDOW)).unwrap_or(1024);
            let mut buf = vec![0u8; window];

            reader.seek(SeekFrom::Start(0)).map_err(read_error)?;
            let filled = read_prefix(reader, &mut buf).map_err(read_error)?;
            if !buf[..filled].starts_with(b"%PDF-") {
                return Err(ValidationError::content(
                    "invalid PDF: missing %PDF- header",
                ));
            }

            reader
                .seek(SeekFrom::Start(len - window as u64))
                .map_err(read_error)?;
            let filled = read_prefix(reader, &mut buf).map_err(read_error)?;
            if !buf[..filled].windows(5).any(|w| w == b"%%EOF") {
                return Err(ValidationError::content(
                    "invalid PDF: missing %%EOF marker",
                ));
            }
            Ok(())
        })
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    fn name(&self) -> &'static str {
        "pdf"
    }
}
