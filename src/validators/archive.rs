//! ZIP archive validation.
//!
//! Only the central directory is read: entry sizes come from the directory
//! records, so a bomb is recognised without inflating a single byte. The scan
//! is shared with the OOXML validator in [`super::office`].

use super::{
    ContentInput, ContentValidator, NON_SEEKABLE_BUFFER_LIMIT, ReadSeek, check_entry_path,
    with_seekable,
};
use crate::error::{Result, ValidationError};
use crate::mime;
use crate::utils::human_format::{format_bytes, format_ratio};
use tracing::debug;

pub const DEFAULT_MAX_COMPRESSION_RATIO: f64 = 100.0;
pub const DEFAULT_MAX_FILES: usize = 1000;
pub const DEFAULT_MAX_UNCOMPRESSED_SIZE: u64 = 1024 * 1024 * 1024;
pub const DEFAULT_MAX_NESTED_ARCHIVES: usize = 3;

/// Entry extensions counted as nested archives.
const NESTED_ARCHIVE_EXTENSIONS: &[&str] = &[
    "zip", "jar", "war", "ear", "apk", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "zst", "cab",
    "iso",
];

const SUPPORTED: &[&str] = &[
    mime::APPLICATION_ZIP,
    "application/x-zip-compressed",
    mime::APPLICATION_JAR,
    mime::APPLICATION_WAR,
    mime::EPUB,
    mime::ODT,
    mime::ODS,
    mime::ODP,
];

/// Validates ZIP-family archives against bomb and traversal attacks.
#[derive(Debug, Clone)]
pub struct ArchiveValidator {
    /// Per-entry uncompressed ÷ compressed ceiling
    pub max_compression_ratio: f64,
    /// Maximum number of entries (directories included)
    pub max_files: usize,
    /// Ceiling on the sum of uncompressed entry sizes
    pub max_uncompressed_size: u64,
    /// Maximum number of entries that are themselves archives
    pub max_nested_archives: usize,
}

impl Default for ArchiveValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveValidator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_compression_ratio: DEFAULT_MAX_COMPRESSION_RATIO,
            max_files: DEFAULT_MAX_FILES,
            max_uncompressed_size: DEFAULT_MAX_UNCOMPRESSED_SIZE,
            max_nested_archives: DEFAULT_MAX_NESTED_ARCHIVES,
        }
    }

    #[must_use]
    pub const fn with_max_compression_ratio(mut self, ratio: f64) -> Self {
        self.max_compression_ratio = ratio;
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
    pub const fn with_max_nested_archives(mut self, count: usize) -> Self {
        self.max_nested_archives = count;
        self
    }

    fn limits(&self) -> ZipLimits {
        ZipLimits {
            max_compression_ratio: self.max_compression_ratio,
            max_files: self.max_files,
            max_uncompressed_size: self.max_uncompressed_size,
            max_nested_archives: Some(self.max_nested_archives),
        }
    }
}

impl ContentValidator for ArchiveValidator {
    fn validate(&self, input: ContentInput<'_>, declared_size: u64) -> Result<()> {
        with_seekable(
            input,
            declared_size,
            NON_SEEKABLE_BUFFER_LIMIT,
            "archive",
            |reader| scan_zip(reader, &self.limits(), |_| Ok(())).map(|_| ()),
        )
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    fn name(&self) -> &'static str {
        "archive"
    }
}

/// Bounds applied while walking a ZIP central directory.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ZipLimits {
    pub max_compression_ratio: f64,
    pub max_files: usize,
    pub max_uncompressed_size: u64,
    /// `None` disables the nested-archive count
    pub max_nested_archives: Option<usize>,
}

/// Totals gathered by a successful scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ZipSummary {
    pub entries: usize,
    pub uncompressed_size: u64,
    pub nested_archives: usize,
}

/// Walk the central directory, enforcing `limits` and calling `visit` with
/// every entry name that passed the path checks.
pub(crate) fn scan_zip(
    reader: &mut dyn ReadSeek,
    limits: &ZipLimits,
    mut visit: impl FnMut(&str) -> Result<()>,
) -> Result<ZipSummary> {
    let mut archive = zip::ZipArchive::new(reader)
        .map_err(|e| ValidationError::content(format!("invalid ZIP archive: {e}")))?;

    let entries = archive.len();
    if entries > limits.max_files {
        return Err(ValidationError::content(format!(
            "archive contains {entries} files, maximum is {}",
            limits.max_files
        )));
    }

    let mut summary = ZipSummary {
        entries,
        ..ZipSummary::default()
    };

    for index in 0..entries {
        let (name, size, compressed) = {
            let entry = archive.by_index_raw(index).map_err(|e| {
                ValidationError::content(format!("unreadable archive entry #{index}: {e}"))
            })?;
            (entry.name().to_string(), entry.size(), entry.compressed_size())
        };

        check_entry_path(&name)?;

        if size > 0 {
            #[allow(clippy::cast_precision_loss)]
            let ratio = if compressed == 0 {
                f64::INFINITY
            } else {
                size as f64 / compressed as f64
            };
            if ratio > limits.max_compression_ratio {
                return Err(ValidationError::content(format!(
                    "entry {name:?} compression ratio {} exceeds maximum {}",
                    format_ratio(ratio),
                    format_ratio(limits.max_compression_ratio)
                )));
            }
        }

        summary.uncompressed_size = summary.uncompressed_size.saturating_add(size);
        if summary.uncompressed_size > limits.max_uncompressed_size {
            return Err(ValidationError::content(format!(
                "total uncompressed size exceeds maximum of {}",
                format_bytes(limits.max_uncompressed_size)
            )));
        }

        if let Some(max_nested) = limits.max_nested_archives {
            if is_nested_archive(&name) {
                summary.nested_archives += 1;
                if summary.nested_archives > max_nested {
                    return Err(ValidationError::content(format!(
                        "archive contains more than {max_nested} nested archives"
                    )));
                }
            }
        }

        visit(&name)?;
    }

    debug!(
        entries = summary.entries,
        uncompressed = summary.uncompressed_size,
        nested = summary.nested_archives,
        "ZIP central directory accepted"
    );
    Ok(summary)
}

fn is_nested_archive(name: &str) -> bool {
    if name.ends_with('/') {
        return false;
    }
    mime::extension_of(name)
        .is_some_and(|ext| NESTED_ARCHIVE_EXTENSIONS.contains(&ext.as_str()))
}
