//! Format-specific content validators.
//!
//! Each validator inspects a bounded portion of an upload and rejects
//! payloads that are malformed or violate a resource bound (zip bombs, deep
//! nesting, path traversal, XXE, macro-laden documents). Validators are
//! configured once at construction and are immutable afterwards, so a single
//! instance can be shared across threads through the
//! [`ValidatorRegistry`](crate::registry::ValidatorRegistry).
//!
//! Whether the input can seek is part of the call signature: see
//! [`ContentInput`]. Formats that need random access (ZIP central directory,
//! PDF trailer, image headers) buffer small forward-only inputs and reject
//! larger ones.

pub mod archive;
pub mod csv;
pub mod image;
pub mod json;
pub mod media;
pub mod office;
pub mod pdf;
pub mod tar;
pub mod text;
pub mod xml;

pub use archive::ArchiveValidator;
pub use csv::CsvValidator;
pub use image::ImageValidator;
pub use json::JsonValidator;
pub use media::{MediaFormat, MediaValidator};
pub use office::OfficeValidator;
pub use pdf::PdfValidator;
pub use tar::TarValidator;
pub use text::TextValidator;
pub use xml::XmlValidator;

use crate::error::{Result, ValidationError};
use crate::utils::human_format::format_bytes;
use std::fmt;
use std::io::{self, Cursor, Read, Seek};

/// Largest forward-only input that random-access validators will buffer.
pub const NON_SEEKABLE_BUFFER_LIMIT: u64 = 1024 * 1024;

/// A readable, seekable byte source.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Content handed to a validator, tagged with its seek capability.
pub enum ContentInput<'a> {
    /// Random access is available
    Seekable(&'a mut dyn ReadSeek),
    /// Forward-only stream
    Stream(&'a mut dyn Read),
}

impl fmt::Debug for ContentInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seekable(_) => f.write_str("ContentInput::Seekable"),
            Self::Stream(_) => f.write_str("ContentInput::Stream"),
        }
    }
}

impl<'a> ContentInput<'a> {
    /// Wrap a seekable source.
    pub fn seekable<R: Read + Seek>(reader: &'a mut R) -> Self {
        Self::Seekable(reader)
    }

    /// Wrap a forward-only source.
    pub fn stream<R: Read>(reader: &'a mut R) -> Self {
        Self::Stream(reader)
    }

    #[must_use]
    pub const fn is_seekable(&self) -> bool {
        matches!(self, Self::Seekable(_))
    }

    /// Forward-only view of the input, for validators that never seek.
    pub(crate) fn into_reader(self) -> Box<dyn Read + 'a> {
        match self {
            Self::Seekable(reader) => Box::new(reader),
            Self::Stream(reader) => Box::new(reader),
        }
    }
}

/// Contract implemented by every format validator.
pub trait ContentValidator: Send + Sync + fmt::Debug {
    /// Inspect `input` and reject it when it is malformed or exceeds a bound.
    ///
    /// `declared_size` is the size the caller claims for the upload; validators
    /// use it for up-front ceiling checks but never trust it for memory sizing.
    ///
    /// # Errors
    /// Returns [`ValidationError::Content`] describing the first violation.
    fn validate(&self, input: ContentInput<'_>, declared_size: u64) -> Result<()>;

    /// MIME types this validator understands.
    fn supported_mime_types(&self) -> &'static [&'static str];

    /// Short name used in logs and diagnostics.
    fn name(&self) -> &'static str;
}

/// Run `check` against a seekable view of `input`.
///
/// Forward-only inputs up to `limit` bytes are buffered in memory; larger ones
/// are rejected without reading.
pub(crate) fn with_seekable<T>(
    input: ContentInput<'_>,
    declared_size: u64,
    limit: u64,
    what: &str,
    check: impl FnOnce(&mut dyn ReadSeek) -> Result<T>,
) -> Result<T> {
    match input {
        ContentInput::Seekable(reader) => check(reader),
        ContentInput::Stream(reader) => {
            if declared_size > limit {
                return Err(ValidationError::content(format!(
                    "{what} from a non-seekable stream larger than {} is not supported",
                    format_bytes(limit)
                )));
            }
            let buffered = read_bounded(reader, limit, what)?;
            check(&mut Cursor::new(buffered))
        }
    }
}

/// Read the whole of `reader`, failing once more than `limit` bytes arrive.
pub(crate) fn read_bounded<R: Read + ?Sized>(reader: &mut R, limit: u64, what: &str) -> Result<Vec<u8>> {
    let mut buffered = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut buffered)
        .map_err(read_error)?;
    if buffered.len() as u64 > limit {
        return Err(ValidationError::content(format!(
            "{what} exceeds maximum size of {}",
            format_bytes(limit)
        )));
    }
    Ok(buffered)
}

/// Reject a declared size above `max` (0 disables the check).
pub(crate) fn check_declared_size(declared_size: u64, max: u64, what: &str) -> Result<()> {
    if max > 0 && declared_size > max {
        return Err(ValidationError::content(format!(
            "{what} size {} exceeds maximum of {}",
            format_bytes(declared_size),
            format_bytes(max)
        )));
    }
    Ok(())
}

pub(crate) fn read_error(e: io::Error) -> ValidationError {
    ValidationError::content(format!("failed to read content: {e}"))
}

/// Reader that fails once more than `limit` bytes have been produced.
pub(crate) struct BoundedReader<R> {
    inner: R,
    limit: u64,
    produced: u64,
}

impl<R: Read> BoundedReader<R> {
    pub(crate) const fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            limit,
            produced: 0,
        }
    }
}

impl<R: Read> Read for BoundedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.produced += n as u64;
        if self.limit > 0 && self.produced > self.limit {
            return Err(io::Error::other(format!(
                "content exceeds maximum size of {}",
                format_bytes(self.limit)
            )));
        }
        Ok(n)
    }
}

/// Path fragments that have no business inside an uploaded archive.
const SENSITIVE_PATHS: &[&str] = &[
    "etc/passwd",
    "etc/shadow",
    "etc/sudoers",
    "etc/hosts",
    "proc/self",
    "windows/system32",
    "windows/syswow64",
    "boot.ini",
    ".ssh/authorized_keys",
];

/// Reject archive entry names that could escape an extraction directory.
pub(crate) fn check_entry_path(name: &str) -> Result<()> {
    if name.contains('\0') {
        return Err(ValidationError::content(format!(
            "archive entry {name:?} contains a null byte"
        )));
    }

    if name.starts_with("\\\\") || name.starts_with("//") {
        return Err(ValidationError::content(format!(
            "archive entry {name:?} uses a UNC path"
        )));
    }

    let normalized = name.replace('\\', "/");
    let bytes = normalized.as_bytes();
    let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if normalized.starts_with('/') || has_drive {
        return Err(ValidationError::content(format!(
            "archive entry {name:?} uses an absolute path"
        )));
    }

    if normalized.contains("..") {
        return Err(ValidationError::content(format!(
            "archive entry {name:?} contains path traversal"
        )));
    }

    let lower = normalized.to_ascii_lowercase();
    if let Some(hit) = SENSITIVE_PATHS.iter().find(|p| lower.contains(*p)) {
        return Err(ValidationError::content(format!(
            "archive entry {name:?} targets sensitive system path {hit}"
        )));
    }

    Ok(())
}

pub(crate) fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|w| w.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_entry_path() {
        assert!(check_entry_path("docs/readme.txt").is_ok());
        assert!(check_entry_path("docs/v1.2/notes.txt").is_ok());

        for bad in [
            "../../etc/passwd",
            "docs/../../secret",
            "release..notes.txt",
            "a..b/evil.txt",
            "..\\..\\windows\\win.ini",
            "/etc/hosts.allow",
            "C:\\Windows\\System32\\drivers",
            "\\\\server\\share\\file",
            "//server/share/file",
            "backup/etc/shadow",
            "file\0.txt",
        ] {
            let err = check_entry_path(bad).unwrap_err();
            assert!(err.is_content_error(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_with_seekable_rejects_large_streams() {
        let mut stream: &[u8] = b"irrelevant";
        let err = with_seekable(
            ContentInput::stream(&mut stream),
            NON_SEEKABLE_BUFFER_LIMIT + 1,
            NON_SEEKABLE_BUFFER_LIMIT,
            "archive",
            |_| Ok(()),
        )
        .unwrap_err();
        assert!(err.message().contains("non-seekable"));
    }

    #[test]
    fn test_with_seekable_buffers_small_streams() {
        let mut stream: &[u8] = b"0123456789";
        let len = with_seekable(
            ContentInput::stream(&mut stream),
            10,
            NON_SEEKABLE_BUFFER_LIMIT,
            "archive",
            |r| Ok(r.seek(io::SeekFrom::End(0)).map_err(read_error)?),
        )
        .unwrap();
        assert_eq!(len, 10);
    }

    #[test]
    fn test_bounded_reader() {
        let mut reader = BoundedReader::new(&b"abcdef"[..], 4);
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());

        let mut reader = BoundedReader::new(&b"abcd"[..], 4);
        let mut out = Vec::new();
        assert_eq!(reader.read_to_end(&mut out).unwrap(), 4);
    }

    #[test]
    fn test_check_declared_size() {
        assert!(check_declared_size(10, 0, "file").is_ok());
        assert!(check_declared_size(10, 10, "file").is_ok());
        assert!(check_declared_size(11, 10, "file").is_err());
    }
}
