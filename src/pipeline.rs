//! Upload validation pipeline.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. file name (length, dangerous substrings, pattern, extension policy)
//! 2. declared size
//! 3. early exit when no MIME types are configured
//! 4. MIME detection from the first 512 bytes, then acceptance
//! 5. strict extension/content agreement (optional)
//! 6. format-specific content validation (optional)
//!
//! Three input shapes are supported. An [`UploadHeader`] is opened only once
//! the cheap checks have passed. A seekable reader is rewound to offset zero
//! for detection and content validation, then returned to where the caller
//! left it. A forward-only reader never has its content read: the type is
//! judged from the extension alone, a reduced guarantee the caller opts into
//! by choosing [`UploadValidator::validate_stream`].

use crate::constraints::Constraints;
use crate::error::{Result, ValidationError};
use crate::mime::{self, detect_reader, extension_of, mime_for_extension};
use crate::result::ValidationResult;
use crate::utils::human_format::format_bytes;
use crate::validators::{ContentInput, ReadSeek};
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// An upload whose metadata is known up front and whose content can be opened
/// on demand.
pub trait UploadHeader {
    fn file_name(&self) -> &str;

    /// Declared size in bytes
    fn size(&self) -> u64;

    /// Content type claimed by the client, if any. Recorded for diagnostics
    /// only; the detected type is authoritative.
    fn content_type(&self) -> Option<&str> {
        None
    }

    /// Open the content positioned at offset zero.
    ///
    /// # Errors
    /// Returns any I/O error raised while opening.
    fn open(&self) -> io::Result<Box<dyn ReadSeek + '_>>;
}

/// Upload held in memory.
#[derive(Debug, Clone)]
pub struct MemoryUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl MemoryUpload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl UploadHeader for MemoryUpload {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn open(&self) -> io::Result<Box<dyn ReadSeek + '_>> {
        Ok(Box::new(Cursor::new(self.data.as_slice())))
    }
}

/// Upload backed by a local file; the file is opened only if content checks
/// are needed.
#[derive(Debug, Clone)]
pub struct FileUpload {
    path: PathBuf,
    file_name: String,
    size: u64,
}

impl FileUpload {
    /// Stat `path` and take its final component as the file name.
    ///
    /// # Errors
    /// Returns an error if the file metadata cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size: metadata.len(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UploadHeader for FileUpload {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn open(&self) -> io::Result<Box<dyn ReadSeek + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// Where the content comes from for one run.
enum Source<'a> {
    Upload(&'a dyn UploadHeader),
    Seekable(&'a mut dyn ReadSeek),
    Stream,
}

/// Validates uploads against a [`Constraints`] policy.
///
/// Cloning is cheap; clones share the same constraints.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    constraints: Arc<Constraints>,
}

impl UploadValidator {
    #[must_use]
    pub fn new(constraints: Constraints) -> Self {
        Self {
            constraints: Arc::new(constraints),
        }
    }

    #[must_use]
    pub const fn from_shared(constraints: Arc<Constraints>) -> Self {
        Self { constraints }
    }

    #[must_use]
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Validate an upload, opening its content only if needed.
    ///
    /// # Errors
    /// Returns the first check that failed.
    pub fn validate_upload(&self, upload: &dyn UploadHeader) -> Result<()> {
        self.validate_upload_with_result(upload, None).1
    }

    /// [`validate_upload`](Self::validate_upload), checking `token` on entry
    /// and again once the content is open.
    ///
    /// # Errors
    /// Returns [`ValidationError::Cancelled`] when the token fires, otherwise
    /// the first check that failed.
    pub fn validate_upload_cancellable(
        &self,
        upload: &dyn UploadHeader,
        token: &CancellationToken,
    ) -> Result<()> {
        self.validate_upload_with_result(upload, Some(token)).1
    }

    /// Validate an upload and return a full diagnostic record.
    pub fn validate_upload_with_result(
        &self,
        upload: &dyn UploadHeader,
        token: Option<&CancellationToken>,
    ) -> (ValidationResult, Result<()>) {
        let mut report = ValidationResult::start(upload.file_name(), upload.content_type());
        let outcome = self.run(
            upload.file_name(),
            upload.size(),
            Source::Upload(upload),
            token,
            &mut report,
        );
        (report.finish(&outcome), outcome)
    }

    /// Validate seekable content. The reader is rewound for inspection and
    /// returned to its original position afterwards.
    ///
    /// # Errors
    /// Returns the first check that failed.
    pub fn validate_seekable<R: Read + Seek>(
        &self,
        file_name: &str,
        size: u64,
        reader: &mut R,
    ) -> Result<()> {
        self.validate_seekable_with_result(file_name, size, reader, None)
            .1
    }

    pub fn validate_seekable_with_result<R: Read + Seek>(
        &self,
        file_name: &str,
        size: u64,
        reader: &mut R,
        token: Option<&CancellationToken>,
    ) -> (ValidationResult, Result<()>) {
        let mut report = ValidationResult::start(file_name, None);
        let outcome = self.run(file_name, size, Source::Seekable(reader), token, &mut report);
        (report.finish(&outcome), outcome)
    }

    /// Validate a forward-only stream by name, size and extension alone.
    ///
    /// Neither MIME detection nor content validation runs and the reader is
    /// never touched; when MIME types are configured, the extension-implied
    /// type must be accepted instead.
    ///
    /// # Errors
    /// Returns the first check that failed.
    pub fn validate_stream<R: Read + ?Sized>(
        &self,
        file_name: &str,
        size: u64,
        _reader: &mut R,
    ) -> Result<()> {
        let mut report = ValidationResult::start(file_name, None);
        self.run(file_name, size, Source::Stream, None, &mut report)
    }

    /// Validate an in-memory buffer (always the full pipeline).
    ///
    /// # Errors
    /// Returns the first check that failed.
    pub fn validate_bytes(&self, file_name: &str, data: &[u8]) -> Result<()> {
        self.validate_bytes_with_result(file_name, data).1
    }

    pub fn validate_bytes_with_result(
        &self,
        file_name: &str,
        data: &[u8],
    ) -> (ValidationResult, Result<()>) {
        self.validate_seekable_with_result(file_name, data.len() as u64, &mut Cursor::new(data), None)
    }

    /// Validate a local file. The name is the path's final component and the
    /// size comes from the file metadata.
    ///
    /// # Errors
    /// Returns [`ValidationError::Io`] if the file cannot be read, otherwise
    /// the first check that failed.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let upload = FileUpload::from_path(path)?;
        self.validate_upload(&upload)
    }

    /// [`validate_path`](Self::validate_path) with a cancellation token.
    ///
    /// # Errors
    /// As [`validate_upload_cancellable`](Self::validate_upload_cancellable).
    pub fn validate_path_cancellable(
        &self,
        path: impl AsRef<Path>,
        token: &CancellationToken,
    ) -> Result<()> {
        check_cancelled(Some(token))?;
        let upload = FileUpload::from_path(path)?;
        self.validate_upload_cancellable(&upload, token)
    }

    /// Run [`validate_path`](Self::validate_path) on the blocking thread pool.
    ///
    /// # Errors
    /// As [`validate_path`](Self::validate_path); a panicked worker surfaces
    /// as [`ValidationError::Io`].
    pub async fn validate_path_async(&self, path: impl Into<PathBuf>) -> Result<()> {
        let validator = self.clone();
        let path = path.into();
        tokio::task::spawn_blocking(move || validator.validate_path(path))
            .await
            .map_err(|e| ValidationError::Io(io::Error::other(e)))?
    }

    fn run(
        &self,
        file_name: &str,
        size: u64,
        source: Source<'_>,
        token: Option<&CancellationToken>,
        report: &mut ValidationResult,
    ) -> Result<()> {
        let outcome = self.run_checks(file_name, size, source, token, report);
        if let Err(err) = &outcome {
            debug!(
                file_name,
                mime = report.detected_mime.as_deref().unwrap_or(""),
                error = %err,
                "Upload rejected"
            );
        }
        outcome
    }

    fn run_checks(
        &self,
        file_name: &str,
        size: u64,
        source: Source<'_>,
        token: Option<&CancellationToken>,
        report: &mut ValidationResult,
    ) -> Result<()> {
        check_cancelled(token)?;

        let ext = report.record("filename", self.check_file_name(file_name))?;
        report.record("size", self.check_size(size))?;

        if self.constraints.accepted_types.is_empty() {
            debug!(file_name, "No accepted types configured; content not inspected");
            return Ok(());
        }

        match source {
            Source::Stream => {
                report.warn("content not inspected: forward-only input");
                report.record("mime", self.check_extension_only(ext.as_deref()))
            }
            Source::Upload(upload) => {
                let mut content = upload.open()?;
                check_cancelled(token)?;
                self.inspect(&mut *content, ext.as_deref(), size, report)
            }
            Source::Seekable(reader) => {
                let origin = reader.stream_position()?;
                check_cancelled(token)?;
                let outcome = self.inspect(reader, ext.as_deref(), size, report);
                reader.seek(SeekFrom::Start(origin))?;
                outcome
            }
        }
    }

    /// MIME, strict and content stages over content readable from offset 0.
    fn inspect(
        &self,
        reader: &mut dyn ReadSeek,
        ext: Option<&str>,
        size: u64,
        report: &mut ValidationResult,
    ) -> Result<()> {
        reader.seek(SeekFrom::Start(0))?;
        let detected = detect_reader(&mut *reader)?;
        reader.seek(SeekFrom::Start(0))?;

        let implied = ext.and_then(mime_for_extension);
        let effective = refine_with_extension(detected, implied);
        report.detected_mime = Some(effective.to_string());
        debug!(detected, effective, "MIME detected");

        if let Some(declared) = report.declared_mime.clone() {
            if !mime::mime_matches(&declared, effective) {
                report.warn(format!(
                    "declared content type {declared} differs from detected {effective}"
                ));
            }
        }

        report.record("mime", self.check_accepted(effective))?;

        if self.constraints.strict_mime {
            report.record("strict_mime", check_strict(ext, implied, effective))?;
        }

        if !self.constraints.content_validation_enabled() {
            return Ok(());
        }
        let Some(validator) = self.constraints.registry().get(effective) else {
            debug!(mime = effective, "No content validator registered");
            return Ok(());
        };

        let outcome = validator.validate(ContentInput::Seekable(&mut *reader), size);
        match outcome {
            Ok(()) => {
                report.record("content", Ok(()))?;
            }
            Err(err) if self.constraints.require_content_validation => {
                report.record("content", Err(err))?;
            }
            Err(err) => {
                warn!(
                    validator = validator.name(),
                    mime = effective,
                    error = %err,
                    "Content validation failed; accepting because it is not required"
                );
                report.downgrade("content", &err);
            }
        }
        Ok(())
    }

    fn check_file_name(&self, file_name: &str) -> Result<Option<String>> {
        let c = &self.constraints;

        if file_name.trim().is_empty() {
            return Err(ValidationError::file_name("file name is empty"));
        }
        if c.max_filename_length > 0 && file_name.len() > c.max_filename_length {
            return Err(ValidationError::file_name(format!(
                "file name is {} bytes long, maximum is {}",
                file_name.len(),
                c.max_filename_length
            )));
        }
        if let Some(hit) = c
            .dangerous_substrings
            .iter()
            .find(|s| !s.is_empty() && file_name.contains(s.as_str()))
        {
            return Err(ValidationError::file_name(format!(
                "file name contains forbidden sequence {hit:?}"
            )));
        }
        if let Some(pattern) = &c.filename_pattern {
            if !pattern.is_match(file_name) {
                return Err(ValidationError::file_name(format!(
                    "file name does not match required pattern {}",
                    pattern.as_str()
                )));
            }
        }

        let ext = extension_of(file_name);
        match ext.as_deref() {
            None if c.require_extension => {
                return Err(ValidationError::extension("file has no extension"));
            }
            None if !c.allowed_extensions.is_empty() => {
                return Err(ValidationError::extension(
                    "file has no extension and an allow list is configured",
                ));
            }
            Some(e) if c.is_extension_blocked(e) => {
                return Err(ValidationError::extension(format!(
                    "extension .{e} is blocked"
                )));
            }
            Some(e) if !c.is_extension_allowed(e) => {
                return Err(ValidationError::extension(format!(
                    "extension .{e} is not allowed"
                )));
            }
            _ => {}
        }
        Ok(ext)
    }

    fn check_size(&self, size: u64) -> Result<()> {
        let c = &self.constraints;
        if c.min_size > 0 && size < c.min_size {
            return Err(ValidationError::size(format!(
                "file size {} is below minimum of {}",
                format_bytes(size),
                format_bytes(c.min_size)
            )));
        }
        if c.max_size > 0 && size > c.max_size {
            return Err(ValidationError::size(format!(
                "file size {} exceeds maximum of {}",
                format_bytes(size),
                format_bytes(c.max_size)
            )));
        }
        Ok(())
    }

    fn check_accepted(&self, mime_type: &str) -> Result<()> {
        if self.constraints.accepts(mime_type) {
            return Ok(());
        }
        Err(ValidationError::mime(format!(
            "content type {mime_type} is not accepted (accepted: {})",
            self.constraints.accepted_types.join(", ")
        )))
    }

    fn check_extension_only(&self, ext: Option<&str>) -> Result<()> {
        let implied = ext.and_then(mime_for_extension).unwrap_or(mime::OCTET_STREAM);
        if self.constraints.accepts(implied) {
            return Ok(());
        }
        Err(ValidationError::mime(format!(
            "type {implied} implied by the file extension is not accepted"
        )))
    }
}

fn check_strict(ext: Option<&str>, implied: Option<&str>, detected: &str) -> Result<()> {
    match (ext, implied) {
        (Some(ext), Some(implied)) if !implied.eq_ignore_ascii_case(detected) => {
            Err(ValidationError::mime(format!(
                "extension .{ext} implies {implied} but content is {detected}"
            )))
        }
        _ => Ok(()),
    }
}

/// OOXML packages that a 512-byte prefix cannot always tell apart.
const OOXML_FAMILY: &[&str] = &[mime::DOCX, mime::XLSX, mime::PPTX];

/// Narrow an ambiguous detection using the extension-implied type.
///
/// Sniffing reports any unrecognised text as `text/plain` and any OOXML
/// package whose prefix lacks a part marker as DOCX. When the extension names
/// a more specific member of the same family, that member is used.
fn refine_with_extension(detected: &'static str, implied: Option<&'static str>) -> &'static str {
    let Some(implied) = implied else {
        return detected;
    };
    if detected == mime::TEXT_PLAIN && implied.starts_with("text/") {
        return implied;
    }
    if OOXML_FAMILY.contains(&detected) && OOXML_FAMILY.contains(&implied) {
        return implied;
    }
    detected
}

fn check_cancelled(token: Option<&CancellationToken>) -> Result<()> {
    match token {
        Some(token) if token.is_cancelled() => Err(ValidationError::Cancelled),
        _ => Ok(()),
    }
}
