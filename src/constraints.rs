//! Upload policy.
//!
//! [`Constraints`] is plain data: build it once (directly, through
//! [`ConstraintsBuilder`], from a preset, or from
//! [`GuardConfig`](crate::config::GuardConfig)) and share it across calls.
//! Every bound uses `0` (or an empty list) for "not configured".

use crate::mime::{self, extensions::ANY};
use crate::registry::{ValidatorRegistry, default_registry};
use regex::Regex;
use std::sync::Arc;

pub const DEFAULT_MAX_FILENAME_LENGTH: usize = 255;

/// Substrings rejected in file names unless overridden.
pub const DEFAULT_DANGEROUS_SUBSTRINGS: &[&str] = &["..", "/", "\\", "\0"];

#[derive(Debug, Clone)]
pub struct Constraints {
    /// Minimum declared size in bytes (0 = no minimum)
    pub min_size: u64,
    /// Maximum declared size in bytes (0 = no maximum)
    pub max_size: u64,
    /// Accepted MIME types or groups (`image/*`, `*/*`); empty skips content
    /// inspection entirely
    pub accepted_types: Vec<String>,
    /// Lower-case extensions without the dot; empty allows any
    pub allowed_extensions: Vec<String>,
    /// Lower-case extensions without the dot; always wins over the allow list
    pub blocked_extensions: Vec<String>,
    /// Maximum file name length in bytes (0 = unbounded)
    pub max_filename_length: usize,
    pub filename_pattern: Option<Regex>,
    pub dangerous_substrings: Vec<String>,
    pub require_extension: bool,
    /// Require the extension-implied MIME type to equal the detected one
    pub strict_mime: bool,
    pub content_validation: bool,
    /// Content failures reject the upload instead of producing a warning
    pub require_content_validation: bool,
    /// Falls back to [`default_registry`] when unset
    pub registry: Option<Arc<ValidatorRegistry>>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: 0,
            accepted_types: Vec::new(),
            allowed_extensions: Vec::new(),
            blocked_extensions: Vec::new(),
            max_filename_length: DEFAULT_MAX_FILENAME_LENGTH,
            filename_pattern: None,
            dangerous_substrings: DEFAULT_DANGEROUS_SUBSTRINGS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            require_extension: false,
            strict_mime: false,
            content_validation: true,
            require_content_validation: false,
            registry: None,
        }
    }
}

impl Constraints {
    #[must_use]
    pub fn builder() -> ConstraintsBuilder {
        ConstraintsBuilder::new()
    }

    /// Raster and vector images up to 50MB, content required to validate.
    #[must_use]
    pub fn images() -> Self {
        ConstraintsBuilder::new()
            .max_size(50 * 1024 * 1024)
            .accept("image/*")
            .allow_extensions(["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "ico", "svg"])
            .require_extension(true)
            .strict_mime(true)
            .require_content_validation(true)
            .registry(Arc::new(ValidatorRegistry::images()))
            .build()
    }

    /// PDF, OOXML and structured text up to 100MB.
    #[must_use]
    pub fn documents() -> Self {
        ConstraintsBuilder::new()
            .max_size(100 * 1024 * 1024)
            .accept_all([
                mime::APPLICATION_PDF,
                mime::DOCX,
                mime::XLSX,
                mime::PPTX,
                mime::APPLICATION_JSON,
                mime::APPLICATION_XML,
                "text/*",
            ])
            .allow_extensions(["pdf", "docx", "xlsx", "pptx", "json", "xml", "csv", "txt", "md"])
            .require_extension(true)
            .strict_mime(true)
            .require_content_validation(true)
            .registry(Arc::new(ValidatorRegistry::documents()))
            .build()
    }

    /// Audio and video up to 10GB.
    #[must_use]
    pub fn media() -> Self {
        ConstraintsBuilder::new()
            .max_size(10 * 1024 * 1024 * 1024)
            .accept_all(["audio/*", "video/*"])
            .allow_extensions([
                "mp3", "wav", "ogg", "oga", "flac", "aac", "m4a", "mp4", "m4v", "mov", "webm",
                "avi", "mkv",
            ])
            .require_extension(true)
            .require_content_validation(true)
            .registry(Arc::new(ValidatorRegistry::media()))
            .build()
    }

    /// ZIP and tar/gzip archives up to 1GB.
    #[must_use]
    pub fn archives() -> Self {
        ConstraintsBuilder::new()
            .max_size(1024 * 1024 * 1024)
            .accept_all([
                mime::APPLICATION_ZIP,
                mime::APPLICATION_TAR,
                mime::APPLICATION_GZIP,
            ])
            .allow_extensions(["zip", "tar", "gz", "tgz"])
            .require_extension(true)
            .require_content_validation(true)
            .registry(Arc::new(ValidatorRegistry::archives()))
            .build()
    }

    /// Any type is accepted; content validation runs but only warns.
    #[must_use]
    pub fn permissive() -> Self {
        ConstraintsBuilder::new().accept(ANY).build()
    }

    /// Registry used for content validation.
    #[must_use]
    pub fn registry(&self) -> Arc<ValidatorRegistry> {
        self.registry.clone().unwrap_or_else(default_registry)
    }

    /// Does any accepted type or group admit `mime_type`?
    #[must_use]
    pub fn accepts(&self, mime_type: &str) -> bool {
        self.accepted_types
            .iter()
            .any(|accepted| mime::mime_matches(accepted, mime_type))
    }

    #[must_use]
    pub fn is_extension_blocked(&self, ext: &str) -> bool {
        self.blocked_extensions
            .iter()
            .any(|blocked| blocked.eq_ignore_ascii_case(ext))
    }

    /// Allowed by the allow list (or no list) and not blocked.
    #[must_use]
    pub fn is_extension_allowed(&self, ext: &str) -> bool {
        if self.is_extension_blocked(ext) {
            return false;
        }
        self.allowed_extensions.is_empty()
            || self
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }

    #[must_use]
    pub fn content_validation_enabled(&self) -> bool {
        self.content_validation || self.require_content_validation
    }
}

/// Builder for [`Constraints`].
#[derive(Debug, Clone, Default)]
pub struct ConstraintsBuilder {
    constraints: Constraints,
}

impl ConstraintsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn min_size(mut self, bytes: u64) -> Self {
        self.constraints.min_size = bytes;
        self
    }

    #[must_use]
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.constraints.max_size = bytes;
        self
    }

    #[must_use]
    pub fn size_range(self, min: u64, max: u64) -> Self {
        self.min_size(min).max_size(max)
    }

    /// Accept a MIME type or group
    #[must_use]
    pub fn accept(mut self, mime_type: impl Into<String>) -> Self {
        self.constraints.accepted_types.push(mime_type.into());
        self
    }

    #[must_use]
    pub fn accept_all<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints
            .accepted_types
            .extend(mime_types.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn allow_extension(mut self, ext: &str) -> Self {
        self.constraints.allowed_extensions.push(normalize_extension(ext));
        self
    }

    #[must_use]
    pub fn allow_extensions<'a>(mut self, exts: impl IntoIterator<Item = &'a str>) -> Self {
        self.constraints
            .allowed_extensions
            .extend(exts.into_iter().map(normalize_extension));
        self
    }

    #[must_use]
    pub fn block_extension(mut self, ext: &str) -> Self {
        self.constraints.blocked_extensions.push(normalize_extension(ext));
        self
    }

    #[must_use]
    pub fn block_extensions<'a>(mut self, exts: impl IntoIterator<Item = &'a str>) -> Self {
        self.constraints
            .blocked_extensions
            .extend(exts.into_iter().map(normalize_extension));
        self
    }

    #[must_use]
    pub fn max_filename_length(mut self, length: usize) -> Self {
        self.constraints.max_filename_length = length;
        self
    }

    #[must_use]
    pub fn filename_pattern(mut self, pattern: Regex) -> Self {
        self.constraints.filename_pattern = Some(pattern);
        self
    }

    /// Compile `pattern` and use it as the filename pattern.
    ///
    /// # Errors
    /// Returns the regex compilation error.
    pub fn try_filename_pattern(self, pattern: &str) -> Result<Self, regex::Error> {
        Ok(self.filename_pattern(Regex::new(pattern)?))
    }

    /// Replace the dangerous substring list
    #[must_use]
    pub fn dangerous_substrings<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints.dangerous_substrings = substrings.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn require_extension(mut self, require: bool) -> Self {
        self.constraints.require_extension = require;
        self
    }

    #[must_use]
    pub fn strict_mime(mut self, strict: bool) -> Self {
        self.constraints.strict_mime = strict;
        self
    }

    #[must_use]
    pub fn content_validation(mut self, enabled: bool) -> Self {
        self.constraints.content_validation = enabled;
        self
    }

    #[must_use]
    pub fn require_content_validation(mut self, required: bool) -> Self {
        self.constraints.require_content_validation = required;
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: Arc<ValidatorRegistry>) -> Self {
        self.constraints.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn build(self) -> Constraints {
        self.constraints
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let constraints = Constraints::default();
        assert_eq!(constraints.max_size, 0);
        assert!(constraints.accepted_types.is_empty());
        assert_eq!(constraints.max_filename_length, 255);
        assert!(constraints.dangerous_substrings.iter().any(|s| s == ".."));
        assert!(constraints.content_validation);
        assert!(!constraints.require_content_validation);
    }

    #[test]
    fn test_blocked_wins_over_allowed() {
        let constraints = Constraints::builder()
            .allow_extensions(["exe", "png"])
            .block_extension(".EXE")
            .build();
        assert!(!constraints.is_extension_allowed("exe"));
        assert!(constraints.is_extension_allowed("PNG"));
        assert!(!constraints.is_extension_allowed("gif"));
    }

    #[test]
    fn test_empty_allow_list_allows_everything_not_blocked() {
        let constraints = Constraints::builder().block_extension("bat").build();
        assert!(constraints.is_extension_allowed("anything"));
        assert!(!constraints.is_extension_allowed("bat"));
    }

    #[test]
    fn test_accepts_groups() {
        let constraints = Constraints::builder().accept("image/*").accept(mime::APPLICATION_PDF).build();
        assert!(constraints.accepts(mime::IMAGE_PNG));
        assert!(constraints.accepts(mime::APPLICATION_PDF));
        assert!(!constraints.accepts(mime::APPLICATION_ZIP));
        assert!(Constraints::permissive().accepts(mime::APPLICATION_PE));
    }

    #[test]
    fn test_presets_carry_scoped_registries() {
        let images = Constraints::images();
        assert!(images.registry().contains(mime::IMAGE_PNG));
        assert!(!images.registry().contains(mime::APPLICATION_ZIP));
        assert!(images.accepts(mime::IMAGE_SVG));

        let archives = Constraints::archives();
        assert!(archives.accepts(mime::APPLICATION_GZIP));
        assert!(archives.is_extension_allowed("tgz"));

        assert!(Constraints::documents().accepts(mime::TEXT_CSV));
        assert!(Constraints::media().accepts(mime::VIDEO_WEBM));
    }

    #[test]
    fn test_try_filename_pattern() {
        assert!(Constraints::builder().try_filename_pattern("^[a-z]+\\.txt$").is_ok());
        assert!(Constraints::builder().try_filename_pattern("(unclosed").is_err());
    }

    #[test]
    fn test_registry_falls_back_to_default() {
        let constraints = Constraints::default();
        assert!(Arc::ptr_eq(&constraints.registry(), &default_registry()));
    }
}
