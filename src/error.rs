//! Error types for upload validation.
//!
//! Every rejected upload maps onto one of five stable kinds (size, MIME,
//! filename, extension, content). Cancellation and I/O failures while opening
//! content are reported separately so callers can tell a policy rejection apart
//! from an aborted or broken call.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for validation operations.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// The five rejection categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Size,
    Mime,
    FileName,
    Extension,
    Content,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Size => "size",
            Self::Mime => "mime",
            Self::FileName => "filename",
            Self::Extension => "extension",
            Self::Content => "content",
        };
        f.write_str(name)
    }
}

/// Errors produced while validating an upload.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Declared size outside the configured bounds
    #[error("Size validation failed: {message}")]
    Size { message: String },

    /// Detected type not accepted, or inconsistent with the filename
    #[error("MIME validation failed: {message}")]
    Mime { message: String },

    /// Filename empty, too long, or matching a dangerous pattern
    #[error("Filename validation failed: {message}")]
    FileName { message: String },

    /// Extension missing, blocked, or not on the allow list
    #[error("Extension validation failed: {message}")]
    Extension { message: String },

    /// Structural or resource-bound violation found inside the content
    #[error("Content validation failed: {message}")]
    Content { message: String },

    /// The caller cancelled the validation
    #[error("Validation cancelled")]
    Cancelled,

    /// Content could not be opened or read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ValidationError {
    /// Create a size error
    pub fn size<S: Into<String>>(message: S) -> Self {
        Self::Size {
            message: message.into(),
        }
    }

    /// Create a MIME error
    pub fn mime<S: Into<String>>(message: S) -> Self {
        Self::Mime {
            message: message.into(),
        }
    }

    /// Create a filename error
    pub fn file_name<S: Into<String>>(message: S) -> Self {
        Self::FileName {
            message: message.into(),
        }
    }

    /// Create an extension error
    pub fn extension<S: Into<String>>(message: S) -> Self {
        Self::Extension {
            message: message.into(),
        }
    }

    /// Create a content error
    pub fn content<S: Into<String>>(message: S) -> Self {
        Self::Content {
            message: message.into(),
        }
    }

    /// The taxonomy kind, or `None` for cancellation and I/O failures.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Size { .. } => Some(ErrorKind::Size),
            Self::Mime { .. } => Some(ErrorKind::Mime),
            Self::FileName { .. } => Some(ErrorKind::FileName),
            Self::Extension { .. } => Some(ErrorKind::Extension),
            Self::Content { .. } => Some(ErrorKind::Content),
            Self::Cancelled | Self::Io(_) => None,
        }
    }

    /// The bare message without the category prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Size { message }
            | Self::Mime { message }
            | Self::FileName { message }
            | Self::Extension { message }
            | Self::Content { message } => message.clone(),
            Self::Cancelled => "validation cancelled".to_string(),
            Self::Io(e) => e.to_string(),
        }
    }

    #[must_use]
    pub const fn is_size_error(&self) -> bool {
        matches!(self, Self::Size { .. })
    }

    #[must_use]
    pub const fn is_mime_error(&self) -> bool {
        matches!(self, Self::Mime { .. })
    }

    #[must_use]
    pub const fn is_filename_error(&self) -> bool {
        matches!(self, Self::FileName { .. })
    }

    #[must_use]
    pub const fn is_extension_error(&self) -> bool {
        matches!(self, Self::Extension { .. })
    }

    #[must_use]
    pub const fn is_content_error(&self) -> bool {
        matches!(self, Self::Content { .. })
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_predicates() {
        let err = ValidationError::content("compression ratio 512:1 exceeds maximum 100:1");
        assert!(err.is_content_error());
        assert!(!err.is_size_error());
        assert_eq!(err.kind(), Some(ErrorKind::Content));
        assert_eq!(
            err.to_string(),
            "Content validation failed: compression ratio 512:1 exceeds maximum 100:1"
        );
        assert_eq!(err.message(), "compression ratio 512:1 exceeds maximum 100:1");
    }

    #[test]
    fn test_non_taxonomy_errors_have_no_kind() {
        assert_eq!(ValidationError::Cancelled.kind(), None);
        assert!(ValidationError::Cancelled.is_cancelled());

        let io = ValidationError::from(std::io::Error::other("disk gone"));
        assert_eq!(io.kind(), None);
        assert!(!io.is_content_error());
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::FileName.to_string(), "filename");
        assert_eq!(ErrorKind::Mime.to_string(), "mime");
    }
}
