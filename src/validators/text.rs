//! Plain text validation: size ceiling and chunked UTF-8 check.

use super::{ContentInput, ContentValidator, check_declared_size, read_error};
use crate::error::{Result, ValidationError};
use crate::mime;
use crate::utils::human_format::format_bytes;
use std::io::{self, Read};

pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

const CHUNK_SIZE: usize = 8 * 1024;

const SUPPORTED: &[&str] = &[mime::TEXT_PLAIN, mime::TEXT_MARKDOWN];

#[derive(Debug, Clone)]
pub struct TextValidator {
    pub max_size: u64,
    pub require_utf8: bool,
}

impl Default for TextValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl TextValidator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            require_utf8: true,
        }
    }

    #[must_use]
    pub const fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    #[must_use]
    pub const fn require_utf8(mut self, require: bool) -> Self {
        self.require_utf8 = require;
        self
    }
}

impl ContentValidator for TextValidator {
    fn validate(&self, input: ContentInput<'_>, declared_size: u64) -> Result<()> {
        check_declared_size(declared_size, self.max_size, "text file")?;
        if !self.require_utf8 {
            return Ok(());
        }

        let mut reader = input.into_reader();
        let mut chunk = vec![0u8; CHUNK_SIZE];
        // Bytes of a multi-byte sequence split across the chunk boundary.
        let mut pending: Vec<u8> = Vec::with_capacity(4);
        let mut total = 0u64;

        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(read_error(e)),
            };
            total += n as u64;
            if self.max_size > 0 && total > self.max_size {
                return Err(ValidationError::content(format!(
                    "text file exceeds maximum size of {}",
                    format_bytes(self.max_size)
                )));
            }

            pending.extend_from_slice(&chunk[..n]);
            match std::str::from_utf8(&pending) {
                Ok(_) => pending.clear(),
                Err(e) if e.error_len().is_none() => {
                    let valid = e.valid_up_to();
                    pending.drain(..valid);
                }
                Err(e) => {
                    return Err(ValidationError::content(format!(
                        "text is not valid UTF-8 near byte {}",
                        total - (pending.len() - e.valid_up_to()) as u64
                    )));
                }
            }
        }

        if !pending.is_empty() {
            return Err(ValidationError::content(
                "text is not valid UTF-8: truncated multi-byte sequence at end",
            ));
        }
        Ok(())
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    fn name(&self) -> &'static str {
        "text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader that yields one byte per call, splitting every sequence.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.split_first() {
                Some((&b, rest)) if !buf.is_empty() => {
                    buf[0] = b;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    fn validate(validator: &TextValidator, data: &[u8]) -> Result<()> {
        let mut reader = Trickle(data);
        validator.validate(ContentInput::stream(&mut reader), data.len() as u64)
    }

    #[test]
    fn test_multibyte_across_reads() {
        assert!(validate(&TextValidator::new(), "naïve café ✓ 🦀".as_bytes()).is_ok());
    }

    #[test]
    fn test_invalid_utf8() {
        let err = validate(&TextValidator::new(), b"abc\xFFdef").unwrap_err();
        assert!(err.message().contains("UTF-8"));

        let err = validate(&TextValidator::new(), b"abc\xE2\x9C").unwrap_err();
        assert!(err.message().contains("truncated"));

        assert!(validate(&TextValidator::new().require_utf8(false), b"abc\xFF").is_ok());
    }

    #[test]
    fn test_size_ceiling() {
        let err = validate(&TextValidator::new().with_max_size(4), b"hello").unwrap_err();
        assert!(err.message().contains("exceeds maximum"));

        // A lying declared size is caught by the actual byte count.
        let mut reader = Trickle(b"hello");
        let err = TextValidator::new()
            .with_max_size(4)
            .validate(ContentInput::stream(&mut reader), 1)
            .unwrap_err();
        assert!(err.message().contains("exceeds maximum"));
    }
}
