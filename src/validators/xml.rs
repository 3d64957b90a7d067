//! XML validation with XXE protection.
//!
//! DOCTYPE and ENTITY declarations are refused unless DTDs are explicitly
//! allowed: a quick case-insensitive scan of the first kilobyte catches the
//! usual payloads before the parser starts, and the parser's own DOCTYPE
//! event catches anything later. Entity references are never expanded.

use super::{
    BoundedReader, ContentInput, ContentValidator, check_declared_size, contains_ignore_case,
    read_error,
};
use crate::error::{Result, ValidationError};
use crate::mime;
use crate::mime::detector::read_prefix;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::{BufReader, Read};

pub const DEFAULT_MAX_SIZE: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_DEPTH: usize = 100;

const PRESCAN_LEN: usize = 1024;

const SUPPORTED: &[&str] = &[mime::APPLICATION_XML, mime::TEXT_XML];

#[derive(Debug, Clone)]
pub struct XmlValidator {
    pub max_size: u64,
    /// Element nesting limit; the root element is depth 1
    pub max_depth: usize,
    pub allow_dtd: bool,
}

impl Default for XmlValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlValidator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            allow_dtd: false,
        }
    }

    #[must_use]
    pub const fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub const fn allow_dtd(mut self, allow: bool) -> Self {
        self.allow_dtd = allow;
        self
    }

    fn check_prefix(&self, prefix: &[u8]) -> Result<()> {
        if self.allow_dtd {
            return Ok(());
        }
        for (marker, label) in [(&b"<!DOCTYPE"[..], "DOCTYPE"), (&b"<!ENTITY"[..], "ENTITY")] {
            if contains_ignore_case(prefix, marker) {
                return Err(ValidationError::content(format!(
                    "XML {label} declarations are not allowed"
                )));
            }
        }
        Ok(())
    }

    fn parse<R: Read>(&self, source: R) -> Result<()> {
        let mut reader = Reader::from_reader(BufReader::new(source));
        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut saw_root = false;

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                ValidationError::content(format!(
                    "invalid XML at byte {}: {e}",
                    reader.buffer_position()
                ))
            })?;

            match event {
                Event::Start(_) | Event::Empty(_) => {
                    let opened = depth + 1;
                    if opened > self.max_depth {
                        return Err(ValidationError::content(format!(
                            "XML nesting depth exceeds maximum of {}",
                            self.max_depth
                        )));
                    }
                    saw_root = true;
                    if matches!(event, Event::Start(_)) {
                        depth = opened;
                    }
                }
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::DocType(_) if !self.allow_dtd => {
                    return Err(ValidationError::content(
                        "XML DOCTYPE declarations are not allowed",
                    ));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_root {
            return Err(ValidationError::content("XML document has no root element"));
        }
        if depth != 0 {
            return Err(ValidationError::content(format!(
                "invalid XML: {depth} unclosed element(s) at end of document"
            )));
        }
        Ok(())
    }
}

impl ContentValidator for XmlValidator {
    fn validate(&self, input: ContentInput<'_>, declared_size: u64) -> Result<()> {
        check_declared_size(declared_size, self.max_size, "XML document")?;

        let mut source = BoundedReader::new(input.into_reader(), self.max_size);
        let mut prefix = [0u8; PRESCAN_LEN];
        let filled = read_prefix(&mut source, &mut prefix).map_err(read_error)?;
        if filled == 0 {
            return Err(ValidationError::content("XML document is empty"));
        }

        self.check_prefix(&prefix[..filled])?;
        self.parse((&prefix[..filled]).chain(source))
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    fn name(&self) -> &'static str {
        "xml"
    }
}
