//! CSV validation.
//!
//! A line-oriented scan with quote tracking: delimiters inside quoted fields
//! are not column breaks, and a newline inside quotes continues the current
//! record. Blank lines between records are ignored. Every line is read through
//! a length-limited window, so a file without newlines cannot make the scan
//! buffer more than one line's worth of bytes.

use super::{BoundedReader, ContentInput, ContentValidator, check_declared_size};
use crate::error::{Result, ValidationError};
use crate::mime;
use crate::utils::human_format::format_bytes;
use std::io::{BufRead, BufReader, Read};

pub const DEFAULT_MAX_SIZE: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_ROWS: usize = 1_000_000;
pub const DEFAULT_MAX_COLUMNS: usize = 1000;
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

const SUPPORTED: &[&str] = &[
    mime::TEXT_CSV,
    "application/csv",
    "text/comma-separated-values",
];

#[derive(Debug, Clone)]
pub struct CsvValidator {
    pub max_size: u64,
    /// Records, header included
    pub max_rows: usize,
    pub max_columns: usize,
    /// Bytes per physical line, line terminator excluded
    pub max_line_length: usize,
    pub delimiter: u8,
    pub require_utf8: bool,
}

impl Default for CsvValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvValidator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            max_rows: DEFAULT_MAX_ROWS,
            max_columns: DEFAULT_MAX_COLUMNS,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            delimiter: b',',
            require_utf8: true,
        }
    }

    #[must_use]
    pub const fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_max_rows(mut self, rows: usize) -> Self {
        self.max_rows = rows;
        self
    }

    #[must_use]
    pub const fn with_max_columns(mut self, columns: usize) -> Self {
        self.max_columns = columns;
        self
    }

    #[must_use]
    pub const fn with_max_line_length(mut self, bytes: usize) -> Self {
        self.max_line_length = bytes;
        self
    }

    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub const fn require_utf8(mut self, require: bool) -> Self {
        self.require_utf8 = require;
        self
    }

    fn scan<R: BufRead>(&self, mut reader: R) -> Result<usize> {
        let mut line = Vec::new();
        let mut line_no = 0usize;
        let mut rows = 0usize;
        let mut columns = 1usize;
        let mut in_quotes = false;

        loop {
            line.clear();
            let read = (&mut reader)
                .take(self.max_line_length as u64 + 1)
                .read_until(b'\n', &mut line)
                .map_err(|e| ValidationError::content(format!("CSV rejected: {e}")))?;
            if read == 0 {
                break;
            }
            line_no += 1;

            let content = strip_line_ending(&line);
            if content.len() > self.max_line_length {
                return Err(ValidationError::content(format!(
                    "CSV line {line_no} exceeds maximum length of {}",
                    format_bytes(self.max_line_length as u64)
                )));
            }
            if self.require_utf8 && std::str::from_utf8(content).is_err() {
                return Err(ValidationError::content(format!(
                    "CSV line {line_no} is not valid UTF-8"
                )));
            }
            if content.is_empty() && !in_quotes {
                continue;
            }

            for &byte in content {
                if byte == b'"' {
                    in_quotes = !in_quotes;
                } else if byte == self.delimiter && !in_quotes {
                    columns += 1;
                }
            }
            if in_quotes {
                continue;
            }

            if columns > self.max_columns {
                return Err(ValidationError::content(format!(
                    "CSV line {line_no} has {columns} columns, maximum is {}",
                    self.max_columns
                )));
            }
            rows += 1;
            if rows > self.max_rows {
                return Err(ValidationError::content(format!(
                    "CSV has more than {} rows",
                    self.max_rows
                )));
            }
            columns = 1;
        }

        if in_quotes {
            return Err(ValidationError::content(
                "CSV ends inside a quoted field",
            ));
        }
        if rows == 0 {
            return Err(ValidationError::content("CSV file is empty"));
        }
        Ok(rows)
    }
}

impl ContentValidator for CsvValidator {
    fn validate(&self, input: ContentInput<'_>, declared_size: u64) -> Result<()> {
        check_declared_size(declared_size, self.max_size, "CSV file")?;
        let reader = BufReader::new(BoundedReader::new(input.into_reader(), self.max_size));
        self.scan(reader).map(|_| ())
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn validate(validator: &CsvValidator, data: &[u8]) -> Result<()> {
        let mut cursor = Cursor::new(data);
        validator.validate(ContentInput::seekable(&mut cursor), data.len() as u64)
    }

    fn rows(n: usize) -> String {
        (0..n).map(|i| format!("{i},value\n")).collect()
    }

    #[test]
    fn test_row_boundary() {
        let validator = CsvValidator::new().with_max_rows(5);
        assert!(validate(&validator, rows(5).as_bytes()).is_ok());
        let err = validate(&validator, rows(6).as_bytes()).unwrap_err();
        assert!(err.message().contains("more than 5 rows"));
    }

    #[test]
    fn test_empty_and_blank() {
        assert!(validate(&CsvValidator::new(), b"").is_err());
        assert!(validate(&CsvValidator::new(), b"\n\r\n\n").is_err());
    }

    #[test]
    fn test_quoted_fields() {
        let data = b"name,comment\nalice,\"hello, world\"\nbob,\"multi\nline, text\"\n";
        let validator = CsvValidator::new().with_max_columns(2).with_max_rows(3);
        assert!(validate(&validator, data).is_ok());
        assert_eq!(
            validator.scan(BufReader::new(&data[..])).unwrap(),
            3
        );

        let err = validate(&CsvValidator::new(), b"a,\"unterminated\n").unwrap_err();
        assert!(err.message().contains("quoted field"));
    }

    #[test]
    fn test_column_limit() {
        let validator = CsvValidator::new().with_max_columns(3);
        assert!(validate(&validator, b"a,b,c\n").is_ok());
        let err = validate(&validator, b"a,b,c,d\n").unwrap_err();
        assert!(err.message().contains("4 columns"));
    }

    #[test]
    fn test_line_length_and_utf8() {
        let validator = CsvValidator::new().with_max_line_length(8);
        assert!(validate(&validator, b"12345678\r\n").is_ok());
        assert!(validate(&validator, b"123456789\n").is_err());

        let err = validate(&CsvValidator::new(), b"caf\xE9,1\n").unwrap_err();
        assert!(err.message().contains("UTF-8"));
        assert!(validate(&CsvValidator::new().require_utf8(false), b"caf\xE9,1\n").is_ok());
    }

    #[test]
    fn test_custom_delimiter() {
        let validator = CsvValidator::new().with_delimiter(b';').with_max_columns(2);
        assert!(validate(&validator, b"a;b\nc,d;e\n").is_ok());
    }
}
