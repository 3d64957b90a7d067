//! Diagnostic record of a validation run.
//!
//! The plain entry points return only `Result<()>`; the `*_with_result`
//! variants also return a [`ValidationResult`] listing every check that ran,
//! which is what audit logs usually want.

use crate::error::{ErrorKind, ValidationError};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Outcome of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub file_name: String,
    pub declared_mime: Option<String>,
    pub detected_mime: Option<String>,
    pub checks: Vec<CheckOutcome>,
    pub warnings: Vec<String>,
    pub elapsed: Duration,
    #[serde(skip)]
    started: Option<Instant>,
}

impl ValidationResult {
    pub(crate) fn start(file_name: &str, declared_mime: Option<&str>) -> Self {
        Self {
            valid: true,
            file_name: file_name.to_string(),
            declared_mime: declared_mime.map(str::to_string),
            detected_mime: None,
            checks: Vec::new(),
            warnings: Vec::new(),
            elapsed: Duration::ZERO,
            started: Some(Instant::now()),
        }
    }

    /// Record the outcome of `check` and hand the result back unchanged.
    pub(crate) fn record<T>(
        &mut self,
        check: &'static str,
        result: Result<T, ValidationError>,
    ) -> Result<T, ValidationError> {
        match &result {
            Ok(_) => self.checks.push(CheckOutcome {
                name: check,
                passed: true,
                kind: None,
                message: None,
            }),
            Err(err) => {
                self.valid = false;
                self.checks.push(CheckOutcome {
                    name: check,
                    passed: false,
                    kind: err.kind(),
                    message: Some(err.message()),
                });
            }
        }
        result
    }

    /// Record a failed check that does not invalidate the upload.
    pub(crate) fn downgrade(&mut self, check: &'static str, err: &ValidationError) {
        self.checks.push(CheckOutcome {
            name: check,
            passed: false,
            kind: err.kind(),
            message: Some(err.message()),
        });
        self.warnings.push(err.to_string());
    }

    pub(crate) fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub(crate) fn finish(mut self, outcome: &Result<(), ValidationError>) -> Self {
        if outcome.is_err() {
            self.valid = false;
        }
        if let Some(started) = self.started.take() {
            self.elapsed = started.elapsed();
        }
        self
    }

    /// The check that rejected the upload, if any.
    #[must_use]
    pub fn failed_check(&self) -> Option<&CheckOutcome> {
        if self.valid {
            return None;
        }
        self.checks.iter().rev().find(|check| !check.passed)
    }

    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.failed_check().and_then(|check| check.kind)
    }

    /// One-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.valid { "PASS" } else { "FAIL" };
        write!(f, "{verdict} {}", self.file_name)?;
        if let Some(mime) = &self.detected_mime {
            write!(f, " ({mime})")?;
        }
        let passed = self.checks.iter().filter(|c| c.passed).count();
        write!(
            f,
            ": {passed}/{} checks passed, {} warning(s) in {:.1?}",
            self.checks.len(),
            self.warnings.len(),
            self.elapsed
        )?;
        if let Some(failed) = self.failed_check() {
            write!(
                f,
                "; {} check failed: {}",
                failed.name,
                failed.message.as_deref().unwrap_or("cancelled")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_flips_validity() {
        let mut result = ValidationResult::start("a.txt", Some("text/plain"));
        assert!(result.record("filename", Ok::<_, ValidationError>(())).is_ok());
        assert!(result.valid);

        let _ = result.record::<()>("size", Err(ValidationError::size("too big")));
        let result = result.finish(&Err(ValidationError::size("too big")));

        assert!(!result.valid);
        assert_eq!(result.checks.len(), 2);
        assert_eq!(result.error_kind(), Some(ErrorKind::Size));
        assert_eq!(result.failed_check().map(|c| c.name), Some("size"));
        assert!(result.summary().starts_with("FAIL a.txt"));
        assert!(result.summary().contains("size check failed: too big"));
    }

    #[test]
    fn test_downgrade_keeps_validity() {
        let mut result = ValidationResult::start("doc.pdf", None);
        result.detected_mime = Some("application/pdf".into());
        result.downgrade("content", &ValidationError::content("missing %%EOF"));
        let result = result.finish(&Ok(()));

        assert!(result.valid);
        assert!(result.failed_check().is_none());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.summary().starts_with("PASS doc.pdf (application/pdf)"));
    }

    #[test]
    fn test_serializes_to_json() {
        let result = ValidationResult::start("a.txt", None).finish(&Ok(()));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["valid"], true);
        assert_eq!(json["file_name"], "a.txt");
    }
}
