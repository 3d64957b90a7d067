//! JSON validation: bounded size, well-formedness, bounded nesting.

use super::{BoundedReader, ContentInput, ContentValidator, check_declared_size};
use crate::error::{Result, ValidationError};
use crate::mime;
use serde_json::Value;
use std::io::BufReader;

pub const DEFAULT_MAX_SIZE: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Deepest nesting serde_json's recursion guard lets through; deeper documents
/// fail to parse before the configured depth is even consulted.
const PARSER_RECURSION_LIMIT: usize = 127;

const SUPPORTED: &[&str] = &[mime::APPLICATION_JSON, "text/json"];

#[derive(Debug, Clone)]
pub struct JsonValidator {
    pub max_size: u64,
    /// Containers nest at most this deep; a bare scalar has depth 0
    pub max_depth: usize,
}

impl Default for JsonValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonValidator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub const fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Set the deepest allowed container nesting.
    ///
    /// The parser refuses documents nested 128 levels or more on its own, so
    /// values above 127 behave as 127.
    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

impl ContentValidator for JsonValidator {
    fn validate(&self, input: ContentInput<'_>, declared_size: u64) -> Result<()> {
        check_declared_size(declared_size, self.max_size, "JSON document")?;

        let reader = BufReader::new(BoundedReader::new(input.into_reader(), self.max_size));
        let value: Value = serde_json::from_reader(reader).map_err(|e| {
            if e.is_io() {
                ValidationError::content(format!("JSON document rejected: {e}"))
            } else if e.to_string().contains("recursion limit") {
                ValidationError::content(format!(
                    "JSON nesting depth exceeds maximum of {}",
                    self.max_depth.min(PARSER_RECURSION_LIMIT)
                ))
            } else {
                ValidationError::content(format!("invalid JSON: {e}"))
            }
        })?;

        let depth = nesting_depth(&value);
        if depth > self.max_depth {
            return Err(ValidationError::content(format!(
                "JSON nesting depth {depth} exceeds maximum of {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// Deepest container nesting in `value`, walked without recursion.
fn nesting_depth(value: &Value) -> usize {
    let mut deepest = 0;
    let mut stack = vec![(value, 0usize)];
    while let Some((value, depth)) = stack.pop() {
        let children: Box<dyn Iterator<Item = &Value>> = match value {
            Value::Array(items) => Box::new(items.iter()),
            Value::Object(map) => Box::new(map.values()),
            _ => continue,
        };
        let depth = depth + 1;
        deepest = deepest.max(depth);
        stack.extend(children.map(|child| (child, depth)));
    }
    deepest
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn nested(depth: usize) -> String {
        format!("{}{}", "[".repeat(depth), "]".repeat(depth))
    }

    fn validate(validator: &JsonValidator, data: &[u8]) -> Result<()> {
        let mut cursor = Cursor::new(data);
        validator.validate(ContentInput::seekable(&mut cursor), data.len() as u64)
    }

    #[test]
    fn test_depth_counting() {
        assert_eq!(nesting_depth(&serde_json::json!(1)), 0);
        assert_eq!(nesting_depth(&serde_json::json!([])), 1);
        assert_eq!(nesting_depth(&serde_json::json!({"a": [1, {"b": []}]})), 4);
    }

    #[test]
    fn test_depth_boundary() {
        let validator = JsonValidator::new().with_max_depth(10);
        assert!(validate(&validator, nested(10).as_bytes()).is_ok());

        let err = validate(&validator, nested(11).as_bytes()).unwrap_err();
        assert!(err.message().contains("depth"));
    }

    #[test]
    fn test_default_depth_rejects_deep_documents() {
        let err = validate(&JsonValidator::new(), nested(101).as_bytes()).unwrap_err();
        assert!(err.message().contains("depth"), "{err}");

        let err = validate(&JsonValidator::new(), nested(10_000).as_bytes()).unwrap_err();
        assert!(err.message().contains("depth"), "{err}");
    }

    #[test]
    fn test_depth_above_parser_limit_is_capped() {
        let validator = JsonValidator::new().with_max_depth(200);
        assert!(validate(&validator, nested(120).as_bytes()).is_ok());

        let err = validate(&validator, nested(150).as_bytes()).unwrap_err();
        assert!(err.message().contains("maximum of 127"), "{err}");
    }

    #[test]
    fn test_malformed_and_oversized() {
        let err = validate(&JsonValidator::new(), b"{\"a\": ").unwrap_err();
        assert!(err.message().contains("invalid JSON"));

        let validator = JsonValidator::new().with_max_size(8);
        let mut stream: &[u8] = b"[1, 2, 3, 4, 5, 6]";
        let err = validator
            .validate(ContentInput::stream(&mut stream), 0)
            .unwrap_err();
        assert!(err.message().contains("exceeds maximum size"), "{err}");
    }

    proptest! {
        #[test]
        fn prop_depth_limit_is_exact(depth in 1usize..60, limit in 0usize..60) {
            let result = validate(&JsonValidator::new().with_max_depth(limit), nested(depth).as_bytes());
            prop_assert_eq!(result.is_ok(), depth <= limit);
        }
    }
}
