use crate::constraints::{Constraints, DEFAULT_DANGEROUS_SUBSTRINGS};
use crate::registry::ValidatorRegistry;
use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub mod defaults;

use defaults::*;

/// Upload policy in plain-data form, loadable from TOML.
///
/// ```toml
/// max_size = 10485760
/// accepted_types = ["image/*", "application/pdf"]
/// blocked_extensions = ["exe", "bat"]
/// strict_mime = true
/// registry = "minimal"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Minimum declared size in bytes (0 = no minimum)
    #[serde(default = "default_min_size")]
    pub min_size: u64,
    /// Maximum declared size in bytes (0 = no maximum)
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    /// Accepted MIME types or groups
    #[serde(default)]
    pub accepted_types: Vec<String>,
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
    #[serde(default)]
    pub blocked_extensions: Vec<String>,
    #[serde(default = "default_max_filename_length")]
    pub max_filename_length: usize,
    /// Regular expression every file name must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_pattern: Option<String>,
    #[serde(default = "default_dangerous_substrings")]
    pub dangerous_substrings: Vec<String>,
    #[serde(default = "default_require_extension")]
    pub require_extension: bool,
    #[serde(default = "default_strict_mime")]
    pub strict_mime: bool,
    #[serde(default = "default_content_validation")]
    pub content_validation: bool,
    #[serde(default = "default_require_content_validation")]
    pub require_content_validation: bool,
    /// Registry preset: default, minimal, images, documents, media or archives
    #[serde(default = "default_registry_preset")]
    pub registry: String,
}

fn default_min_size() -> u64 {
    DEFAULT_MIN_SIZE
}

fn default_max_size() -> u64 {
    DEFAULT_MAX_SIZE
}

fn default_max_filename_length() -> usize {
    DEFAULT_MAX_FILENAME_LENGTH
}

fn default_dangerous_substrings() -> Vec<String> {
    DEFAULT_DANGEROUS_SUBSTRINGS
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_require_extension() -> bool {
    DEFAULT_REQUIRE_EXTENSION
}

fn default_strict_mime() -> bool {
    DEFAULT_STRICT_MIME
}

fn default_content_validation() -> bool {
    DEFAULT_CONTENT_VALIDATION
}

fn default_require_content_validation() -> bool {
    DEFAULT_REQUIRE_CONTENT_VALIDATION
}

fn default_registry_preset() -> String {
    DEFAULT_REGISTRY_PRESET.to_string()
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            min_size: default_min_size(),
            max_size: default_max_size(),
            accepted_types: Vec::new(),
            allowed_extensions: Vec::new(),
            blocked_extensions: Vec::new(),
            max_filename_length: default_max_filename_length(),
            filename_pattern: None,
            dangerous_substrings: default_dangerous_substrings(),
            require_extension: default_require_extension(),
            strict_mime: default_strict_mime(),
            content_validation: default_content_validation(),
            require_content_validation: default_require_content_validation(),
            registry: default_registry_preset(),
        }
    }
}

impl GuardConfig {
    /// Load from the file named by `UPLOAD_GUARD_CONFIG` (or
    /// `upload-guard.toml`), writing a default file if none exists.
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_or_create(&config_file)
    }

    /// Parse an existing TOML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse `path` if it exists, otherwise write the defaults there.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load_from_file(path);
        }
        let default_config = Self::default();
        std::fs::write(path, default_config.to_toml_string()?)
            .with_context(|| format!("Failed to write default config {}", path.display()))?;
        info!("Created default config file: {}", path.display());
        Ok(default_config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Compile into a [`Constraints`] value, resolving the filename pattern
    /// and the registry preset.
    pub fn into_constraints(self) -> Result<Constraints> {
        let filename_pattern = self
            .filename_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .context("Invalid filename_pattern")?;

        let Some(registry) = ValidatorRegistry::preset(&self.registry) else {
            bail!(
                "Unknown registry preset {:?} (expected default, minimal, images, documents, media or archives)",
                self.registry
            );
        };

        let normalize = |exts: Vec<String>| -> Vec<String> {
            exts.into_iter()
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .collect()
        };

        Ok(Constraints {
            min_size: self.min_size,
            max_size: self.max_size,
            accepted_types: self.accepted_types,
            allowed_extensions: normalize(self.allowed_extensions),
            blocked_extensions: normalize(self.blocked_extensions),
            max_filename_length: self.max_filename_length,
            filename_pattern,
            dangerous_substrings: self.dangerous_substrings,
            require_extension: self.require_extension,
            strict_mime: self.strict_mime,
            content_validation: self.content_validation,
            require_content_validation: self.require_content_validation,
            registry: Some(Arc::new(registry)),
        })
    }
}

impl TryFrom<GuardConfig> for Constraints {
    type Error = anyhow::Error;

    fn try_from(config: GuardConfig) -> Result<Self> {
        config.into_constraints()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime;
    use tempfile::TempDir;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = GuardConfig::from_toml_str("").unwrap();
        assert_eq!(config, GuardConfig::default());
        assert_eq!(config.max_filename_length, 255);
        assert_eq!(config.registry, "default");
    }

    #[test]
    fn test_into_constraints() {
        let config = GuardConfig::from_toml_str(
            r#"
            max_size = 1048576
            accepted_types = ["image/*"]
            allowed_extensions = [".PNG", "jpg"]
            filename_pattern = '^[a-z0-9_.-]+$'
            strict_mime = true
            registry = "images"
            "#,
        )
        .unwrap();

        let constraints = config.into_constraints().unwrap();
        assert_eq!(constraints.max_size, 1_048_576);
        assert_eq!(constraints.allowed_extensions, ["png", "jpg"]);
        assert!(constraints.strict_mime);
        assert!(constraints.filename_pattern.unwrap().is_match("cat.png"));
        let registry = constraints.registry.unwrap();
        assert!(registry.contains(mime::IMAGE_PNG));
        assert!(!registry.contains(mime::APPLICATION_PDF));
    }

    #[test]
    fn test_invalid_pattern_and_preset() {
        let config = GuardConfig {
            filename_pattern: Some("(".into()),
            ..GuardConfig::default()
        };
        let err = config.into_constraints().unwrap_err();
        assert!(err.to_string().contains("filename_pattern"));

        let config = GuardConfig {
            registry: "everything".into(),
            ..GuardConfig::default()
        };
        assert!(Constraints::try_from(config).is_err());
    }

    #[test]
    fn test_load_or_create_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("guard.toml");

        let created = GuardConfig::load_or_create(&path).unwrap();
        assert!(path.exists());

        let loaded = GuardConfig::load_from_file(&path).unwrap();
        assert_eq!(created, loaded);
    }

    #[test]
    fn test_missing_file_error_names_path() {
        let err = GuardConfig::load_from_file("/nonexistent/guard.toml").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/guard.toml"));
    }
}
