//! Configuration default values

// Size defaults (0 = unbounded)
pub const DEFAULT_MIN_SIZE: u64 = 0;
pub const DEFAULT_MAX_SIZE: u64 = 0;

// Filename defaults
pub const DEFAULT_MAX_FILENAME_LENGTH: usize = crate::constraints::DEFAULT_MAX_FILENAME_LENGTH;
pub const DEFAULT_REQUIRE_EXTENSION: bool = false;

// MIME defaults
pub const DEFAULT_STRICT_MIME: bool = false;

// Content validation defaults
pub const DEFAULT_CONTENT_VALIDATION: bool = true;
pub const DEFAULT_REQUIRE_CONTENT_VALIDATION: bool = false;
pub const DEFAULT_REGISTRY_PRESET: &str = "default";

// Config file location
pub const DEFAULT_CONFIG_FILE: &str = "upload-guard.toml";
pub const CONFIG_FILE_ENV: &str = "UPLOAD_GUARD_CONFIG";
