/*!
 Validator Registry

 Maps a MIME type to the content validator responsible for it. Lookups are
 keyed on the lower-cased MIME essence (parameters stripped), so
 `Text/CSV; charset=utf-8` resolves to the `text/csv` validator.

 Usage pattern:
   let registry = ValidatorRegistry::with_defaults();
   if let Some(validator) = registry.get("application/zip") { ... }

 A registry is cheap to share: validators are held behind `Arc`, and the map
 sits behind a `RwLock` so registration and lookup may happen concurrently.
 Cloning produces an independent map that still shares the validator
 instances.

 `default_registry()` returns a process-wide instance built on first use.
 Callers that need isolation (tests, per-tenant policy) should construct
 their own registry and hand it to `Constraints` instead.
*/

use crate::validators::{
    ArchiveValidator, ContentValidator, CsvValidator, ImageValidator, JsonValidator, MediaFormat,
    MediaValidator, OfficeValidator, PdfValidator, TarValidator, TextValidator, XmlValidator,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

type ValidatorMap = HashMap<String, Arc<dyn ContentValidator>>;

#[derive(Default)]
pub struct ValidatorRegistry {
    validators: RwLock<ValidatorMap>,
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("mime_types", &self.mime_types())
            .finish()
    }
}

impl Clone for ValidatorRegistry {
    fn clone(&self) -> Self {
        Self {
            validators: RwLock::new(self.read().clone()),
        }
    }
}

impl ValidatorRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in validator.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_validator(Arc::new(ArchiveValidator::new()));
        registry.register_validator(Arc::new(TarValidator::new()));
        registry.register_validator(Arc::new(OfficeValidator::new()));
        registry.register_validator(Arc::new(PdfValidator::new()));
        registry.register_validator(Arc::new(ImageValidator::new()));
        registry.register_validator(Arc::new(JsonValidator::new()));
        registry.register_validator(Arc::new(XmlValidator::new()));
        registry.register_validator(Arc::new(CsvValidator::new()));
        registry.register_validator(Arc::new(TextValidator::new()));
        registry.register_media();
        registry
    }

    /// Only the formats with the largest attack surface: archives, office
    /// documents, PDF and XML.
    #[must_use]
    pub fn minimal() -> Self {
        let registry = Self::new();
        registry.register_validator(Arc::new(ArchiveValidator::new()));
        registry.register_validator(Arc::new(TarValidator::new()));
        registry.register_validator(Arc::new(OfficeValidator::new()));
        registry.register_validator(Arc::new(PdfValidator::new()));
        registry.register_validator(Arc::new(XmlValidator::new()));
        registry
    }

    #[must_use]
    pub fn images() -> Self {
        let registry = Self::new();
        registry.register_validator(Arc::new(ImageValidator::new()));
        registry
    }

    #[must_use]
    pub fn documents() -> Self {
        let registry = Self::new();
        registry.register_validator(Arc::new(PdfValidator::new()));
        registry.register_validator(Arc::new(OfficeValidator::new()));
        registry.register_validator(Arc::new(JsonValidator::new()));
        registry.register_validator(Arc::new(XmlValidator::new()));
        registry.register_validator(Arc::new(CsvValidator::new()));
        registry.register_validator(Arc::new(TextValidator::new()));
        registry
    }

    #[must_use]
    pub fn media() -> Self {
        let registry = Self::new();
        registry.register_media();
        registry
    }

    #[must_use]
    pub fn archives() -> Self {
        let registry = Self::new();
        registry.register_validator(Arc::new(ArchiveValidator::new()));
        registry.register_validator(Arc::new(TarValidator::new()));
        registry
    }

    /// Build a preset by name: `default`, `minimal`, `images`, `documents`,
    /// `media` or `archives`.
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" | "defaults" | "all" => Some(Self::with_defaults()),
            "minimal" => Some(Self::minimal()),
            "images" => Some(Self::images()),
            "documents" => Some(Self::documents()),
            "media" => Some(Self::media()),
            "archives" => Some(Self::archives()),
            _ => None,
        }
    }

    fn register_media(&self) {
        for format in MediaFormat::ALL {
            self.register_validator(Arc::new(MediaValidator::new(format)));
        }
    }

    /// Register `validator` for `mime_type`, replacing any previous entry.
    pub fn register(&self, mime_type: &str, validator: Arc<dyn ContentValidator>) {
        self.write().insert(normalize(mime_type), validator);
    }

    /// Register `validator` under every MIME type it reports supporting.
    pub fn register_validator(&self, validator: Arc<dyn ContentValidator>) {
        let mut map = self.write();
        for mime_type in validator.supported_mime_types() {
            map.insert(normalize(mime_type), Arc::clone(&validator));
        }
    }

    /// Remove the validator for `mime_type`, returning it if present.
    pub fn unregister(&self, mime_type: &str) -> Option<Arc<dyn ContentValidator>> {
        self.write().remove(&normalize(mime_type))
    }

    /// Validator for `mime_type`, if one is registered.
    #[must_use]
    pub fn get(&self, mime_type: &str) -> Option<Arc<dyn ContentValidator>> {
        self.read().get(&normalize(mime_type)).cloned()
    }

    #[must_use]
    pub fn contains(&self, mime_type: &str) -> bool {
        self.read().contains_key(&normalize(mime_type))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registered MIME types, sorted.
    #[must_use]
    pub fn mime_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.read().keys().cloned().collect();
        types.sort();
        types
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    // Every mutation is a single map operation; a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, ValidatorMap> {
        self.validators
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ValidatorMap> {
        self.validators
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Process-wide registry with every built-in validator, built on first use.
pub fn default_registry() -> Arc<ValidatorRegistry> {
    static DEFAULT: OnceLock<Arc<ValidatorRegistry>> = OnceLock::new();
    Arc::clone(DEFAULT.get_or_init(|| {
        let registry = ValidatorRegistry::with_defaults();
        debug!(mime_types = registry.len(), "Built default validator registry");
        Arc::new(registry)
    }))
}

fn normalize(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime;
    use rstest::rstest;

    #[test]
    fn test_register_overwrites_and_unregister() {
        let registry = ValidatorRegistry::new();
        assert!(registry.is_empty());

        registry.register("application/x-custom", Arc::new(JsonValidator::new()));
        assert_eq!(registry.get("application/x-custom").unwrap().name(), "json");

        registry.register("application/x-custom", Arc::new(XmlValidator::new()));
        assert_eq!(registry.get("application/x-custom").unwrap().name(), "xml");
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister("application/x-custom").is_some());
        assert!(registry.get("application/x-custom").is_none());
        assert!(registry.unregister("application/x-custom").is_none());
    }

    #[test]
    fn test_lookup_normalizes_mime() {
        let registry = ValidatorRegistry::with_defaults();
        assert!(registry.get("Text/CSV; charset=utf-8").is_some());
        assert!(registry.get("application/x-unknown").is_none());
    }

    #[test]
    fn test_clone_is_independent() {
        let original = ValidatorRegistry::minimal();
        let copy = original.clone();
        copy.clear();
        assert!(copy.is_empty());
        assert!(original.contains(mime::APPLICATION_ZIP));
    }

    #[test]
    fn test_clone_shares_instances() {
        let original = ValidatorRegistry::minimal();
        let copy = original.clone();
        let a = original.get(mime::APPLICATION_PDF).unwrap();
        let b = copy.get(mime::APPLICATION_PDF).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[rstest]
    #[case(ValidatorRegistry::minimal(), mime::APPLICATION_XML, true)]
    #[case(ValidatorRegistry::minimal(), mime::IMAGE_PNG, false)]
    #[case(ValidatorRegistry::images(), mime::IMAGE_SVG, true)]
    #[case(ValidatorRegistry::images(), mime::APPLICATION_PDF, false)]
    #[case(ValidatorRegistry::documents(), mime::DOCX, true)]
    #[case(ValidatorRegistry::documents(), mime::APPLICATION_ZIP, false)]
    #[case(ValidatorRegistry::media(), mime::AUDIO_WAV, true)]
    #[case(ValidatorRegistry::media(), mime::VIDEO_MKV, true)]
    #[case(ValidatorRegistry::archives(), mime::APPLICATION_TAR, true)]
    #[case(ValidatorRegistry::archives(), mime::DOCX, false)]
    fn test_presets(
        #[case] registry: ValidatorRegistry,
        #[case] mime_type: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(registry.contains(mime_type), expected);
    }

    #[test]
    fn test_defaults_cover_every_preset() {
        let all = ValidatorRegistry::with_defaults();
        for preset in ["minimal", "images", "documents", "media", "archives"] {
            let registry = ValidatorRegistry::preset(preset).unwrap();
            for mime_type in registry.mime_types() {
                assert!(all.contains(&mime_type), "{preset}: {mime_type}");
            }
        }
        assert!(ValidatorRegistry::preset("nonsense").is_none());
    }

    #[test]
    fn test_default_registry_is_shared() {
        let a = default_registry();
        let b = default_registry();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.contains(mime::APPLICATION_ZIP));
    }

    #[test]
    fn test_mime_types_sorted() {
        let types = ValidatorRegistry::archives().mime_types();
        let mut sorted = types.clone();
        sorted.sort();
        assert_eq!(types, sorted);
    }
}
