//! Content-based validation of untrusted file uploads.
//!
//! An upload is judged by what it contains, not by what the client claims:
//! the file name and declared size are checked first, then the content type
//! is sniffed from its leading bytes, and finally a format-specific validator
//! walks the structure under fixed resource limits (archive bombs, XML entity
//! expansion, runaway nesting, oversized images).
//!
//! ```no_run
//! use upload_guard::{Constraints, UploadValidator};
//!
//! let validator = UploadValidator::new(
//!     Constraints::builder()
//!         .max_size(10 * 1024 * 1024)
//!         .accept("image/*")
//!         .accept("application/pdf")
//!         .block_extensions(["exe", "bat"])
//!         .build(),
//! );
//! validator.validate_path("upload.pdf")?;
//! # Ok::<(), upload_guard::ValidationError>(())
//! ```

pub mod config;
pub mod constraints;
pub mod error;
pub mod mime;
pub mod pipeline;
pub mod registry;
pub mod result;
pub mod utils;
pub mod validators;

pub use config::GuardConfig;
pub use constraints::{Constraints, ConstraintsBuilder};
pub use error::{ErrorKind, Result, ValidationError};
pub use pipeline::{FileUpload, MemoryUpload, UploadHeader, UploadValidator};
pub use registry::{ValidatorRegistry, default_registry};
pub use result::{CheckOutcome, ValidationResult};
pub use validators::{ContentInput, ContentValidator, ReadSeek};
