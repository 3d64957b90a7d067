//! MIME type constants, magic-byte detection and extension mapping.
//!
//! Detection never trusts the filename: [`detector::detect`] looks only at a
//! bounded content prefix. [`extensions`] maps filenames onto the type they
//! claim to be, which the pipeline compares against the detected type in
//! strict mode.

pub mod detector;
pub mod extensions;
pub mod signatures;

pub use detector::{DETECTION_WINDOW, detect, detect_reader};
pub use extensions::{expand_group, extension_of, mime_for_extension, mime_matches};

// Fallbacks
pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain";

// Images
pub const IMAGE_JPEG: &str = "image/jpeg";
pub const IMAGE_PNG: &str = "image/png";
pub const IMAGE_GIF: &str = "image/gif";
pub const IMAGE_WEBP: &str = "image/webp";
pub const IMAGE_BMP: &str = "image/bmp";
pub const IMAGE_TIFF: &str = "image/tiff";
pub const IMAGE_ICO: &str = "image/x-icon";
pub const IMAGE_SVG: &str = "image/svg+xml";
pub const IMAGE_AVIF: &str = "image/avif";
pub const IMAGE_HEIC: &str = "image/heic";
pub const IMAGE_PSD: &str = "image/vnd.adobe.photoshop";

// Documents
pub const APPLICATION_PDF: &str = "application/pdf";
pub const APPLICATION_RTF: &str = "application/rtf";
pub const APPLICATION_POSTSCRIPT: &str = "application/postscript";
pub const APPLICATION_OLE: &str = "application/x-ole-storage";
pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const PPTX: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const EPUB: &str = "application/epub+zip";
pub const ODT: &str = "application/vnd.oasis.opendocument.text";
pub const ODS: &str = "application/vnd.oasis.opendocument.spreadsheet";
pub const ODP: &str = "application/vnd.oasis.opendocument.presentation";

// Text formats
pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml";
pub const TEXT_XML: &str = "text/xml";
pub const TEXT_CSV: &str = "text/csv";
pub const TEXT_HTML: &str = "text/html";
pub const TEXT_MARKDOWN: &str = "text/markdown";

// Archives
pub const APPLICATION_ZIP: &str = "application/zip";
pub const APPLICATION_JAR: &str = "application/java-archive";
pub const APPLICATION_WAR: &str = "application/x-webarchive";
pub const APPLICATION_GZIP: &str = "application/gzip";
pub const APPLICATION_X_GZIP: &str = "application/x-gzip";
pub const APPLICATION_TAR: &str = "application/x-tar";
pub const APPLICATION_TAR_GZ: &str = "application/x-compressed-tar";
pub const APPLICATION_BZIP2: &str = "application/x-bzip2";
pub const APPLICATION_XZ: &str = "application/x-xz";
pub const APPLICATION_7Z: &str = "application/x-7z-compressed";
pub const APPLICATION_RAR: &str = "application/vnd.rar";
pub const APPLICATION_ZSTD: &str = "application/zstd";

// Executables and binaries
pub const APPLICATION_PE: &str = "application/vnd.microsoft.portable-executable";
pub const APPLICATION_ELF: &str = "application/x-elf";
pub const APPLICATION_MACHO: &str = "application/x-mach-binary";
pub const APPLICATION_WASM: &str = "application/wasm";
pub const APPLICATION_SQLITE: &str = "application/vnd.sqlite3";
pub const APPLICATION_RIFF: &str = "application/x-riff";

// Fonts
pub const FONT_WOFF: &str = "font/woff";
pub const FONT_WOFF2: &str = "font/woff2";
pub const FONT_OTF: &str = "font/otf";

// Audio
pub const AUDIO_MPEG: &str = "audio/mpeg";
pub const AUDIO_WAV: &str = "audio/wav";
pub const AUDIO_OGG: &str = "audio/ogg";
pub const AUDIO_FLAC: &str = "audio/flac";
pub const AUDIO_AAC: &str = "audio/aac";
pub const AUDIO_MP4: &str = "audio/mp4";
pub const AUDIO_MIDI: &str = "audio/midi";

// Video
pub const VIDEO_MP4: &str = "video/mp4";
pub const VIDEO_M4V: &str = "video/x-m4v";
pub const VIDEO_QUICKTIME: &str = "video/quicktime";
pub const VIDEO_3GPP: &str = "video/3gpp";
pub const VIDEO_WEBM: &str = "video/webm";
pub const VIDEO_MKV: &str = "video/x-matroska";
pub const VIDEO_AVI: &str = "video/x-msvideo";
