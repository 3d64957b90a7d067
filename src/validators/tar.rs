//! TAR and gzip validation.
//!
//! Unlike ZIP there is no central directory, so the stream is walked once
//! from the front. A gzip wrapper is inflated on the fly through two meters:
//! one counting compressed input, one counting inflated output. Either meter
//! trips as soon as a bound is crossed, so a bomb is abandoned after a bounded
//! amount of work rather than inflated to completion.
//!
//! A gzip payload that does not contain a tar stream is still metered and
//! accepted on its own.

use super::{
    ContentInput, ContentValidator, check_declared_size, check_entry_path, read_error,
};
use crate::error::{Result, ValidationError};
use crate::mime;
use crate::mime::detector::read_prefix;
use crate::utils::human_format::{format_bytes, format_ratio};
use flate2::read::GzDecoder;
use std::cell::{Cell, RefCell};
use std::io::{self, Read};
use std::rc::Rc;
use tracing::debug;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 10_000;
pub const DEFAULT_MAX_UNCOMPRESSED_SIZE: u64 = 10 * 1024 * 1024 * 1024;
pub const DEFAULT_MAX_COMPRESSION_RATIO: f64 = 100.0;

/// Inflated output below this size is never judged by ratio; tiny streams
/// legitimately compress far beyond any sane ratio.
const RATIO_CHECK_FLOOR: u64 = 1024 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const BLOCK_SIZE: usize = 512;

const SUPPORTED: &[&str] = &[
    mime::APPLICATION_TAR,
    mime::APPLICATION_GZIP,
    mime::APPLICATION_X_GZIP,
    mime::APPLICATION_TAR_GZ,
];

#[derive(Debug, Clone)]
pub struct TarValidator {
    /// Ceiling on compressed (on-the-wire) bytes
    pub max_file_size: u64,
    pub max_files: usize,
    pub max_uncompressed_size: u64,
    pub max_compression_ratio: f64,
    pub allow_symlinks: bool,
    pub allow_hardlinks: bool,
}

impl Default for TarValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl TarValidator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
            max_uncompressed_size: DEFAULT_MAX_UNCOMPRESSED_SIZE,
            max_compression_ratio: DEFAULT_MAX_COMPRESSION_RATIO,
            allow_symlinks: false,
            allow_hardlinks: false,
        }
    }

    #[must_use]
    pub const fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    #[must_use]
    pub const fn with_max_uncompressed_size(mut self, bytes: u64) -> Self {
        self.max_uncompressed_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_max_compression_ratio(mut self, ratio: f64) -> Self {
        self.max_compression_ratio = ratio;
        self
    }

    #[must_use]
    pub const fn allow_symlinks(mut self, allow: bool) -> Self {
        self.allow_symlinks = allow;
        self
    }

    #[must_use]
    pub const fn allow_hardlinks(mut self, allow: bool) -> Self {
        self.allow_hardlinks = allow;
        self
    }

    fn validate_gzip<R: Read>(&self, compressed: R, meters: &Rc<Meters>) -> Result<()> {
        let mut inflated = OutputMeter {
            inner: GzDecoder::new(compressed),
            max_output: self.max_uncompressed_size,
            max_ratio: self.max_compression_ratio,
            meters: Rc::clone(meters),
        };

        let mut block = [0u8; BLOCK_SIZE];
        let filled = read_prefix(&mut inflated, &mut block)
            .map_err(|e| meters.explain(e, "invalid gzip stream"))?;

        if filled == BLOCK_SIZE && is_tar_header(&block) {
            debug!("gzip payload carries a tar stream");
            return self.walk((&block[..]).chain(inflated), meters);
        }

        io::copy(&mut inflated, &mut io::sink())
            .map_err(|e| meters.explain(e, "invalid gzip stream"))?;
        debug!(
            compressed = meters.input.get(),
            inflated = meters.output.get(),
            "gzip payload accepted"
        );
        Ok(())
    }

    fn walk<R: Read>(&self, reader: R, meters: &Meters) -> Result<()> {
        let mut archive = tar::Archive::new(reader);
        let entries = archive
            .entries()
            .map_err(|e| meters.explain(e, "invalid tar archive"))?;

        let mut count = 0usize;
        let mut total = 0u64;
        for entry in entries {
            let mut entry = entry.map_err(|e| meters.explain(e, "invalid tar archive"))?;

            count += 1;
            if count > self.max_files {
                return Err(ValidationError::content(format!(
                    "archive contains more than {} files",
                    self.max_files
                )));
            }

            let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            check_entry_path(&path)?;

            let kind = entry.header().entry_type();
            if kind.is_symlink() || kind.is_hard_link() {
                let (allowed, label) = if kind.is_symlink() {
                    (self.allow_symlinks, "symbolic link")
                } else {
                    (self.allow_hardlinks, "hard link")
                };
                if !allowed {
                    return Err(ValidationError::content(format!(
                        "archive entry {path:?} is a {label}, which is not allowed"
                    )));
                }
                if let Some(target) = entry.link_name_bytes() {
                    check_entry_path(&String::from_utf8_lossy(&target))?;
                }
            }

            let size = entry
                .header()
                .size()
                .map_err(|e| meters.explain(e, "invalid tar header"))?;
            total = total.saturating_add(size);
            if total > self.max_uncompressed_size {
                return Err(ValidationError::content(format!(
                    "total uncompressed size exceeds maximum of {}",
                    format_bytes(self.max_uncompressed_size)
                )));
            }

            io::copy(&mut entry, &mut io::sink())
                .map_err(|e| meters.explain(e, "invalid tar archive"))?;
        }

        debug!(entries = count, uncompressed = total, "tar archive accepted");
        Ok(())
    }
}

impl ContentValidator for TarValidator {
    fn validate(&self, input: ContentInput<'_>, declared_size: u64) -> Result<()> {
        check_declared_size(declared_size, self.max_file_size, "archive")?;

        let meters = Rc::new(Meters::default());
        let mut compressed = InputMeter {
            inner: input.into_reader(),
            limit: self.max_file_size,
            meters: Rc::clone(&meters),
        };

        let mut block = [0u8; BLOCK_SIZE];
        let filled = read_prefix(&mut compressed, &mut block)
            .map_err(|e| meters.explain(e, "failed to read archive"))?;
        if filled == 0 {
            return Err(ValidationError::content("archive is empty"));
        }
        let head = &block[..filled];

        if head.starts_with(&GZIP_MAGIC) {
            return self.validate_gzip(head.chain(compressed), &meters);
        }

        if filled < BLOCK_SIZE {
            return Err(ValidationError::content(
                "invalid tar archive: truncated header block",
            ));
        }
        self.walk(head.chain(compressed), &meters)
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    fn name(&self) -> &'static str {
        "tar"
    }
}

/// A ustar magic, or a stored checksum matching the block (old V7 headers
/// carry no magic at all).
fn is_tar_header(block: &[u8; BLOCK_SIZE]) -> bool {
    if &block[257..262] == b"ustar" {
        return true;
    }
    let Ok(stored) = tar::Header::from_byte_slice(block).cksum() else {
        return false;
    };
    let computed: u32 = block
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { u32::from(b' ') } else { u32::from(b) })
        .sum();
    stored == computed
}

/// Byte counters shared between the meters, plus the first bound violated.
#[derive(Debug, Default)]
struct Meters {
    input: Cell<u64>,
    output: Cell<u64>,
    violation: RefCell<Option<String>>,
}

impl Meters {
    fn trip(&self, message: String) -> io::Error {
        let err = io::Error::other(message.clone());
        self.violation.borrow_mut().get_or_insert(message);
        err
    }

    /// Map a read error to a validation error, preferring a recorded bound
    /// violation over whatever the decoder made of it.
    fn explain(&self, err: io::Error, context: &str) -> ValidationError {
        match self.violation.borrow().as_ref() {
            Some(violation) => ValidationError::content(violation.clone()),
            None if err.kind() == io::ErrorKind::UnexpectedEof => {
                ValidationError::content(format!("{context}: unexpected end of data"))
            }
            None => match err.kind() {
                io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::Other => {
                    ValidationError::content(format!("{context}: {err}"))
                }
                _ => read_error(err),
            },
        }
    }
}

struct InputMeter<R> {
    inner: R,
    /// 0 disables
    limit: u64,
    meters: Rc<Meters>,
}

impl<R: Read> Read for InputMeter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        let total = self.meters.input.get() + n as u64;
        self.meters.input.set(total);
        if self.limit > 0 && total > self.limit {
            return Err(self.meters.trip(format!(
                "archive exceeds maximum size of {}",
                format_bytes(self.limit)
            )));
        }
        Ok(n)
    }
}

struct OutputMeter<R> {
    inner: R,
    max_output: u64,
    max_ratio: f64,
    meters: Rc<Meters>,
}

impl<R: Read> Read for OutputMeter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        let output = self.meters.output.get() + n as u64;
        self.meters.output.set(output);

        if output > self.max_output {
            return Err(self.meters.trip(format!(
                "uncompressed size exceeds maximum of {}",
                format_bytes(self.max_output)
            )));
        }

        if output > RATIO_CHECK_FLOOR {
            let input = self.meters.input.get();
            #[allow(clippy::cast_precision_loss)]
            let ratio = if input == 0 {
                f64::INFINITY
            } else {
                output as f64 / input as f64
            };
            if ratio > self.max_ratio {
                return Err(self.meters.trip(format!(
                    "compression ratio {} exceeds maximum {}",
                    format_ratio(ratio),
                    format_ratio(self.max_ratio)
                )));
            }
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::{Cursor, Write};

    fn build_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn validate(validator: &TarValidator, data: &[u8]) -> Result<()> {
        let mut cursor = Cursor::new(data);
        validator.validate(ContentInput::seekable(&mut cursor), data.len() as u64)
    }

    #[test]
    fn test_accepts_plain_and_gzipped_tar() {
        let tar = build_tar(&[("a.txt", b"alpha"), ("dir/b.txt", b"beta")]);
        assert!(validate(&TarValidator::new(), &tar).is_ok());
        assert!(validate(&TarValidator::new(), &gzip(&tar)).is_ok());
    }

    #[test]
    fn test_accepts_gzip_without_tar() {
        let data = gzip(b"just some compressed text\n");
        assert!(validate(&TarValidator::new(), &data).is_ok());
    }

    #[test]
    fn test_rejects_gzip_bomb() {
        let data = gzip(&vec![0u8; 10 * 1024 * 1024]);
        let err = validate(&TarValidator::new(), &data).unwrap_err();
        assert!(err.message().contains("compression ratio"), "{err}");
    }

    #[test]
    fn test_rejects_tar_gz_bomb() {
        let tar = build_tar(&[("zeros.bin", &vec![0u8; 10 * 1024 * 1024])]);
        let err = validate(&TarValidator::new(), &gzip(&tar)).unwrap_err();
        assert!(err.message().contains("compression ratio"), "{err}");
    }

    #[test]
    fn test_uncompressed_ceiling() {
        let tar = build_tar(&[("a.bin", &[7u8; 4096]), ("b.bin", &[7u8; 4096])]);
        let validator = TarValidator::new().with_max_uncompressed_size(6000);
        let err = validate(&validator, &tar).unwrap_err();
        assert!(err.message().contains("uncompressed size"), "{err}");
    }

    #[test]
    fn test_file_count_limit() {
        let tar = build_tar(&[("1", b"1"), ("2", b"2"), ("3", b"3")]);
        assert!(validate(&TarValidator::new().with_max_files(3), &tar).is_ok());
        let err = validate(&TarValidator::new().with_max_files(2), &tar).unwrap_err();
        assert!(err.message().contains("more than 2 files"));
    }

    #[test]
    fn test_link_policy() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_link_name("target.txt").unwrap();
        builder
            .append_data(&mut header, "link", io::empty())
            .unwrap();
        let tar = builder.into_inner().unwrap();

        let err = validate(&TarValidator::new(), &tar).unwrap_err();
        assert!(err.message().contains("symbolic link"));
        assert!(validate(&TarValidator::new().allow_symlinks(true), &tar).is_ok());
    }

    /// Old-format (V7) archive: no ustar magic in the header.
    fn build_v7_tar(name: &[u8], kind: tar::EntryType, link: &[u8], data: &[u8]) -> Vec<u8> {
        let mut header = tar::Header::new_old();
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.as_old_mut().linkname[..link.len()].copy_from_slice(link);
        header.set_entry_type(kind);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();

        let mut builder = tar::Builder::new(Vec::new());
        builder.append(&header, data).unwrap();
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_rejects_traversal_entry() {
        let tar = build_v7_tar(b"../../etc/passwd", tar::EntryType::Regular, b"", b"root");

        let err = validate(&TarValidator::new(), &tar).unwrap_err();
        assert!(err.message().contains("path traversal"), "{err}");
    }

    #[test]
    fn test_gzipped_v7_tar_is_walked() {
        let tar = build_v7_tar(b"../../etc/passwd", tar::EntryType::Regular, b"", b"root");
        let err = validate(&TarValidator::new(), &gzip(&tar)).unwrap_err();
        assert!(err.message().contains("path traversal"), "{err}");

        let tar = build_v7_tar(b"shadow", tar::EntryType::Symlink, b"/etc/shadow", b"");
        let err = validate(&TarValidator::new(), &gzip(&tar)).unwrap_err();
        assert!(err.message().contains("symbolic link"), "{err}");

        let tar = build_v7_tar(b"notes.txt", tar::EntryType::Regular, b"", b"hello");
        assert!(validate(&TarValidator::new(), &gzip(&tar)).is_ok());
    }

    #[test]
    fn test_rejects_garbage_and_empty() {
        let err = validate(&TarValidator::new(), &[0x55; 1024]).unwrap_err();
        assert!(err.message().contains("invalid tar archive"), "{err}");

        let err = validate(&TarValidator::new(), b"").unwrap_err();
        assert!(err.message().contains("empty"));

        let err = validate(&TarValidator::new(), b"short").unwrap_err();
        assert!(err.message().contains("truncated"));
    }

    #[test]
    fn test_streams_without_seeking() {
        let tar = gzip(&build_tar(&[("a.txt", b"alpha")]));
        let mut stream = &tar[..];
        let result =
            TarValidator::new().validate(ContentInput::stream(&mut stream), tar.len() as u64);
        assert!(result.is_ok());
    }

    #[test]
    fn test_declared_size_ceiling() {
        let mut stream: &[u8] = b"";
        let err = TarValidator::new()
            .with_max_file_size(100)
            .validate(ContentInput::stream(&mut stream), 101)
            .unwrap_err();
        assert!(err.message().contains("exceeds maximum"));
    }
}
