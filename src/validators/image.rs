//! Image validation.
//!
//! Raster formats are checked by decoding only the header through the `image`
//! crate, which yields the dimensions without allocating the pixel buffer.
//! SVG is markup, so it is bounded in size and handed to the XML validator
//! with DTDs forbidden.

use super::xml::XmlValidator;
use super::{
    ContentInput, ContentValidator, NON_SEEKABLE_BUFFER_LIMIT, ReadSeek, check_declared_size,
    contains_ignore_case, read_bounded, read_error, with_seekable,
};
use crate::error::{Result, ValidationError};
use crate::mime;
use crate::mime::detector::read_prefix;
use image::ImageReader;
use std::io::{BufReader, Cursor, SeekFrom};
use tracing::debug;

pub const DEFAULT_MAX_WIDTH: u32 = 16_384;
pub const DEFAULT_MAX_HEIGHT: u32 = 16_384;
pub const DEFAULT_MAX_PIXELS: u64 = 100_000_000;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_SVG_SIZE: u64 = 5 * 1024 * 1024;

const SUPPORTED: &[&str] = &[
    mime::IMAGE_PNG,
    mime::IMAGE_JPEG,
    mime::IMAGE_GIF,
    mime::IMAGE_WEBP,
    mime::IMAGE_BMP,
    mime::IMAGE_TIFF,
    mime::IMAGE_ICO,
    mime::IMAGE_SVG,
];

#[derive(Debug, Clone)]
pub struct ImageValidator {
    pub max_width: u32,
    pub max_height: u32,
    /// Ceiling on width × height
    pub max_pixels: u64,
    pub max_file_size: u64,
    pub max_svg_size: u64,
}

impl Default for ImageValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageValidator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            max_pixels: DEFAULT_MAX_PIXELS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_svg_size: DEFAULT_MAX_SVG_SIZE,
        }
    }

    #[must_use]
    pub const fn with_max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    #[must_use]
    pub const fn with_max_pixels(mut self, pixels: u64) -> Self {
        self.max_pixels = pixels;
        self
    }

    #[must_use]
    pub const fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_max_svg_size(mut self, bytes: u64) -> Self {
        self.max_svg_size = bytes;
        self
    }

    fn validate_raster(&self, reader: &mut dyn ReadSeek) -> Result<()> {
        let (width, height) = ImageReader::new(BufReader::new(reader))
            .with_guessed_format()
            .map_err(read_error)?
            .into_dimensions()
            .map_err(|e| ValidationError::content(format!("invalid image: {e}")))?;

        if width > self.max_width || height > self.max_height {
            return Err(ValidationError::content(format!(
                "image dimensions {width}x{height} exceed maximum of {}x{}",
                self.max_width, self.max_height
            )));
        }

        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.max_pixels {
            return Err(ValidationError::content(format!(
                "image has {pixels} pixels, maximum is {}",
                self.max_pixels
            )));
        }

        debug!(width, height, "image header accepted");
        Ok(())
    }

    fn validate_svg(&self, reader: &mut dyn ReadSeek) -> Result<()> {
        let markup = read_bounded(reader, self.max_svg_size, "SVG image")?;
        if !contains_ignore_case(&markup, b"<svg") {
            return Err(ValidationError::content("invalid SVG: no <svg> element"));
        }
        let len = markup.len() as u64;
        XmlValidator::new()
            .with_max_size(self.max_svg_size)
            .validate(ContentInput::seekable(&mut Cursor::new(markup)), len)
    }
}

impl ContentValidator for ImageValidator {
    fn validate(&self, input: ContentInput<'_>, declared_size: u64) -> Result<()> {
        check_declared_size(declared_size, self.max_file_size, "image")?;

        with_seekable(input, declared_size, NON_SEEKABLE_BUFFER_LIMIT, "image", |reader| {
            let mut head = [0u8; 16];
            let filled = read_prefix(reader, &mut head).map_err(read_error)?;
            reader.seek(SeekFrom::Start(0)).map_err(read_error)?;

            if looks_like_markup(&head[..filled]) {
                self.validate_svg(reader)
            } else {
                self.validate_raster(reader)
            }
        })
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        SUPPORTED
    }

    fn name(&self) -> &'static str {
        "image"
    }
}

fn looks_like_markup(head: &[u8]) -> bool {
    let head = head.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(head);
    head.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'<')
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbImage::new(width, height)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn validate(validator: &ImageValidator, data: &[u8]) -> Result<()> {
        let mut cursor = Cursor::new(data);
        validator.validate(ContentInput::seekable(&mut cursor), data.len() as u64)
    }

    #[test]
    fn test_accepts_small_png() {
        assert!(validate(&ImageValidator::new(), &png(4, 4)).is_ok());
    }

    #[test]
    fn test_dimension_limits() {
        let data = png(16, 4);
        let err = validate(&ImageValidator::new().with_max_dimensions(8, 8), &data).unwrap_err();
        assert!(err.message().contains("16x4"));

        let err = validate(&ImageValidator::new().with_max_pixels(32), &data).unwrap_err();
        assert!(err.message().contains("64 pixels"));
    }

    #[test]
    fn test_rejects_truncated_png() {
        let data = png(4, 4);
        let err = validate(&ImageValidator::new(), &data[..12]).unwrap_err();
        assert!(err.message().contains("invalid image"));
    }

    #[test]
    fn test_svg() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect/></svg>"#;
        assert!(validate(&ImageValidator::new(), svg).is_ok());

        let xxe = br#"<?xml version="1.0"?><!DOCTYPE svg [<!ENTITY x SYSTEM "file:///etc/passwd">]><svg>&x;</svg>"#;
        assert!(validate(&ImageValidator::new(), xxe).is_err());

        let not_svg = b"<html><body></body></html>";
        assert!(validate(&ImageValidator::new(), not_svg).is_err());
    }

    #[test]
    fn test_svg_size_limit() {
        let mut svg = b"<svg>".to_vec();
        svg.extend(std::iter::repeat_n(b' ', 200));
        svg.extend_from_slice(b"</svg>");
        let err = validate(&ImageValidator::new().with_max_svg_size(100), &svg).unwrap_err();
        assert!(err.message().contains("exceeds maximum size"));
    }
}
