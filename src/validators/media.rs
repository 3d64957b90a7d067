//! Audio and video container checks.
//!
//! Media validation is deliberately shallow: a declared-size ceiling per
//! format plus the container's leading marker. Nothing is demuxed.

use super::{ContentInput, ContentValidator, check_declared_size, read_error};
use crate::error::{Result, ValidationError};
use crate::mime;
use crate::mime::detector::read_prefix;
use serde::{Deserialize, Serialize};
use std::fmt;

const GIB: u64 = 1024 * 1024 * 1024;
const MIB: u64 = 1024 * 1024;

/// Bytes of header inspected.
const HEADER_LEN: usize = 32;

/// Box types that may open a QuickTime file lacking an `ftyp` box.
const QUICKTIME_LEAD_ATOMS: &[&[u8; 4]] = &[b"moov", b"mdat", b"wide", b"free", b"skip", b"pnot"];

const EBML_MAGIC: &[u8] = &[0x1A, 0x45, 0xDF, 0xA3];

/// Media formats with a dedicated validator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp4,
    Mp3,
    WebM,
    Wav,
    Ogg,
    Flac,
    Avi,
    Mov,
    Mkv,
    Aac,
}

impl MediaFormat {
    pub const ALL: [Self; 10] = [
        Self::Mp4,
        Self::Mp3,
        Self::WebM,
        Self::Wav,
        Self::Ogg,
        Self::Flac,
        Self::Avi,
        Self::Mov,
        Self::Mkv,
        Self::Aac,
    ];

    /// Default size ceiling for the format.
    #[must_use]
    pub const fn default_max_size(self) -> u64 {
        match self {
            Self::Mp4 | Self::Mov | Self::WebM | Self::Avi => 5 * GIB,
            Self::Mkv => 10 * GIB,
            Self::Wav | Self::Flac => 2 * GIB,
            Self::Ogg => GIB,
            Self::Mp3 | Self::Aac => 500 * MIB,
        }
    }

    /// MIME types, aliases included, served by this format.
    #[must_use]
    pub const fn mime_types(self) -> &'static [&'static str] {
        match self {
            Self::Mp4 => &[mime::VIDEO_MP4, mime::VIDEO_M4V, mime::AUDIO_MP4],
            Self::Mp3 => &[mime::AUDIO_MPEG, "audio/mp3", "audio/x-mpeg"],
            Self::WebM => &[mime::VIDEO_WEBM, "audio/webm"],
            Self::Wav => &[mime::AUDIO_WAV, "audio/x-wav", "audio/wave", "audio/vnd.wave"],
            Self::Ogg => &[mime::AUDIO_OGG, "video/ogg", "application/ogg"],
            Self::Flac => &[mime::AUDIO_FLAC, "audio/x-flac"],
            Self::Avi => &[mime::VIDEO_AVI, "video/avi"],
            Self::Mov => &[mime::VIDEO_QUICKTIME],
            Self::Mkv => &[mime::VIDEO_MKV, "audio/x-matroska"],
            Self::Aac => &[mime::AUDIO_AAC, "audio/x-aac", "audio/aacp"],
        }
    }

    /// True when `header` opens a file of this format.
    fn header_matches(self, header: &[u8]) -> bool {
        let at = |offset: usize, pattern: &[u8]| {
            header
                .get(offset..offset + pattern.len())
                .is_some_and(|w| w == pattern)
        };
        match self {
            Self::Mp4 => at(4, b"ftyp"),
            Self::Mov => {
                (at(4, b"ftyp") && at(8, b"qt  "))
                    || QUICKTIME_LEAD_ATOMS.iter().any(|atom| at(4, *atom))
            }
            Self::Mp3 => at(0, b"ID3") || is_mpeg_audio_frame(header),
            Self::Aac => at(0, b"ID3") || at(0, b"ADIF") || is_adts_frame(header),
            Self::Wav => at(0, b"RIFF") && at(8, b"WAVE"),
            Self::Avi => at(0, b"RIFF") && at(8, b"AVI "),
            Self::WebM | Self::Mkv => at(0, EBML_MAGIC),
            Self::Ogg => at(0, b"OggS"),
            Self::Flac => at(0, b"fLaC"),
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mp4 => "MP4",
            Self::Mp3 => "MP3",
            Self::WebM => "WebM",
            Self::Wav => "WAV",
            Self::Ogg => "Ogg",
            Self::Flac => "FLAC",
            Self::Avi => "AVI",
            Self::Mov => "QuickTime",
            Self::Mkv => "Matroska",
            Self::Aac => "AAC",
        };
        f.write_str(name)
    }
}

/// MPEG audio frame sync with a valid layer.
fn is_mpeg_audio_frame(header: &[u8]) -> bool {
    match header {
        [0xFF, b1, ..] => b1 & 0xE0 == 0xE0 && b1 & 0x06 != 0,
        _ => false,
    }
}

/// ADTS sync word (layer bits zero).
fn is_adts_frame(header: &[u8]) -> bool {
    match header {
        [0xFF, b1, ..] => b1 & 0xF6 == 0xF0,
        _ => false,
    }
}

#[derive(Debug, Clone)]
pub struct MediaValidator {
    pub format: MediaFormat,
    pub max_file_size: u64,
}

impl MediaValidator {
    #[must_use]
    pub const fn new(format: MediaFormat) -> Self {
        Self {
            format,
            max_file_size: format.default_max_size(),
        }
    }

    #[must_use]
    pub const fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    #[must_use]
    pub const fn mp4() -> Self {
        Self::new(MediaFormat::Mp4)
    }

    #[must_use]
    pub const fn mp3() -> Self {
        Self::new(MediaFormat::Mp3)
    }

    #[must_use]
    pub const fn webm() -> Self {
        Self::new(MediaFormat::WebM)
    }

    #[must_use]
    pub const fn wav() -> Self {
        Self::new(MediaFormat::Wav)
    }

    #[must_use]
    pub const fn ogg() -> Self {
        Self::new(MediaFormat::Ogg)
    }

    #[must_use]
    pub const fn flac() -> Self {
        Self::new(MediaFormat::Flac)
    }

    #[must_use]
    pub const fn avi() -> Self {
        Self::new(MediaFormat::Avi)
    }

    #[must_use]
    pub const fn mov() -> Self {
        Self::new(MediaFormat::Mov)
    }

    #[must_use]
    pub const fn mkv() -> Self {
        Self::new(MediaFormat::Mkv)
    }

    #[must_use]
    pub const fn aac() -> Self {
        Self::new(MediaFormat::Aac)
    }
}

impl ContentValidator for MediaValidator {
    fn validate(&self, input: ContentInput<'_>, declared_size: u64) -> Result<()> {
        let what = self.format.to_string();
        check_declared_size(declared_size, self.max_file_size, &what)?;

        let mut header = [0u8; HEADER_LEN];
        let mut reader = input.into_reader();
        let filled = read_prefix(&mut reader, &mut header).map_err(read_error)?;

        if !self.format.header_matches(&header[..filled]) {
            return Err(ValidationError::content(format!(
                "invalid {what} file: container header not recognised"
            )));
        }
        Ok(())
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        self.format.mime_types()
    }

    fn name(&self) -> &'static str {
        "media"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    const WAV: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt \x10\x00\x00\x00";
    const AVI: &[u8] = b"RIFF\x24\x00\x00\x00AVI LIST\x00\x00\x00\x00";

    fn validate(validator: &MediaValidator, data: &[u8]) -> Result<()> {
        let mut cursor = Cursor::new(data);
        validator.validate(ContentInput::seekable(&mut cursor), data.len() as u64)
    }

    #[rstest]
    #[case(MediaValidator::wav(), WAV)]
    #[case(MediaValidator::avi(), AVI)]
    #[case(MediaValidator::mp4(), b"\x00\x00\x00\x18ftypisom\x00\x00\x02\x00")]
    #[case(MediaValidator::mov(), b"\x00\x00\x00\x14ftypqt  \x00\x00\x00\x00")]
    #[case(MediaValidator::mov(), b"\x00\x00\x00\x08wide\x00\x00\x00\x00mdat")]
    #[case(MediaValidator::mp3(), b"ID3\x04\x00\x00\x00\x00\x00\x00")]
    #[case(MediaValidator::mp3(), b"\xFF\xFB\x90\x64\x00\x00")]
    #[case(MediaValidator::aac(), b"\xFF\xF1\x50\x80\x00\x1F\xFC")]
    #[case(MediaValidator::webm(), b"\x1A\x45\xDF\xA3\x9F\x42\x86\x81\x01")]
    #[case(MediaValidator::mkv(), b"\x1A\x45\xDF\xA3\x9F\x42\x86\x81\x01")]
    #[case(MediaValidator::ogg(), b"OggS\x00\x02\x00\x00")]
    #[case(MediaValidator::flac(), b"fLaC\x00\x00\x00\x22")]
    fn test_accepts_matching_header(#[case] validator: MediaValidator, #[case] data: &[u8]) {
        assert!(validate(&validator, data).is_ok(), "{}", validator.format);
    }

    #[test]
    fn test_riff_forms_are_not_interchangeable() {
        assert!(validate(&MediaValidator::wav(), AVI).is_err());
        assert!(validate(&MediaValidator::avi(), WAV).is_err());
    }

    #[test]
    fn test_aac_rejects_mp3_frames() {
        assert!(validate(&MediaValidator::aac(), b"\xFF\xFB\x90\x64").is_err());
        assert!(validate(&MediaValidator::mp3(), b"\xFF\xF1\x50\x80").is_err());
    }

    #[test]
    fn test_size_ceilings() {
        assert_eq!(MediaFormat::Mkv.default_max_size(), 10 * GIB);
        assert_eq!(MediaFormat::Mp3.default_max_size(), 500 * MIB);

        let mut cursor = Cursor::new(WAV);
        let err = MediaValidator::wav()
            .validate(ContentInput::seekable(&mut cursor), 2 * GIB + 1)
            .unwrap_err();
        assert!(err.message().contains("exceeds maximum"));
    }

    #[test]
    fn test_mime_aliases() {
        assert!(MediaFormat::Wav.mime_types().contains(&"audio/x-wav"));
        assert!(MediaFormat::Mp4.mime_types().contains(&mime::VIDEO_MP4));
        for format in MediaFormat::ALL {
            assert!(!format.mime_types().is_empty());
        }
    }
}
