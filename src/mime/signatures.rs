//! Magic signature table.
//!
//! Ordered most-specific-first; the first entry whose pattern matches wins.
//! Container formats (RIFF, ZIP, ISO-BMFF, EBML) are listed at their container
//! level and disambiguated afterwards by the detector's refinement step.

use super::*;

/// A fixed byte pattern expected at a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicSignature {
    pub mime: &'static str,
    pub offset: usize,
    pub pattern: &'static [u8],
    /// Byte range that must be all zero for the match to hold.
    pub zeroed: Option<(usize, usize)>,
}

impl MagicSignature {
    const fn new(mime: &'static str, offset: usize, pattern: &'static [u8]) -> Self {
        Self {
            mime,
            offset,
            pattern,
            zeroed: None,
        }
    }

    const fn with_zeroed(mut self, start: usize, end: usize) -> Self {
        self.zeroed = Some((start, end));
        self
    }

    /// True when `data[offset..offset + pattern.len()] == pattern` and the
    /// reserved range, if any, is zero.
    #[must_use]
    pub fn matches(&self, data: &[u8]) -> bool {
        let pattern_ok = data
            .get(self.offset..self.offset + self.pattern.len())
            .is_some_and(|window| window == self.pattern);
        if !pattern_ok {
            return false;
        }
        match self.zeroed {
            Some((start, end)) => data
                .get(start..end)
                .is_some_and(|reserved| reserved.iter().all(|&b| b == 0)),
            None => true,
        }
    }
}

/// Built-in signature table.
pub static SIGNATURES: &[MagicSignature] = &[
    // Images
    MagicSignature::new(IMAGE_PNG, 0, &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
    MagicSignature::new(IMAGE_JPEG, 0, &[0xFF, 0xD8, 0xFF]),
    MagicSignature::new(IMAGE_GIF, 0, b"GIF87a"),
    MagicSignature::new(IMAGE_GIF, 0, b"GIF89a"),
    MagicSignature::new(IMAGE_TIFF, 0, b"II*\x00"),
    MagicSignature::new(IMAGE_TIFF, 0, b"MM\x00*"),
    MagicSignature::new(IMAGE_PSD, 0, b"8BPS"),
    // Documents
    MagicSignature::new(APPLICATION_PDF, 0, b"%PDF-"),
    MagicSignature::new(APPLICATION_POSTSCRIPT, 0, b"%!PS"),
    MagicSignature::new(APPLICATION_RTF, 0, b"{\\rtf"),
    MagicSignature::new(
        APPLICATION_OLE,
        0,
        &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1],
    ),
    MagicSignature::new(APPLICATION_XML, 0, b"<?xml"),
    MagicSignature::new(APPLICATION_XML, 0, b"\xEF\xBB\xBF<?xml"),
    // Archives and compression
    MagicSignature::new(APPLICATION_ZIP, 0, b"PK\x03\x04"),
    MagicSignature::new(APPLICATION_ZIP, 0, b"PK\x05\x06"),
    MagicSignature::new(APPLICATION_ZIP, 0, b"PK\x07\x08"),
    MagicSignature::new(APPLICATION_7Z, 0, &[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C]),
    MagicSignature::new(APPLICATION_RAR, 0, b"Rar!\x1A\x07"),
    MagicSignature::new(APPLICATION_XZ, 0, &[0xFD, b'7', b'z', b'X', b'Z', 0x00]),
    MagicSignature::new(APPLICATION_ZSTD, 0, &[0x28, 0xB5, 0x2F, 0xFD]),
    MagicSignature::new(APPLICATION_GZIP, 0, &[0x1F, 0x8B]),
    MagicSignature::new(APPLICATION_BZIP2, 0, b"BZh"),
    MagicSignature::new(APPLICATION_TAR, 257, b"ustar"),
    // Executables and databases
    MagicSignature::new(APPLICATION_ELF, 0, b"\x7FELF"),
    MagicSignature::new(APPLICATION_WASM, 0, b"\x00asm"),
    MagicSignature::new(APPLICATION_MACHO, 0, &[0xCF, 0xFA, 0xED, 0xFE]),
    MagicSignature::new(APPLICATION_MACHO, 0, &[0xCE, 0xFA, 0xED, 0xFE]),
    MagicSignature::new(APPLICATION_MACHO, 0, &[0xCA, 0xFE, 0xBA, 0xBE]),
    MagicSignature::new(APPLICATION_SQLITE, 0, b"SQLite format 3\x00"),
    MagicSignature::new(APPLICATION_PE, 0, b"MZ"),
    // Fonts
    MagicSignature::new(FONT_WOFF, 0, b"wOFF"),
    MagicSignature::new(FONT_WOFF2, 0, b"wOF2"),
    MagicSignature::new(FONT_OTF, 0, b"OTTO"),
    // Containers refined by the detector
    MagicSignature::new(APPLICATION_RIFF, 0, b"RIFF"),
    MagicSignature::new(VIDEO_MP4, 4, b"ftyp"),
    MagicSignature::new(VIDEO_QUICKTIME, 4, b"moov"),
    MagicSignature::new(VIDEO_WEBM, 0, &[0x1A, 0x45, 0xDF, 0xA3]),
    // Audio
    MagicSignature::new(AUDIO_OGG, 0, b"OggS"),
    MagicSignature::new(AUDIO_FLAC, 0, b"fLaC"),
    MagicSignature::new(AUDIO_MIDI, 0, b"MThd"),
    MagicSignature::new(AUDIO_AAC, 0, b"ADIF"),
    MagicSignature::new(AUDIO_MPEG, 0, b"ID3"),
    MagicSignature::new(AUDIO_AAC, 0, &[0xFF, 0xF1]),
    MagicSignature::new(AUDIO_AAC, 0, &[0xFF, 0xF9]),
    MagicSignature::new(AUDIO_MPEG, 0, &[0xFF, 0xFB]),
    MagicSignature::new(AUDIO_MPEG, 0, &[0xFF, 0xF3]),
    MagicSignature::new(AUDIO_MPEG, 0, &[0xFF, 0xF2]),
    // Weak signatures last; an ISO-BMFF box of 256 bytes also starts 00 00 01 00
    MagicSignature::new(IMAGE_ICO, 0, &[0x00, 0x00, 0x01, 0x00]),
    // BITMAPFILEHEADER reserved fields
    MagicSignature::new(IMAGE_BMP, 0, b"BM").with_zeroed(6, 10),
];

/// First signature matching `data`, if any.
#[must_use]
pub fn find(data: &[u8]) -> Option<&'static MagicSignature> {
    SIGNATURES.iter().find(|sig| sig.matches(data))
}
