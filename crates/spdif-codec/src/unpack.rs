//! PCM sample unpacking
//!
//! Every source layout is brought to the same alignment: the sample's MSB on
//! bit 23, matching the 24-bit S/PDIF audio field. Word-length truncation is
//! left to [`SampleMask`], applied once by the frame encoder.

use spdif_core::ConfigError;

use crate::subframe::SAMPLE_FIELD_MASK;

/// Interleaved stereo PCM layouts accepted from the audio framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// 16-bit little endian
    S16Le,
    /// 20 significant bits in the 24-bit field of a 32-bit container
    S20Le,
    /// 24-bit field in the low three bytes of a 32-bit container
    S24Le,
    /// 20 significant bits, packed in 3 bytes
    S20Packed,
    /// 24-bit, packed in 3 bytes
    S24Packed,
    /// 32-bit little endian
    S32Le,
}

impl SampleFormat {
    pub const ALL: [SampleFormat; 6] = [
        SampleFormat::S16Le,
        SampleFormat::S20Le,
        SampleFormat::S24Le,
        SampleFormat::S20Packed,
        SampleFormat::S24Packed,
        SampleFormat::S32Le,
    ];

    /// Bytes per sample (one channel)
    pub fn sample_bytes(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
            SampleFormat::S20Packed | SampleFormat::S24Packed => 3,
            SampleFormat::S20Le | SampleFormat::S24Le | SampleFormat::S32Le => 4,
        }
    }

    /// Bytes per interleaved stereo frame
    pub fn frame_bytes(self) -> usize {
        2 * self.sample_bytes()
    }

    /// Significant bits of the format
    pub fn bit_depth(self) -> u32 {
        match self {
            SampleFormat::S16Le => 16,
            SampleFormat::S20Le | SampleFormat::S20Packed => 20,
            SampleFormat::S24Le | SampleFormat::S24Packed => 24,
            SampleFormat::S32Le => 32,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::S16Le => "S16_LE",
            SampleFormat::S20Le => "S20_LE",
            SampleFormat::S24Le => "S24_LE",
            SampleFormat::S20Packed => "S20_3LE",
            SampleFormat::S24Packed => "S24_3LE",
            SampleFormat::S32Le => "S32_LE",
        }
    }

    /// Pick a format for a container width, as WAV files describe it
    pub fn from_container(bits: u16) -> Result<Self, ConfigError> {
        match bits {
            16 => Ok(SampleFormat::S16Le),
            24 => Ok(SampleFormat::S24Packed),
            32 => Ok(SampleFormat::S32Le),
            other => Err(ConfigError::UnsupportedFormat(format!("{}-bit integer PCM", other))),
        }
    }

    /// Resolve the unpacker for this layout. Done once per stream setup.
    pub fn unpacker(self) -> Unpacker {
        match self {
            SampleFormat::S16Le => Unpacker::S16,
            SampleFormat::S20Le | SampleFormat::S24Le => Unpacker::S24InS32,
            SampleFormat::S20Packed | SampleFormat::S24Packed => Unpacker::S24Packed,
            SampleFormat::S32Le => Unpacker::S32,
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Container layout of a source stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unpacker {
    S16,
    S24InS32,
    S24Packed,
    S32,
}

impl Unpacker {
    /// Read one stereo pair from the start of `src`. `src` must hold a
    /// whole frame.
    #[inline]
    pub fn unpack(self, src: &[u8]) -> (i32, i32) {
        match self {
            Unpacker::S16 => unpack_s16(src),
            Unpacker::S24InS32 => unpack_s24_in_s32(src),
            Unpacker::S24Packed => unpack_s24_packed(src),
            Unpacker::S32 => unpack_s32(src),
        }
    }
}

#[inline]
pub fn unpack_s16(src: &[u8]) -> (i32, i32) {
    (
        i32::from(i16::from_le_bytes([src[0], src[1]])) << 8,
        i32::from(i16::from_le_bytes([src[2], src[3]])) << 8,
    )
}

#[inline]
pub fn unpack_s24_in_s32(src: &[u8]) -> (i32, i32) {
    (
        i32::from_le_bytes([src[0], src[1], src[2], src[3]]),
        i32::from_le_bytes([src[4], src[5], src[6], src[7]]),
    )
}

#[inline]
pub fn unpack_s24_packed(src: &[u8]) -> (i32, i32) {
    (
        i32::from_le_bytes([src[0], src[1], src[2], 0]),
        i32::from_le_bytes([src[3], src[4], src[5], 0]),
    )
}

#[inline]
pub fn unpack_s32(src: &[u8]) -> (i32, i32) {
    (
        i32::from_le_bytes([src[0], src[1], src[2], src[3]]) >> 8,
        i32::from_le_bytes([src[4], src[5], src[6], src[7]]) >> 8,
    )
}

/// Word-length truncation mask over the 24-bit audio field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleMask(u32);

impl SampleMask {
    pub const FULL: SampleMask = SampleMask(SAMPLE_FIELD_MASK);

    /// Keep the top `bits` bits of the field. Depths of 24 and above keep
    /// the whole field.
    pub fn for_depth(bits: u32) -> Self {
        if bits >= 24 {
            return Self::FULL;
        }
        Self((SAMPLE_FIELD_MASK << (24 - bits)) & SAMPLE_FIELD_MASK)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub fn apply(self, sample: i32) -> u32 {
        sample as u32 & self.0
    }
}

impl Default for SampleMask {
    fn default() -> Self {
        Self::FULL
    }
}
