//! Consumer channel status (IEC 60958-3)
//!
//! The channel-status block is 192 bits, sent one bit per frame starting with
//! bit 0 of byte 0. Only the first five bytes carry information here.

use bitflags::bitflags;
use spdif_core::config::{ChannelStatusConfig, BLOCK_FRAMES};
use spdif_core::ConfigError;

/// Bytes of channel status that carry information
pub const CHANNEL_STATUS_BYTES: usize = 5;

/// Bytes in a full 192-bit block
pub const BLOCK_BYTES: usize = BLOCK_FRAMES / 8;

bitflags! {
    /// Channel status byte 0
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cs0: u8 {
        const PROFESSIONAL = 0x01;
        const NON_AUDIO = 0x02;
        const NOT_COPYRIGHT = 0x04;
        const PRE_EMPHASIS = 0x08;
    }
}

/// Byte 1: generation status, original recording
pub const CS1_ORIGINAL: u8 = 0x80;

/// Byte 4: maximum word length is 24 bits
pub const CS4_MAX_WORDLEN_24: u8 = 0x01;

/// Sample rates with a channel-status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleRate {
    Hz44100,
    Hz48000,
    Hz88200,
    Hz96000,
    Hz176400,
    Hz192000,
}

impl SampleRate {
    pub const ALL: [SampleRate; 6] = [
        SampleRate::Hz44100,
        SampleRate::Hz48000,
        SampleRate::Hz88200,
        SampleRate::Hz96000,
        SampleRate::Hz176400,
        SampleRate::Hz192000,
    ];

    pub fn from_hz(hz: u32) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|rate| rate.hz() == hz)
            .ok_or(ConfigError::UnsupportedRate(hz))
    }

    pub fn hz(self) -> u32 {
        match self {
            SampleRate::Hz44100 => 44_100,
            SampleRate::Hz48000 => 48_000,
            SampleRate::Hz88200 => 88_200,
            SampleRate::Hz96000 => 96_000,
            SampleRate::Hz176400 => 176_400,
            SampleRate::Hz192000 => 192_000,
        }
    }

    /// Byte 3 code (bits 0-3, clock accuracy level II)
    pub fn code(self) -> u8 {
        match self {
            SampleRate::Hz44100 => 0x00,
            SampleRate::Hz48000 => 0x02,
            SampleRate::Hz88200 => 0x08,
            SampleRate::Hz96000 => 0x0A,
            SampleRate::Hz176400 => 0x0C,
            SampleRate::Hz192000 => 0x0E,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|rate| rate.code() == code & 0x0F)
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = ConfigError;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        Self::from_hz(hz)
    }
}

/// Word length category carried in byte 4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WordLength {
    #[default]
    Unspecified,
    Bits16,
    Bits20,
    Bits24,
}

impl WordLength {
    /// Category for a negotiated bit depth. 32-bit sources are truncated
    /// to the 24-bit field.
    pub fn from_bit_depth(bits: u32) -> Result<Self, ConfigError> {
        match bits {
            16 => Ok(WordLength::Bits16),
            20 => Ok(WordLength::Bits20),
            24 | 32 => Ok(WordLength::Bits24),
            other => Err(ConfigError::UnsupportedBitDepth(other)),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            WordLength::Unspecified => 0x00,
            WordLength::Bits16 => 0x02,
            WordLength::Bits20 => 0x0A,
            WordLength::Bits24 => CS4_MAX_WORDLEN_24 | 0x0A,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code & 0x0F {
            0x00 => Some(WordLength::Unspecified),
            0x02 => Some(WordLength::Bits16),
            0x0A => Some(WordLength::Bits20),
            0x0B => Some(WordLength::Bits24),
            _ => None,
        }
    }
}

/// The five informative channel-status bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatus([u8; CHANNEL_STATUS_BYTES]);

impl ChannelStatus {
    /// Consumer-format status for linear PCM
    pub fn consumer(rate: SampleRate, word_length: WordLength, config: &ChannelStatusConfig) -> Self {
        let mut cs0 = Cs0::empty();
        cs0.set(Cs0::NOT_COPYRIGHT, config.copy_permitted);

        let mut cs1 = config.category & !CS1_ORIGINAL;
        if config.original {
            cs1 |= CS1_ORIGINAL;
        }

        Self([cs0.bits(), cs1, 0, rate.code(), word_length.code()])
    }

    pub fn from_bytes(bytes: [u8; CHANNEL_STATUS_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; CHANNEL_STATUS_BYTES] {
        self.0
    }

    pub fn flags(&self) -> Cs0 {
        Cs0::from_bits_retain(self.0[0])
    }

    pub fn category(&self) -> u8 {
        self.0[1] & !CS1_ORIGINAL
    }

    pub fn sample_rate(&self) -> Option<SampleRate> {
        SampleRate::from_code(self.0[3])
    }

    pub fn word_length(&self) -> Option<WordLength> {
        WordLength::from_code(self.0[4])
    }
}

impl Default for ChannelStatus {
    fn default() -> Self {
        Self::consumer(
            SampleRate::Hz48000,
            WordLength::Unspecified,
            &ChannelStatusConfig::default(),
        )
    }
}

/// One channel-status bit, with a flag on the first bit of each block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBit {
    pub value: bool,
    pub block_start: bool,
}

/// Walks the 192-bit block one frame at a time
#[derive(Debug, Clone)]
pub struct ChannelStatusCycle {
    block: [u8; BLOCK_BYTES],
    index: usize,
}

impl ChannelStatusCycle {
    pub fn new(status: ChannelStatus) -> Self {
        let mut cycle = Self {
            block: [0; BLOCK_BYTES],
            index: 0,
        };
        cycle.configure(status);
        cycle
    }

    /// Replace the payload. The bit index is kept, so a block already in
    /// flight finishes with mixed content and the new status is complete
    /// from the next block start.
    pub fn configure(&mut self, status: ChannelStatus) {
        self.block[..CHANNEL_STATUS_BYTES].copy_from_slice(&status.0);
    }

    /// Make the next bit the first of a block
    pub fn restart_block(&mut self) {
        self.index = 0;
    }

    pub fn status(&self) -> ChannelStatus {
        let mut bytes = [0u8; CHANNEL_STATUS_BYTES];
        bytes.copy_from_slice(&self.block[..CHANNEL_STATUS_BYTES]);
        ChannelStatus(bytes)
    }

    /// Index of the bit the next call will return
    pub fn position(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn next_bit(&mut self) -> StatusBit {
        let index = self.index;
        let value = (self.block[index >> 3] >> (index & 7)) & 1 == 1;
        self.index = (index + 1) % BLOCK_FRAMES;
        StatusBit {
            value,
            block_start: index == 0,
        }
    }
}

impl Default for ChannelStatusCycle {
    fn default() -> Self {
        Self::new(ChannelStatus::default())
    }
}
