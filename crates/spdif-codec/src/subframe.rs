//! Biphase-mark subframe codec
//!
//! A subframe has 32 time slots: 4 preamble slots, the 24-bit audio field
//! (LSB first, the low nibble doubling as the auxiliary bits), then the
//! validity, user, channel-status and parity slots. Every slot is sent as two
//! line cells, so a coded subframe is 64 cells held in two words, first cell
//! in bit 31 of the first word.

use bitflags::bitflags;

/// 64 biphase-mark line cells, transmitted MSB first
pub type CodedSubframe = [u32; 2];

/// Mask of the 24-bit audio field
pub const SAMPLE_FIELD_MASK: u32 = 0x00FF_FFFF;

/// Time slot of the first audio bit
pub const AUDIO_SLOT: u32 = 4;

/// Time slot of the parity bit
pub const PARITY_SLOT: u32 = 31;

/// Subframe preamble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preamble {
    /// Left channel, first frame of a block
    B,
    /// Left channel, any other frame
    M,
    /// Right channel
    W,
}

impl Preamble {
    /// Line cells of the preamble when the preceding cell is low.
    /// Preceded by a high cell the complement is sent.
    pub const fn cells(self) -> u8 {
        match self {
            Preamble::B => 0b1110_1000,
            Preamble::M => 0b1110_0010,
            Preamble::W => 0b1110_0100,
        }
    }

    /// Identify a preamble from its eight line cells, in either polarity
    pub fn from_cells(cells: u8) -> Option<Self> {
        [Preamble::B, Preamble::M, Preamble::W]
            .into_iter()
            .find(|p| p.cells() == cells || !p.cells() == cells)
    }
}

bitflags! {
    /// Metadata slots of a subframe, at their time-slot positions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SubframeFlags: u32 {
        /// Validity slot; set means the sample is NOT fit for conversion
        const VALIDITY = 1 << 28;
        /// User data slot
        const USER = 1 << 29;
        /// Channel status slot
        const CHANNEL_STATUS = 1 << 30;
    }
}

/// Biphase-mark cells for one byte sent LSB first, starting from a low line.
/// The first bit lands in the top two cells.
pub(crate) static BMC_TABLE: [u16; 256] = bmc_table();

const fn bmc_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut byte = 0;
    while byte < 256 {
        let mut level = 0u16;
        let mut cells = 0u16;
        let mut bit = 0;
        while bit < 8 {
            level ^= 1;
            cells = (cells << 1) | level;
            if (byte >> bit) & 1 == 1 {
                level ^= 1;
            }
            cells = (cells << 1) | level;
            bit += 1;
        }
        table[byte] = cells;
        byte += 1;
    }
    table
}

/// Subframe encoder. The only state is the line level after the last cell.
#[derive(Debug, Clone, Default)]
pub struct SubframeCodec {
    /// Even parity makes every subframe an even number of transitions, so
    /// this is back at its starting value after each call.
    level: u32,
}

impl SubframeCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line level of the last emitted cell. Constant for a given codec, see
    /// the parity note on the field.
    pub fn level(&self) -> bool {
        self.level != 0
    }

    /// Encode one subframe. `sample` must already be masked to the word
    /// length; bits above the 24-bit field are ignored.
    #[inline]
    pub fn encode_subframe(
        &mut self,
        sample: u32,
        preamble: Preamble,
        flags: SubframeFlags,
    ) -> CodedSubframe {
        let slots = ((sample & SAMPLE_FIELD_MASK) << AUDIO_SLOT) | flags.bits();
        let slots = slots | ((slots.count_ones() & 1) << PARITY_SLOT);

        let mut level = self.level;
        let preamble = u32::from(preamble.cells()) ^ polarity(level, 0xFF);

        let nibble = (slots >> AUDIO_SLOT) & 0xF;
        let aux = (u32::from(BMC_TABLE[nibble as usize]) >> 8) ^ polarity(level, 0xFF);
        level ^= nibble.count_ones() & 1;

        let mut bytes = [0u32; 3];
        for (i, cells) in bytes.iter_mut().enumerate() {
            let byte = (slots >> (8 * (i + 1))) & 0xFF;
            *cells = u32::from(BMC_TABLE[byte as usize]) ^ polarity(level, 0xFFFF);
            level ^= byte.count_ones() & 1;
        }
        self.level = level;

        [
            (preamble << 24) | (aux << 16) | bytes[0],
            (bytes[1] << 16) | bytes[2],
        ]
    }
}

/// All-ones `mask` when the line is high, zero otherwise
#[inline(always)]
fn polarity(level: u32, mask: u32) -> u32 {
    0u32.wrapping_sub(level) & mask
}
