//! Bitstream decoder
//!
//! Reverses the encoder for verification: checks preambles, biphase-mark
//! transitions and parity, and recovers samples and metadata.

use thiserror::Error;

use crate::channel_status::{ChannelStatus, CHANNEL_STATUS_BYTES};
use crate::frame::EncodedFrame;
use crate::subframe::{CodedSubframe, Preamble, SubframeFlags, AUDIO_SLOT, SAMPLE_FIELD_MASK};

/// Decoding failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unknown preamble cells: {0:08b}")]
    Preamble(u8),

    #[error("Missing biphase transition at slot {0}")]
    Biphase(u32),

    #[error("Parity error")]
    Parity,
}

/// Contents of one subframe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedSubframe {
    pub preamble: Preamble,
    /// 24-bit audio field
    pub sample: u32,
    pub flags: SubframeFlags,
}

impl DecodedSubframe {
    pub fn channel_status(&self) -> bool {
        self.flags.contains(SubframeFlags::CHANNEL_STATUS)
    }

    /// Audio field sign-extended to an `i32`
    pub fn signed_sample(&self) -> i32 {
        ((self.sample << 8) as i32) >> 8
    }
}

/// Contents of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    pub left: DecodedSubframe,
    pub right: DecodedSubframe,
}

pub fn decode_subframe(coded: CodedSubframe) -> Result<DecodedSubframe, DecodeError> {
    let cells = (u64::from(coded[0]) << 32) | u64::from(coded[1]);
    let cell = |index: u32| ((cells >> (63 - index)) & 1) as u32;

    let preamble_cells = (coded[0] >> 24) as u8;
    let preamble = Preamble::from_cells(preamble_cells).ok_or(DecodeError::Preamble(preamble_cells))?;

    let mut previous = cell(2 * AUDIO_SLOT - 1);
    let mut slots = 0u32;
    for slot in AUDIO_SLOT..32 {
        let first = cell(2 * slot);
        let second = cell(2 * slot + 1);
        if first == previous {
            return Err(DecodeError::Biphase(slot));
        }
        slots |= (first ^ second) << slot;
        previous = second;
    }

    if slots.count_ones() % 2 != 0 {
        return Err(DecodeError::Parity);
    }

    Ok(DecodedSubframe {
        preamble,
        sample: (slots >> AUDIO_SLOT) & SAMPLE_FIELD_MASK,
        flags: SubframeFlags::from_bits_truncate(slots),
    })
}

pub fn decode_frame(frame: &EncodedFrame) -> Result<DecodedFrame, DecodeError> {
    Ok(DecodedFrame {
        left: decode_subframe([frame[0], frame[1]])?,
        right: decode_subframe([frame[2], frame[3]])?,
    })
}

/// Rebuild the informative channel-status bytes from a block. `frames` must
/// start at a B preamble and hold at least 40 frames.
pub fn channel_status_from_block(frames: &[DecodedFrame]) -> Option<ChannelStatus> {
    let bits = CHANNEL_STATUS_BYTES * 8;
    if frames.len() < bits || frames[0].left.preamble != Preamble::B {
        return None;
    }

    let mut bytes = [0u8; CHANNEL_STATUS_BYTES];
    for (index, frame) in frames[..bits].iter().enumerate() {
        if frame.left.channel_status() {
            bytes[index / 8] |= 1 << (index % 8);
        }
    }
    Some(ChannelStatus::from_bytes(bytes))
}
