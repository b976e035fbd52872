//! Double buffer of encoded frames
//!
//! The transmitter drains the buffer cyclically, one half per segment, while
//! software refills the half it has just left.

use spdif_codec::{EncodedFrame, FRAME_BYTES};
use spdif_core::ConfigError;

/// One half of the stream buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Half {
    First,
    Second,
}

impl Half {
    /// The half the reader has moved past, given the remaining byte count
    /// of the cyclic transfer. Only the residue is trusted, not the order
    /// of completions.
    pub fn vacated(residue: usize, half_bytes: usize) -> Self {
        if residue <= half_bytes {
            Half::First
        } else {
            Half::Second
        }
    }

    pub fn other(self) -> Self {
        match self {
            Half::First => Half::Second,
            Half::Second => Half::First,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Half::First => 0,
            Half::Second => 1,
        }
    }
}

/// Which half the hardware reader is draining
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderState {
    /// No transfer submitted
    #[default]
    Empty,
    Half0Active,
    Half1Active,
}

impl ReaderState {
    pub fn reading(half: Half) -> Self {
        match half {
            Half::First => ReaderState::Half0Active,
            Half::Second => ReaderState::Half1Active,
        }
    }

    /// Half software may write, if a transfer is running
    pub fn writable(self) -> Option<Half> {
        match self {
            ReaderState::Empty => None,
            ReaderState::Half0Active => Some(Half::Second),
            ReaderState::Half1Active => Some(Half::First),
        }
    }
}

/// Fixed region of encoded frames, word aligned for the serializer
#[derive(Debug, Clone)]
pub struct StreamBuffer {
    frames: Vec<EncodedFrame>,
}

impl StreamBuffer {
    /// Allocate a buffer of `frames` frames; must be non-zero and even
    pub fn new(frames: usize) -> Result<Self, ConfigError> {
        if frames == 0 || frames % 2 != 0 {
            return Err(ConfigError::InvalidStreamBuffer(frames));
        }
        Ok(Self {
            frames: vec![EncodedFrame::default(); frames],
        })
    }

    pub fn frames(&self) -> usize {
        self.frames.len()
    }

    pub fn half_frames(&self) -> usize {
        self.frames.len() / 2
    }

    pub fn len_bytes(&self) -> usize {
        self.frames.len() * FRAME_BYTES
    }

    pub fn half_bytes(&self) -> usize {
        self.len_bytes() / 2
    }

    pub fn half(&self, half: Half) -> &[EncodedFrame] {
        let n = self.half_frames();
        &self.frames[half.index() * n..(half.index() + 1) * n]
    }

    pub fn half_mut(&mut self, half: Half) -> &mut [EncodedFrame] {
        let n = self.half_frames();
        &mut self.frames[half.index() * n..(half.index() + 1) * n]
    }

    pub fn all_mut(&mut self) -> &mut [EncodedFrame] {
        &mut self.frames
    }

    /// Buffer contents as the serializer reads them
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.frames)
    }

    pub fn half_as_bytes(&self, half: Half) -> &[u8] {
        bytemuck::cast_slice(self.half(half))
    }

    /// Start address handed to the transmitter
    pub fn base_address(&self) -> usize {
        self.frames.as_ptr() as usize
    }
}
