//! S/PDIF frame encoder

use crate::channel_status::{ChannelStatus, ChannelStatusCycle};
use crate::subframe::{Preamble, SubframeCodec, SubframeFlags};
use crate::unpack::SampleMask;

/// Words in one encoded frame (two coded subframes)
pub const FRAME_WORDS: usize = 4;

/// Bytes in one encoded frame
pub const FRAME_BYTES: usize = FRAME_WORDS * 4;

/// One encoded stereo frame: left subframe words, then right subframe words
pub type EncodedFrame = [u32; FRAME_WORDS];

/// Encodes stereo sample pairs into complete frames, keeping the line
/// polarity and the channel-status block position across calls.
#[derive(Debug, Clone, Default)]
pub struct FrameEncoder {
    codec: SubframeCodec,
    status: ChannelStatusCycle,
    sample_mask: SampleMask,
}

impl FrameEncoder {
    pub fn new(status: ChannelStatus) -> Self {
        Self {
            codec: SubframeCodec::new(),
            status: ChannelStatusCycle::new(status),
            sample_mask: SampleMask::FULL,
        }
    }

    pub fn sample_mask(&self) -> SampleMask {
        self.sample_mask
    }

    pub fn set_sample_mask(&mut self, mask: SampleMask) {
        tracing::debug!("Sample mask: 0x{:08x}", mask.bits());
        self.sample_mask = mask;
    }

    pub fn channel_status(&self) -> ChannelStatus {
        self.status.status()
    }

    /// Replace the channel status from the next block boundary
    pub fn set_channel_status(&mut self, status: ChannelStatus) {
        self.status.configure(status);
    }

    /// Start a new block with the next frame
    pub fn restart_block(&mut self) {
        self.status.restart_block();
    }

    /// Frame index within the current block of the next encoded frame
    pub fn block_position(&self) -> usize {
        self.status.position()
    }

    /// Encode one frame. Must be called exactly once per output frame so the
    /// channel-status block stays aligned with the line.
    #[inline]
    pub fn encode_frame(&mut self, dst: &mut EncodedFrame, (left, right): (i32, i32)) {
        let bit = self.status.next_bit();
        let preamble = if bit.block_start { Preamble::B } else { Preamble::M };
        let flags = SubframeFlags::from_bits_retain(u32::from(bit.value) << 30);

        let [l0, l1] = self
            .codec
            .encode_subframe(self.sample_mask.apply(left), preamble, flags);
        let [r0, r1] = self
            .codec
            .encode_subframe(self.sample_mask.apply(right), Preamble::W, flags);
        *dst = [l0, l1, r0, r1];
    }

    /// Encode a frame of digital silence
    #[inline]
    pub fn encode_silence(&mut self, dst: &mut EncodedFrame) {
        self.encode_frame(dst, (0, 0));
    }
}
