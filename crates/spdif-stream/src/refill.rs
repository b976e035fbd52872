//! Completion handling: refill the vacated half and track the PCM position

use crate::buffer::{Half, ReaderState, StreamBuffer};
use crate::idle::IdleCounter;
use crate::pcm::{PcmRuntime, PcmStream};
use spdif_codec::unpack::{unpack_s16, unpack_s24_in_s32, unpack_s24_packed, unpack_s32};
use spdif_codec::{ChannelStatus, EncodedFrame, FrameEncoder, SampleMask, Unpacker};
use std::sync::Arc;

/// What went into a refilled half
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillSource {
    Silence,
    Live,
}

/// Result of handling one segment completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefillOutcome {
    pub half: Half,
    pub source: FillSource,
    /// Period notifications delivered during this refill
    pub periods_elapsed: usize,
}

/// Refill counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefillStats {
    pub refills: u64,
    pub silent_refills: u64,
    pub periods_elapsed: u64,
}

/// Owns the stream buffer and the encoder state that must stay continuous
/// across refills.
#[derive(Debug)]
pub struct RefillController {
    encoder: FrameEncoder,
    buffer: StreamBuffer,
    idle: Arc<IdleCounter>,
    /// Next PCM frame to read
    pcm_position: usize,
    /// Frames consumed since the last period notification
    period_position: usize,
    reader: ReaderState,
    stats: RefillStats,
}

impl RefillController {
    pub fn new(buffer: StreamBuffer, idle: Arc<IdleCounter>) -> Self {
        Self {
            encoder: FrameEncoder::default(),
            buffer,
            idle,
            pcm_position: 0,
            period_position: 0,
            reader: ReaderState::Empty,
            stats: RefillStats::default(),
        }
    }

    /// Apply a new word length and channel status. With no transfer running
    /// the next encoded frame opens a fresh block. A running transfer keeps
    /// its block position and the new status is whole from the next block.
    pub fn configure(&mut self, mask: SampleMask, status: ChannelStatus) {
        self.encoder.set_sample_mask(mask);
        self.encoder.set_channel_status(status);
        if self.reader == ReaderState::Empty {
            self.encoder.restart_block();
        }
    }

    /// Fill the whole buffer with silence, first frame on a block start
    pub fn prefill_silence(&mut self) {
        self.encoder.restart_block();
        for frame in self.buffer.all_mut() {
            self.encoder.encode_silence(frame);
        }
        self.reader = ReaderState::reading(Half::First);
    }

    pub fn reset_positions(&mut self) {
        self.pcm_position = 0;
        self.period_position = 0;
    }

    /// Forget the running transfer
    pub fn halt(&mut self) {
        self.reader = ReaderState::Empty;
    }

    /// Handle one segment completion. `residue` is the byte count the
    /// transfer reports as still to go before wrapping.
    ///
    /// A completion with no transfer running is left over from a stopped
    /// transfer: the vacated half gets silence and the reader stays empty.
    pub fn on_segment_consumed(&mut self, residue: usize, stream: Option<&mut PcmStream>) -> RefillOutcome {
        let half = Half::vacated(residue, self.buffer.half_bytes());
        let orphaned = self.reader == ReaderState::Empty;
        if !orphaned {
            if self.reader.writable() == Some(half) {
                tracing::warn!("Completion for {:?} while it was not being read", half);
            }
            self.reader = ReaderState::reading(half.other());
        }
        self.stats.refills += 1;

        let silent = self.idle.tick();
        let live = match stream {
            Some(stream) if !silent && !orphaned => stream.runtime().copied().map(|runtime| (stream, runtime)),
            _ => None,
        };

        let Some((stream, runtime)) = live else {
            let dst = self.buffer.half_mut(half);
            for frame in dst {
                self.encoder.encode_silence(frame);
            }
            self.stats.silent_refills += 1;
            tracing::trace!("Refill {:?}: silence, idle count {}", half, self.idle.count());
            return RefillOutcome {
                half,
                source: FillSource::Silence,
                periods_elapsed: 0,
            };
        };

        let dst = self.buffer.half_mut(half);
        self.pcm_position = fill_from_pcm(&mut self.encoder, dst, stream.ring(), &runtime, self.pcm_position);

        self.period_position += dst.len();
        let mut periods_elapsed = 0;
        while self.period_position >= runtime.period_frames {
            self.period_position -= runtime.period_frames;
            stream.period_elapsed();
            periods_elapsed += 1;
        }
        self.stats.periods_elapsed += periods_elapsed as u64;

        tracing::trace!(
            "Refill {:?}: live, pcm position {}, {} periods elapsed",
            half,
            self.pcm_position,
            periods_elapsed
        );
        RefillOutcome {
            half,
            source: FillSource::Live,
            periods_elapsed,
        }
    }

    pub fn pcm_position(&self) -> usize {
        self.pcm_position
    }

    pub fn reader(&self) -> ReaderState {
        self.reader
    }

    pub fn stats(&self) -> RefillStats {
        self.stats
    }

    pub fn buffer(&self) -> &StreamBuffer {
        &self.buffer
    }

    pub fn encoder(&self) -> &FrameEncoder {
        &self.encoder
    }
}

/// Encode `dst.len()` frames read from the PCM ring at `position`. Returns
/// the position after the last frame read.
fn fill_from_pcm(
    encoder: &mut FrameEncoder,
    dst: &mut [EncodedFrame],
    ring: &[u8],
    runtime: &PcmRuntime,
    position: usize,
) -> usize {
    match runtime.unpacker {
        Unpacker::S16 => fill_with(encoder, dst, ring, runtime, position, unpack_s16),
        Unpacker::S24InS32 => fill_with(encoder, dst, ring, runtime, position, unpack_s24_in_s32),
        Unpacker::S24Packed => fill_with(encoder, dst, ring, runtime, position, unpack_s24_packed),
        Unpacker::S32 => fill_with(encoder, dst, ring, runtime, position, unpack_s32),
    }
}

#[inline(always)]
fn fill_with<F>(
    encoder: &mut FrameEncoder,
    dst: &mut [EncodedFrame],
    ring: &[u8],
    runtime: &PcmRuntime,
    mut position: usize,
    unpack: F,
) -> usize
where
    F: Fn(&[u8]) -> (i32, i32),
{
    let frame_bytes = runtime.frame_bytes;
    for frame in dst {
        let offset = position * frame_bytes;
        encoder.encode_frame(frame, unpack(&ring[offset..offset + frame_bytes]));
        position += 1;
        if position == runtime.buffer_frames {
            position = 0;
        }
    }
    position
}
