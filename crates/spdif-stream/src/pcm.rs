//! Consumer stream: the audio framework's side of the device

use spdif_codec::{SampleFormat, SampleMask, SampleRate, Unpacker, WordLength};
use spdif_core::config::OutputConfig;
use spdif_core::ConfigError;

/// What the device accepts, published to the audio framework
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwConstraints {
    pub formats: &'static [SampleFormat],
    pub rates: &'static [SampleRate],
    pub channels: u32,
    pub periods: u32,
    pub buffer_bytes_max: usize,
}

impl HwConstraints {
    pub fn from_config(output: &OutputConfig) -> Self {
        Self {
            formats: &SampleFormat::ALL,
            rates: &SampleRate::ALL,
            channels: 2,
            periods: output.pcm_periods,
            buffer_bytes_max: output.pcm_buffer_bytes,
        }
    }

    /// Preferred period size in bytes
    pub fn period_bytes(&self) -> usize {
        self.buffer_bytes_max / self.periods.max(1) as usize
    }
}

/// Parameters negotiated by the audio framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub format: SampleFormat,
    pub rate: u32,
    pub channels: u32,
    /// Significant bits per sample; drives the sample mask and word length
    pub bit_depth: u32,
    pub buffer_frames: usize,
    pub period_frames: usize,
}

impl StreamParams {
    /// Stereo parameters using the format's full bit depth
    pub fn new(format: SampleFormat, rate: u32, buffer_frames: usize, period_frames: usize) -> Self {
        Self {
            format,
            rate,
            channels: 2,
            bit_depth: format.bit_depth(),
            buffer_frames,
            period_frames,
        }
    }

    /// Check every parameter against the device and the stream's ring
    /// buffer. Nothing is modified on failure.
    pub fn validate(
        &self,
        constraints: &HwConstraints,
        half_frames: usize,
        ring_bytes: usize,
    ) -> Result<PcmRuntime, ConfigError> {
        if self.channels != constraints.channels {
            return Err(ConfigError::UnsupportedChannels(self.channels));
        }
        if !constraints.formats.contains(&self.format) {
            return Err(ConfigError::UnsupportedFormat(self.format.name().to_string()));
        }
        let rate = SampleRate::from_hz(self.rate)?;
        if !constraints.rates.contains(&rate) {
            return Err(ConfigError::UnsupportedRate(self.rate));
        }
        if self.bit_depth > self.format.bit_depth() {
            return Err(ConfigError::UnsupportedBitDepth(self.bit_depth));
        }
        let word_length = WordLength::from_bit_depth(self.bit_depth)?;

        if self.period_frames == 0 || self.period_frames % half_frames != 0 {
            return Err(ConfigError::InvalidGeometry(format!(
                "period of {} frames is not a multiple of the {} frame refill",
                self.period_frames, half_frames
            )));
        }
        if self.buffer_frames == 0 || self.buffer_frames % self.period_frames != 0 {
            return Err(ConfigError::InvalidGeometry(format!(
                "buffer of {} frames is not a whole number of {} frame periods",
                self.buffer_frames, self.period_frames
            )));
        }
        let periods = self.buffer_frames / self.period_frames;
        if periods != constraints.periods as usize {
            return Err(ConfigError::InvalidGeometry(format!(
                "{} periods requested, device uses {}",
                periods, constraints.periods
            )));
        }

        let frame_bytes = self.format.frame_bytes();
        let needed = self.buffer_frames * frame_bytes;
        if needed > constraints.buffer_bytes_max {
            return Err(ConfigError::InvalidGeometry(format!(
                "buffer of {} bytes exceeds the {} byte maximum",
                needed, constraints.buffer_bytes_max
            )));
        }
        if needed > ring_bytes {
            return Err(ConfigError::BufferTooSmall {
                needed,
                available: ring_bytes,
            });
        }

        Ok(PcmRuntime {
            format: self.format,
            unpacker: self.format.unpacker(),
            rate,
            word_length,
            mask: SampleMask::for_depth(self.bit_depth),
            frame_bytes,
            buffer_frames: self.buffer_frames,
            period_frames: self.period_frames,
        })
    }
}

/// Validated stream setup, fixed between prepares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmRuntime {
    pub format: SampleFormat,
    pub unpacker: Unpacker,
    pub rate: SampleRate,
    pub word_length: WordLength,
    pub mask: SampleMask,
    pub frame_bytes: usize,
    pub buffer_frames: usize,
    pub period_frames: usize,
}

/// An open playback stream: the PCM ring buffer written by the audio
/// framework and its period-elapsed callback.
pub struct PcmStream {
    ring: Vec<u8>,
    runtime: Option<PcmRuntime>,
    on_period_elapsed: Box<dyn FnMut() + Send>,
}

impl PcmStream {
    /// Stream with a zeroed ring buffer of `ring_bytes` bytes
    pub fn new<F>(ring_bytes: usize, on_period_elapsed: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self {
            ring: vec![0; ring_bytes],
            runtime: None,
            on_period_elapsed: Box::new(on_period_elapsed),
        }
    }

    pub fn ring(&self) -> &[u8] {
        &self.ring
    }

    pub fn ring_mut(&mut self) -> &mut [u8] {
        &mut self.ring
    }

    pub fn runtime(&self) -> Option<&PcmRuntime> {
        self.runtime.as_ref()
    }

    pub(crate) fn set_runtime(&mut self, runtime: PcmRuntime) {
        self.runtime = Some(runtime);
    }

    pub(crate) fn period_elapsed(&mut self) {
        (self.on_period_elapsed)();
    }

    /// Copy interleaved frames into the ring starting at frame `position`,
    /// wrapping at the buffer end. Returns the frame position after the
    /// copy. Partial frames at the end of `data` are ignored.
    pub fn write_frames(&mut self, position: usize, data: &[u8]) -> Option<usize> {
        let runtime = self.runtime?;
        let mut position = position % runtime.buffer_frames;
        for frame in data.chunks_exact(runtime.frame_bytes) {
            let offset = position * runtime.frame_bytes;
            self.ring[offset..offset + runtime.frame_bytes].copy_from_slice(frame);
            position = (position + 1) % runtime.buffer_frames;
        }
        Some(position)
    }
}

impl std::fmt::Debug for PcmStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcmStream")
            .field("ring_bytes", &self.ring.len())
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}
