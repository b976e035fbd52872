//! S/PDIF playback device
//!
//! Control-path context: opens and prepares the consumer stream, starts and
//! stops the cyclic transfer, and routes segment completions to the refill
//! controller.

use crate::buffer::StreamBuffer;
use crate::idle::IdleCounter;
use crate::pcm::{HwConstraints, PcmStream, StreamParams};
use crate::refill::{RefillController, RefillOutcome};
use crate::transmitter::{CyclicTransfer, TransferCookie, Transmitter};
use spdif_codec::ChannelStatus;
use spdif_core::config::ChannelStatusConfig;
use spdif_core::{Config, Result, StreamError};
use std::sync::Arc;

/// Stream trigger commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Start,
    Stop,
}

pub struct SpdifDevice<T: Transmitter> {
    constraints: HwConstraints,
    status_config: ChannelStatusConfig,
    refill: RefillController,
    idle: Arc<IdleCounter>,
    transmitter: T,
    stream: Option<PcmStream>,
    cookie: Option<TransferCookie>,
}

impl<T: Transmitter> SpdifDevice<T> {
    /// Create a device with its stream buffer sized from `config`
    pub fn new(config: &Config, transmitter: T) -> Result<Self> {
        let buffer = StreamBuffer::new(config.output.buffer_frames)?;
        let idle = Arc::new(IdleCounter::new());

        tracing::debug!(
            "S/PDIF device: {} frame stream buffer, {} frame refills",
            buffer.frames(),
            buffer.half_frames()
        );

        Ok(Self {
            constraints: HwConstraints::from_config(&config.output),
            status_config: config.channel_status.clone(),
            refill: RefillController::new(buffer, Arc::clone(&idle)),
            idle,
            transmitter,
            stream: None,
            cookie: None,
        })
    }

    pub fn constraints(&self) -> &HwConstraints {
        &self.constraints
    }

    /// Attach a consumer stream
    pub fn open(&mut self, stream: PcmStream) -> Result<()> {
        if self.stream.is_some() {
            return Err(StreamError::AlreadyOpen.into());
        }
        tracing::debug!("Stream opened: {} byte ring", stream.ring().len());
        self.stream = Some(stream);
        Ok(())
    }

    /// Detach the consumer stream. Later completions encode silence.
    pub fn close(&mut self) -> Result<PcmStream> {
        let stream = self.stream.take().ok_or(StreamError::NotOpen)?;
        self.idle.disable();
        tracing::debug!("Stream closed");
        Ok(stream)
    }

    pub fn stream(&self) -> Option<&PcmStream> {
        self.stream.as_ref()
    }

    pub fn stream_mut(&mut self) -> Option<&mut PcmStream> {
        self.stream.as_mut()
    }

    /// Validate `params`, reconfigure the encoder and make sure the transfer
    /// is running. Invalid parameters leave the device untouched.
    pub fn prepare(&mut self, params: &StreamParams) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(StreamError::NotOpen)?;
        let runtime = params.validate(
            &self.constraints,
            self.refill.buffer().half_frames(),
            stream.ring().len(),
        )?;

        self.idle.disable();
        let status = ChannelStatus::consumer(runtime.rate, runtime.word_length, &self.status_config);
        self.refill.configure(runtime.mask, status);
        stream.set_runtime(runtime);

        tracing::info!("Prepare {}-bit {} Hz ({})", params.bit_depth, runtime.rate.hz(), runtime.format);
        tracing::debug!(
            "Channel status {:02x?}, {} frame buffer, {} frame periods",
            status.bytes(),
            runtime.buffer_frames,
            runtime.period_frames
        );

        self.submit()
    }

    pub fn trigger(&mut self, trigger: Trigger) -> Result<()> {
        match trigger {
            Trigger::Start => self.start(),
            Trigger::Stop => {
                self.stop();
                Ok(())
            }
        }
    }

    fn start(&mut self) -> Result<()> {
        let stream = self.stream.as_ref().ok_or(StreamError::NotOpen)?;
        if stream.runtime().is_none() {
            return Err(StreamError::NotPrepared.into());
        }

        self.submit()?;
        self.refill.reset_positions();

        let prior = self.idle.start();
        if prior > 1 {
            let silenced = (u64::from(prior) + 1) * self.refill.buffer().half_frames() as u64;
            tracing::info!("Start: {} frames silenced", silenced);
        } else {
            tracing::info!("Start");
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.transmitter.terminate_all();
        self.cookie = None;
        self.refill.halt();
        self.idle.disable();
        tracing::info!("Stop at frame {}", self.refill.pcm_position());
    }

    fn submit(&mut self) -> Result<()> {
        if self.cookie.is_some() {
            return Ok(());
        }

        self.refill.prefill_silence();
        let buffer = self.refill.buffer();
        let transfer = CyclicTransfer {
            base: buffer.base_address(),
            len: buffer.len_bytes(),
            period_len: buffer.half_bytes(),
        };

        match self.transmitter.submit_cyclic(transfer) {
            Ok(cookie) => {
                tracing::debug!("Transfer {:?} running", cookie);
                self.cookie = Some(cookie);
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Cyclic transfer submission failed: {}", err);
                self.refill.halt();
                Err(err.into())
            }
        }
    }

    /// Completion handler, called once per consumed segment
    pub fn on_segment_consumed(&mut self, residue: usize) -> RefillOutcome {
        self.refill.on_segment_consumed(residue, self.stream.as_mut())
    }

    /// Consumer position in frames
    pub fn pointer(&self) -> usize {
        self.refill.pcm_position()
    }

    pub fn idle_counter(&self) -> Arc<IdleCounter> {
        Arc::clone(&self.idle)
    }

    pub fn refill(&self) -> &RefillController {
        &self.refill
    }

    pub fn buffer(&self) -> &StreamBuffer {
        self.refill.buffer()
    }

    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    pub fn is_running(&self) -> bool {
        self.cookie.is_some()
    }
}

impl<T: Transmitter> std::fmt::Debug for SpdifDevice<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpdifDevice")
            .field("stream", &self.stream)
            .field("cookie", &self.cookie)
            .field("idle", &self.idle.count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Half, ReaderState};
    use crate::refill::FillSource;
    use crate::transmitter::{SimulatedLink, SimulatedTransmitter};
    use spdif_codec::decode::channel_status_from_block;
    use spdif_codec::{decode_frame, SampleFormat, SampleRate, WordLength};
    use spdif_core::{ConfigError, SpdifError, TransmitterError};

    fn device() -> (SpdifDevice<SimulatedTransmitter>, SimulatedLink) {
        let (tx, link) = SimulatedTransmitter::new();
        (SpdifDevice::new(&Config::default(), tx).unwrap(), link)
    }

    fn params() -> StreamParams {
        StreamParams::new(SampleFormat::S16Le, 48_000, 8 * 192, 192)
    }

    #[test]
    fn test_open_twice() {
        let (mut dev, _) = device();
        dev.open(PcmStream::new(1024, || {})).unwrap();
        assert!(matches!(
            dev.open(PcmStream::new(1024, || {})),
            Err(SpdifError::Stream(StreamError::AlreadyOpen))
        ));
        dev.close().unwrap();
        assert!(matches!(dev.close(), Err(SpdifError::Stream(StreamError::NotOpen))));
    }

    #[test]
    fn test_lifecycle_order() {
        let (mut dev, link) = device();
        assert!(matches!(dev.prepare(&params()), Err(SpdifError::Stream(StreamError::NotOpen))));

        dev.open(PcmStream::new(8 * 192 * 4, || {})).unwrap();
        assert!(matches!(
            dev.trigger(Trigger::Start),
            Err(SpdifError::Stream(StreamError::NotPrepared))
        ));

        dev.prepare(&params()).unwrap();
        assert!(dev.is_running());
        assert_eq!(link.submissions(), 1);
        assert!(!dev.idle_counter().is_live());

        dev.trigger(Trigger::Start).unwrap();
        assert!(dev.idle_counter().is_live());
        assert_eq!(link.submissions(), 1);

        dev.trigger(Trigger::Stop).unwrap();
        assert!(!dev.is_running());
        assert_eq!(link.terminations(), 1);
        assert!(!dev.idle_counter().is_live());

        // restart after stop resubmits
        dev.trigger(Trigger::Start).unwrap();
        assert_eq!(link.submissions(), 2);
    }

    #[test]
    fn test_bad_rate_changes_nothing() {
        let (mut dev, link) = device();
        dev.open(PcmStream::new(8 * 192 * 4, || {})).unwrap();
        let params = StreamParams { rate: 22_050, ..params() };

        let err = dev.prepare(&params).unwrap_err();
        assert!(matches!(err, SpdifError::Setup(ConfigError::UnsupportedRate(22_050))));
        assert!(!dev.is_running());
        assert_eq!(link.submissions(), 0);
        assert!(dev.stream().unwrap().runtime().is_none());
        assert_eq!(dev.refill().encoder().channel_status(), ChannelStatus::default());
    }

    #[test]
    fn test_submission_failure_is_retryable() {
        let (mut dev, link) = device();
        dev.open(PcmStream::new(8 * 192 * 4, || {})).unwrap();
        link.fail_next_submissions(1);

        let err = dev.prepare(&params()).unwrap_err();
        assert!(matches!(
            err,
            SpdifError::Transmitter(TransmitterError::DescriptorUnavailable)
        ));
        assert!(!dev.is_running());
        assert!(dev.buffer().as_bytes().iter().any(|&b| b != 0));

        dev.prepare(&params()).unwrap();
        assert!(dev.is_running());
        assert_eq!(link.submissions(), 1);
    }

    #[test]
    fn test_prepare_sets_channel_status() {
        let (mut dev, link) = device();
        dev.open(PcmStream::new(8 * 576 * 8, || {})).unwrap();
        let params = StreamParams::new(SampleFormat::S24Le, 96_000, 8 * 576, 576);
        dev.prepare(&params).unwrap();

        let completion = link.complete_segment().unwrap();
        dev.on_segment_consumed(completion.residue);

        let decode_block = |half| -> Vec<_> {
            dev.buffer().half(half)[..192]
                .iter()
                .map(|frame| decode_frame(frame).unwrap())
                .collect()
        };
        let refilled = decode_block(Half::First);
        let prefilled = decode_block(Half::Second);

        let status = channel_status_from_block(&refilled).unwrap();
        assert_eq!(status.sample_rate(), Some(SampleRate::Hz96000));
        assert_eq!(status.word_length(), Some(WordLength::Bits24));
        assert_eq!(channel_status_from_block(&prefilled), Some(status));
    }

    #[test]
    fn test_completion_after_stop_keeps_device_stopped() {
        let (mut dev, link) = device();
        dev.open(PcmStream::new(8 * 192 * 4, || {})).unwrap();
        dev.prepare(&params()).unwrap();
        dev.trigger(Trigger::Start).unwrap();
        dev.trigger(Trigger::Stop).unwrap();

        let outcome = dev.on_segment_consumed(0);
        assert_eq!(outcome.source, FillSource::Silence);
        assert_eq!(outcome.periods_elapsed, 0);
        assert!(!dev.is_running());
        assert_eq!(dev.refill().reader(), ReaderState::Empty);
        assert!(link.complete_segment().is_none());

        // the next start still prefills and resubmits
        dev.trigger(Trigger::Start).unwrap();
        assert_eq!(dev.refill().reader(), ReaderState::Half0Active);
        assert_eq!(link.submissions(), 2);
    }

    #[test]
    fn test_completions_after_close_are_silent() {
        let (mut dev, link) = device();
        dev.open(PcmStream::new(8 * 192 * 4, || {})).unwrap();
        dev.prepare(&params()).unwrap();
        dev.trigger(Trigger::Start).unwrap();
        dev.close().unwrap();

        let completion = link.complete_segment().unwrap();
        let outcome = dev.on_segment_consumed(completion.residue);
        assert_eq!(outcome.source, FillSource::Silence);
        assert_eq!(outcome.periods_elapsed, 0);
    }
}
