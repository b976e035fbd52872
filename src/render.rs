//! `spdif render`: WAV file to bitstream file
//!
//! The output is the exact sequence of encoded frames the simulated
//! transmitter consumed, starting with the silent prefill, each frame
//! written as four little-endian 32-bit words.

use anyhow::{bail, Context, Result};
use clap::Args;
use spdif_codec::{EncodedFrame, SampleFormat, BLOCK_FRAMES};
use spdif_core::Config;
use spdif_stream::{Half, PcmStream, SimulatedTransmitter, SpdifDevice, StreamParams, Trigger};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct RenderArgs {
    /// Stereo integer PCM WAV file (16, 24 or 32 bit)
    pub input: PathBuf,

    /// Bitstream output file
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderSummary {
    pub format: SampleFormat,
    pub rate: u32,
    pub input_frames: usize,
    pub output_frames: usize,
    pub periods: usize,
}

/// Interleaved PCM already in the container layout of `format`
struct PcmSource {
    format: SampleFormat,
    rate: u32,
    data: Vec<u8>,
}

fn read_wav(path: &Path) -> Result<PcmSource> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("Failed to load WAV: {}", path.display()))?;
    let spec = reader.spec();

    if spec.channels != 2 {
        bail!("Unsupported channel count: {} (S/PDIF output is stereo)", spec.channels);
    }
    if spec.sample_format != hound::SampleFormat::Int {
        bail!("Floating point WAV files are not supported");
    }
    let format = SampleFormat::from_container(spec.bits_per_sample)?;

    let mut data = Vec::with_capacity(reader.len() as usize * format.sample_bytes());
    for sample in reader.samples::<i32>() {
        let sample = sample.with_context(|| format!("Failed to read samples from {}", path.display()))?;
        data.extend_from_slice(&sample.to_le_bytes()[..format.sample_bytes()]);
    }

    Ok(PcmSource {
        format,
        rate: spec.sample_rate,
        data,
    })
}

/// Largest period of the configured byte size that the device refills in
/// whole halves
fn stream_geometry(dev: &SpdifDevice<SimulatedTransmitter>, format: SampleFormat) -> Result<(usize, usize)> {
    let half = dev.buffer().half_frames();
    let constraints = dev.constraints();
    let period = constraints.period_bytes() / format.frame_bytes();
    let period = period - period % half;
    if period == 0 {
        bail!(
            "A {} byte period cannot hold {} frames of {}",
            constraints.period_bytes(),
            half,
            format
        );
    }
    Ok((period * constraints.periods as usize, period))
}

/// Application side of the PCM ring: writes one period at a time behind
/// the device's read position
struct Feeder<'a> {
    data: &'a [u8],
    next_byte: usize,
    write_pos: usize,
    period: Vec<u8>,
}

impl<'a> Feeder<'a> {
    fn new(data: &'a [u8], period_bytes: usize) -> Self {
        Self {
            data,
            next_byte: 0,
            write_pos: 0,
            period: vec![0; period_bytes],
        }
    }

    /// Copy the next period of input, zero padded once the input runs out
    fn write_period(&mut self, dev: &mut SpdifDevice<SimulatedTransmitter>) -> Result<()> {
        let end = (self.next_byte + self.period.len()).min(self.data.len());
        let chunk = &self.data[self.next_byte..end];
        self.period[..chunk.len()].copy_from_slice(chunk);
        self.period[chunk.len()..].fill(0);
        self.next_byte = end;

        let stream = dev.stream_mut().context("PCM stream closed during render")?;
        self.write_pos = stream
            .write_frames(self.write_pos, &self.period)
            .context("PCM stream is not prepared")?;
        Ok(())
    }
}

fn write_encoded(out: &mut impl Write, frames: &[EncodedFrame]) -> std::io::Result<()> {
    for word in frames.iter().flatten() {
        out.write_all(&word.to_le_bytes())?;
    }
    Ok(())
}

pub fn execute(args: &RenderArgs, config: &Config) -> Result<RenderSummary> {
    let source = read_wav(&args.input)?;
    let format = source.format;
    let frame_bytes = format.frame_bytes();
    let input_frames = source.data.len() / frame_bytes;

    let (tx, link) = SimulatedTransmitter::new();
    let mut dev = SpdifDevice::new(config, tx)?;
    let (buffer_frames, period_frames) = stream_geometry(&dev, format)?;
    let half_frames = dev.buffer().half_frames();

    tracing::info!(
        "Rendering {} frames of {} at {} Hz: {} frame periods",
        input_frames,
        format,
        source.rate,
        period_frames
    );

    dev.open(PcmStream::new(buffer_frames * frame_bytes, || {}))?;
    dev.prepare(&StreamParams::new(format, source.rate, buffer_frames, period_frames))?;

    let mut feeder = Feeder::new(&source.data, period_frames * frame_bytes);
    for _ in 0..buffer_frames / period_frames {
        feeder.write_period(&mut dev)?;
    }
    dev.trigger(Trigger::Start)?;

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let mut out = BufWriter::new(file);

    // silent prefill, the audio, then at least one block of trailing silence
    let total_frames = 2 * half_frames + input_frames + BLOCK_FRAMES;
    let mut output_frames = 0;
    let mut periods = 0;
    while output_frames < total_frames {
        let completion = link
            .complete_segment()
            .context("Transfer stopped during render")?;
        let half = Half::vacated(completion.residue, dev.buffer().half_bytes());
        write_encoded(&mut out, dev.buffer().half(half))
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
        output_frames += half_frames;

        let outcome = dev.on_segment_consumed(completion.residue);
        for _ in 0..outcome.periods_elapsed {
            feeder.write_period(&mut dev)?;
            periods += 1;
        }
    }

    dev.trigger(Trigger::Stop)?;
    dev.close()?;
    out.flush()
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    tracing::debug!("{} segments consumed", link.segments());

    Ok(RenderSummary {
        format,
        rate: source.rate,
        input_frames,
        output_frames,
        periods,
    })
}
