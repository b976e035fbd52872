//! `spdif inspect`: decode and check a bitstream file

use anyhow::{bail, Context, Result};
use clap::Args;
use spdif_codec::decode::channel_status_from_block;
use spdif_codec::{
    decode_frame, ChannelStatus, DecodeError, DecodedFrame, EncodedFrame, Preamble, SubframeFlags, BLOCK_FRAMES,
    FRAME_BYTES,
};
use std::fmt;
use std::path::PathBuf;

/// Channel status bits needed to recover the informative bytes
const STATUS_FRAMES: usize = 40;

/// Full scale of the 24-bit audio field
const FULL_SCALE: f64 = 8_388_608.0;

#[derive(Args)]
pub struct InspectArgs {
    /// Bitstream file written by `spdif render`
    pub file: PathBuf,

    /// Decode at most this many frames
    #[arg(long)]
    pub frames: Option<usize>,
}

#[derive(Debug, Default)]
pub struct InspectReport {
    pub frames: usize,
    pub blocks: usize,
    pub first_block: Option<usize>,
    /// Block starts not 192 frames after the previous one
    pub misplaced_blocks: usize,
    /// Subframes flagged as not suitable for conversion
    pub invalid_subframes: usize,
    pub errors: usize,
    pub first_error: Option<(usize, DecodeError)>,
    pub channel_status: Option<ChannelStatus>,
    /// Peak magnitude per channel, left then right
    pub peak: [u32; 2],
}

/// Split a bitstream file into frames of four little-endian words
pub fn parse_frames(bytes: &[u8]) -> Result<Vec<EncodedFrame>> {
    if bytes.len() % FRAME_BYTES != 0 {
        bail!(
            "{} bytes is not a whole number of {}-byte frames",
            bytes.len(),
            FRAME_BYTES
        );
    }

    Ok(bytes
        .chunks_exact(FRAME_BYTES)
        .map(|chunk| {
            let mut frame = EncodedFrame::default();
            for (word, b) in frame.iter_mut().zip(chunk.chunks_exact(4)) {
                *word = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            }
            frame
        })
        .collect())
}

pub fn analyze(frames: &[EncodedFrame]) -> InspectReport {
    let mut report = InspectReport::default();
    let mut last_block: Option<usize> = None;
    // contiguous frames from a block start, for the channel status
    let mut status_frames: Vec<DecodedFrame> = Vec::with_capacity(STATUS_FRAMES);
    let mut collecting = false;

    for (index, frame) in frames.iter().enumerate() {
        report.frames += 1;

        let decoded = match decode_frame(frame) {
            Ok(decoded) => decoded,
            Err(err) => {
                report.errors += 1;
                report.first_error.get_or_insert((index, err));
                if status_frames.len() < STATUS_FRAMES {
                    status_frames.clear();
                    collecting = false;
                }
                continue;
            }
        };

        if decoded.left.preamble == Preamble::B {
            report.blocks += 1;
            match last_block {
                None => report.first_block = Some(index),
                Some(previous) if index - previous != BLOCK_FRAMES => report.misplaced_blocks += 1,
                Some(_) => {}
            }
            last_block = Some(index);

            if status_frames.len() < STATUS_FRAMES {
                status_frames.clear();
                collecting = true;
            }
        }
        if collecting && status_frames.len() < STATUS_FRAMES {
            status_frames.push(decoded);
        }

        for (peak, subframe) in report.peak.iter_mut().zip([decoded.left, decoded.right]) {
            *peak = (*peak).max(subframe.signed_sample().unsigned_abs());
            if subframe.flags.contains(SubframeFlags::VALIDITY) {
                report.invalid_subframes += 1;
            }
        }
    }

    report.channel_status = channel_status_from_block(&status_frames);
    report
}

pub fn execute(args: &InspectArgs) -> Result<InspectReport> {
    let bytes = std::fs::read(&args.file).with_context(|| format!("Failed to read {}", args.file.display()))?;
    let mut frames = parse_frames(&bytes).with_context(|| format!("Invalid bitstream {}", args.file.display()))?;
    if let Some(limit) = args.frames {
        frames.truncate(limit);
    }

    let report = analyze(&frames);
    if let Some((index, err)) = report.first_error {
        tracing::warn!("First decode error at frame {}: {}", index, err);
    }
    Ok(report)
}

fn dbfs(peak: u32) -> String {
    if peak == 0 {
        "-inf dBFS".to_string()
    } else {
        format!("{:.1} dBFS", 20.0 * (f64::from(peak) / FULL_SCALE).log10())
    }
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frames:           {}", self.frames)?;
        match self.first_block {
            Some(first) => writeln!(f, "Blocks:           {} (first at frame {})", self.blocks, first)?,
            None => writeln!(f, "Blocks:           none")?,
        }
        writeln!(f, "Misplaced blocks: {}", self.misplaced_blocks)?;
        writeln!(f, "Decode errors:    {}", self.errors)?;
        writeln!(f, "Invalid samples:  {}", self.invalid_subframes)?;

        if let Some(status) = self.channel_status {
            let rate = status
                .sample_rate()
                .map(|rate| format!("{} Hz", rate.hz()))
                .unwrap_or_else(|| "unknown".to_string());
            writeln!(f, "Channel status:   {:02x?}", status.bytes())?;
            writeln!(f, "  Sample rate:    {}", rate)?;
            writeln!(f, "  Word length:    {:?}", status.word_length())?;
            writeln!(f, "  Flags:          {:?}", status.flags())?;
            writeln!(f, "  Category:       0x{:02x}", status.category())?;
        } else {
            writeln!(f, "Channel status:   not found")?;
        }

        writeln!(f, "Peak left:        {}", dbfs(self.peak[0]))?;
        writeln!(f, "Peak right:       {}", dbfs(self.peak[1]))
    }
}
