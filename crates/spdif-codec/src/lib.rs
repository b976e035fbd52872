//! IEC 60958 (S/PDIF) software encoder
//!
//! Turns stereo PCM into biphase-mark coded frames ready for a generic serial
//! audio interface clocked at 128 cells per frame.

pub mod channel_status;
pub mod decode;
pub mod frame;
pub mod subframe;
pub mod unpack;

pub use channel_status::{ChannelStatus, ChannelStatusCycle, SampleRate, StatusBit, WordLength};
pub use decode::{decode_frame, DecodeError, DecodedFrame, DecodedSubframe};
pub use frame::{EncodedFrame, FrameEncoder, FRAME_BYTES, FRAME_WORDS};
pub use spdif_core::config::BLOCK_FRAMES;
pub use subframe::{CodedSubframe, Preamble, SubframeCodec, SubframeFlags};
pub use unpack::{SampleFormat, SampleMask, Unpacker};
