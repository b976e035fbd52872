//! Streaming side of the software S/PDIF output
//!
//! This crate keeps a double buffer of encoded frames full while a cyclic
//! transfer drains it, switches between live audio and silence, and reports
//! consumed periods back to the audio framework.

pub mod buffer;
pub mod device;
pub mod idle;
pub mod pcm;
pub mod refill;
pub mod transmitter;

pub use buffer::{Half, ReaderState, StreamBuffer};
pub use device::{SpdifDevice, Trigger};
pub use idle::IdleCounter;
pub use pcm::{HwConstraints, PcmRuntime, PcmStream, StreamParams};
pub use refill::{FillSource, RefillController, RefillOutcome, RefillStats};
pub use transmitter::{
    Completion, CyclicTransfer, SimulatedLink, SimulatedTransmitter, TransferCookie, Transmitter,
};
