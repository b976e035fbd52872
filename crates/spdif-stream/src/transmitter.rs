//! Hardware transmitter interface
//!
//! The transmitter owns the cyclic transfer over the stream buffer. It calls
//! back into [`SpdifDevice::on_segment_consumed`](crate::SpdifDevice::on_segment_consumed)
//! each time it finishes a segment (half of the buffer).

use parking_lot::Mutex;
use spdif_core::TransmitterError;
use std::sync::Arc;

/// Cyclic transfer description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclicTransfer {
    /// Start address of the stream buffer
    pub base: usize,
    /// Total length in bytes
    pub len: usize,
    /// Bytes per completion notification
    pub period_len: usize,
}

/// Handle of a submitted transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferCookie(pub u32);

pub trait Transmitter {
    /// Start draining `transfer` cyclically
    fn submit_cyclic(&mut self, transfer: CyclicTransfer) -> Result<TransferCookie, TransmitterError>;

    /// Abort every transfer in flight
    fn terminate_all(&mut self);
}

/// A finished segment, as reported by [`SimulatedLink::complete_segment`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Byte offset of the segment just consumed
    pub offset: usize,
    /// Bytes left before the end of the buffer
    pub residue: usize,
}

#[derive(Debug, Default)]
struct LinkState {
    active: Option<CyclicTransfer>,
    position: usize,
    next_cookie: u32,
    submissions: usize,
    terminations: usize,
    segments: u64,
    failures_pending: usize,
}

/// Transmitter without hardware. The paired [`SimulatedLink`] plays the
/// serializer's part: it advances through the buffer and reports residues.
#[derive(Debug)]
pub struct SimulatedTransmitter {
    state: Arc<Mutex<LinkState>>,
}

/// Test and tooling side of a [`SimulatedTransmitter`]
#[derive(Debug, Clone)]
pub struct SimulatedLink {
    state: Arc<Mutex<LinkState>>,
}

impl SimulatedTransmitter {
    pub fn new() -> (Self, SimulatedLink) {
        let state = Arc::new(Mutex::new(LinkState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimulatedLink { state },
        )
    }
}

impl Transmitter for SimulatedTransmitter {
    fn submit_cyclic(&mut self, transfer: CyclicTransfer) -> Result<TransferCookie, TransmitterError> {
        let mut state = self.state.lock();
        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return Err(TransmitterError::DescriptorUnavailable);
        }

        state.next_cookie += 1;
        state.submissions += 1;
        state.position = 0;
        state.active = Some(transfer);
        tracing::debug!(
            "Cyclic transfer {} submitted: {} bytes in {} byte segments",
            state.next_cookie,
            transfer.len,
            transfer.period_len
        );
        Ok(TransferCookie(state.next_cookie))
    }

    fn terminate_all(&mut self) {
        let mut state = self.state.lock();
        state.active = None;
        state.position = 0;
        state.terminations += 1;
    }
}

impl SimulatedLink {
    /// Consume the next segment. Returns `None` when no transfer is running.
    pub fn complete_segment(&self) -> Option<Completion> {
        let mut state = self.state.lock();
        let transfer = state.active?;

        let offset = state.position;
        state.position = (offset + transfer.period_len) % transfer.len;
        state.segments += 1;

        Some(Completion {
            offset,
            residue: transfer.len - state.position,
        })
    }

    /// Make the next `count` submissions fail
    pub fn fail_next_submissions(&self, count: usize) {
        self.state.lock().failures_pending = count;
    }

    pub fn active(&self) -> Option<CyclicTransfer> {
        self.state.lock().active
    }

    pub fn submissions(&self) -> usize {
        self.state.lock().submissions
    }

    pub fn terminations(&self) -> usize {
        self.state.lock().terminations
    }

    pub fn segments(&self) -> u64 {
        self.state.lock().segments
    }
}
