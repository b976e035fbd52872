//! Silence/live switch shared by the control path and the completion handler
//!
//! Zero means live audio. Any other value means silence, and counts the
//! silent refill cycles for diagnostics. Every transition is one atomic
//! operation, so a start racing a late completion cannot be undone by it.

use std::sync::atomic::{AtomicU32, Ordering};

/// Value meaning "streaming disabled"
pub const DISABLED: u32 = 1;

#[derive(Debug)]
pub struct IdleCounter(AtomicU32);

impl IdleCounter {
    /// A counter in the disabled state
    pub fn new() -> Self {
        Self(AtomicU32::new(DISABLED))
    }

    /// Enable live audio. Returns the previous count.
    pub fn start(&self) -> u32 {
        self.0.swap(0, Ordering::AcqRel)
    }

    /// Fall back to silence if currently live. A counter that is already
    /// counting keeps its value. Returns the previous count.
    pub fn disable(&self) -> u32 {
        match self.0.compare_exchange(0, DISABLED, Ordering::AcqRel, Ordering::Acquire) {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// Account one refill cycle. Increments (saturating) only when non-zero
    /// and returns whether the cycle must be silent.
    pub fn tick(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count != 0).then(|| count.saturating_add(1))
            })
            .is_ok()
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_live(&self) -> bool {
        self.count() == 0
    }
}

impl Default for IdleCounter {
    fn default() -> Self {
        Self::new()
    }
}
