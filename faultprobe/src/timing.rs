//! The calibrated busy-wait timebase.
//!
//! Every delay in the timing-critical paths is expressed as an integer
//! number of *quanta*, a fixed busy-wait unit in the order of tens of CPU
//! cycles. Protocol bit timing and the glitch delay/pulse widths are all
//! multiples of the same quantum, so reproducing hardware behavior depends
//! on [`Timebase::wait_quantum`] being near-deterministic.

use std::time::{Duration, Instant};

/// Source of all waits used by the transport and the glitch controller.
///
/// Implementations must block the calling thread without yielding to a
/// scheduler: substituting an OS sleep (or any suspension point) stretches
/// individual quanta unpredictably and breaks compatibility with targets
/// that were characterized against the calibrated busy-wait.
pub trait Timebase {
    /// Block for exactly one quantum.
    fn wait_quantum(&mut self);

    /// Block for `quanta` quanta.
    fn wait_quanta(&mut self, quanta: u32) {
        for _ in 0..quanta {
            self.wait_quantum();
        }
    }

    /// Block for a wall-clock interval. Used for coarse, real-time
    /// calibrated waits (power settle), not for protocol timing.
    fn wait_settle(&mut self, interval: Duration);
}

/// Spin-loop [`Timebase`] for bare-metal style deployments.
#[derive(Debug, Clone)]
pub struct SpinTimer {
    spins_per_quantum: u32,
}

impl SpinTimer {
    /// Default calibration, matching the original hardware's 0x20-iteration
    /// countdown loop.
    pub const DEFAULT_SPINS: u32 = 32;

    pub fn new(spins_per_quantum: u32) -> Self {
        Self { spins_per_quantum }
    }
}

impl Default for SpinTimer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SPINS)
    }
}

impl Timebase for SpinTimer {
    fn wait_quantum(&mut self) {
        for _ in 0..self.spins_per_quantum {
            std::hint::spin_loop();
        }
    }

    fn wait_settle(&mut self, interval: Duration) {
        // Spinning instead of sleeping keeps the no-suspension contract even
        // for the coarse waits.
        let start = Instant::now();
        while start.elapsed() < interval {
            std::hint::spin_loop();
        }
    }
}
