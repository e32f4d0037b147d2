//! Clock Pulse Generator
//!
//! Fixed-length pulses armed by phasor wraps, syncs and resets.

use crate::port::MAX_VOUT;

/// Default pulse length in seconds
pub const DEFAULT_PULSE_LENGTH: f64 = 1e-3;

/// A retriggerable one-shot.
///
/// Re-arming always restarts the full duration; it never extends a pulse
/// that is already running. The first tick after arming is always high, even
/// when a single sample is longer than the pulse.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PulseGenerator {
    remaining: f64,
    armed: bool,
}

impl PulseGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a pulse of `duration` seconds
    #[inline]
    pub fn arm(&mut self, duration: f64) {
        self.remaining = if duration.is_finite() {
            duration.max(0.0)
        } else {
            0.0
        };
        self.armed = self.remaining > 0.0;
    }

    /// Consume `sample_time` seconds and report whether the pulse is still
    /// high. The output stays high while the elapsed time since arming is
    /// below the duration. Negative or non-finite sample times consume
    /// nothing.
    #[inline]
    pub fn tick(&mut self, sample_time: f64) -> bool {
        let dt = if sample_time.is_finite() {
            sample_time.max(0.0)
        } else {
            0.0
        };
        let fresh = core::mem::take(&mut self.armed);
        self.remaining = (self.remaining - dt).max(0.0);
        fresh || self.remaining > 0.0
    }

    /// Like `tick`, returning the output voltage (0V or 10V)
    #[inline]
    pub fn tick_voltage(&mut self, sample_time: f64) -> f64 {
        if self.tick(sample_time) {
            MAX_VOUT
        } else {
            0.0
        }
    }

    #[inline]
    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    pub fn reset(&mut self) {
        self.remaining = 0.0;
        self.armed = false;
    }
}
