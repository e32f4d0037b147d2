//! Edge Detection with Hysteresis
//!
//! Turns continuous voltages into logic levels. A trigger goes high once the
//! input reaches the high threshold and only goes low again after the input
//! falls to the low threshold, so noise around a single threshold cannot
//! chatter.

use crate::simd::{Float4, SIMD_BLOCK_SIZE};

/// Low threshold used by every logic input, in volts
pub const LOW_THRESHOLD: f64 = 0.1;

/// High threshold used by every logic input, in volts
pub const HIGH_THRESHOLD: f64 = 1.0;

/// Schmitt trigger.
///
/// Starts in the high state, so an input that is already high when the
/// module powers up does not count as an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchmittTrigger {
    high: bool,
}

impl Default for SchmittTrigger {
    fn default() -> Self {
        Self { high: true }
    }
}

impl SchmittTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample with explicit thresholds. Returns true on the tick the
    /// state changes from low to high.
    #[inline]
    pub fn process_with(&mut self, input: f64, low: f64, high: f64) -> bool {
        if self.high {
            if input <= low {
                self.high = false;
            }
            false
        } else if input >= high {
            self.high = true;
            true
        } else {
            false
        }
    }

    /// Feed one sample with the standard 0.1V / 1.0V thresholds
    #[inline]
    pub fn process(&mut self, input: f64) -> bool {
        self.process_with(input, LOW_THRESHOLD, HIGH_THRESHOLD)
    }

    #[inline]
    pub fn is_high(&self) -> bool {
        self.high
    }

    pub fn reset(&mut self) {
        self.high = true;
    }
}

/// Four independent Schmitt triggers, one per lane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchmittTrigger4 {
    lanes: [SchmittTrigger; SIMD_BLOCK_SIZE],
}

impl SchmittTrigger4 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample per lane. Bit `i` of the result is set when lane `i`
    /// rose this tick.
    #[inline]
    pub fn process(&mut self, inputs: Float4) -> u8 {
        let mut rising = 0;
        for (i, lane) in self.lanes.iter_mut().enumerate() {
            if lane.process(inputs[i]) {
                rising |= 1 << i;
            }
        }
        rising
    }

    pub fn reset(&mut self) {
        for lane in &mut self.lanes {
            lane.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initially_high_suppresses_startup_edge() {
        let mut t = SchmittTrigger::new();
        assert!(!t.process(10.0));
        assert!(t.is_high());
    }

    #[test]
    fn test_rising_edge_after_low() {
        let mut t = SchmittTrigger::new();
        assert!(!t.process(0.0));
        assert!(!t.is_high());
        assert!(t.process(1.0));
        // Held high: no second edge
        assert!(!t.process(5.0));
        assert!(t.is_high());
    }

    #[test]
    fn test_hysteresis_band() {
        let mut t = SchmittTrigger::new();
        t.process(0.0);

        // Inside the band nothing changes
        assert!(!t.process(0.5));
        assert!(!t.process(0.99));
        assert!(!t.is_high());

        assert!(t.process(1.0));

        // Dipping into the band does not re-arm
        assert!(!t.process(0.5));
        assert!(!t.process(2.0));

        // Dropping to the low threshold does
        assert!(!t.process(0.1));
        assert!(t.process(1.5));
    }

    #[test]
    fn test_nan_input_holds_state() {
        let mut t = SchmittTrigger::new();
        t.process(0.0);
        assert!(!t.process(f64::NAN));
        assert!(!t.is_high());
    }

    #[test]
    fn test_four_lanes_independent() {
        let mut t = SchmittTrigger4::new();
        assert_eq!(t.process(Float4::splat(0.0)), 0);

        let rising = t.process(Float4([10.0, 0.0, 0.5, 1.0]));
        assert_eq!(rising, 0b1001);
        // Lane 2 sits inside the hysteresis band and stays low
        assert_eq!(t.process(Float4([10.0, 0.0, 0.5, 1.0])), 0);

        assert_eq!(t.process(Float4([10.0, 10.0, 10.0, 10.0])), 0b0110);
    }
}
