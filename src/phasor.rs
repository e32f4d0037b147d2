//! Phase Accumulation and Sync
//!
//! A single leader phase advances at the lead frequency. Each channel's
//! phasor advances at the leader's delta times its own rate ratio, can be
//! snapped back into line by a sync edge, and reports every wrap so the clock
//! outputs can fire.

use crate::simd::rescale;
use libm::Libm;
use serde::{Deserialize, Serialize};

/// Largest rate ratio, reached at +5V or full-right knob. The smallest is its inverse.
pub const MAX_RATIO: f64 = 32.0;

/// Normalize any value into `[0, 1)`.
///
/// Negative inputs wrap from the top, exact integers map to 0, and
/// non-finite inputs collapse to 0.
#[inline]
pub fn wrap_unit(x: f64) -> f64 {
    if !x.is_finite() {
        return 0.0;
    }
    let r = x.rem_euclid(1.0);
    // rem_euclid can round up to 1.0 for tiny negative inputs
    if r >= 1.0 {
        0.0
    } else {
        r
    }
}

/// Exponential CV-to-ratio law: -5V → 1/32, 0V → 1, +5V → 32.
#[inline]
pub fn ratio_from_cv(cv: f64) -> f64 {
    let exponent = rescale(cv, -5.0, 5.0, -1.0, 1.0).clamp(-1.0, 1.0);
    clamp_ratio(Libm::<f64>::pow(MAX_RATIO, exponent))
}

/// Force a ratio into `[1/32, 32]`; NaN becomes 1.
#[inline]
pub fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        1.0
    } else {
        ratio.clamp(1.0 / MAX_RATIO, MAX_RATIO)
    }
}

/// Phase delta of the leader for one sample.
///
/// `freq_hz` is scaled by one octave per volt of `cv`. Negative or
/// non-finite results are treated as a stopped clock.
#[inline]
pub fn leader_delta(freq_hz: f64, cv: f64, sample_time: f64) -> f64 {
    let delta = freq_hz * Libm::<f64>::exp2(cv) * sample_time;
    if delta.is_finite() && delta > 0.0 {
        delta
    } else {
        0.0
    }
}

/// What a sync edge does to a channel's phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncPolicy {
    /// Jump to the leader's phase scaled by the channel ratio, so the channel
    /// lines up with where it would be had it started with the leader.
    #[default]
    #[serde(rename = "snap")]
    SnapToLeader,

    /// Jump to zero
    #[serde(rename = "reset")]
    HardReset,
}

impl SyncPolicy {
    /// Phase a channel takes on a sync edge
    #[inline]
    pub fn apply(self, leader_phase: f64, ratio: f64) -> f64 {
        match self {
            SyncPolicy::SnapToLeader => wrap_unit(leader_phase * ratio),
            SyncPolicy::HardReset => 0.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SyncPolicy::SnapToLeader => "snap",
            SyncPolicy::HardReset => "reset",
        }
    }
}

/// The reference phase all channel ratios are relative to
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LeaderClock {
    phase: f64,
}

impl LeaderClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `delta`; returns true if the phase wrapped
    #[inline]
    pub fn advance(&mut self, delta: f64) -> bool {
        let next = self.phase + delta;
        self.phase = wrap_unit(next);
        !(0.0..1.0).contains(&next)
    }

    #[inline]
    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// One channel's phase before its phase offset is applied
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseAccumulator {
    phase: f64,
}

impl PhaseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Advance by `leader_delta * ratio`. Returns true when the phase crossed
    /// the end of the cycle, including multi-cycle jumps.
    #[inline]
    pub fn advance(&mut self, leader_delta: f64, ratio: f64) -> bool {
        let next = self.phase + leader_delta * ratio;
        self.phase = wrap_unit(next);
        !(0.0..1.0).contains(&next)
    }

    /// Apply a sync edge. Always counts as a wrap event.
    #[inline]
    pub fn sync(&mut self, policy: SyncPolicy, leader_phase: f64, ratio: f64) -> bool {
        self.phase = policy.apply(leader_phase, ratio);
        true
    }

    /// Force the phase to zero. Always counts as a wrap event.
    #[inline]
    pub fn reset(&mut self) -> bool {
        self.phase = 0.0;
        true
    }

    /// Output phase with `offset` added, wrapped into `[0, 1)`
    #[inline]
    pub fn offset_phase(&self, offset: f64) -> f64 {
        wrap_unit(self.phase + offset)
    }
}
