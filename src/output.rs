//! Output Formatting
//!
//! The same four lanes can leave the module on four mono jacks or on the
//! first jack as one 4-channel polyphonic cable. Switching modes only changes
//! how the lanes are exposed.

use crate::port::{ModuleIo, PortId, MAX_VOUT};
use crate::simd::{Float4, SIMD_BLOCK_SIZE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputMode {
    /// One jack per channel
    #[default]
    Mono,
    /// All channels on the first jack
    Poly,
}

impl OutputMode {
    pub fn from_poly(is_poly: bool) -> Self {
        if is_poly {
            OutputMode::Poly
        } else {
            OutputMode::Mono
        }
    }

    pub fn is_poly(self) -> bool {
        self == OutputMode::Poly
    }
}

/// Scale a unit phase to the 0–10V phasor range
#[inline]
pub fn phase_to_voltage(phases: Float4) -> Float4 {
    phases * MAX_VOUT
}

/// Writes a four-lane group onto a run of four output jacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormatter {
    first: PortId,
}

impl OutputFormatter {
    /// Formatter for jacks `first..first + 4`
    pub const fn new(first: PortId) -> Self {
        Self { first }
    }

    #[inline]
    pub fn write(&self, mode: OutputMode, lanes: Float4, io: &mut ModuleIo) {
        match mode {
            OutputMode::Mono => {
                for i in 0..SIMD_BLOCK_SIZE {
                    let port = io.output_mut(self.first + i);
                    port.set_channels(1);
                    port.set_voltage(lanes[i], 0);
                }
            }
            OutputMode::Poly => {
                let port = io.output_mut(self.first);
                port.set_channels(SIMD_BLOCK_SIZE);
                port.set_voltage4(lanes, 0);
                for i in 1..SIMD_BLOCK_SIZE {
                    io.output_mut(self.first + i).set_channels(0);
                }
            }
        }
    }
}
