//! Signal Conventions and Port System
//!
//! This module defines the signal kinds, port and parameter definitions, the
//! live port bank each module owns, and the `RackModule` interface the host
//! drives once per sample.

use crate::error::{Result, RondaError};
use crate::expander::ExpanderContext;
use crate::simd::{Float4, SIMD_BLOCK_SIZE};
use libm::Libm;
use serde::{Deserialize, Serialize};

/// Unique identifier for a port within a module
pub type PortId = usize;

/// Unique identifier for a parameter within a module
pub type ParamId = usize;

/// Maximum number of channels a polyphonic cable carries
pub const MAX_CHANNELS: usize = 16;

/// Full-scale voltage of phasor and clock outputs
pub const MAX_VOUT: f64 = 10.0;

/// Semantic signal classification following hardware modular conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// Bipolar control voltage, ±5V (rate CV)
    CvBipolar,

    /// Unipolar control voltage, 0–10V (phase CV, start/end voltages)
    CvUnipolar,

    /// Pitch-style CV following 1V/octave
    VoltPerOctave,

    /// Gate signal, held high while active (run)
    Gate,

    /// Trigger signal, only the rising edge matters (reset, sync)
    Trigger,

    /// Clock pulses, 0V or 10V
    Clock,

    /// Phase ramp scaled to 0–10V
    Phasor,
}

/// Definition of a single port (input or output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortDef {
    pub id: PortId,
    pub name: String,
    pub kind: SignalKind,
    /// Voltage read when no cable is connected
    pub default: f64,
}

impl PortDef {
    pub fn new(id: PortId, name: impl Into<String>, kind: SignalKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            default: 0.0,
        }
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }
}

/// Specification of all ports for a module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortSpec {
    pub inputs: Vec<PortDef>,
    pub outputs: Vec<PortDef>,
}

impl PortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_by_name(&self, name: &str) -> Option<&PortDef> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output_by_name(&self, name: &str) -> Option<&PortDef> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Mapping from a control's stored value to the value shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamRange {
    /// `raw * multiplier + offset`
    Linear { multiplier: f64, offset: f64 },

    /// `base^raw * multiplier + offset`, for frequency and ratio knobs
    Exponential {
        base: f64,
        multiplier: f64,
        offset: f64,
    },
}

impl ParamRange {
    pub const IDENTITY: ParamRange = ParamRange::Linear {
        multiplier: 1.0,
        offset: 0.0,
    };

    pub fn apply(&self, raw: f64) -> f64 {
        match *self {
            ParamRange::Linear { multiplier, offset } => raw * multiplier + offset,
            ParamRange::Exponential {
                base,
                multiplier,
                offset,
            } => Libm::<f64>::pow(base, raw) * multiplier + offset,
        }
    }
}

/// Parameter definition: bounds, default and display mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub id: ParamId,
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub range: ParamRange,
}

impl ParamDef {
    pub fn new(id: ParamId, name: impl Into<String>, min: f64, max: f64, default: f64) -> Self {
        Self {
            id,
            name: name.into(),
            min,
            max,
            default,
            range: ParamRange::IDENTITY,
        }
    }

    /// Two-position switch, 0 or 1
    pub fn switch(id: ParamId, name: impl Into<String>, default: bool) -> Self {
        Self::new(id, name, 0.0, 1.0, if default { 1.0 } else { 0.0 })
    }

    pub fn with_range(mut self, range: ParamRange) -> Self {
        self.range = range;
        self
    }

    /// Clamp a requested value into bounds; non-finite values fall back to the default
    pub fn sanitize(&self, value: f64) -> f64 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.default
        }
    }

    pub fn display(&self, raw: f64) -> f64 {
        self.range.apply(raw)
    }
}

/// One input jack: its instantaneous voltage and whether a cable is plugged in
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputPort {
    pub voltage: f64,
    pub connected: bool,
}

impl InputPort {
    /// Voltage if connected, `normal` otherwise
    #[inline]
    pub fn normal_voltage(&self, normal: f64) -> f64 {
        if self.connected {
            self.voltage
        } else {
            normal
        }
    }
}

/// One output jack carrying up to `MAX_CHANNELS` lanes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputPort {
    voltages: [f64; MAX_CHANNELS],
    channels: usize,
}

impl Default for OutputPort {
    fn default() -> Self {
        Self {
            voltages: [0.0; MAX_CHANNELS],
            channels: 1,
        }
    }
}

impl OutputPort {
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Set the channel count; lanes above the new count are zeroed
    #[inline]
    pub fn set_channels(&mut self, channels: usize) {
        let channels = channels.min(MAX_CHANNELS);
        for v in &mut self.voltages[channels..] {
            *v = 0.0;
        }
        self.channels = channels;
    }

    #[inline]
    pub fn voltage(&self, channel: usize) -> f64 {
        if channel < self.channels {
            self.voltages[channel]
        } else {
            0.0
        }
    }

    #[inline]
    pub fn set_voltage(&mut self, voltage: f64, channel: usize) {
        if channel < MAX_CHANNELS {
            self.voltages[channel] = voltage;
        }
    }

    /// Write four consecutive lanes starting at `first`
    #[inline]
    pub fn set_voltage4(&mut self, lanes: Float4, first: usize) {
        for i in 0..SIMD_BLOCK_SIZE {
            self.set_voltage(lanes[i], first + i);
        }
    }

    /// The active lanes
    pub fn voltages(&self) -> &[f64] {
        &self.voltages[..self.channels]
    }
}

/// Live port bank of a module instance.
///
/// Allocated once at construction; the per-sample path only reads and
/// writes existing slots.
#[derive(Debug, Clone)]
pub struct ModuleIo {
    spec: PortSpec,
    param_defs: Vec<ParamDef>,
    params: Vec<f64>,
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
}

impl ModuleIo {
    pub fn new(spec: PortSpec, param_defs: Vec<ParamDef>) -> Self {
        let params = param_defs.iter().map(|p| p.default).collect();
        let inputs = spec
            .inputs
            .iter()
            .map(|p| InputPort {
                voltage: p.default,
                connected: false,
            })
            .collect();
        let outputs = vec![OutputPort::default(); spec.outputs.len()];
        Self {
            spec,
            param_defs,
            params,
            inputs,
            outputs,
        }
    }

    pub fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    pub fn param_defs(&self) -> &[ParamDef] {
        &self.param_defs
    }

    #[inline]
    pub fn input(&self, id: PortId) -> &InputPort {
        &self.inputs[id]
    }

    #[inline]
    pub fn output(&self, id: PortId) -> &OutputPort {
        &self.outputs[id]
    }

    #[inline]
    pub fn output_mut(&mut self, id: PortId) -> &mut OutputPort {
        &mut self.outputs[id]
    }

    /// Raw stored value of a control
    #[inline]
    pub fn param(&self, id: ParamId) -> f64 {
        self.params[id]
    }

    /// Display-mapped value of a control
    #[inline]
    pub fn param_display(&self, id: ParamId) -> f64 {
        self.param_defs[id].display(self.params[id])
    }

    /// Set a control, clamped to its bounds
    pub fn set_param(&mut self, id: ParamId, value: f64) -> Result<()> {
        let len = self.params.len();
        let def = self.param_defs.get(id).ok_or(RondaError::PortOutOfRange {
            kind: "param",
            index: id,
            len,
        })?;
        self.params[id] = def.sanitize(value);
        Ok(())
    }

    /// Patch a cable into an input and set its voltage
    pub fn set_input(&mut self, id: PortId, voltage: f64) -> Result<()> {
        let len = self.inputs.len();
        let port = self.inputs.get_mut(id).ok_or(RondaError::PortOutOfRange {
            kind: "input",
            index: id,
            len,
        })?;
        port.voltage = voltage;
        port.connected = true;
        Ok(())
    }

    /// Unplug an input; it falls back to its default voltage
    pub fn disconnect_input(&mut self, id: PortId) -> Result<()> {
        let len = self.inputs.len();
        let default = self
            .spec
            .inputs
            .get(id)
            .map(|p| p.default)
            .ok_or(RondaError::PortOutOfRange {
                kind: "input",
                index: id,
                len,
            })?;
        self.inputs[id] = InputPort {
            voltage: default,
            connected: false,
        };
        Ok(())
    }

    /// Checked output lookup for callers outside the process path
    pub fn try_output(&self, id: PortId) -> Result<&OutputPort> {
        self.outputs.get(id).ok_or(RondaError::PortOutOfRange {
            kind: "output",
            index: id,
            len: self.outputs.len(),
        })
    }
}

/// Timing information for one call to `process`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessArgs {
    pub sample_rate: f64,
    pub sample_time: f64,
    pub frame: u64,
}

impl ProcessArgs {
    pub fn new(sample_rate: f64, frame: u64) -> Self {
        Self {
            sample_rate,
            sample_time: 1.0 / sample_rate,
            frame,
        }
    }
}

/// Type-erased module interface driven by the host once per sample
pub trait RackModule: Send {
    /// Port bank (read side)
    fn io(&self) -> &ModuleIo;

    /// Port bank (write side), used by the host to patch cables and turn knobs
    fn io_mut(&mut self) -> &mut ModuleIo;

    /// Process one sample. Must not allocate, block or fail.
    fn process(&mut self, args: &ProcessArgs, expander: ExpanderContext<'_>);

    /// Return all internal state to its power-on values
    fn reset(&mut self);

    /// Module type identifier for serialization and expander matching
    fn type_id(&self) -> &'static str {
        "unknown"
    }

    fn port_spec(&self) -> &PortSpec {
        self.io().port_spec()
    }

    /// Persisted per-instance state
    fn serialize_state(&self) -> Option<serde_json::Value> {
        None
    }

    /// Restore persisted state; unknown or malformed keys are ignored
    fn deserialize_state(&mut self, _state: &serde_json::Value) {}
}
