//! Expander Exchange
//!
//! A core module and the companion placed to its right share a
//! double-buffered message. During a frame the core writes the producer
//! buffer and the companion reads the consumer buffer; the host flips the two
//! after every module has run. Because the host never runs two modules at
//! once, no locking is needed and the companion lags the core by at most one
//! frame.

use crate::param::ParameterSource;
use crate::port::{
    ModuleIo, ParamDef, PortDef, PortSpec, ProcessArgs, RackModule, SignalKind, MAX_VOUT,
};
use crate::simd::{Float4, SIMD_BLOCK_SIZE};

/// Two message slots with a host-driven flip
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DoubleBuffer<T: Copy + Default> {
    slots: [T; 2],
    producer: usize,
    flip_requested: bool,
}

impl<T: Copy + Default> DoubleBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot the writer fills during the current frame
    #[inline]
    pub fn producer_mut(&mut self) -> &mut T {
        &mut self.slots[self.producer]
    }

    /// Slot published at the end of the previous frame
    #[inline]
    pub fn consumer(&self) -> &T {
        &self.slots[1 - self.producer]
    }

    /// Ask the host to publish the producer slot at the end of this frame
    #[inline]
    pub fn request_flip(&mut self) {
        self.flip_requested = true;
    }

    pub fn flip_requested(&self) -> bool {
        self.flip_requested
    }

    /// Called by the host after all modules have processed a frame
    #[inline]
    pub fn flip(&mut self) {
        if self.flip_requested {
            self.producer = 1 - self.producer;
            self.flip_requested = false;
        }
    }
}

/// Per-frame data the core hands to its companion, already in volts
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RondaExMessage {
    pub phasor: Float4,
    pub clock: Float4,
}

pub type ExpanderBus = DoubleBuffer<RondaExMessage>;

/// Buses adjacent to the module being processed
#[derive(Debug, Default)]
pub struct ExpanderContext<'a> {
    /// Bus shared with the module on the left, read side
    pub left: Option<&'a ExpanderBus>,
    /// Bus shared with the module on the right, write side
    pub right: Option<&'a mut ExpanderBus>,
}

impl ExpanderContext<'_> {
    /// Context for a module with no neighbours
    pub fn none() -> Self {
        Self::default()
    }
}

/// Ronda expander.
///
/// Re-exposes the core's phasors as one polyphonic cable, each lane mapped
/// from its 0–1 phase onto a per-channel start/end voltage range, next to a
/// polyphonic copy of the clock pulses.
pub struct RondaEx {
    io: ModuleIo,
}

impl RondaEx {
    pub const TYPE_ID: &'static str = "ronda_ex";

    pub const START_PARAM: usize = 0;
    pub const END_PARAM: usize = Self::START_PARAM + SIMD_BLOCK_SIZE;
    pub const PARAMS_LEN: usize = Self::END_PARAM + SIMD_BLOCK_SIZE;

    pub const START_INPUT: usize = 0;
    pub const END_INPUT: usize = Self::START_INPUT + SIMD_BLOCK_SIZE;
    pub const INPUTS_LEN: usize = Self::END_INPUT + SIMD_BLOCK_SIZE;

    pub const PHASOR_POLY_OUTPUT: usize = 0;
    pub const CLOCK_POLY_OUTPUT: usize = 1;
    pub const OUTPUTS_LEN: usize = 2;

    pub fn new() -> Self {
        let mut inputs = Vec::with_capacity(Self::INPUTS_LEN);
        let mut params = Vec::with_capacity(Self::PARAMS_LEN);
        for i in 0..SIMD_BLOCK_SIZE {
            let name = format!("phasor{}_start", i + 1);
            inputs.push(PortDef::new(
                Self::START_INPUT + i,
                name.clone(),
                SignalKind::CvUnipolar,
            ));
            params.push(ParamDef::new(Self::START_PARAM + i, name, -10.0, 10.0, 0.0));
        }
        for i in 0..SIMD_BLOCK_SIZE {
            let name = format!("phasor{}_end", i + 1);
            inputs.push(PortDef::new(
                Self::END_INPUT + i,
                name.clone(),
                SignalKind::CvUnipolar,
            ));
            params.push(ParamDef::new(Self::END_PARAM + i, name, -10.0, 10.0, 10.0));
        }
        let spec = PortSpec {
            inputs,
            outputs: vec![
                PortDef::new(Self::PHASOR_POLY_OUTPUT, "phasor", SignalKind::Phasor),
                PortDef::new(Self::CLOCK_POLY_OUTPUT, "clock", SignalKind::Clock),
            ],
        };
        let mut io = ModuleIo::new(spec, params);
        io.output_mut(Self::PHASOR_POLY_OUTPUT)
            .set_channels(SIMD_BLOCK_SIZE);
        io.output_mut(Self::CLOCK_POLY_OUTPUT)
            .set_channels(SIMD_BLOCK_SIZE);
        tracing::debug!("created ronda expander");
        Self { io }
    }
}

impl Default for RondaEx {
    fn default() -> Self {
        Self::new()
    }
}

impl RackModule for RondaEx {
    fn io(&self) -> &ModuleIo {
        &self.io
    }

    fn io_mut(&mut self) -> &mut ModuleIo {
        &mut self.io
    }

    fn process(&mut self, _args: &ProcessArgs, expander: ExpanderContext<'_>) {
        let message = expander.left.map(|bus| *bus.consumer()).unwrap_or_default();

        let (start, _) = self.io.resolve4(Self::START_INPUT, Self::START_PARAM, false);
        let (end, _) = self.io.resolve4(Self::END_INPUT, Self::END_PARAM, false);
        let phase = message.phasor.map(|v| v / MAX_VOUT);
        let phasor = start + (end - start) * phase;

        let out = self.io.output_mut(Self::PHASOR_POLY_OUTPUT);
        out.set_channels(SIMD_BLOCK_SIZE);
        out.set_voltage4(phasor, 0);

        let out = self.io.output_mut(Self::CLOCK_POLY_OUTPUT);
        out.set_channels(SIMD_BLOCK_SIZE);
        out.set_voltage4(message.clock, 0);
    }

    fn reset(&mut self) {
        for id in [Self::PHASOR_POLY_OUTPUT, Self::CLOCK_POLY_OUTPUT] {
            self.io.output_mut(id).set_voltage4(Float4::ZERO, 0);
        }
    }

    fn type_id(&self) -> &'static str {
        Self::TYPE_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(phase: f64, clock: f64) -> RondaExMessage {
        RondaExMessage {
            phasor: Float4::splat(phase * MAX_VOUT),
            clock: Float4::splat(clock),
        }
    }

    #[test]
    fn test_double_buffer_flip_publishes_producer() {
        let mut bus: DoubleBuffer<u32> = DoubleBuffer::new();
        *bus.producer_mut() = 7;
        assert_eq!(*bus.consumer(), 0);

        // No request, no flip
        bus.flip();
        assert_eq!(*bus.consumer(), 0);

        bus.request_flip();
        assert!(bus.flip_requested());
        bus.flip();
        assert_eq!(*bus.consumer(), 7);
        assert!(!bus.flip_requested());
    }

    #[test]
    fn test_unlinked_expander_outputs_zero() {
        let mut ex = RondaEx::new();
        ex.process(&ProcessArgs::new(44100.0, 0), ExpanderContext::none());
        let io = ex.io();
        assert_eq!(io.output(RondaEx::PHASOR_POLY_OUTPUT).voltages(), &[0.0; 4]);
        assert_eq!(io.output(RondaEx::CLOCK_POLY_OUTPUT).voltages(), &[0.0; 4]);
    }

    #[test]
    fn test_default_range_passes_phasor_through() {
        let mut bus = ExpanderBus::new();
        *bus.producer_mut() = message(0.25, 10.0);
        bus.request_flip();
        bus.flip();

        let mut ex = RondaEx::new();
        let ctx = ExpanderContext {
            left: Some(&bus),
            right: None,
        };
        ex.process(&ProcessArgs::new(44100.0, 0), ctx);
        let io = ex.io();
        assert_eq!(io.output(RondaEx::PHASOR_POLY_OUTPUT).voltages(), &[2.5; 4]);
        assert_eq!(io.output(RondaEx::CLOCK_POLY_OUTPUT).voltages(), &[10.0; 4]);
    }

    #[test]
    fn test_start_end_mapping() {
        let mut bus = ExpanderBus::new();
        *bus.producer_mut() = message(0.5, 0.0);
        bus.request_flip();
        bus.flip();

        let mut ex = RondaEx::new();
        ex.io_mut().set_param(RondaEx::START_PARAM, -5.0).unwrap();
        ex.io_mut().set_param(RondaEx::END_PARAM, 5.0).unwrap();
        // Inverted range on channel 2
        ex.io_mut().set_param(RondaEx::START_PARAM + 1, 8.0).unwrap();
        ex.io_mut().set_param(RondaEx::END_PARAM + 1, 0.0).unwrap();
        // CV overrides the end knob on channel 3
        ex.io_mut().set_input(RondaEx::END_INPUT + 2, 4.0).unwrap();

        let ctx = ExpanderContext {
            left: Some(&bus),
            right: None,
        };
        ex.process(&ProcessArgs::new(44100.0, 0), ctx);
        let out = ex.io().output(RondaEx::PHASOR_POLY_OUTPUT);
        assert!((out.voltage(0) - 0.0).abs() < 1e-12);
        assert!((out.voltage(1) - 4.0).abs() < 1e-12);
        assert!((out.voltage(2) - 2.0).abs() < 1e-12);
        assert!((out.voltage(3) - 5.0).abs() < 1e-12);
    }
}
