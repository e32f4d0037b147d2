//! Ronda: Multi-Phase Clock Generator
//!
//! Four phasors locked to a shared leader phase. Each channel runs at its own
//! rate ratio relative to the leader, takes a phase offset, can be re-synced
//! to the leader by a trigger, and emits a clock pulse every time it wraps.
//! A run gate pauses everything; a reset trigger zeroes everything.
//!
//! Per sample the module resolves its controls, runs edge detection, lets the
//! run/reset controller decide what happens, advances the leader, advances or
//! syncs every channel, updates the clock pulses and finally writes the
//! outputs (and the expander message, when a companion is attached).

use crate::config::RondaConfig;
use crate::error::{Result, RondaError};
use crate::expander::{ExpanderContext, RondaExMessage};
use crate::output::{phase_to_voltage, OutputFormatter, OutputMode};
use crate::param::ParameterSource;
use crate::phasor::{
    clamp_ratio, leader_delta, ratio_from_cv, LeaderClock, PhaseAccumulator, SyncPolicy,
    MAX_RATIO,
};
use crate::port::{
    ModuleIo, ParamDef, ParamRange, PortDef, PortSpec, ProcessArgs, RackModule, SignalKind,
};
use crate::pulse::PulseGenerator;
use crate::serialize::RondaState;
use crate::simd::{Float4, SIMD_BLOCK_SIZE};
use crate::trigger::{SchmittTrigger, SchmittTrigger4};

/// Number of phasor channels
pub const PHASORS_LEN: usize = SIMD_BLOCK_SIZE;

/// What the run/reset controller decided for this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transport {
    pub run: bool,
    pub reset: bool,
}

/// Turns the run gate and the reset trigger into a per-tick decision.
///
/// Run is a level (high while the gate is high); reset is an edge and lasts
/// exactly one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunResetController {
    run: SchmittTrigger,
    reset: SchmittTrigger,
}

impl RunResetController {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn update(&mut self, run_voltage: f64, reset_voltage: f64) -> Transport {
        self.run.process(run_voltage);
        let reset = self.reset.process(reset_voltage);
        Transport {
            run: self.run.is_high(),
            reset,
        }
    }

    pub fn reset(&mut self) {
        self.run.reset();
        self.reset.reset();
    }
}

pub struct Ronda {
    io: ModuleIo,
    config: RondaConfig,
    mode: OutputMode,
    leader: LeaderClock,
    phasors: [PhaseAccumulator; PHASORS_LEN],
    pulses: [PulseGenerator; PHASORS_LEN],
    transport: RunResetController,
    sync_triggers: SchmittTrigger4,
}

impl Ronda {
    pub const TYPE_ID: &'static str = "ronda";

    pub const RUN_PARAM: usize = 0;
    pub const RESET_PARAM: usize = 1;
    pub const FREQ_PARAM: usize = 2;
    pub const RATE_PARAM: usize = 3;
    pub const PHASE_PARAM: usize = Self::RATE_PARAM + PHASORS_LEN;
    pub const SYNC_PARAM: usize = Self::PHASE_PARAM + PHASORS_LEN;
    pub const PARAMS_LEN: usize = Self::SYNC_PARAM + PHASORS_LEN;

    pub const RUN_INPUT: usize = 0;
    pub const RESET_INPUT: usize = 1;
    pub const FREQ_INPUT: usize = 2;
    pub const RATE_INPUT: usize = 3;
    pub const PHASE_INPUT: usize = Self::RATE_INPUT + PHASORS_LEN;
    pub const SYNC_INPUT: usize = Self::PHASE_INPUT + PHASORS_LEN;
    pub const INPUTS_LEN: usize = Self::SYNC_INPUT + PHASORS_LEN;

    pub const PHASOR_OUTPUT: usize = 0;
    pub const CLOCK_OUTPUT: usize = Self::PHASOR_OUTPUT + PHASORS_LEN;
    pub const OUTPUTS_LEN: usize = Self::CLOCK_OUTPUT + PHASORS_LEN;

    const PHASOR_OUT: OutputFormatter = OutputFormatter::new(Self::PHASOR_OUTPUT);
    const CLOCK_OUT: OutputFormatter = OutputFormatter::new(Self::CLOCK_OUTPUT);

    /// Ronda with the default configuration
    pub fn new() -> Self {
        Self::build(RondaConfig::default())
    }

    pub fn with_config(config: RondaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RondaConfig) -> Self {
        let (spec, params) = Self::layout(&config);
        tracing::debug!(
            sync_policy = config.sync_policy.name(),
            pulse_length = config.pulse_length,
            "created ronda"
        );
        Self {
            io: ModuleIo::new(spec, params),
            config,
            mode: OutputMode::Mono,
            leader: LeaderClock::new(),
            phasors: [PhaseAccumulator::new(); PHASORS_LEN],
            pulses: [PulseGenerator::new(); PHASORS_LEN],
            transport: RunResetController::new(),
            sync_triggers: SchmittTrigger4::new(),
        }
    }

    fn layout(config: &RondaConfig) -> (PortSpec, Vec<ParamDef>) {
        let mut inputs = vec![
            PortDef::new(Self::RUN_INPUT, "run", SignalKind::Gate),
            PortDef::new(Self::RESET_INPUT, "reset", SignalKind::Trigger),
            PortDef::new(Self::FREQ_INPUT, "freq", SignalKind::VoltPerOctave),
        ];
        let mut params = vec![
            ParamDef::switch(Self::RUN_PARAM, "run", true),
            ParamDef::new(Self::RESET_PARAM, "reset", 0.0, 1.0, 0.0),
            ParamDef::new(Self::FREQ_PARAM, "freq", 0.0, 1.0, 0.25).with_range(
                ParamRange::Exponential {
                    base: config.max_lead_freq + 1.0,
                    multiplier: 1.0,
                    offset: -1.0,
                },
            ),
        ];
        let mut outputs = Vec::with_capacity(Self::OUTPUTS_LEN);

        for i in 0..PHASORS_LEN {
            let name = format!("rate{}", i + 1);
            inputs.push(PortDef::new(
                Self::RATE_INPUT + i,
                name.clone(),
                SignalKind::CvBipolar,
            ));
            params.push(
                ParamDef::new(Self::RATE_PARAM + i, name, -1.0, 1.0, 0.0).with_range(
                    ParamRange::Exponential {
                        base: MAX_RATIO,
                        multiplier: 1.0,
                        offset: 0.0,
                    },
                ),
            );
        }
        for i in 0..PHASORS_LEN {
            let name = format!("phase{}", i + 1);
            inputs.push(PortDef::new(
                Self::PHASE_INPUT + i,
                name.clone(),
                SignalKind::CvUnipolar,
            ));
            params.push(ParamDef::new(Self::PHASE_PARAM + i, name, 0.0, 1.0, 0.0));
        }
        for i in 0..PHASORS_LEN {
            let name = format!("sync{}", i + 1);
            inputs.push(PortDef::new(
                Self::SYNC_INPUT + i,
                name.clone(),
                SignalKind::Trigger,
            ));
            params.push(ParamDef::switch(Self::SYNC_PARAM + i, name, false));
        }
        for i in 0..PHASORS_LEN {
            outputs.push(PortDef::new(
                Self::PHASOR_OUTPUT + i,
                format!("phasor{}", i + 1),
                SignalKind::Phasor,
            ));
        }
        for i in 0..PHASORS_LEN {
            outputs.push(PortDef::new(
                Self::CLOCK_OUTPUT + i,
                format!("clock{}", i + 1),
                SignalKind::Clock,
            ));
        }

        (PortSpec { inputs, outputs }, params)
    }

    /// Lead frequency in Hz: knob display value scaled by the 1V/oct input
    fn leader_delta(&self, sample_time: f64) -> f64 {
        let freq = self.io.param_display(Self::FREQ_PARAM);
        let cv = self.io.input(Self::FREQ_INPUT).normal_voltage(0.0);
        leader_delta(freq, cv, sample_time)
    }

    /// Rate ratios. Patched lanes follow the exponential CV law; knob lanes
    /// already carry the same law in their display value.
    fn rate_ratios(&self) -> Float4 {
        let (raw, connected) = self
            .io
            .resolve4(Self::RATE_INPUT, Self::RATE_PARAM, true);
        Float4::select(connected, raw.map(ratio_from_cv), raw.map(clamp_ratio))
    }

    /// Phase offsets in `[0, 1]`. Patched lanes map 0–10V onto 0–1.
    fn phase_offsets(&self) -> Float4 {
        let (raw, connected) = self
            .io
            .resolve4(Self::PHASE_INPUT, Self::PHASE_PARAM, false);
        Float4::select(
            connected,
            raw.rescale(0.0, 10.0, 0.0, 1.0).clamp(0.0, 1.0),
            raw.map(|x| if x.is_finite() { x } else { 0.0 }),
        )
    }

    // --- Introspection ---

    /// Leader phase in `[0, 1)`
    pub fn leader(&self) -> f64 {
        self.leader.phase()
    }

    /// Phase of channel `index` before its offset is applied
    pub fn phasor(&self, index: usize) -> Result<f64> {
        self.phasors
            .get(index)
            .map(PhaseAccumulator::phase)
            .ok_or(RondaError::ChannelOutOfRange {
                index,
                len: PHASORS_LEN,
            })
    }

    /// Seconds left on channel `index`'s clock pulse
    pub fn pulse_remaining(&self, index: usize) -> Result<f64> {
        self.pulses
            .get(index)
            .map(PulseGenerator::remaining)
            .ok_or(RondaError::ChannelOutOfRange {
                index,
                len: PHASORS_LEN,
            })
    }

    pub fn config(&self) -> &RondaConfig {
        &self.config
    }

    pub fn output_mode(&self) -> OutputMode {
        self.mode
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) {
        if mode != self.mode {
            tracing::debug!(?mode, "ronda output mode changed");
        }
        self.mode = mode;
    }

    pub fn is_output_poly(&self) -> bool {
        self.mode.is_poly()
    }

    pub fn set_output_poly(&mut self, is_poly: bool) {
        self.set_output_mode(OutputMode::from_poly(is_poly));
    }

    pub fn set_sync_policy(&mut self, policy: SyncPolicy) {
        if policy != self.config.sync_policy {
            tracing::debug!(sync_policy = policy.name(), "ronda sync policy changed");
        }
        self.config.sync_policy = policy;
    }

    /// Persisted state as a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state())?)
    }

    /// Restore state from a JSON string. Only text that is not JSON at all
    /// is an error; unknown or malformed keys are skipped.
    pub fn load_json(&mut self, json: &str) -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        self.deserialize_state(&value);
        Ok(())
    }

    fn state(&self) -> RondaState {
        RondaState {
            is_output_poly: self.mode.is_poly(),
            sync_policy: self.config.sync_policy,
        }
    }
}

impl Default for Ronda {
    fn default() -> Self {
        Self::new()
    }
}

impl RackModule for Ronda {
    fn io(&self) -> &ModuleIo {
        &self.io
    }

    fn io_mut(&mut self) -> &mut ModuleIo {
        &mut self.io
    }

    fn process(&mut self, args: &ProcessArgs, expander: ExpanderContext<'_>) {
        let dt = args.sample_time;

        // Resolve controls
        let delta = self.leader_delta(dt);
        let ratios = self.rate_ratios();
        let offsets = self.phase_offsets();
        let (sync_values, _) = self
            .io
            .resolve4(Self::SYNC_INPUT, Self::SYNC_PARAM, false);
        let run_voltage = self.io.resolve_value(Self::RUN_INPUT, Self::RUN_PARAM);
        let reset_voltage = self.io.input(Self::RESET_INPUT).normal_voltage(0.0)
            + self.io.param(Self::RESET_PARAM);

        // Edges
        let sync_edges = self.sync_triggers.process(sync_values);
        let transport = self.transport.update(run_voltage, reset_voltage);

        // Phase state
        let mut events = 0u8;
        if transport.reset {
            self.leader.reset();
            for (i, phasor) in self.phasors.iter_mut().enumerate() {
                if phasor.reset() {
                    events |= 1 << i;
                }
            }
        } else if transport.run {
            self.leader.advance(delta);
            let leader = self.leader.phase();
            let policy = self.config.sync_policy;
            for (i, phasor) in self.phasors.iter_mut().enumerate() {
                let event = if sync_edges & (1 << i) != 0 {
                    phasor.sync(policy, leader, ratios[i])
                } else {
                    phasor.advance(delta, ratios[i])
                };
                if event {
                    events |= 1 << i;
                }
            }
        }

        // Clock pulses
        let mut clocks = Float4::ZERO;
        for (i, pulse) in self.pulses.iter_mut().enumerate() {
            if events & (1 << i) != 0 {
                pulse.arm(self.config.pulse_length);
            }
            clocks[i] = pulse.tick_voltage(dt);
        }

        // Outputs
        let mut phases = Float4::ZERO;
        for (i, phasor) in self.phasors.iter().enumerate() {
            phases[i] = phasor.offset_phase(offsets[i]);
        }
        let volts = phase_to_voltage(phases);
        Self::PHASOR_OUT.write(self.mode, volts, &mut self.io);
        Self::CLOCK_OUT.write(self.mode, clocks, &mut self.io);

        if let Some(bus) = expander.right {
            *bus.producer_mut() = RondaExMessage {
                phasor: volts,
                clock: clocks,
            };
            bus.request_flip();
        }
    }

    fn reset(&mut self) {
        self.leader.reset();
        for phasor in &mut self.phasors {
            phasor.reset();
        }
        for pulse in &mut self.pulses {
            pulse.reset();
        }
        self.transport.reset();
        self.sync_triggers.reset();
    }

    fn type_id(&self) -> &'static str {
        Self::TYPE_ID
    }

    fn serialize_state(&self) -> Option<serde_json::Value> {
        Some(self.state().to_value())
    }

    fn deserialize_state(&mut self, state: &serde_json::Value) {
        let mut restored = self.state();
        restored.merge_from(state);
        self.set_output_poly(restored.is_output_poly);
        self.set_sync_policy(restored.sync_policy);
    }
}
