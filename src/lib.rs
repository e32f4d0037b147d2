//! # Ronda: Multi-Phase Clock Generator
//!
//! `ronda` provides four phasors locked to a shared leader clock, each running
//! at its own rate ratio with its own phase offset, sync trigger and clock
//! output. A companion expander re-exposes the phasors as a polyphonic cable
//! mapped onto per-channel voltage ranges.
//!
//! ## Architecture
//!
//! - **Port System** - Signal conventions, parameter definitions, port banks and the `RackModule` interface
//! - **Building Blocks** - Edge detection, phase accumulators, pulse generators and output formatting
//! - **Modules** - `Ronda` and its `RondaEx` expander
//! - **Rack Host** - Runs modules frame by frame and carries expander messages between neighbours
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ronda::prelude::*;
//!
//! let mut rack = Rack::new(44100.0).unwrap();
//! let core = rack.add("ronda", Ronda::new());
//! let ex = rack.add("ronda_ex", RondaEx::new());
//! rack.link_expander(core, ex).unwrap();
//!
//! // Second channel at twice the leader rate
//! rack.set_param(core, Ronda::RATE_PARAM + 1, 0.2).unwrap();
//!
//! rack.process_frame();
//! let phase = rack.output(core, Ronda::PHASOR_OUTPUT + 1).unwrap().voltage(0);
//! ```

pub mod config;
pub mod error;
pub mod expander;
pub mod output;
pub mod param;
pub mod phasor;
pub mod port;
pub mod pulse;
pub mod rack;
pub mod ronda;
pub mod serialize;
pub mod simd;
pub mod trigger;

/// Prelude module for convenient imports
pub mod prelude {
    // Port System
    pub use crate::param::{ConnectedMask, ParameterSource};
    pub use crate::port::{
        InputPort, ModuleIo, OutputPort, ParamDef, ParamId, ParamRange, PortDef, PortId, PortSpec,
        ProcessArgs, RackModule, SignalKind, MAX_VOUT,
    };

    // Building Blocks
    pub use crate::output::{OutputFormatter, OutputMode};
    pub use crate::phasor::{LeaderClock, PhaseAccumulator, SyncPolicy};
    pub use crate::pulse::PulseGenerator;
    pub use crate::simd::{Float4, SIMD_BLOCK_SIZE};
    pub use crate::trigger::{SchmittTrigger, SchmittTrigger4};

    // Modules
    pub use crate::expander::{DoubleBuffer, ExpanderBus, ExpanderContext, RondaEx, RondaExMessage};
    pub use crate::ronda::{Ronda, RunResetController, Transport};

    // Rack Host
    pub use crate::rack::{ModuleId, Rack};

    // Configuration, errors and persistence
    pub use crate::config::RondaConfig;
    pub use crate::error::{Result, RondaError};
    pub use crate::serialize::RondaState;
}

// Re-export key types at crate root for convenience
pub use prelude::*;
