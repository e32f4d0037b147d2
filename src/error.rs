//! Error type for everything outside the per-sample path.
//!
//! `process` never fails; these errors come from introspection accessors,
//! configuration validation, rack wiring and state parsing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RondaError {
    #[error("channel {index} out of range (module has {len} channels)")]
    ChannelOutOfRange { index: usize, len: usize },

    #[error("{kind} port {index} out of range (module has {len})")]
    PortOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown module")]
    UnknownModule,

    #[error("cannot attach expander `{right}` to `{left}`")]
    IncompatibleExpander {
        left: &'static str,
        right: &'static str,
    },

    #[error("state: {0}")]
    State(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RondaError>;
