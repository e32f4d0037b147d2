//! Serialization and Persistence
//!
//! Ronda persists a small JSON object alongside the host's patch. Loading is
//! forgiving: keys that are missing or carry the wrong type leave the current
//! value in place, so patches saved by older or newer builds still open.

use crate::phasor::SyncPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key holding the output mode flag
pub const OUTPUT_POLY_KEY: &str = "isOutputPoly";

/// Key holding the sync policy
pub const SYNC_POLICY_KEY: &str = "syncPolicy";

/// Persisted Ronda state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RondaState {
    #[serde(rename = "isOutputPoly")]
    pub is_output_poly: bool,

    #[serde(rename = "syncPolicy", default)]
    pub sync_policy: SyncPolicy,
}

impl RondaState {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            OUTPUT_POLY_KEY: self.is_output_poly,
            SYNC_POLICY_KEY: self.sync_policy,
        })
    }

    /// Overlay every well-formed key in `value` onto this state
    pub fn merge_from(&mut self, value: &Value) {
        let Some(object) = value.as_object() else {
            tracing::warn!("ignoring ronda state that is not a JSON object");
            return;
        };

        match object.get(OUTPUT_POLY_KEY) {
            Some(Value::Bool(is_poly)) => self.is_output_poly = *is_poly,
            Some(other) => {
                tracing::warn!(value = %other, "ignoring malformed {}", OUTPUT_POLY_KEY)
            }
            None => {}
        }

        if let Some(raw) = object.get(SYNC_POLICY_KEY) {
            match SyncPolicy::deserialize(raw) {
                Ok(policy) => self.sync_policy = policy,
                Err(err) => {
                    tracing::warn!(%err, "ignoring malformed {}", SYNC_POLICY_KEY)
                }
            }
        }
    }

    /// State restored on top of the defaults
    pub fn from_value(value: &Value) -> Self {
        let mut state = Self::default();
        state.merge_from(value);
        state
    }
}
