//! Ronda configuration, injected at construction.

use crate::error::{Result, RondaError};
use crate::phasor::SyncPolicy;
use crate::pulse::DEFAULT_PULSE_LENGTH;
use serde::{Deserialize, Serialize};

/// Top of the lead frequency knob, in Hz
pub const DEFAULT_MAX_LEAD_FREQ: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RondaConfig {
    /// What a sync edge does to a channel
    pub sync_policy: SyncPolicy,

    /// Clock output pulse length in seconds
    pub pulse_length: f64,

    /// Lead frequency at full knob travel, in Hz
    pub max_lead_freq: f64,
}

impl Default for RondaConfig {
    fn default() -> Self {
        Self {
            sync_policy: SyncPolicy::default(),
            pulse_length: DEFAULT_PULSE_LENGTH,
            max_lead_freq: DEFAULT_MAX_LEAD_FREQ,
        }
    }
}

impl RondaConfig {
    pub fn with_sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    pub fn with_pulse_length(mut self, seconds: f64) -> Self {
        self.pulse_length = seconds;
        self
    }

    pub fn with_max_lead_freq(mut self, hz: f64) -> Self {
        self.max_lead_freq = hz;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.pulse_length.is_finite() && self.pulse_length > 0.0) {
            return Err(RondaError::InvalidConfig(format!(
                "pulse length must be a positive number of seconds, got {}",
                self.pulse_length
            )));
        }
        if !(self.max_lead_freq.is_finite() && self.max_lead_freq > 0.0) {
            return Err(RondaError::InvalidConfig(format!(
                "max lead frequency must be positive, got {}",
                self.max_lead_freq
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RondaConfig::default();
        assert_eq!(config.sync_policy, SyncPolicy::SnapToLeader);
        assert_eq!(config.pulse_length, 0.001);
        assert_eq!(config.max_lead_freq, 80.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RondaConfig::default()
            .with_sync_policy(SyncPolicy::HardReset)
            .with_pulse_length(0.005)
            .with_max_lead_freq(20.0);
        assert_eq!(config.sync_policy, SyncPolicy::HardReset);
        assert_eq!(config.pulse_length, 0.005);
        assert_eq!(config.max_lead_freq, 20.0);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(RondaConfig::default()
            .with_pulse_length(0.0)
            .validate()
            .is_err());
        assert!(RondaConfig::default()
            .with_pulse_length(f64::NAN)
            .validate()
            .is_err());
        assert!(RondaConfig::default()
            .with_max_lead_freq(-1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_json_partial_keys_use_defaults() {
        let config = RondaConfig::from_json(r#"{ "syncPolicy": "reset" }"#).unwrap();
        assert_eq!(config.sync_policy, SyncPolicy::HardReset);
        assert_eq!(config.pulse_length, 0.001);

        let back = RondaConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_json_invalid_values_rejected() {
        assert!(RondaConfig::from_json(r#"{ "pulseLength": -2.0 }"#).is_err());
        assert!(RondaConfig::from_json("not json").is_err());
    }
}
