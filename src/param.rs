//! Input-or-Control Resolution
//!
//! Every control on the panel has a matching input jack. When a cable is
//! patched the jack wins, otherwise the control's value is used. The
//! `ParameterSource` capability is composed into each module through its
//! port bank rather than inherited.

use crate::port::{ModuleIo, ParamId, PortId};
use crate::simd::{Float4, SIMD_BLOCK_SIZE};

/// Bitmask of lanes whose value came from a patched input
pub type ConnectedMask = u8;

/// Resolves effective values from input jacks and panel controls
pub trait ParameterSource {
    /// Returns `(value, was_input_connected)`.
    ///
    /// With a patched input the instantaneous voltage is returned. Otherwise
    /// the control's raw value, or its display-mapped value when
    /// `use_display` is set.
    fn resolve(&self, input: PortId, param: ParamId, use_display: bool) -> (f64, bool);

    /// Applies `resolve` to four consecutive input/control pairs.
    fn resolve4(
        &self,
        first_input: PortId,
        first_param: ParamId,
        use_display: bool,
    ) -> (Float4, ConnectedMask) {
        let mut values = Float4::ZERO;
        let mut mask = 0;
        for i in 0..SIMD_BLOCK_SIZE {
            let (value, connected) = self.resolve(first_input + i, first_param + i, use_display);
            values[i] = value;
            if connected {
                mask |= 1 << i;
            }
        }
        (values, mask)
    }

    /// Value only, when the connection flag is irrelevant
    fn resolve_value(&self, input: PortId, param: ParamId) -> f64 {
        self.resolve(input, param, false).0
    }
}

impl ParameterSource for ModuleIo {
    #[inline]
    fn resolve(&self, input: PortId, param: ParamId, use_display: bool) -> (f64, bool) {
        let port = self.input(input);
        if port.connected {
            (port.voltage, true)
        } else if use_display {
            (self.param_display(param), false)
        } else {
            (self.param(param), false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{ParamDef, ParamRange, PortDef, PortSpec, SignalKind};

    fn bank() -> ModuleIo {
        let spec = PortSpec {
            inputs: (0..4)
                .map(|i| PortDef::new(i, format!("rate{}", i + 1), SignalKind::CvBipolar))
                .collect(),
            outputs: vec![],
        };
        let params = (0..4)
            .map(|i| {
                ParamDef::new(i, format!("rate{}", i + 1), -1.0, 1.0, 0.0).with_range(
                    ParamRange::Exponential {
                        base: 32.0,
                        multiplier: 1.0,
                        offset: 0.0,
                    },
                )
            })
            .collect();
        ModuleIo::new(spec, params)
    }

    #[test]
    fn test_resolve_prefers_input() {
        let mut io = bank();
        io.set_param(0, 1.0).unwrap();
        assert_eq!(io.resolve(0, 0, false), (1.0, false));
        assert_eq!(io.resolve(0, 0, true), (32.0, false));

        io.set_input(0, -2.5).unwrap();
        assert_eq!(io.resolve(0, 0, true), (-2.5, true));
        assert_eq!(io.resolve_value(0, 0), -2.5);
    }

    #[test]
    fn test_resolve4_builds_mask() {
        let mut io = bank();
        io.set_input(1, 5.0).unwrap();
        io.set_input(3, -5.0).unwrap();
        io.set_param(2, -1.0).unwrap();

        let (values, mask) = io.resolve4(0, 0, true);
        assert_eq!(mask, 0b1010);
        assert_eq!(values.to_array(), [1.0, 5.0, 1.0 / 32.0, -5.0]);
    }

    #[test]
    fn test_resolve4_nothing_patched() {
        let io = bank();
        let (values, mask) = io.resolve4(0, 0, false);
        assert_eq!(mask, 0);
        assert_eq!(values, Float4::ZERO);
    }
}
