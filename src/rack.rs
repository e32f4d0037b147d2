//! Rack Host
//!
//! A minimal host for driving modules one frame at a time. Modules live in a
//! slot map and run in insertion order. Expander links join a core module to
//! the companion on its right through a shared double buffer; the host flips
//! every buffer once all modules have processed the frame.

use crate::error::{Result, RondaError};
use crate::expander::{ExpanderBus, ExpanderContext, RondaEx};
use crate::port::{OutputPort, ParamId, PortId, ProcessArgs, RackModule};
use crate::ronda::Ronda;
use slotmap::{DefaultKey, SlotMap};

/// Unique identifier for a module in the rack
pub type ModuleId = DefaultKey;

struct Slot {
    module: Box<dyn RackModule>,
    name: String,
}

/// Core module on the left, companion on the right
struct Link {
    left: ModuleId,
    right: ModuleId,
    bus: ExpanderBus,
}

pub struct Rack {
    modules: SlotMap<ModuleId, Slot>,
    order: Vec<ModuleId>,
    links: Vec<Link>,
    sample_rate: f64,
    frame: u64,
}

impl Rack {
    /// Empty rack. The sample rate must be finite and positive.
    pub fn new(sample_rate: f64) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(RondaError::InvalidConfig(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }
        Ok(Self {
            modules: SlotMap::new(),
            order: Vec::new(),
            links: Vec::new(),
            sample_rate,
            frame: 0,
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Frames processed since creation or the last reset
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn add<M: RackModule + 'static>(&mut self, name: impl Into<String>, module: M) -> ModuleId {
        self.add_boxed(name, Box::new(module))
    }

    pub fn add_boxed(&mut self, name: impl Into<String>, module: Box<dyn RackModule>) -> ModuleId {
        let name = name.into();
        tracing::debug!(%name, type_id = module.type_id(), "adding module");
        let id = self.modules.insert(Slot { module, name });
        self.order.push(id);
        id
    }

    /// Remove a module and any expander link it takes part in
    pub fn remove(&mut self, id: ModuleId) -> Result<()> {
        let slot = self.modules.remove(id).ok_or(RondaError::UnknownModule)?;
        tracing::debug!(name = %slot.name, "removed module");
        self.order.retain(|&m| m != id);
        self.links.retain(|link| link.left != id && link.right != id);
        Ok(())
    }

    /// Attach a companion expander to the right of a core module.
    ///
    /// Any link either side already had is replaced.
    pub fn link_expander(&mut self, left: ModuleId, right: ModuleId) -> Result<()> {
        let left_type = self.module(left)?.type_id();
        let right_type = self.module(right)?.type_id();
        if left_type != Ronda::TYPE_ID || right_type != RondaEx::TYPE_ID {
            tracing::warn!(left = left_type, right = right_type, "rejected expander link");
            return Err(RondaError::IncompatibleExpander {
                left: left_type,
                right: right_type,
            });
        }

        self.links
            .retain(|link| link.left != left && link.right != right);
        self.links.push(Link {
            left,
            right,
            bus: ExpanderBus::new(),
        });
        tracing::debug!("linked expander");
        Ok(())
    }

    /// Detach whatever companion sits to the right of `left`
    pub fn unlink_expander(&mut self, left: ModuleId) -> bool {
        let before = self.links.len();
        self.links.retain(|link| link.left != left);
        self.links.len() != before
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn module(&self, id: ModuleId) -> Result<&dyn RackModule> {
        self.modules
            .get(id)
            .map(|slot| slot.module.as_ref())
            .ok_or(RondaError::UnknownModule)
    }

    pub fn module_mut(&mut self, id: ModuleId) -> Result<&mut (dyn RackModule + 'static)> {
        self.modules
            .get_mut(id)
            .map(|slot| slot.module.as_mut())
            .ok_or(RondaError::UnknownModule)
    }

    pub fn name(&self, id: ModuleId) -> Option<&str> {
        self.modules.get(id).map(|slot| slot.name.as_str())
    }

    pub fn set_param(&mut self, id: ModuleId, param: ParamId, value: f64) -> Result<()> {
        self.module_mut(id)?.io_mut().set_param(param, value)
    }

    pub fn set_input(&mut self, id: ModuleId, port: PortId, voltage: f64) -> Result<()> {
        self.module_mut(id)?.io_mut().set_input(port, voltage)
    }

    pub fn disconnect_input(&mut self, id: ModuleId, port: PortId) -> Result<()> {
        self.module_mut(id)?.io_mut().disconnect_input(port)
    }

    pub fn output(&self, id: ModuleId, port: PortId) -> Result<&OutputPort> {
        self.module(id)?.io().try_output(port)
    }

    /// Run every module once, then publish every expander message
    pub fn process_frame(&mut self) {
        let args = ProcessArgs::new(self.sample_rate, self.frame);

        for &id in &self.order {
            let Some(slot) = self.modules.get_mut(id) else {
                continue;
            };

            let mut context = ExpanderContext::none();
            for link in self.links.iter_mut() {
                if link.left == id {
                    context.right = Some(&mut link.bus);
                } else if link.right == id {
                    context.left = Some(&link.bus);
                }
            }

            slot.module.process(&args, context);
        }

        for link in &mut self.links {
            link.bus.flip();
        }
        self.frame += 1;
    }

    pub fn run(&mut self, frames: u64) {
        for _ in 0..frames {
            self.process_frame();
        }
    }

    /// Reset every module and clear the expander buses
    pub fn reset(&mut self) {
        for slot in self.modules.values_mut() {
            slot.module.reset();
        }
        for link in &mut self.links {
            link.bus = ExpanderBus::new();
        }
        self.frame = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::SIMD_BLOCK_SIZE;
    use approx::assert_abs_diff_eq;

    fn linked_rack() -> (Rack, ModuleId, ModuleId) {
        let mut rack = Rack::new(44100.0).unwrap();
        let core = rack.add("ronda", Ronda::new());
        let ex = rack.add("ronda_ex", RondaEx::new());
        rack.link_expander(core, ex).unwrap();
        (rack, core, ex)
    }

    fn core_phasors(rack: &Rack, core: ModuleId) -> [f64; SIMD_BLOCK_SIZE] {
        let mut lanes = [0.0; SIMD_BLOCK_SIZE];
        for (i, lane) in lanes.iter_mut().enumerate() {
            *lane = rack
                .output(core, Ronda::PHASOR_OUTPUT + i)
                .unwrap()
                .voltage(0);
        }
        lanes
    }

    fn assert_lanes_eq(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert_abs_diff_eq!(*a, *e, epsilon = 1e-12);
        }
    }

    fn ex_phasors(rack: &Rack, ex: ModuleId) -> Vec<f64> {
        rack.output(ex, RondaEx::PHASOR_POLY_OUTPUT)
            .unwrap()
            .voltages()
            .to_vec()
    }

    #[test]
    fn test_rejects_bad_sample_rate() {
        for sr in [0.0, -44100.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(Rack::new(sr), Err(RondaError::InvalidConfig(_))));
        }
        assert_eq!(Rack::new(96000.0).unwrap().sample_rate(), 96000.0);
    }

    #[test]
    fn test_add_and_remove() {
        let (mut rack, core, ex) = linked_rack();
        assert_eq!(rack.module_count(), 2);
        assert_eq!(rack.name(core), Some("ronda"));
        assert_eq!(rack.link_count(), 1);

        rack.remove(ex).unwrap();
        assert_eq!(rack.module_count(), 1);
        assert_eq!(rack.link_count(), 0);
        assert!(matches!(rack.remove(ex), Err(RondaError::UnknownModule)));
        assert!(rack.output(ex, 0).is_err());
    }

    #[test]
    fn test_expander_lags_one_frame() {
        let (mut rack, core, ex) = linked_rack();
        rack.set_param(core, Ronda::RATE_PARAM + 1, 0.5).unwrap();
        rack.set_param(core, Ronda::PHASE_PARAM + 2, 0.3).unwrap();

        rack.process_frame();
        // Nothing published before the first flip
        assert_eq!(ex_phasors(&rack, ex), vec![0.0; SIMD_BLOCK_SIZE]);

        let mut previous = core_phasors(&rack, core);
        for _ in 0..500 {
            rack.process_frame();
            assert_lanes_eq(&ex_phasors(&rack, ex), &previous);
            previous = core_phasors(&rack, core);
        }
    }

    #[test]
    fn test_expander_lags_regardless_of_order() {
        let mut rack = Rack::new(44100.0).unwrap();
        let ex = rack.add("ronda_ex", RondaEx::new());
        let core = rack.add("ronda", Ronda::new());
        rack.link_expander(core, ex).unwrap();

        rack.process_frame();
        let previous = core_phasors(&rack, core);
        rack.process_frame();
        assert_lanes_eq(&ex_phasors(&rack, ex), &previous);
    }

    #[test]
    fn test_expander_clock_follows_reset() {
        let (mut rack, core, ex) = linked_rack();
        rack.run(10);
        rack.set_param(core, Ronda::RESET_PARAM, 1.0).unwrap();
        rack.process_frame();
        rack.set_param(core, Ronda::RESET_PARAM, 0.0).unwrap();
        rack.process_frame();
        let clock = rack.output(ex, RondaEx::CLOCK_POLY_OUTPUT).unwrap();
        assert_eq!(clock.voltages(), &[10.0; 4]);
    }

    #[test]
    fn test_incompatible_link_rejected() {
        let mut rack = Rack::new(48000.0).unwrap();
        let a = rack.add("a", Ronda::new());
        let b = rack.add("b", Ronda::new());
        let ex = rack.add("ex", RondaEx::new());

        assert!(matches!(
            rack.link_expander(a, b),
            Err(RondaError::IncompatibleExpander {
                left: "ronda",
                right: "ronda"
            })
        ));
        assert!(rack.link_expander(ex, a).is_err());
        assert_eq!(rack.link_count(), 0);
    }

    #[test]
    fn test_relink_replaces_existing() {
        let mut rack = Rack::new(48000.0).unwrap();
        let a = rack.add("a", Ronda::new());
        let b = rack.add("b", Ronda::new());
        let ex = rack.add("ex", RondaEx::new());
        rack.link_expander(a, ex).unwrap();
        rack.link_expander(b, ex).unwrap();
        assert_eq!(rack.link_count(), 1);

        assert!(!rack.unlink_expander(a));
        assert!(rack.unlink_expander(b));
        assert_eq!(rack.link_count(), 0);
    }

    #[test]
    fn test_unlinked_expander_goes_quiet() {
        let (mut rack, core, ex) = linked_rack();
        rack.run(100);
        assert!(ex_phasors(&rack, ex).iter().any(|&v| v > 0.0));
        rack.unlink_expander(core);
        rack.process_frame();
        assert_eq!(ex_phasors(&rack, ex), vec![0.0; SIMD_BLOCK_SIZE]);
    }

    #[test]
    fn test_inputs_route_to_module() {
        let (mut rack, core, _) = linked_rack();
        rack.set_input(core, Ronda::RUN_INPUT, 0.0).unwrap();
        rack.run(10);
        assert_eq!(core_phasors(&rack, core), [0.0; SIMD_BLOCK_SIZE]);

        rack.disconnect_input(core, Ronda::RUN_INPUT).unwrap();
        rack.run(10);
        assert!(core_phasors(&rack, core)[0] > 0.0);
        assert!(rack.set_input(core, 99, 1.0).is_err());
    }

    #[test]
    fn test_reset_clears_frame_counter() {
        let (mut rack, core, ex) = linked_rack();
        rack.run(50);
        assert_eq!(rack.frame(), 50);
        rack.reset();
        assert_eq!(rack.frame(), 0);
        rack.process_frame();
        assert_abs_diff_eq!(
            core_phasors(&rack, core)[0],
            2.0 / 44100.0 * 10.0,
            epsilon = 1e-12
        );
        assert_eq!(ex_phasors(&rack, ex), vec![0.0; SIMD_BLOCK_SIZE]);
    }
}
