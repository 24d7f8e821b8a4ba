//! Fixed-point iteration over discrete device states.
//!
//! Each pass expands every junction and transistor into the companion of its
//! currently assumed state, solves the linear system, and re-derives the
//! states from the new voltages. The loop stops when a pass reproduces its own
//! assumptions or when the iteration cap is reached; in the latter case the
//! last iterate is kept and flagged as not converged.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, debug_span, warn};

use crate::components::{JunctionState, TransistorRegion};
use crate::netlist::{ElementKind, Netlist};

use super::assemble::{assemble, bias_point, Analysis, Assembly, Solution};
use super::simulator::SimulatorConfig;

/// Assumed discrete state of every nonlinear element, keyed by element key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStates {
    pub junctions: BTreeMap<String, JunctionState>,
    pub transistors: BTreeMap<String, TransistorRegion>,
}

impl DeviceStates {
    /// State of a junction; unknown junctions are off.
    pub fn junction(&self, key: &str) -> JunctionState {
        self.junctions.get(key).copied().unwrap_or_default()
    }

    /// Region of a transistor; unknown transistors are in cutoff.
    pub fn transistor(&self, key: &str) -> TransistorRegion {
        self.transistors.get(key).copied().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.junctions.is_empty() && self.transistors.is_empty()
    }

    /// One entry per device in `netlist`, carrying over known states.
    pub fn for_netlist(&self, netlist: &Netlist) -> DeviceStates {
        let mut states = DeviceStates::default();
        for element in &netlist.elements {
            match element.kind {
                ElementKind::Junction { .. } => {
                    states
                        .junctions
                        .insert(element.key.clone(), self.junction(&element.key));
                }
                ElementKind::Transistor { .. } => {
                    states
                        .transistors
                        .insert(element.key.clone(), self.transistor(&element.key));
                }
                _ => {}
            }
        }
        states
    }
}

/// Outcome of the device iteration.
#[derive(Debug, Clone)]
pub struct Convergence {
    /// Solution under `states`; all zeros when singular
    pub solution: Solution,
    pub states: DeviceStates,
    pub iterations: usize,
    pub converged: bool,
    pub singular: Option<String>,
    pub used_gmin: bool,
}

/// Solve, retrying once with gmin on a singular system.
fn solve_with_gmin(assembly: &Assembly, config: &SimulatorConfig) -> Result<(Solution, bool), String> {
    match assembly.solve(0.0, config.pivot_tolerance) {
        Ok(solution) => Ok((solution, false)),
        Err(first) => {
            debug!(error = %first, gmin = config.gmin, "retrying with gmin");
            assembly
                .solve(config.gmin, config.pivot_tolerance)
                .map(|solution| (solution, true))
                .map_err(|e| e.to_string())
        }
    }
}

/// Run the bounded fixed-point loop.
///
/// `burned` lists junction keys that must stay off regardless of bias, on top
/// of those the snapshot already marks burned.
pub fn converge(
    netlist: &Netlist,
    initial: &DeviceStates,
    analysis: Analysis<'_>,
    config: &SimulatorConfig,
    burned: &BTreeSet<String>,
) -> Convergence {
    let mut states = initial.for_netlist(netlist);
    for element in &netlist.elements {
        if is_burned(&element.kind, &element.key, burned) {
            states.junctions.insert(element.key.clone(), JunctionState::Off);
        }
    }

    let max_iterations = config.max_iterations.max(1);
    let mut used_gmin = false;
    let mut iteration = 0;
    loop {
        iteration += 1;
        let _span = debug_span!("device_iteration", iteration).entered();

        let assembly = assemble(netlist, &states, analysis, config);
        let solution = match solve_with_gmin(&assembly, config) {
            Ok((solution, gmin)) => {
                used_gmin |= gmin;
                solution
            }
            Err(reason) => {
                warn!(%reason, "singular system, reporting zero result");
                return Convergence {
                    solution: assembly.zero_solution(),
                    states,
                    iterations: iteration,
                    converged: false,
                    singular: Some(reason),
                    used_gmin: true,
                };
            }
        };

        let next = next_states(netlist, &states, &solution, config, burned);
        let settled = next == states;
        if settled || iteration >= max_iterations {
            if settled {
                debug!(iteration, "device states settled");
            } else {
                warn!(iteration, "device states still changing, keeping last iterate");
            }
            return Convergence {
                solution,
                states,
                iterations: iteration,
                converged: settled,
                singular: None,
                used_gmin,
            };
        }
        states = next;
    }
}

fn is_burned(kind: &ElementKind, key: &str, burned: &BTreeSet<String>) -> bool {
    match kind {
        ElementKind::Junction { burned: flag, .. } => *flag || burned.contains(key),
        _ => false,
    }
}

/// Re-derive every device state from a solution.
fn next_states(
    netlist: &Netlist,
    states: &DeviceStates,
    solution: &Solution,
    config: &SimulatorConfig,
    burned: &BTreeSet<String>,
) -> DeviceStates {
    let mut next = states.clone();
    for element in &netlist.elements {
        let key = element.key.as_str();
        match &element.kind {
            ElementKind::Junction {
                anode,
                cathode,
                model,
                device,
                ..
            } => {
                let current = states.junction(key);
                let state = if is_burned(&element.kind, key, burned) {
                    JunctionState::Off
                } else {
                    let hysteresis = if device.is_light() {
                        config.led_hysteresis
                    } else {
                        config.diode_hysteresis
                    };
                    model.next_state(current, solution.across(*anode, *cathode), hysteresis)
                };
                if state != current {
                    debug!(element = key, from = ?current, to = ?state, "junction state change");
                }
                next.junctions.insert(element.key.clone(), state);
            }
            ElementKind::Transistor { transistor, .. } => {
                let Some(bias) = bias_point(element, solution, states) else {
                    continue;
                };
                let current = states.transistor(key);
                let region = transistor.next_region(current, bias, config.diode_hysteresis);
                if region != current {
                    debug!(element = key, from = ?current, to = ?region, "transistor region change");
                }
                next.transistors.insert(element.key.clone(), region);
            }
            _ => {}
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;
    use crate::components::{ComponentKind, Diode, Led, LedColor, Resistor, VoltageSource};
    use crate::netlist::build_netlist;
    use approx::assert_relative_eq;

    fn led_behind(voltage: f64, resistance: f64) -> Netlist {
        build_netlist(
            &Circuit::new()
                .with_component(
                    "bat",
                    ComponentKind::VoltageSource(VoltageSource::new(voltage).ideal()),
                )
                .with_component("r1", ComponentKind::Resistor(Resistor::new(resistance)))
                .with_component("led1", ComponentKind::Led(Led::new(LedColor::Red)))
                .with_component("gnd", ComponentKind::Ground)
                .with_wire(("bat", "pos"), ("r1", "a"))
                .with_wire(("r1", "b"), ("led1", "anode"))
                .with_wire(("led1", "cathode"), ("gnd", "gnd")),
        )
    }

    #[test]
    fn test_led_turns_on_and_settles() {
        let netlist = led_behind(5.0, 220.0);
        let result = converge(
            &netlist,
            &DeviceStates::default(),
            Analysis::Dc,
            &SimulatorConfig::default(),
            &BTreeSet::new(),
        );
        assert!(result.converged);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.states.junction("led1"), JunctionState::On);
        assert_relative_eq!(result.solution.branch("led1").unwrap(), 3.0 / 230.0, max_relative = 1e-9);
    }

    #[test]
    fn test_led_inside_hysteresis_band_stays_off() {
        // No series drop to speak of: 2.03V sits inside the 2.0V + 0.05V band
        let netlist = led_behind(2.03, 1.0);
        let result = converge(
            &netlist,
            &DeviceStates::default(),
            Analysis::Dc,
            &SimulatorConfig::default(),
            &BTreeSet::new(),
        );
        assert!(result.converged);
        assert_eq!(result.states.junction("led1"), JunctionState::Off);
    }

    #[test]
    fn test_burned_led_never_conducts() {
        let netlist = led_behind(9.0, 100.0);
        let burned = BTreeSet::from(["led1".to_string()]);
        let result = converge(
            &netlist,
            &DeviceStates::default(),
            Analysis::Dc,
            &SimulatorConfig::default(),
            &burned,
        );
        assert_eq!(result.states.junction("led1"), JunctionState::Off);
        assert_eq!(result.iterations, 1);
    }

    #[test]
    fn test_iteration_cap_reports_not_converged() {
        let netlist = led_behind(5.0, 220.0);
        let config = SimulatorConfig::default().with_max_iterations(1);
        let result = converge(
            &netlist,
            &DeviceStates::default(),
            Analysis::Dc,
            &config,
            &BTreeSet::new(),
        );
        assert!(!result.converged);
        // The kept solution matches the kept (pre-update) states
        assert_eq!(result.states.junction("led1"), JunctionState::Off);
    }

    #[test]
    fn test_parallel_ideal_sources_are_singular() {
        let circuit = Circuit::new()
            .with_component("v1", ComponentKind::VoltageSource(VoltageSource::new(5.0).ideal()))
            .with_component("v2", ComponentKind::VoltageSource(VoltageSource::new(3.0).ideal()))
            .with_component("d1", ComponentKind::Diode(Diode::default()))
            .with_wire(("v1", "pos"), ("v2", "pos"))
            .with_wire(("v1", "pos"), ("d1", "anode"))
            .with_wire(("d1", "cathode"), ("v1", "neg"));
        let netlist = build_netlist(&circuit);
        let result = converge(
            &netlist,
            &DeviceStates::default(),
            Analysis::Dc,
            &SimulatorConfig::default(),
            &BTreeSet::new(),
        );
        assert!(result.singular.is_some());
        assert!(result.solution.values().iter().all(|v| *v == 0.0));
    }
}
