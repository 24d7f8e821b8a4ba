//! State carried between transient steps.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::warn;

use crate::circuit::ComponentId;
use crate::components::exceeds_reverse_limit;
use crate::netlist::{ElementKind, Netlist};

use super::assemble::{element_current, Analysis};
use super::nonlinear::{Convergence, DeviceStates};
use super::simulator::SimulatorConfig;
use super::LED_BURN_TICKS;

/// Backward-Euler history of the reactive elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct History {
    /// Plate voltage (a - b) at the end of the last step
    pub capacitors: BTreeMap<ComponentId, f64>,
    /// Branch current (a to b) at the end of the last step
    pub inductors: BTreeMap<ComponentId, f64>,
}

impl History {
    /// Previous plate voltage, or `initial` before the first step.
    pub fn capacitor_voltage(&self, id: &ComponentId, initial: f64) -> f64 {
        self.capacitors.get(id).copied().unwrap_or(initial)
    }

    /// Previous branch current, or `initial` before the first step.
    pub fn inductor_current(&self, id: &ComponentId, initial: f64) -> f64 {
        self.inductors.get(id).copied().unwrap_or(initial)
    }
}

/// Overcurrent bookkeeping of one light-emitting junction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedHealth {
    pub damage_ticks: u32,
    pub burned: bool,
}

/// Everything a transient run remembers from one step to the next.
///
/// Owned by a single simulation; independent DC solves never touch it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransientState {
    /// Simulated time at the end of the last step
    pub time: f64,
    pub steps: u64,
    pub history: History,
    /// Device states the next step starts from
    pub devices: DeviceStates,
    /// Keyed by junction element key
    pub leds: BTreeMap<String, LedHealth>,
    /// Polarized capacitors driven past their reverse rating; never cleared
    pub damaged: BTreeSet<ComponentId>,
    #[serde(skip)]
    pub(crate) seeded: bool,
}

impl TransientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Junction keys that burned out during this run.
    pub fn burned(&self) -> BTreeSet<String> {
        self.leds
            .iter()
            .filter(|(_, health)| health.burned)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn led_health(&self, key: &str) -> Option<LedHealth> {
        self.leds.get(key).copied()
    }

    pub fn is_damaged(&self, id: &ComponentId) -> bool {
        self.damaged.contains(id)
    }

    /// Fold a converged step into the history.
    ///
    /// `analysis` must be the transient analysis the step was solved with, so
    /// capacitor currents use the pre-step voltages. Returns one warning per
    /// newly damaged component.
    pub(crate) fn advance(
        &mut self,
        netlist: &Netlist,
        convergence: &Convergence,
        analysis: Analysis<'_>,
        config: &SimulatorConfig,
    ) -> Vec<String> {
        let Analysis::Transient { time, .. } = analysis else {
            return Vec::new();
        };
        let solution = &convergence.solution;
        let mut events = Vec::new();

        for element in &netlist.elements {
            match &element.kind {
                ElementKind::Capacitor {
                    a, b, reverse_limit, ..
                } => {
                    let v = solution.across(*a, *b);
                    self.history.capacitors.insert(element.owner.clone(), v);
                    if let Some(limit) = reverse_limit {
                        if exceeds_reverse_limit(v, *limit)
                            && self.damaged.insert(element.owner.clone())
                        {
                            warn!(component = %element.owner, voltage = v, "reverse voltage, capacitor damaged");
                            events.push(format!(
                                "{}: reverse voltage {:.2}V exceeds {:.2}V rating; capacitor damaged",
                                element.owner, -v, limit
                            ));
                        }
                    }
                }
                ElementKind::Inductor { .. } => {
                    let i = element_current(element, solution, &convergence.states, analysis, config);
                    self.history.inductors.insert(element.owner.clone(), i);
                }
                ElementKind::Junction {
                    device,
                    burned,
                    damage_ticks,
                    ..
                } => {
                    let Some(rating) = device.rating() else {
                        continue;
                    };
                    let current =
                        element_current(element, solution, &convergence.states, analysis, config);
                    let health = self.leds.entry(element.key.clone()).or_insert(LedHealth {
                        damage_ticks: *damage_ticks,
                        burned: *burned,
                    });
                    if health.burned || current <= rating.max_current {
                        continue;
                    }
                    health.damage_ticks += 1;
                    if health.damage_ticks >= LED_BURN_TICKS {
                        health.burned = true;
                        warn!(element = %element.key, current, "LED burned out");
                        events.push(format!(
                            "{}: burned out after {} steps above {:.1}mA",
                            element.key,
                            health.damage_ticks,
                            rating.max_current * 1e3
                        ));
                    }
                }
                _ => {}
            }
        }

        self.time = time;
        self.steps += 1;
        self.devices = convergence.states.clone();
        events
    }
}
