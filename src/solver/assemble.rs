//! Per-pass expansion of netlist elements into matrix stamps.
//!
//! Hidden nodes and extra branches depend on which devices are assumed to
//! conduct, so every pass allocates them from a fresh arena placed after the
//! netlist's own nodes.

use std::collections::BTreeMap;

use crate::circuit::{BranchId, NodeId, VarIndex};
use crate::components::{BiasPoint, JunctionState, TransistorRegion};
use crate::error::Result;
use crate::netlist::{Element, ElementKind, Netlist};

use super::mna::MnaMatrix;
use super::nonlinear::DeviceStates;
use super::simulator::SimulatorConfig;
use super::transient::History;
use super::{MIN_RESISTANCE, OFF_RESISTANCE, SWITCH_CLOSED_RESISTANCE};

/// One primitive contribution to the system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stamp {
    Conductance {
        a: NodeId,
        b: NodeId,
        g: f64,
    },
    /// V[pos] - V[neg] = voltage, branch current flowing pos to neg inside
    VoltageSource {
        pos: NodeId,
        neg: NodeId,
        branch: BranchId,
        voltage: f64,
    },
    /// Fixed current flowing `from` to `to` through the source
    CurrentSource {
        from: NodeId,
        to: NodeId,
        current: f64,
    },
    /// `gain` times the current of `control`, flowing `from` to `to`
    Cccs {
        from: NodeId,
        to: NodeId,
        control: BranchId,
        gain: f64,
    },
}

/// Which solve the stamps are for.
#[derive(Debug, Clone, Copy)]
pub enum Analysis<'a> {
    Dc,
    /// One Backward-Euler step ending at `time`
    Transient {
        dt: f64,
        time: f64,
        history: &'a History,
    },
}

impl Analysis<'_> {
    /// Time at which sources are evaluated; `None` for DC.
    pub fn time(&self) -> Option<f64> {
        match self {
            Analysis::Dc => None,
            Analysis::Transient { time, .. } => Some(*time),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Analysis::Transient { .. })
    }
}

/// Node and branch allocator for one pass.
struct Arena {
    nodes: usize,
    branches: usize,
}

impl Arena {
    fn node(&mut self) -> NodeId {
        let node = NodeId(self.nodes);
        self.nodes += 1;
        node
    }

    fn branch(&mut self) -> BranchId {
        let branch = BranchId(self.branches);
        self.branches += 1;
        branch
    }
}

/// Stamps for one pass together with the branch map.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// Nodes including ground and hidden nodes
    pub num_nodes: usize,
    pub num_branches: usize,
    pub stamps: Vec<Stamp>,
    branches: BTreeMap<String, BranchId>,
}

fn conductance(resistance: f64) -> f64 {
    1.0 / resistance.max(MIN_RESISTANCE)
}

/// Expand the netlist under the assumed device states.
pub fn assemble(
    netlist: &Netlist,
    states: &DeviceStates,
    analysis: Analysis<'_>,
    config: &SimulatorConfig,
) -> Assembly {
    let mut arena = Arena {
        nodes: netlist.num_nodes(),
        branches: 0,
    };
    let mut stamps = Vec::new();
    let mut branches = BTreeMap::new();

    for element in &netlist.elements {
        match &element.kind {
            ElementKind::Resistor {
                a, b, resistance, ..
            } => stamps.push(Stamp::Conductance {
                a: *a,
                b: *b,
                g: conductance(*resistance),
            }),
            ElementKind::Switch { a, b, closed } => {
                // Open contacts carry no current at all
                if *closed && a != b {
                    stamps.push(Stamp::Conductance {
                        a: *a,
                        b: *b,
                        g: conductance(SWITCH_CLOSED_RESISTANCE),
                    });
                }
            }
            ElementKind::VoltageSource {
                pos,
                neg,
                internal,
                source,
            } => {
                let branch = arena.branch();
                let terminal = match internal {
                    Some(node) => {
                        stamps.push(Stamp::Conductance {
                            a: *pos,
                            b: *node,
                            g: conductance(source.internal_resistance),
                        });
                        *node
                    }
                    None => *pos,
                };
                stamps.push(Stamp::VoltageSource {
                    pos: terminal,
                    neg: *neg,
                    branch,
                    voltage: source.voltage_at(analysis.time()),
                });
                branches.insert(element.key.clone(), branch);
            }
            ElementKind::CurrentSource { pos, neg, current } => {
                stamps.push(Stamp::CurrentSource {
                    from: *neg,
                    to: *pos,
                    current: *current,
                });
            }
            ElementKind::Capacitor { a, b, capacitor, .. } => {
                stamps.push(Stamp::Conductance {
                    a: *a,
                    b: *b,
                    g: conductance(capacitor.leakage_resistance),
                });
                if let Analysis::Transient { dt, history, .. } = analysis {
                    let v_prev = history.capacitor_voltage(&element.owner, capacitor.initial_voltage);
                    stamps.push(Stamp::Conductance {
                        a: *a,
                        b: *b,
                        g: capacitor.conductance(dt),
                    });
                    stamps.push(Stamp::CurrentSource {
                        from: *b,
                        to: *a,
                        current: capacitor.history_current(dt, v_prev),
                    });
                }
            }
            ElementKind::Inductor { a, b, inductor } => match analysis {
                Analysis::Dc => stamps.push(Stamp::Conductance {
                    a: *a,
                    b: *b,
                    g: conductance(config.dc_inductor_model.resistance()),
                }),
                Analysis::Transient { dt, history, .. } => {
                    let i_prev = history.inductor_current(&element.owner, inductor.initial_current);
                    stamps.push(Stamp::Conductance {
                        a: *a,
                        b: *b,
                        g: inductor.conductance(dt),
                    });
                    stamps.push(Stamp::CurrentSource {
                        from: *a,
                        to: *b,
                        current: i_prev,
                    });
                }
            },
            ElementKind::Junction {
                anode,
                cathode,
                model,
                ..
            } => {
                let state = states.junction(&element.key);
                let reverse = model.breakdown_voltage.filter(|_| state == JunctionState::Breakdown);
                match (state, reverse) {
                    (JunctionState::On, _) => {
                        let hidden = arena.node();
                        let branch = arena.branch();
                        stamps.push(Stamp::Conductance {
                            a: *anode,
                            b: hidden,
                            g: conductance(model.on_resistance),
                        });
                        stamps.push(Stamp::VoltageSource {
                            pos: hidden,
                            neg: *cathode,
                            branch,
                            voltage: model.forward_voltage,
                        });
                        branches.insert(element.key.clone(), branch);
                    }
                    (JunctionState::Breakdown, Some(bv)) => {
                        let hidden = arena.node();
                        let branch = arena.branch();
                        stamps.push(Stamp::Conductance {
                            a: *cathode,
                            b: hidden,
                            g: conductance(model.on_resistance),
                        });
                        stamps.push(Stamp::VoltageSource {
                            pos: hidden,
                            neg: *anode,
                            branch,
                            voltage: bv,
                        });
                        branches.insert(element.key.clone(), branch);
                    }
                    _ => stamps.push(Stamp::Conductance {
                        a: *anode,
                        b: *cathode,
                        g: conductance(OFF_RESISTANCE),
                    }),
                }
            }
            ElementKind::Transistor {
                collector,
                base,
                emitter,
                transistor,
            } => {
                let region = states.transistor(&element.key);
                let ((anode, cathode), (from, to)) =
                    transistor.polarity.orient(*collector, *base, *emitter);

                if region.base_on() {
                    let hidden = arena.node();
                    let branch = arena.branch();
                    stamps.push(Stamp::Conductance {
                        a: anode,
                        b: hidden,
                        g: conductance(transistor.base_resistance),
                    });
                    stamps.push(Stamp::VoltageSource {
                        pos: hidden,
                        neg: cathode,
                        branch,
                        voltage: transistor.vbe_on,
                    });
                    branches.insert(element.key.clone(), branch);

                    if region == TransistorRegion::Active {
                        stamps.push(Stamp::Cccs {
                            from,
                            to,
                            control: branch,
                            gain: transistor.beta,
                        });
                    }
                } else {
                    stamps.push(Stamp::Conductance {
                        a: anode,
                        b: cathode,
                        g: conductance(OFF_RESISTANCE),
                    });
                }

                match region {
                    // V_ce(sat) behind R_sat, in Norton form
                    TransistorRegion::Saturation => {
                        let g = conductance(transistor.saturation_resistance);
                        stamps.push(Stamp::Conductance { a: from, b: to, g });
                        stamps.push(Stamp::CurrentSource {
                            from: to,
                            to: from,
                            current: g * transistor.vce_sat,
                        });
                    }
                    // Output resistance keeps an unloaded collector solvable
                    TransistorRegion::Active | TransistorRegion::Cutoff => {
                        stamps.push(Stamp::Conductance {
                            a: from,
                            b: to,
                            g: conductance(OFF_RESISTANCE),
                        });
                    }
                }
            }
        }
    }

    Assembly {
        num_nodes: arena.nodes,
        num_branches: arena.branches,
        stamps,
        branches,
    }
}

impl Assembly {
    /// Build the matrix, optionally with a gmin shunt on every node.
    pub fn matrix(&self, gmin: f64) -> MnaMatrix {
        let mut m = MnaMatrix::new(self.num_nodes.saturating_sub(1), self.num_branches);
        for stamp in &self.stamps {
            match *stamp {
                Stamp::Conductance { a, b, g } => m.stamp_conductance(a.row(), b.row(), g),
                Stamp::VoltageSource {
                    pos,
                    neg,
                    branch,
                    voltage,
                } => m.stamp_voltage_source(pos.row(), neg.row(), branch.0, voltage),
                Stamp::CurrentSource { from, to, current } => {
                    m.stamp_current_source(from.row(), to.row(), current)
                }
                Stamp::Cccs {
                    from,
                    to,
                    control,
                    gain,
                } => m.stamp_cccs(from.row(), to.row(), control.0, gain),
            }
        }
        if gmin > 0.0 {
            m.add_gmin(gmin);
        }
        m
    }

    /// Solve the assembled system.
    pub fn solve(&self, gmin: f64, pivot_tolerance: f64) -> Result<Solution> {
        let mut m = self.matrix(gmin);
        m.factor(pivot_tolerance)?;
        m.solve();
        Ok(Solution {
            values: m.x,
            num_nodes: self.num_nodes,
            branches: self.branches.clone(),
        })
    }

    /// The all-zero result reported for a singular system.
    pub fn zero_solution(&self) -> Solution {
        Solution {
            values: vec![0.0; self.num_nodes.saturating_sub(1) + self.num_branches],
            num_nodes: self.num_nodes,
            branches: self.branches.clone(),
        }
    }
}

/// Solved node voltages and branch currents of one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    values: Vec<f64>,
    num_nodes: usize,
    branches: BTreeMap<String, BranchId>,
}

impl Solution {
    /// Voltage of a node; ground is always 0.
    pub fn voltage(&self, node: NodeId) -> f64 {
        if node.is_ground() {
            return 0.0;
        }
        self.values
            .get(VarIndex::Voltage(node).to_index(self.num_nodes))
            .copied()
            .unwrap_or(0.0)
    }

    /// V[a] - V[b].
    pub fn across(&self, a: NodeId, b: NodeId) -> f64 {
        self.voltage(a) - self.voltage(b)
    }

    /// Raw branch current of an element that owns a branch this pass.
    pub fn branch(&self, key: &str) -> Option<f64> {
        let branch = self.branches.get(key)?;
        self.values
            .get(VarIndex::Current(*branch).to_index(self.num_nodes))
            .copied()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Current through an element in its natural direction.
///
/// Two-terminal elements report `a`/anode/`pos` to `b`/cathode/`neg`;
/// voltage and current sources report the current delivered out of `pos`;
/// transistors report the collector current in NPN orientation.
pub fn element_current(
    element: &Element,
    solution: &Solution,
    states: &DeviceStates,
    analysis: Analysis<'_>,
    config: &SimulatorConfig,
) -> f64 {
    match &element.kind {
        ElementKind::Resistor {
            a, b, resistance, ..
        } => solution.across(*a, *b) * conductance(*resistance),
        ElementKind::Switch { a, b, closed } => {
            if *closed && a != b {
                solution.across(*a, *b) * conductance(SWITCH_CLOSED_RESISTANCE)
            } else {
                0.0
            }
        }
        ElementKind::VoltageSource { .. } => -solution.branch(&element.key).unwrap_or(0.0),
        ElementKind::CurrentSource { current, .. } => *current,
        ElementKind::Capacitor { a, b, capacitor, .. } => {
            let v = solution.across(*a, *b);
            match analysis {
                Analysis::Dc => v * conductance(capacitor.leakage_resistance),
                Analysis::Transient { dt, history, .. } => {
                    let v_prev =
                        history.capacitor_voltage(&element.owner, capacitor.initial_voltage);
                    capacitor.branch_current(dt, v, v_prev)
                }
            }
        }
        ElementKind::Inductor { a, b, inductor } => {
            let v = solution.across(*a, *b);
            match analysis {
                Analysis::Dc => v * conductance(config.dc_inductor_model.resistance()),
                Analysis::Transient { dt, history, .. } => {
                    let i_prev = history.inductor_current(&element.owner, inductor.initial_current);
                    inductor.branch_current(dt, v, i_prev)
                }
            }
        }
        ElementKind::Junction { anode, cathode, .. } => match states.junction(&element.key) {
            JunctionState::On => solution.branch(&element.key).unwrap_or(0.0),
            JunctionState::Breakdown => match solution.branch(&element.key) {
                Some(reverse) => -reverse,
                None => solution.across(*anode, *cathode) * conductance(OFF_RESISTANCE),
            },
            JunctionState::Off => solution.across(*anode, *cathode) * conductance(OFF_RESISTANCE),
        },
        ElementKind::Transistor { .. } => bias_point(element, solution, states)
            .map(|bias| bias.ic)
            .unwrap_or(0.0),
    }
}

/// Terminal voltages and currents of a transistor, in NPN orientation.
pub fn bias_point(element: &Element, solution: &Solution, states: &DeviceStates) -> Option<BiasPoint> {
    let ElementKind::Transistor {
        collector,
        base,
        emitter,
        transistor,
    } = &element.kind
    else {
        return None;
    };
    let s = transistor.polarity.sign();
    let vbe = s * solution.across(*base, *emitter);
    let vce = s * solution.across(*collector, *emitter);
    let region = states.transistor(&element.key);

    let ib = if region.base_on() {
        solution.branch(&element.key).unwrap_or(0.0)
    } else {
        vbe / OFF_RESISTANCE
    };
    let ic = match region {
        TransistorRegion::Cutoff => vce / OFF_RESISTANCE,
        TransistorRegion::Active => transistor.beta * ib + vce / OFF_RESISTANCE,
        TransistorRegion::Saturation => {
            (vce - transistor.vce_sat) * conductance(transistor.saturation_resistance)
        }
    };
    Some(BiasPoint { vbe, vce, ib, ic })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;
    use crate::components::{ComponentKind, Led, LedColor, Resistor, Transistor, VoltageSource};
    use crate::netlist::build_netlist;
    use approx::assert_relative_eq;

    fn led_netlist() -> Netlist {
        build_netlist(
            &Circuit::new()
                .with_component("bat", ComponentKind::VoltageSource(VoltageSource::new(5.0)))
                .with_component("r1", ComponentKind::Resistor(Resistor::new(220.0)))
                .with_component("led1", ComponentKind::Led(Led::new(LedColor::Red)))
                .with_component("gnd", ComponentKind::Ground)
                .with_wire(("bat", "pos"), ("r1", "a"))
                .with_wire(("r1", "b"), ("led1", "anode"))
                .with_wire(("led1", "cathode"), ("gnd", "gnd")),
        )
    }

    #[test]
    fn test_off_junction_adds_no_unknowns() {
        let netlist = led_netlist();
        let config = SimulatorConfig::default();
        let assembly = assemble(&netlist, &DeviceStates::default(), Analysis::Dc, &config);
        assert_eq!(assembly.num_nodes, netlist.num_nodes());
        // Only the source branch
        assert_eq!(assembly.num_branches, 1);
    }

    #[test]
    fn test_on_junction_allocates_hidden_node_and_branch() {
        let netlist = led_netlist();
        let config = SimulatorConfig::default();
        let mut states = DeviceStates::default();
        states.junctions.insert("led1".to_string(), JunctionState::On);
        let assembly = assemble(&netlist, &states, Analysis::Dc, &config);
        assert_eq!(assembly.num_nodes, netlist.num_nodes() + 1);
        assert_eq!(assembly.num_branches, 2);

        let solution = assembly.solve(0.0, 1e-13).unwrap();
        let current = element_current(
            netlist.element("led1").unwrap(),
            &solution,
            &states,
            Analysis::Dc,
            &config,
        );
        assert_relative_eq!(current, 3.0 / 280.0, max_relative = 1e-9);
        let delivered = element_current(
            netlist.element("bat").unwrap(),
            &solution,
            &states,
            Analysis::Dc,
            &config,
        );
        assert_relative_eq!(delivered, current, max_relative = 1e-9);
    }

    #[test]
    fn test_conductance_stamps_are_symmetric() {
        let netlist = led_netlist();
        let assembly = assemble(
            &netlist,
            &DeviceStates::default(),
            Analysis::Dc,
            &SimulatorConfig::default(),
        );
        let m = assembly.matrix(0.0);
        for i in 0..m.num_nodes {
            for j in 0..m.num_nodes {
                assert_eq!(m.get(i, j), m.get(j, i));
            }
        }
    }

    #[test]
    fn test_saturated_transistor_bias() {
        // 5V -> 1k -> collector, 5V -> 10k -> base, emitter grounded
        let circuit = Circuit::new()
            .with_component("bat", ComponentKind::VoltageSource(VoltageSource::new(5.0).ideal()))
            .with_component("rc", ComponentKind::Resistor(Resistor::new(1_000.0)))
            .with_component("rb", ComponentKind::Resistor(Resistor::new(10_000.0)))
            .with_component("q1", ComponentKind::Transistor(Transistor::npn()))
            .with_component("gnd", ComponentKind::Ground)
            .with_wire(("bat", "pos"), ("rc", "a"))
            .with_wire(("bat", "pos"), ("rb", "a"))
            .with_wire(("rc", "b"), ("q1", "collector"))
            .with_wire(("rb", "b"), ("q1", "base"))
            .with_wire(("q1", "emitter"), ("gnd", "gnd"));
        let netlist = build_netlist(&circuit);
        let mut states = DeviceStates::default();
        states
            .transistors
            .insert("q1".to_string(), TransistorRegion::Saturation);
        let assembly = assemble(&netlist, &states, Analysis::Dc, &SimulatorConfig::default());
        let solution = assembly.solve(0.0, 1e-13).unwrap();
        let bias = bias_point(netlist.element("q1").unwrap(), &solution, &states).unwrap();

        // Ib = (5 - 0.7) / (10k + 100), Ic = (5 - 0.2) / (1k + 1)
        assert_relative_eq!(bias.ib, 4.3 / 10_100.0, max_relative = 1e-6);
        assert_relative_eq!(bias.ic, 4.8 / 1_001.0, max_relative = 1e-6);
        assert_relative_eq!(bias.vce, 0.2 + bias.ic, max_relative = 1e-6);
        assert!(bias.ic < 100.0 * bias.ib);
    }
}
