//! Conductivity and topology analysis over net graphs.
//!
//! Two views of the same elements:
//! - topology: undirected, ignores bias ("is it wired into a loop")
//! - conductive: junction and transistor edges directed and present only
//!   while the device conducts ("can current actually flow")

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;

use crate::circuit::NetId;
use crate::components::JunctionState;
use crate::netlist::{Element, ElementKind, Netlist};
use crate::solver::{Analysis, DeviceStates};

/// Reservoirs below this are treated as empty.
const CHARGED_VOLTAGE: f64 = 1e-6;
const FLUX_CURRENT: f64 = 1e-9;

#[derive(Debug, Clone)]
struct Edge {
    to: NetId,
    owner: String,
}

/// Adjacency over nets, edges labelled by the element they came from.
#[derive(Debug, Clone, Default)]
pub struct NetGraph {
    adjacency: BTreeMap<NetId, Vec<Edge>>,
}

impl NetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an undirected edge.
    pub fn connect(&mut self, a: NetId, b: NetId, owner: &str) {
        self.direct(a, b, owner);
        self.direct(b, a, owner);
    }

    /// Add a directed edge.
    pub fn direct(&mut self, from: NetId, to: NetId, owner: &str) {
        self.adjacency.entry(from).or_default().push(Edge {
            to,
            owner: owner.to_string(),
        });
    }

    /// Nets reachable from `starts` by BFS, never crossing edges owned by `skip`.
    pub fn reachable(
        &self,
        starts: impl IntoIterator<Item = NetId>,
        skip: Option<&str>,
    ) -> BTreeSet<NetId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        for start in starts {
            if seen.insert(start) {
                queue.push_back(start);
            }
        }
        while let Some(net) = queue.pop_front() {
            for edge in self.adjacency.get(&net).into_iter().flatten() {
                if skip == Some(edge.owner.as_str()) {
                    continue;
                }
                if seen.insert(edge.to) {
                    queue.push_back(edge.to);
                }
            }
        }
        seen
    }

    /// The same graph with every edge turned around.
    pub fn reversed(&self) -> NetGraph {
        let mut graph = NetGraph::new();
        for (from, edges) in &self.adjacency {
            for edge in edges {
                graph.direct(edge.to, *from, &edge.owner);
            }
        }
        graph
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }
}

/// How semiconductor edges are drawn.
#[derive(Debug, Clone, Copy)]
pub enum Bias<'a> {
    /// Every element is an undirected edge
    Topology,
    /// Edges follow the solved device states
    Actual(&'a DeviceStates),
}

/// Build a net graph from the stamped elements.
pub fn build_graph(netlist: &Netlist, bias: Bias<'_>) -> NetGraph {
    let mut graph = NetGraph::new();
    for element in &netlist.elements {
        let net = |node| netlist.net_of_node(node);
        let key = element.key.as_str();
        match &element.kind {
            ElementKind::Resistor { a, b, .. }
            | ElementKind::Capacitor { a, b, .. }
            | ElementKind::Inductor { a, b, .. } => {
                if let (Some(a), Some(b)) = (net(*a), net(*b)) {
                    graph.connect(a, b, key);
                }
            }
            ElementKind::Switch { a, b, closed } => {
                if let (true, Some(a), Some(b)) = (*closed, net(*a), net(*b)) {
                    graph.connect(a, b, key);
                }
            }
            // Sources are where paths start and end, not edges
            ElementKind::VoltageSource { .. } | ElementKind::CurrentSource { .. } => {}
            ElementKind::Junction { anode, cathode, .. } => {
                let (Some(anode), Some(cathode)) = (net(*anode), net(*cathode)) else {
                    continue;
                };
                match bias {
                    Bias::Topology => graph.connect(anode, cathode, key),
                    Bias::Actual(states) => match states.junction(key) {
                        JunctionState::On => graph.direct(anode, cathode, key),
                        JunctionState::Breakdown => graph.direct(cathode, anode, key),
                        JunctionState::Off => {}
                    },
                }
            }
            ElementKind::Transistor {
                collector,
                base,
                emitter,
                transistor,
            } => {
                let (Some(c), Some(b), Some(e)) = (net(*collector), net(*base), net(*emitter))
                else {
                    continue;
                };
                let ((anode, cathode), (from, to)) = transistor.polarity.orient(c, b, e);
                let conducting = match bias {
                    Bias::Topology => {
                        graph.connect(b, e, key);
                        graph.connect(c, e, key);
                        false
                    }
                    Bias::Actual(states) => states.transistor(key).base_on(),
                };
                if conducting {
                    graph.direct(anode, cathode, key);
                    graph.direct(from, to, key);
                }
            }
        }
    }
    graph
}

/// Where current leaves and re-enters the circuit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Terminals {
    pub supplies: BTreeSet<NetId>,
    pub returns: BTreeSet<NetId>,
}

impl Terminals {
    fn both(&mut self, a: NetId, b: NetId) {
        self.supplies.extend([a, b]);
        self.returns.extend([a, b]);
    }
}

/// Supply-positive and return nets of the circuit.
///
/// Ground is always a return. Sources that swing both ways and charged
/// reservoirs count both terminals as supply and return.
pub fn terminals(netlist: &Netlist, analysis: Analysis<'_>) -> Terminals {
    let mut t = Terminals::default();
    t.returns.extend(netlist.nets.ground);

    for element in &netlist.elements {
        let net = |node| netlist.net_of_node(node);
        match &element.kind {
            ElementKind::VoltageSource {
                pos, neg, source, ..
            } => {
                let (Some(pos), Some(neg)) = (net(*pos), net(*neg)) else {
                    continue;
                };
                if source.is_alternating() && analysis.is_transient() {
                    t.both(pos, neg);
                } else if source.voltage >= 0.0 {
                    t.supplies.insert(pos);
                    t.returns.insert(neg);
                } else {
                    t.supplies.insert(neg);
                    t.returns.insert(pos);
                }
            }
            ElementKind::CurrentSource { pos, neg, current } => {
                let (Some(pos), Some(neg)) = (net(*pos), net(*neg)) else {
                    continue;
                };
                let (out, back) = if *current >= 0.0 { (pos, neg) } else { (neg, pos) };
                t.supplies.insert(out);
                t.returns.insert(back);
            }
            ElementKind::Capacitor { a, b, capacitor, .. } => {
                if let Analysis::Transient { history, .. } = analysis {
                    let v = history.capacitor_voltage(&element.owner, capacitor.initial_voltage);
                    if let (true, Some(a), Some(b)) = (v.abs() > CHARGED_VOLTAGE, net(*a), net(*b)) {
                        t.both(a, b);
                    }
                }
            }
            ElementKind::Inductor { a, b, inductor } => {
                if let Analysis::Transient { history, .. } = analysis {
                    let i = history.inductor_current(&element.owner, inductor.initial_current);
                    if let (true, Some(a), Some(b)) = (i.abs() > FLUX_CURRENT, net(*a), net(*b)) {
                        t.both(a, b);
                    }
                }
            }
            _ => {}
        }
    }
    t
}

/// Whether some supply reaches a return other than itself.
fn supply_reaches_return(graph: &NetGraph, terminals: &Terminals) -> bool {
    terminals.supplies.iter().any(|&supply| {
        graph
            .reachable([supply], None)
            .iter()
            .any(|net| *net != supply && terminals.returns.contains(net))
    })
}

/// `graph` plus an undirected edge across every voltage source.
///
/// Current leaving an element may return through a source it meets on the
/// way, charging or not.
fn with_source_edges(netlist: &Netlist, graph: &NetGraph) -> NetGraph {
    let mut relay = graph.clone();
    for element in &netlist.elements {
        if let ElementKind::VoltageSource { pos, neg, .. } = &element.kind {
            if let (Some(pos), Some(neg)) = (netlist.net_of_node(*pos), netlist.net_of_node(*neg)) {
                relay.connect(pos, neg, &element.key);
            }
        }
    }
    relay
}

/// The conductive graph, plus the relay graph the return leg may use.
struct Loops<'g> {
    graph: &'g NetGraph,
    relay: &'g NetGraph,
    terminals: &'g Terminals,
}

impl Loops<'_> {
    /// Whether current can run supply -> `from`, then `to` -> return, without `owner`.
    fn through(&self, from: NetId, to: NetId, owner: &str) -> bool {
        self.graph
            .reachable(self.terminals.supplies.iter().copied(), Some(owner))
            .contains(&from)
            && self
                .relay
                .reachable([to], Some(owner))
                .iter()
                .any(|net| self.terminals.returns.contains(net))
    }
}

/// Whether an element sits on a loop from a supply to a return.
fn element_on_loop(netlist: &Netlist, loops: &Loops<'_>, element: &Element) -> bool {
    let net = |node| netlist.net_of_node(node);
    let key = element.key.as_str();
    match &element.kind {
        ElementKind::Junction { anode, cathode, .. } => match (net(*anode), net(*cathode)) {
            (Some(a), Some(c)) => loops.through(a, c, key),
            _ => false,
        },
        ElementKind::Transistor {
            collector,
            base,
            emitter,
            transistor,
        } => match (net(*collector), net(*base), net(*emitter)) {
            (Some(c), Some(b), Some(e)) => {
                let ((anode, cathode), _) = transistor.polarity.orient(c, b, e);
                loops.through(anode, cathode, key)
            }
            _ => false,
        },
        ElementKind::Resistor { a, b, .. }
        | ElementKind::Switch { a, b, .. }
        | ElementKind::Capacitor { a, b, .. }
        | ElementKind::Inductor { a, b, .. } => match (net(*a), net(*b)) {
            (Some(a), Some(b)) => loops.through(a, b, key) || loops.through(b, a, key),
            _ => false,
        },
        ElementKind::VoltageSource { .. } | ElementKind::CurrentSource { .. } => true,
    }
}

/// Net-level reachability for current-flow display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathReport {
    /// A supply is wired to a return, bias ignored
    pub has_topology_path: bool,
    /// A supply reaches a return through conducting elements
    pub has_return_path: bool,
    /// A supply feeds at least one net beyond itself
    pub has_feed_path: bool,
    pub supply_nets: BTreeSet<NetId>,
    pub return_nets: BTreeSet<NetId>,
    /// Reachable from a supply
    pub fed_nets: BTreeSet<NetId>,
    /// Able to reach a return
    pub returning_nets: BTreeSet<NetId>,
    /// Both fed and returning: where current flows
    pub live_nets: BTreeSet<NetId>,
}

/// Post-solve analysis bound to one netlist and its final device states.
#[derive(Debug, Clone)]
pub struct Conductivity {
    pub report: PathReport,
    conductive: NetGraph,
    relay: NetGraph,
    terminals: Terminals,
}

impl Conductivity {
    pub fn analyze(netlist: &Netlist, states: &DeviceStates, analysis: Analysis<'_>) -> Self {
        let terminals = terminals(netlist, analysis);
        let topology = build_graph(netlist, Bias::Topology);
        let conductive = build_graph(netlist, Bias::Actual(states));

        let supplies = terminals.supplies.iter().copied();
        let fed_nets = conductive.reachable(supplies, None);
        let returning_nets = conductive
            .reversed()
            .reachable(terminals.returns.iter().copied(), None);
        let live_nets = fed_nets.intersection(&returning_nets).copied().collect();

        let report = PathReport {
            has_topology_path: supply_reaches_return(&topology, &terminals),
            has_return_path: supply_reaches_return(&conductive, &terminals),
            has_feed_path: fed_nets.iter().any(|n| !terminals.supplies.contains(n)),
            supply_nets: terminals.supplies.clone(),
            return_nets: terminals.returns.clone(),
            fed_nets,
            returning_nets,
            live_nets,
        };
        let relay = with_source_edges(netlist, &conductive);
        Self {
            report,
            conductive,
            relay,
            terminals,
        }
    }

    /// Whether an element sits on a conducting supply-to-return loop,
    /// judged without its own edges.
    pub fn on_loop(&self, netlist: &Netlist, element: &Element) -> bool {
        let loops = Loops {
            graph: &self.conductive,
            relay: &self.relay,
            terminals: &self.terminals,
        };
        element_on_loop(netlist, &loops, element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;
    use crate::components::{
        ComponentKind, Diode, Led, LedColor, Motor, Resistor, SpstSwitch, VoltageSource,
    };
    use crate::netlist::build_netlist;

    fn series(reversed: bool) -> Netlist {
        let (a, c) = if reversed {
            ("cathode", "anode")
        } else {
            ("anode", "cathode")
        };
        build_netlist(
            &Circuit::new()
                .with_component("bat", ComponentKind::VoltageSource(VoltageSource::new(5.0)))
                .with_component("r1", ComponentKind::Resistor(Resistor::new(220.0)))
                .with_component("d1", ComponentKind::Diode(Diode::default()))
                .with_component("gnd", ComponentKind::Ground)
                .with_wire(("bat", "pos"), ("r1", "a"))
                .with_wire(("r1", "b"), ("d1", a))
                .with_wire(("d1", c), ("gnd", "gnd")),
        )
    }

    #[test]
    fn test_off_junction_breaks_conductive_path() {
        let netlist = series(false);
        let off = Conductivity::analyze(&netlist, &DeviceStates::default(), Analysis::Dc);
        assert!(off.report.has_topology_path);
        assert!(!off.report.has_return_path);
        assert!(off.report.has_feed_path);

        let mut states = DeviceStates::default();
        states.junctions.insert("d1".to_string(), JunctionState::On);
        let on = Conductivity::analyze(&netlist, &states, Analysis::Dc);
        assert!(on.report.has_return_path);
        assert_eq!(on.report.live_nets.len(), 3);
    }

    #[test]
    fn test_open_switch_has_no_paths() {
        let circuit = Circuit::new()
            .with_component("bat", ComponentKind::VoltageSource(VoltageSource::new(5.0)))
            .with_component("sw", ComponentKind::SpstSwitch(SpstSwitch { closed: false }))
            .with_component("gnd", ComponentKind::Ground)
            .with_wire(("bat", "pos"), ("sw", "a"))
            .with_wire(("sw", "b"), ("gnd", "gnd"));
        let netlist = build_netlist(&circuit);
        let c = Conductivity::analyze(&netlist, &DeviceStates::default(), Analysis::Dc);
        assert!(!c.report.has_topology_path);
        assert!(!c.report.has_return_path);
        assert!(!c.report.has_feed_path);
    }

    #[test]
    fn test_element_loop_excludes_own_edge() {
        // Motor across the supply, LED hanging off the supply with nowhere to go
        let circuit = Circuit::new()
            .with_component("bat", ComponentKind::VoltageSource(VoltageSource::new(5.0)))
            .with_component("m1", ComponentKind::Motor(Motor::default()))
            .with_component("led1", ComponentKind::Led(Led::new(LedColor::Red)))
            .with_component("r1", ComponentKind::Resistor(Resistor::new(100.0)))
            .with_component("gnd", ComponentKind::Ground)
            .with_wire(("bat", "pos"), ("m1", "a"))
            .with_wire(("m1", "b"), ("gnd", "gnd"))
            .with_wire(("bat", "pos"), ("led1", "anode"))
            .with_wire(("led1", "cathode"), ("r1", "a"));
        let netlist = build_netlist(&circuit);
        let c = Conductivity::analyze(&netlist, &DeviceStates::default(), Analysis::Dc);
        assert!(c.on_loop(&netlist, netlist.element("m1").unwrap()));
        assert!(!c.on_loop(&netlist, netlist.element("led1").unwrap()));
    }

    #[test]
    fn test_reachable_skips_owner() {
        let mut g = NetGraph::new();
        g.connect(NetId(0), NetId(1), "r1");
        g.direct(NetId(1), NetId(2), "d1");
        assert_eq!(g.reachable([NetId(0)], None).len(), 3);
        assert_eq!(g.reachable([NetId(0)], Some("d1")).len(), 2);
        assert!(g.reversed().reachable([NetId(2)], None).contains(&NetId(0)));
        assert_eq!(g.edge_count(), 3);
    }
}
