//! Netlist builder: numbers the nets and expands components into elements.
//!
//! Every net with at least two pins gets a matrix node; the ground net is
//! node 0. Components become one or more canonical two- or three-terminal
//! elements. An element with an unconnected terminal is left out of the
//! matrix entirely.

use std::collections::BTreeMap;

use tracing::debug;

use crate::circuit::{Circuit, Component, ComponentId, NetId, NodeId};
use crate::components::{
    Capacitor, ComponentKind, Inductor, JunctionModel, RgbChannel, Transistor, VoltageSource,
};

use super::nets::{build_nets, NetMap};

/// What an ohmic element stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRole {
    Plain,
    Motor,
    Buzzer,
    PotSegment,
}

/// Brightness and damage thresholds of a light-emitting junction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedRating {
    pub reference_current: f64,
    pub min_current: f64,
    pub max_current: f64,
}

impl LedRating {
    pub fn brightness(&self, current: f64) -> f64 {
        crate::components::brightness(current, self.min_current, self.reference_current)
    }
}

/// Which device a junction element belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JunctionDevice {
    Led(LedRating),
    RgbChannel(RgbChannel, LedRating),
    Diode,
}

impl JunctionDevice {
    pub fn rating(&self) -> Option<&LedRating> {
        match self {
            JunctionDevice::Led(r) | JunctionDevice::RgbChannel(_, r) => Some(r),
            JunctionDevice::Diode => None,
        }
    }

    pub fn is_light(&self) -> bool {
        self.rating().is_some()
    }
}

/// A canonical stamped element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Resistor {
        a: NodeId,
        b: NodeId,
        resistance: f64,
        role: LoadRole,
    },
    Switch {
        a: NodeId,
        b: NodeId,
        closed: bool,
    },
    VoltageSource {
        pos: NodeId,
        neg: NodeId,
        /// Node between the series resistance and the ideal source
        internal: Option<NodeId>,
        source: VoltageSource,
    },
    CurrentSource {
        pos: NodeId,
        neg: NodeId,
        current: f64,
    },
    Capacitor {
        a: NodeId,
        b: NodeId,
        capacitor: Capacitor,
        reverse_limit: Option<f64>,
    },
    Inductor {
        a: NodeId,
        b: NodeId,
        inductor: Inductor,
    },
    Junction {
        anode: NodeId,
        cathode: NodeId,
        model: JunctionModel,
        device: JunctionDevice,
        burned: bool,
        damage_ticks: u32,
    },
    Transistor {
        collector: NodeId,
        base: NodeId,
        emitter: NodeId,
        transistor: Transistor,
    },
}

/// An element together with the component it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Unique per element: the component id, or `id:part` for multi-element components
    pub key: String,
    pub owner: ComponentId,
    pub kind: ElementKind,
}

impl Element {
    /// Node pairs this element connects, for graph building.
    pub fn terminals(&self) -> Vec<NodeId> {
        match &self.kind {
            ElementKind::Resistor { a, b, .. }
            | ElementKind::Switch { a, b, .. }
            | ElementKind::Capacitor { a, b, .. }
            | ElementKind::Inductor { a, b, .. } => vec![*a, *b],
            ElementKind::VoltageSource { pos, neg, .. }
            | ElementKind::CurrentSource { pos, neg, .. } => vec![*pos, *neg],
            ElementKind::Junction { anode, cathode, .. } => vec![*anode, *cathode],
            ElementKind::Transistor {
                collector,
                base,
                emitter,
                ..
            } => vec![*collector, *base, *emitter],
        }
    }
}

/// Matrix-ready view of a circuit.
#[derive(Debug, Clone)]
pub struct Netlist {
    pub nets: NetMap,
    /// Net held at node 0
    pub reference: Option<NetId>,
    net_nodes: BTreeMap<NetId, NodeId>,
    node_nets: Vec<Option<NetId>>,
    pub elements: Vec<Element>,
    pub warnings: Vec<String>,
}

impl Netlist {
    /// Nodes in the system, ground and synthetic nodes included.
    pub fn num_nodes(&self) -> usize {
        self.node_nets.len()
    }

    pub fn node_of_net(&self, net: NetId) -> Option<NodeId> {
        self.net_nodes.get(&net).copied()
    }

    /// Node of a pin; `None` when the pin sits in a floating net.
    pub fn node_of_pin(&self, component: &ComponentId, pin: &str) -> Option<NodeId> {
        self.nets
            .net_of_pin(component, pin)
            .and_then(|net| self.node_of_net(net))
    }

    /// Net behind a node; synthetic nodes have none.
    pub fn net_of_node(&self, node: NodeId) -> Option<NetId> {
        self.node_nets.get(node.0).copied().flatten()
    }

    /// Nets that received a node, in id order.
    pub fn net_nodes(&self) -> impl Iterator<Item = (NetId, NodeId)> + '_ {
        self.net_nodes.iter().map(|(net, node)| (*net, *node))
    }

    pub fn element(&self, key: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.key == key)
    }

    pub fn elements_of<'a>(&'a self, owner: &'a ComponentId) -> impl Iterator<Item = &'a Element> {
        self.elements.iter().filter(move |e| &e.owner == owner)
    }
}

/// Build the netlist for a circuit snapshot.
pub fn build_netlist(circuit: &Circuit) -> Netlist {
    let nets = build_nets(circuit);

    // Without a ground symbol the first multi-pin net becomes the reference
    let reference = nets
        .ground
        .or_else(|| nets.nets.iter().find(|n| n.pins.len() >= 2).map(|n| n.id));

    let mut net_nodes = BTreeMap::new();
    let mut node_nets = vec![reference];
    if let Some(r) = reference {
        net_nodes.insert(r, NodeId::GROUND);
    }
    for net in &nets.nets {
        if Some(net.id) == reference || net.is_floating() {
            continue;
        }
        net_nodes.insert(net.id, NodeId(node_nets.len()));
        node_nets.push(Some(net.id));
    }

    let mut netlist = Netlist {
        nets,
        reference,
        net_nodes,
        node_nets,
        elements: Vec::new(),
        warnings: Vec::new(),
    };
    for component in &circuit.components {
        expand(&mut netlist, component);
    }
    debug!(
        nodes = netlist.num_nodes(),
        elements = netlist.elements.len(),
        "netlist built"
    );
    netlist
}

/// Resolve the nodes of an element's pins, or explain why it is skipped.
fn terminals<const N: usize>(
    netlist: &mut Netlist,
    component: &Component,
    key: &str,
    pins: [&str; N],
) -> Option<[NodeId; N]> {
    let nodes = pins.map(|pin| netlist.node_of_pin(&component.id, pin));
    if nodes.iter().all(Option::is_some) {
        return Some(nodes.map(|n| n.unwrap_or(NodeId::GROUND)));
    }
    // Ground-like pins sit on the ground net without being wired
    let ground_pins = component.kind.ground_pins();
    let untouched = pins
        .iter()
        .zip(&nodes)
        .all(|(pin, node)| node.is_none() || ground_pins.contains(pin));
    if untouched {
        debug!(element = key, "unconnected, not stamped");
    } else {
        let missing: Vec<&str> = pins
            .iter()
            .zip(&nodes)
            .filter(|(_, n)| n.is_none())
            .map(|(p, _)| *p)
            .collect();
        netlist.warnings.push(format!(
            "{key}: pin {} is unconnected; element not stamped",
            missing.join(", ")
        ));
    }
    None
}

fn push(netlist: &mut Netlist, component: &Component, key: String, kind: ElementKind) {
    netlist.elements.push(Element {
        key,
        owner: component.id.clone(),
        kind,
    });
}

fn expand(netlist: &mut Netlist, component: &Component) {
    let id = component.id.as_str();
    match &component.kind {
        ComponentKind::Resistor(r) => {
            if let Some([a, b]) = terminals(netlist, component, id, ["a", "b"]) {
                let kind = ElementKind::Resistor {
                    a,
                    b,
                    resistance: r.effective_resistance(),
                    role: LoadRole::Plain,
                };
                push(netlist, component, id.to_string(), kind);
            }
        }
        ComponentKind::Motor(m) => {
            if let Some([a, b]) = terminals(netlist, component, id, ["a", "b"]) {
                let kind = ElementKind::Resistor {
                    a,
                    b,
                    resistance: m.resistance,
                    role: LoadRole::Motor,
                };
                push(netlist, component, id.to_string(), kind);
            }
        }
        ComponentKind::Buzzer(bz) => {
            if let Some([a, b]) = terminals(netlist, component, id, ["pos", "neg"]) {
                let kind = ElementKind::Resistor {
                    a,
                    b,
                    resistance: bz.resistance,
                    role: LoadRole::Buzzer,
                };
                push(netlist, component, id.to_string(), kind);
            }
        }
        ComponentKind::Potentiometer(p) => {
            let segments = [("a", "wiper", p.r1()), ("wiper", "b", p.r2())];
            for (from, to, resistance) in segments {
                let key = format!("{id}:{from}-{to}");
                if let Some([a, b]) = terminals(netlist, component, &key, [from, to]) {
                    let kind = ElementKind::Resistor {
                        a,
                        b,
                        resistance,
                        role: LoadRole::PotSegment,
                    };
                    push(netlist, component, key, kind);
                }
            }
        }
        ComponentKind::SpstSwitch(_)
        | ComponentKind::SpdtSwitch(_)
        | ComponentKind::DpstSwitch(_)
        | ComponentKind::DpdtSwitch(_)
        | ComponentKind::PushButton(_) => {
            for contact in component.kind.contacts().unwrap_or_default() {
                let key = format!("{id}:{}-{}", contact.a, contact.b);
                if let Some([a, b]) = terminals(netlist, component, &key, [contact.a, contact.b]) {
                    let kind = ElementKind::Switch {
                        a,
                        b,
                        closed: contact.closed,
                    };
                    push(netlist, component, key, kind);
                }
            }
        }
        ComponentKind::VoltageSource(v) => {
            if let Some([pos, neg]) = terminals(netlist, component, id, ["pos", "neg"]) {
                let internal = (v.internal_resistance > 0.0).then(|| {
                    let node = NodeId(netlist.node_nets.len());
                    netlist.node_nets.push(None);
                    node
                });
                let kind = ElementKind::VoltageSource {
                    pos,
                    neg,
                    internal,
                    source: v.clone(),
                };
                push(netlist, component, id.to_string(), kind);
            }
        }
        ComponentKind::CurrentSource(i) => {
            if let Some([pos, neg]) = terminals(netlist, component, id, ["pos", "neg"]) {
                let kind = ElementKind::CurrentSource {
                    pos,
                    neg,
                    current: i.current,
                };
                push(netlist, component, id.to_string(), kind);
            }
        }
        ComponentKind::Capacitor(c) => {
            if let Some([a, b]) = terminals(netlist, component, id, ["a", "b"]) {
                let kind = ElementKind::Capacitor {
                    a,
                    b,
                    capacitor: c.clone(),
                    reverse_limit: None,
                };
                push(netlist, component, id.to_string(), kind);
            }
        }
        ComponentKind::PolarizedCapacitor(c) => {
            if let Some([a, b]) = terminals(netlist, component, id, ["pos", "neg"]) {
                let kind = ElementKind::Capacitor {
                    a,
                    b,
                    capacitor: c.as_capacitor(),
                    reverse_limit: Some(c.reverse_voltage_limit),
                };
                push(netlist, component, id.to_string(), kind);
            }
        }
        ComponentKind::Inductor(l) => {
            if let Some([a, b]) = terminals(netlist, component, id, ["a", "b"]) {
                let kind = ElementKind::Inductor {
                    a,
                    b,
                    inductor: l.clone(),
                };
                push(netlist, component, id.to_string(), kind);
            }
        }
        ComponentKind::Led(led) => {
            if let Some([anode, cathode]) = terminals(netlist, component, id, ["anode", "cathode"]) {
                let rating = LedRating {
                    reference_current: led.reference_current,
                    min_current: led.min_current,
                    max_current: led.max_current,
                };
                let kind = ElementKind::Junction {
                    anode,
                    cathode,
                    model: led.model(),
                    device: JunctionDevice::Led(rating),
                    burned: led.burned,
                    damage_ticks: led.damage_ticks,
                };
                push(netlist, component, id.to_string(), kind);
            }
        }
        ComponentKind::RgbLed(led) => {
            let rating = LedRating {
                reference_current: led.reference_current,
                min_current: led.min_current,
                max_current: led.max_current,
            };
            for channel in RgbChannel::ALL {
                let key = format!("{id}:{}", channel.pin());
                let pins = [channel.pin(), "cathode"];
                if let Some([anode, cathode]) = terminals(netlist, component, &key, pins) {
                    let kind = ElementKind::Junction {
                        anode,
                        cathode,
                        model: led.model(channel),
                        device: JunctionDevice::RgbChannel(channel, rating),
                        burned: led.burned,
                        damage_ticks: 0,
                    };
                    push(netlist, component, key, kind);
                }
            }
        }
        ComponentKind::Diode(d) => {
            if let Some([anode, cathode]) = terminals(netlist, component, id, ["anode", "cathode"]) {
                let kind = ElementKind::Junction {
                    anode,
                    cathode,
                    model: d.model(),
                    device: JunctionDevice::Diode,
                    burned: false,
                    damage_ticks: 0,
                };
                push(netlist, component, id.to_string(), kind);
            }
        }
        ComponentKind::Transistor(q) => {
            let pins = ["collector", "base", "emitter"];
            if let Some([collector, base, emitter]) = terminals(netlist, component, id, pins) {
                let kind = ElementKind::Transistor {
                    collector,
                    base,
                    emitter,
                    transistor: q.clone(),
                };
                push(netlist, component, id.to_string(), kind);
            }
        }
        // Ideal instruments and ground symbols carry no stamp
        ComponentKind::Voltmeter | ComponentKind::Ground => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Led, LedColor, Potentiometer, Resistor, SpdtSwitch, Throw};

    fn led_circuit() -> Circuit {
        Circuit::new()
            .with_component("bat", ComponentKind::VoltageSource(VoltageSource::new(5.0)))
            .with_component("r1", ComponentKind::Resistor(Resistor::new(220.0)))
            .with_component("led1", ComponentKind::Led(Led::new(LedColor::Red)))
            .with_component("gnd", ComponentKind::Ground)
            .with_wire(("bat", "pos"), ("r1", "a"))
            .with_wire(("r1", "b"), ("led1", "anode"))
            .with_wire(("led1", "cathode"), ("gnd", "gnd"))
    }

    #[test]
    fn test_ground_is_node_zero() {
        let netlist = build_netlist(&led_circuit());
        assert_eq!(netlist.node_of_pin(&"gnd".into(), "gnd"), Some(NodeId::GROUND));
        assert_eq!(netlist.node_of_pin(&"bat".into(), "neg"), Some(NodeId::GROUND));
        // Two signal nets plus ground plus the source's internal node
        assert_eq!(netlist.num_nodes(), 4);
        assert_eq!(netlist.elements.len(), 3);
    }

    #[test]
    fn test_source_gets_internal_node() {
        let netlist = build_netlist(&led_circuit());
        let source = netlist.element("bat").unwrap();
        match source.kind {
            ElementKind::VoltageSource { internal, .. } => {
                let node = internal.unwrap();
                assert_eq!(netlist.net_of_node(node), None);
            }
            _ => panic!("expected a voltage source"),
        }
    }

    #[test]
    fn test_unconnected_component_not_stamped() {
        let circuit = led_circuit()
            .with_component("loose", ComponentKind::Resistor(Resistor::new(10.0)));
        let netlist = build_netlist(&circuit);
        assert!(netlist.element("loose").is_none());
        assert!(netlist.warnings.is_empty());
    }

    #[test]
    fn test_unwired_grounded_battery_is_quiet() {
        let circuit = led_circuit()
            .with_component("spare", ComponentKind::VoltageSource(VoltageSource::new(9.0)));
        let netlist = build_netlist(&circuit);
        assert!(netlist.element("spare").is_none());
        assert!(netlist.warnings.is_empty());

        // A wired negative terminal is a real half connection
        let floating = VoltageSource {
            grounded: false,
            ..VoltageSource::new(9.0)
        };
        let circuit = led_circuit()
            .with_component("spare", ComponentKind::VoltageSource(floating))
            .with_wire(("spare", "neg"), ("gnd", "gnd"));
        let netlist = build_netlist(&circuit);
        assert_eq!(netlist.warnings.len(), 1);
        assert!(netlist.warnings[0].starts_with("spare: pin pos"));
    }

    #[test]
    fn test_half_connected_component_warns() {
        let circuit = led_circuit()
            .with_component("dangling", ComponentKind::Resistor(Resistor::new(10.0)))
            .with_wire(("dangling", "a"), ("bat", "pos"));
        let netlist = build_netlist(&circuit);
        assert!(netlist.element("dangling").is_none());
        assert_eq!(netlist.warnings.len(), 1);
        assert!(netlist.warnings[0].contains("pin b"));
    }

    #[test]
    fn test_potentiometer_splits_on_wiper() {
        let circuit = Circuit::new()
            .with_component("p", ComponentKind::Potentiometer(Potentiometer::new(10_000.0, 0.25)))
            .with_component("g", ComponentKind::Ground)
            .with_component("bat", ComponentKind::VoltageSource(VoltageSource::new(5.0)))
            .with_wire(("bat", "pos"), ("p", "a"))
            .with_wire(("p", "b"), ("g", "gnd"))
            .with_wire(("p", "wiper"), ("g", "gnd"));
        let netlist = build_netlist(&circuit);
        let segments: Vec<f64> = netlist
            .elements_of(&"p".into())
            .filter_map(|e| match e.kind {
                ElementKind::Resistor { resistance, .. } => Some(resistance),
                _ => None,
            })
            .collect();
        assert_eq!(segments, vec![2_500.0, 7_500.0]);
    }

    #[test]
    fn test_spdt_expands_to_two_switches() {
        let circuit = Circuit::new()
            .with_component("sw", ComponentKind::SpdtSwitch(SpdtSwitch { throw: Throw::A }))
            .with_component("r1", ComponentKind::Resistor(Resistor::new(1.0)))
            .with_component("r2", ComponentKind::Resistor(Resistor::new(1.0)))
            .with_wire(("sw", "com"), ("r1", "a"))
            .with_wire(("sw", "b"), ("r2", "a"))
            .with_wire(("r1", "b"), ("r2", "b"));
        let netlist = build_netlist(&circuit);
        let closed: Vec<bool> = netlist
            .elements_of(&"sw".into())
            .filter_map(|e| match e.kind {
                ElementKind::Switch { closed, .. } => Some(closed),
                _ => None,
            })
            .collect();
        assert_eq!(closed, vec![true, false]);
    }
}
