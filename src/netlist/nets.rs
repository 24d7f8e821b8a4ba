//! Net builder: groups pins into equipotential nets.
//!
//! Pins are unioned when they are joined by a complete wire, by a closed
//! switch contact, or when both are ground-like (ground symbols and grounded
//! supply terminals). Net ids are assigned by sorting the groups on their
//! smallest pin key, so an unchanged snapshot always yields the same ids.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::circuit::{Circuit, ComponentId, NetId, PinKey, PinRef};

/// Simple union-find for grouping connected pins into nets.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Which end of a wire an issue refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WireEnd {
    From,
    To,
}

/// A wiring problem. Issues never abort a solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologyIssue {
    /// A wire end is unattached or points at a pin that does not exist
    DanglingWire {
        wire: String,
        end: WireEnd,
        endpoint: Option<String>,
    },
    /// Nothing in the circuit is ground-like
    NoReferenceNode,
    /// A wired pin is cut off by an open switch contact
    FloatingSwitchPin {
        component: ComponentId,
        pin: String,
        net: NetId,
    },
}

impl fmt::Display for TopologyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyIssue::DanglingWire {
                wire,
                end,
                endpoint: Some(endpoint),
            } => write!(f, "wire {wire}: {end:?} end references unknown pin {endpoint}"),
            TopologyIssue::DanglingWire { wire, end, .. } => {
                write!(f, "wire {wire}: {end:?} end is not attached")
            }
            TopologyIssue::NoReferenceNode => {
                write!(f, "circuit has no ground or grounded supply; voltages are relative")
            }
            TopologyIssue::FloatingSwitchPin {
                component,
                pin,
                net,
            } => write!(f, "{component}:{pin} is left floating by an open contact ({net})"),
        }
    }
}

/// An equivalence class of pins at one potential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Net {
    pub id: NetId,
    /// Member pins, sorted
    pub pins: Vec<PinKey>,
    pub is_ground: bool,
}

impl Net {
    /// A net with a single pin is floating and gets no matrix node.
    pub fn is_floating(&self) -> bool {
        self.pins.len() < 2 && !self.is_ground
    }
}

/// Result of net building.
#[derive(Debug, Clone)]
pub struct NetMap {
    pub nets: Vec<Net>,
    pin_net: HashMap<PinKey, NetId>,
    pub ground: Option<NetId>,
    pub issues: Vec<TopologyIssue>,
}

impl NetMap {
    /// Net holding a pin.
    pub fn net_of(&self, key: &PinKey) -> Option<NetId> {
        self.pin_net.get(key).copied()
    }

    /// Net holding a component's pin.
    pub fn net_of_pin(&self, component: &ComponentId, pin: &str) -> Option<NetId> {
        self.net_of(&PinKey::new(component, pin))
    }

    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.0]
    }
}

/// Union all pins of a circuit into nets.
pub fn build_nets(circuit: &Circuit) -> NetMap {
    let mut keys: Vec<PinKey> = Vec::new();
    let mut index: HashMap<PinKey, usize> = HashMap::new();
    for component in &circuit.components {
        for pin in component.kind.pins() {
            let key = component.pin_key(pin);
            if !index.contains_key(&key) {
                index.insert(key.clone(), keys.len());
                keys.push(key);
            }
        }
    }

    let mut uf = UnionFind::new(keys.len());
    let mut issues = Vec::new();

    // Wires
    for wire in &circuit.wires {
        let from = resolve_end(&index, wire.id.as_str(), WireEnd::From, wire.from.as_ref());
        let to = resolve_end(&index, wire.id.as_str(), WireEnd::To, wire.to.as_ref());
        match (from, to) {
            (Ok(a), Ok(b)) => uf.union(a, b),
            (a, b) => issues.extend(a.err().into_iter().chain(b.err())),
        }
    }

    // Closed switch contacts
    for component in &circuit.components {
        for contact in component.kind.contacts().unwrap_or_default() {
            if contact.closed {
                let a = index[&component.pin_key(contact.a)];
                let b = index[&component.pin_key(contact.b)];
                uf.union(a, b);
            }
        }
    }

    // Ground-like pins
    let index = &index;
    let ground_pins: Vec<usize> = circuit
        .components
        .iter()
        .flat_map(|c| c.kind.ground_pins().iter().map(move |p| index[&c.pin_key(p)]))
        .collect();
    if let Some((&first, rest)) = ground_pins.split_first() {
        for &other in rest {
            uf.union(first, other);
        }
    }

    // Group by root, then order groups by their smallest key
    let mut groups: BTreeMap<usize, Vec<PinKey>> = BTreeMap::new();
    for (i, key) in keys.iter().enumerate() {
        groups.entry(uf.find(i)).or_default().push(key.clone());
    }
    let ground_root = ground_pins.first().map(|&g| uf.find(g));
    let mut sorted: Vec<(bool, Vec<PinKey>)> = groups
        .into_iter()
        .map(|(root, mut pins)| {
            pins.sort();
            (Some(root) == ground_root, pins)
        })
        .collect();
    sorted.sort_by(|a, b| a.1[0].cmp(&b.1[0]));

    let mut nets = Vec::with_capacity(sorted.len());
    let mut pin_net = HashMap::with_capacity(keys.len());
    let mut ground = None;
    for (i, (is_ground, pins)) in sorted.into_iter().enumerate() {
        let id = NetId(i);
        for pin in &pins {
            pin_net.insert(pin.clone(), id);
        }
        if is_ground {
            ground = Some(id);
        }
        nets.push(Net { id, pins, is_ground });
    }

    let mut map = NetMap {
        nets,
        pin_net,
        ground,
        issues,
    };

    if map.ground.is_none() && !circuit.components.is_empty() {
        map.issues.push(TopologyIssue::NoReferenceNode);
    }
    let floating = floating_switch_pins(circuit, &map);
    map.issues.extend(floating);
    map
}

fn resolve_end(
    index: &HashMap<PinKey, usize>,
    wire: &str,
    end: WireEnd,
    pin: Option<&PinRef>,
) -> Result<usize, TopologyIssue> {
    let dangling = |endpoint: Option<String>| TopologyIssue::DanglingWire {
        wire: wire.to_string(),
        end,
        endpoint,
    };
    let pin = pin.ok_or_else(|| dangling(None))?;
    let key = pin.key();
    index.get(&key).copied().ok_or_else(|| dangling(Some(key.0)))
}

/// Wired pins of open contacts whose net has no source terminal and no ground.
fn floating_switch_pins(circuit: &Circuit, map: &NetMap) -> Vec<TopologyIssue> {
    let driven: BTreeSet<PinKey> = circuit
        .components
        .iter()
        .filter(|c| c.kind.is_source())
        .flat_map(|c| c.kind.pins().iter().map(move |p| c.pin_key(p)))
        .collect();

    let mut issues = Vec::new();
    for component in &circuit.components {
        let Some(contacts) = component.kind.contacts() else {
            continue;
        };
        let closed: BTreeSet<&str> = contacts
            .iter()
            .filter(|c| c.closed)
            .flat_map(|c| [c.a, c.b])
            .collect();
        let open: BTreeSet<&str> = contacts
            .iter()
            .filter(|c| !c.closed)
            .flat_map(|c| [c.a, c.b])
            .filter(|p| !closed.contains(p))
            .collect();

        for pin in open {
            let Some(net_id) = map.net_of_pin(&component.id, pin) else {
                continue;
            };
            let net = map.net(net_id);
            if net.pins.len() < 2 || net.is_ground {
                continue;
            }
            if !net.pins.iter().any(|p| driven.contains(p)) {
                issues.push(TopologyIssue::FloatingSwitchPin {
                    component: component.id.clone(),
                    pin: pin.to_string(),
                    net: net_id,
                });
            }
        }
    }
    issues
}
