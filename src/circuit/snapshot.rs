//! Circuit snapshot as handed over by the editor.

use serde::{Deserialize, Serialize};

use super::types::{ComponentId, PinKey};
use crate::components::ComponentKind;
use crate::error::Result;

/// Canvas position. Carried through for the editor, no electrical meaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A placed component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    #[serde(flatten)]
    pub kind: ComponentKind,
    #[serde(default)]
    pub position: Position,
}

impl Component {
    pub fn new(id: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            id: ComponentId::new(id),
            kind,
            position: Position::default(),
        }
    }

    /// Canonical key of one of this component's pins.
    pub fn pin_key(&self, pin: &str) -> PinKey {
        PinKey::new(&self.id, pin)
    }
}

/// One end of a wire: a pin on a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinRef {
    pub component: ComponentId,
    pub pin: String,
}

impl PinRef {
    pub fn new(component: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            component: ComponentId::new(component),
            pin: pin.into(),
        }
    }

    pub fn key(&self) -> PinKey {
        PinKey::new(&self.component, &self.pin)
    }
}

/// A wire between two pins. Routing geometry is ignored.
///
/// Endpoints are optional because the editor hands over half-drawn wires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wire {
    pub id: String,
    #[serde(default)]
    pub from: Option<PinRef>,
    #[serde(default)]
    pub to: Option<PinRef>,
}

impl Wire {
    pub fn new(id: impl Into<String>, from: PinRef, to: PinRef) -> Self {
        Self {
            id: id.into(),
            from: Some(from),
            to: Some(to),
        }
    }
}

/// A complete circuit snapshot ready for solving.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub wires: Vec<Wire>,
}

impl Circuit {
    /// Create an empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a snapshot from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Add a component, returning `self` for chaining.
    pub fn with_component(mut self, id: impl Into<String>, kind: ComponentKind) -> Self {
        self.components.push(Component::new(id, kind));
        self
    }

    /// Wire two pins given as `(component, pin)` pairs.
    pub fn with_wire(mut self, from: (&str, &str), to: (&str, &str)) -> Self {
        let id = format!("w{}", self.wires.len() + 1);
        self.wires.push(Wire::new(
            id,
            PinRef::new(from.0, from.1),
            PinRef::new(to.0, to.1),
        ));
        self
    }

    /// Find a component by id.
    pub fn component(&self, id: &ComponentId) -> Option<&Component> {
        self.components.iter().find(|c| &c.id == id)
    }

    /// Find a component by id for editing.
    pub fn component_mut(&mut self, id: &ComponentId) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| &c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentKind;

    #[test]
    fn test_parse_snapshot() {
        let json = r#"{
            "components": [
                {"id": "bat", "type": "battery", "voltage": 5, "position": {"x": 1, "y": 2}},
                {"id": "r1", "type": "resistor", "resistance": 220, "label": "R1"},
                {"id": "g", "type": "ground"}
            ],
            "wires": [
                {"id": "w1", "from": {"component": "bat", "pin": "pos"}, "to": {"component": "r1", "pin": "a"}},
                {"id": "w2", "from": {"component": "r1", "pin": "b"}}
            ]
        }"#;
        let circuit = Circuit::from_json(json).unwrap();
        assert_eq!(circuit.components.len(), 3);
        assert_eq!(circuit.components[0].position, Position { x: 1.0, y: 2.0 });
        assert!(matches!(
            circuit.components[1].kind,
            ComponentKind::Resistor(ref r) if r.resistance == 220.0
        ));
        assert_eq!(circuit.components[2].kind, ComponentKind::Ground);
        assert!(circuit.wires[1].to.is_none());
    }

    #[test]
    fn test_unknown_kind_is_an_error() {
        let json = r#"{"components": [{"id": "x", "type": "flux_capacitor"}]}"#;
        assert!(Circuit::from_json(json).is_err());
    }
}
