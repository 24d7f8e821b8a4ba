//! Component models for circuit simulation.
//!
//! This module provides one typed parameter record per component kind:
//! - Linear: Resistor, Capacitor, Polarized Capacitor, Inductor
//! - Sources: Voltage Source, Current Source
//! - Junctions: LED, RGB LED, Diode
//! - Transistor: NPN/PNP BJT
//! - Controls: SPST/SPDT/DPST/DPDT switches, Push Button, Potentiometer
//! - Loads: Motor, Buzzer
//! - Instruments: Voltmeter, Ground
//!
//! Parameters are validated and defaulted when the snapshot is read, so the
//! netlist builder never has to guess a missing value.

mod bjt;
mod controls;
mod diode;
mod linear;
mod loads;
mod sources;

pub use bjt::{BiasPoint, Polarity, Transistor, TransistorRegion};
pub use controls::{
    ButtonVariant, Contact, DpdtSwitch, DpstSwitch, Potentiometer, PushButton, SpdtSwitch,
    SpstSwitch, Taper, Throw, LOG_TAPER_GAMMA,
};
pub use diode::{brightness, Diode, JunctionModel, JunctionState, Led, LedColor, RgbChannel, RgbLed};
pub use linear::{
    companion_conductance, exceeds_reverse_limit, Capacitor, Inductor, PolarizedCapacitor,
    Resistor,
};
pub use loads::{Buzzer, Motor, MotorDrive, Rotation};
pub use sources::{CurrentSource, VoltageSource, Waveform};

use serde::{Deserialize, Serialize};

/// The kind of a component together with its parameters and runtime flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentKind {
    Resistor(Resistor),
    #[serde(alias = "battery")]
    VoltageSource(VoltageSource),
    CurrentSource(CurrentSource),
    SpstSwitch(SpstSwitch),
    SpdtSwitch(SpdtSwitch),
    DpstSwitch(DpstSwitch),
    DpdtSwitch(DpdtSwitch),
    PushButton(PushButton),
    Led(Led),
    RgbLed(RgbLed),
    Diode(Diode),
    Transistor(Transistor),
    Motor(Motor),
    Buzzer(Buzzer),
    Capacitor(Capacitor),
    PolarizedCapacitor(PolarizedCapacitor),
    Inductor(Inductor),
    Potentiometer(Potentiometer),
    Voltmeter,
    Ground,
}

impl ComponentKind {
    /// Canonical pin ids of this kind, in a fixed order.
    pub fn pins(&self) -> &'static [&'static str] {
        match self {
            ComponentKind::Resistor(_)
            | ComponentKind::SpstSwitch(_)
            | ComponentKind::PushButton(_)
            | ComponentKind::Motor(_)
            | ComponentKind::Capacitor(_)
            | ComponentKind::Inductor(_) => &["a", "b"],
            ComponentKind::VoltageSource(_)
            | ComponentKind::CurrentSource(_)
            | ComponentKind::Buzzer(_)
            | ComponentKind::PolarizedCapacitor(_)
            | ComponentKind::Voltmeter => &["pos", "neg"],
            ComponentKind::SpdtSwitch(_) => &["com", "a", "b"],
            ComponentKind::DpstSwitch(_) => &["a1", "b1", "a2", "b2"],
            ComponentKind::DpdtSwitch(_) => &["com1", "a1", "b1", "com2", "a2", "b2"],
            ComponentKind::Led(_) | ComponentKind::Diode(_) => &["anode", "cathode"],
            ComponentKind::RgbLed(_) => &["red", "green", "blue", "cathode"],
            ComponentKind::Transistor(_) => &["collector", "base", "emitter"],
            ComponentKind::Potentiometer(_) => &["a", "wiper", "b"],
            ComponentKind::Ground => &["gnd"],
        }
    }

    /// Check whether `pin` is one of this kind's pins.
    pub fn has_pin(&self, pin: &str) -> bool {
        self.pins().contains(&pin)
    }

    /// Pins that are tied to the global ground net.
    pub fn ground_pins(&self) -> &'static [&'static str] {
        match self {
            ComponentKind::Ground => &["gnd"],
            ComponentKind::VoltageSource(v) if v.grounded => &["neg"],
            _ => &[],
        }
    }

    /// Contact pairs of switch-like components; `None` for everything else.
    pub fn contacts(&self) -> Option<Vec<Contact>> {
        match self {
            ComponentKind::SpstSwitch(s) => Some(s.contacts()),
            ComponentKind::SpdtSwitch(s) => Some(s.contacts()),
            ComponentKind::DpstSwitch(s) => Some(s.contacts()),
            ComponentKind::DpdtSwitch(s) => Some(s.contacts()),
            ComponentKind::PushButton(b) => Some(b.contacts()),
            _ => None,
        }
    }

    /// Whether this component drives the circuit.
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            ComponentKind::VoltageSource(_) | ComponentKind::CurrentSource(_)
        )
    }

    /// Snake-case type name, as used in snapshots.
    pub fn type_name(&self) -> &'static str {
        match self {
            ComponentKind::Resistor(_) => "resistor",
            ComponentKind::VoltageSource(_) => "voltage_source",
            ComponentKind::CurrentSource(_) => "current_source",
            ComponentKind::SpstSwitch(_) => "spst_switch",
            ComponentKind::SpdtSwitch(_) => "spdt_switch",
            ComponentKind::DpstSwitch(_) => "dpst_switch",
            ComponentKind::DpdtSwitch(_) => "dpdt_switch",
            ComponentKind::PushButton(_) => "push_button",
            ComponentKind::Led(_) => "led",
            ComponentKind::RgbLed(_) => "rgb_led",
            ComponentKind::Diode(_) => "diode",
            ComponentKind::Transistor(_) => "transistor",
            ComponentKind::Motor(_) => "motor",
            ComponentKind::Buzzer(_) => "buzzer",
            ComponentKind::Capacitor(_) => "capacitor",
            ComponentKind::PolarizedCapacitor(_) => "polarized_capacitor",
            ComponentKind::Inductor(_) => "inductor",
            ComponentKind::Potentiometer(_) => "potentiometer",
            ComponentKind::Voltmeter => "voltmeter",
            ComponentKind::Ground => "ground",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_alias_and_ground_pin() {
        let kind: ComponentKind =
            serde_json::from_str(r#"{"type": "battery", "voltage": 9}"#).unwrap();
        assert_eq!(kind.type_name(), "voltage_source");
        assert_eq!(kind.ground_pins(), &["neg"]);

        let floating: ComponentKind =
            serde_json::from_str(r#"{"type": "voltage_source", "voltage": 9, "grounded": false}"#)
                .unwrap();
        assert!(floating.ground_pins().is_empty());
    }

    #[test]
    fn test_unit_kinds() {
        let kind: ComponentKind = serde_json::from_str(r#"{"type": "voltmeter"}"#).unwrap();
        assert_eq!(kind, ComponentKind::Voltmeter);
        assert!(kind.has_pin("neg"));
        assert!(!kind.has_pin("gnd"));
    }

    #[test]
    fn test_only_switches_have_contacts() {
        let sw: ComponentKind =
            serde_json::from_str(r#"{"type": "dpst_switch", "closed": true}"#).unwrap();
        assert_eq!(sw.contacts().map(|c| c.len()), Some(2));
        let r = ComponentKind::Resistor(Resistor::new(1.0));
        assert!(r.contacts().is_none());
    }
}
