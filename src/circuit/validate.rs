//! Circuit validation.

use std::collections::BTreeSet;

use crate::components::ComponentKind;
use crate::error::{BreadboardError, Result};

use super::Circuit;

/// Validate a circuit for simulation.
///
/// Checks:
/// - No duplicate component ids
/// - Component parameters are physical (positive, finite, in range)
///
/// Wiring problems are not checked here; the net builder reports them as
/// issues and the solve carries on.
pub fn validate_circuit(circuit: &Circuit) -> Result<()> {
    let mut seen = BTreeSet::new();
    for component in &circuit.components {
        if !seen.insert(&component.id) {
            return Err(BreadboardError::DuplicateComponent {
                id: component.id.to_string(),
            });
        }
        validate_kind(component.id.as_str(), &component.kind)?;
    }
    Ok(())
}

fn positive(id: &str, param: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BreadboardError::invalid_parameter(
            id,
            param,
            format!("must be a positive finite number, got {value}"),
        ))
    }
}

fn non_negative(id: &str, param: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(BreadboardError::invalid_parameter(
            id,
            param,
            format!("must be zero or positive, got {value}"),
        ))
    }
}

fn finite(id: &str, param: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(BreadboardError::invalid_parameter(id, param, "must be finite"))
    }
}

fn validate_kind(id: &str, kind: &ComponentKind) -> Result<()> {
    match kind {
        ComponentKind::Resistor(r) => positive(id, "resistance", r.resistance),
        ComponentKind::VoltageSource(v) => {
            finite(id, "voltage", v.voltage)?;
            non_negative(id, "internal_resistance", v.internal_resistance)?;
            if let Some(w) = &v.waveform {
                finite(id, "waveform.amplitude", w.amplitude)?;
                non_negative(id, "waveform.frequency", w.frequency)?;
                finite(id, "waveform.phase", w.phase)?;
            }
            Ok(())
        }
        ComponentKind::CurrentSource(i) => finite(id, "current", i.current),
        ComponentKind::Led(led) => {
            positive(id, "forward_voltage", led.forward_voltage)?;
            positive(id, "on_resistance", led.on_resistance)?;
            positive(id, "reference_current", led.reference_current)?;
            non_negative(id, "min_current", led.min_current)?;
            positive(id, "max_current", led.max_current)
        }
        ComponentKind::RgbLed(led) => {
            positive(id, "red_forward_voltage", led.red_forward_voltage)?;
            positive(id, "green_forward_voltage", led.green_forward_voltage)?;
            positive(id, "blue_forward_voltage", led.blue_forward_voltage)?;
            positive(id, "on_resistance", led.on_resistance)?;
            positive(id, "reference_current", led.reference_current)?;
            non_negative(id, "min_current", led.min_current)?;
            positive(id, "max_current", led.max_current)
        }
        ComponentKind::Diode(d) => {
            positive(id, "forward_voltage", d.forward_voltage)?;
            positive(id, "on_resistance", d.on_resistance)?;
            if let Some(bv) = d.breakdown_voltage {
                positive(id, "breakdown_voltage", bv)?;
            }
            Ok(())
        }
        ComponentKind::Transistor(q) => {
            positive(id, "beta", q.beta)?;
            positive(id, "vbe_on", q.vbe_on)?;
            non_negative(id, "vce_sat", q.vce_sat)?;
            positive(id, "base_resistance", q.base_resistance)?;
            positive(id, "saturation_resistance", q.saturation_resistance)
        }
        ComponentKind::Motor(m) => {
            positive(id, "resistance", m.resistance)?;
            non_negative(id, "min_current", m.min_current)?;
            positive(id, "rated_current", m.rated_current)
        }
        ComponentKind::Buzzer(b) => {
            positive(id, "resistance", b.resistance)?;
            non_negative(id, "min_voltage", b.min_voltage)?;
            non_negative(id, "min_current", b.min_current)
        }
        ComponentKind::Capacitor(c) => {
            positive(id, "capacitance", c.capacitance)?;
            finite(id, "initial_voltage", c.initial_voltage)?;
            positive(id, "leakage_resistance", c.leakage_resistance)
        }
        ComponentKind::PolarizedCapacitor(c) => {
            positive(id, "capacitance", c.capacitance)?;
            finite(id, "initial_voltage", c.initial_voltage)?;
            positive(id, "leakage_resistance", c.leakage_resistance)?;
            non_negative(id, "reverse_voltage_limit", c.reverse_voltage_limit)
        }
        ComponentKind::Inductor(l) => {
            positive(id, "inductance", l.inductance)?;
            finite(id, "initial_current", l.initial_current)
        }
        ComponentKind::Potentiometer(p) => {
            positive(id, "resistance", p.resistance)?;
            if (0.0..=1.0).contains(&p.wiper) {
                Ok(())
            } else {
                Err(BreadboardError::invalid_parameter(
                    id,
                    "wiper",
                    format!("must lie in [0, 1], got {}", p.wiper),
                ))
            }
        }
        ComponentKind::SpstSwitch(_)
        | ComponentKind::SpdtSwitch(_)
        | ComponentKind::DpstSwitch(_)
        | ComponentKind::DpdtSwitch(_)
        | ComponentKind::PushButton(_)
        | ComponentKind::Voltmeter
        | ComponentKind::Ground => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Potentiometer, Resistor};

    #[test]
    fn test_duplicate_ids_rejected() {
        let circuit = Circuit::new()
            .with_component("r1", ComponentKind::Resistor(Resistor::new(100.0)))
            .with_component("r1", ComponentKind::Resistor(Resistor::new(200.0)));
        assert!(matches!(
            validate_circuit(&circuit),
            Err(BreadboardError::DuplicateComponent { .. })
        ));
    }

    #[test]
    fn test_non_physical_values_rejected() {
        let circuit =
            Circuit::new().with_component("r1", ComponentKind::Resistor(Resistor::new(-5.0)));
        let err = validate_circuit(&circuit).unwrap_err();
        assert!(err.to_string().contains("resistance"));

        let mut pot = Potentiometer::new(10_000.0, 0.5);
        pot.wiper = 1.5;
        let circuit = Circuit::new().with_component("p1", ComponentKind::Potentiometer(pot));
        assert!(validate_circuit(&circuit).is_err());
    }

    #[test]
    fn test_valid_circuit_passes() {
        let circuit = Circuit::new()
            .with_component("r1", ComponentKind::Resistor(Resistor::new(100.0)))
            .with_component("g", ComponentKind::Ground);
        assert!(validate_circuit(&circuit).is_ok());
    }
}
