//! Linear passive components: Resistor, Capacitor, Inductor.

use serde::{Deserialize, Serialize};

use crate::solver::{CAPACITOR_LEAKAGE_RESISTANCE, MIN_RESISTANCE};

/// A resistor component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resistor {
    /// Resistance in ohms
    pub resistance: f64,
}

impl Resistor {
    /// Create a new resistor.
    pub fn new(resistance: f64) -> Self {
        Self { resistance }
    }

    /// Resistance as stamped, floored to avoid an infinite conductance.
    pub fn effective_resistance(&self) -> f64 {
        self.resistance.max(MIN_RESISTANCE)
    }

    /// Get the conductance (1/R).
    pub fn conductance(&self) -> f64 {
        1.0 / self.effective_resistance()
    }
}

fn default_leakage() -> f64 {
    CAPACITOR_LEAKAGE_RESISTANCE
}

fn default_reverse_limit() -> f64 {
    1.0
}

/// A capacitor component.
///
/// In DC analysis the capacitor is only its leakage resistance, which makes it
/// behave as an open circuit. In transient analysis it is discretized with
/// Backward Euler:
///   i(n) = (C/dt) * (v(n) - v(n-1))
///
/// giving an equivalent conductance G_eq = C/dt in parallel with a history
/// current source I_eq = (C/dt) * v(n-1) driven into the positive terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capacitor {
    /// Capacitance in farads
    pub capacitance: f64,
    /// Voltage across the plates before the first transient step
    #[serde(default)]
    pub initial_voltage: f64,
    /// Parallel leakage path
    #[serde(default = "default_leakage")]
    pub leakage_resistance: f64,
}

impl Capacitor {
    /// Create a new capacitor.
    pub fn new(capacitance: f64) -> Self {
        Self {
            capacitance,
            initial_voltage: 0.0,
            leakage_resistance: CAPACITOR_LEAKAGE_RESISTANCE,
        }
    }

    /// Start the capacitor charged to `voltage`.
    pub fn with_initial_voltage(mut self, voltage: f64) -> Self {
        self.initial_voltage = voltage;
        self
    }

    /// Get the equivalent conductance for the Backward-Euler companion model.
    pub fn conductance(&self, dt: f64) -> f64 {
        companion_conductance(self.capacitance, dt)
    }

    /// Get the companion history current for the previous plate voltage.
    pub fn history_current(&self, dt: f64, v_prev: f64) -> f64 {
        self.conductance(dt) * v_prev
    }

    /// Plate current after a step, from the exact difference quotient.
    pub fn branch_current(&self, dt: f64, v_now: f64, v_prev: f64) -> f64 {
        self.capacitance * (v_now - v_prev) / dt
    }
}

/// An electrolytic capacitor with a reverse-voltage rating.
///
/// Electrically identical to [`Capacitor`]; the transient stepper additionally
/// latches `damaged` once the reverse rating is exceeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarizedCapacitor {
    pub capacitance: f64,
    #[serde(default)]
    pub initial_voltage: f64,
    #[serde(default = "default_leakage")]
    pub leakage_resistance: f64,
    /// Largest tolerated voltage with `neg` above `pos`
    #[serde(default = "default_reverse_limit")]
    pub reverse_voltage_limit: f64,
    /// Persisted damage flag
    #[serde(default)]
    pub damaged: bool,
}

impl PolarizedCapacitor {
    /// View the electrical part of this capacitor.
    pub fn as_capacitor(&self) -> Capacitor {
        Capacitor {
            capacitance: self.capacitance,
            initial_voltage: self.initial_voltage,
            leakage_resistance: self.leakage_resistance,
        }
    }
}

/// Check whether a plate voltage (pos - neg) exceeds a reverse rating.
pub fn exceeds_reverse_limit(voltage: f64, limit: f64) -> bool {
    -voltage > limit
}

/// Conductance of a Backward-Euler capacitor companion.
pub fn companion_conductance(capacitance: f64, dt: f64) -> f64 {
    capacitance / dt
}

/// An inductor component.
///
/// Backward Euler gives:
///   i(n) = (dt/L) * v(n) + i(n-1)
///
/// so the companion is a conductance dt/L in parallel with a current source
/// carrying the previous branch current from `a` to `b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inductor {
    /// Inductance in henries
    pub inductance: f64,
    /// Branch current before the first transient step
    #[serde(default)]
    pub initial_current: f64,
}

impl Inductor {
    /// Create a new inductor.
    pub fn new(inductance: f64) -> Self {
        Self {
            inductance,
            initial_current: 0.0,
        }
    }

    /// Get the equivalent conductance for the companion model.
    pub fn conductance(&self, dt: f64) -> f64 {
        dt / self.inductance
    }

    /// Branch current after a step.
    pub fn branch_current(&self, dt: f64, v_now: f64, i_prev: f64) -> f64 {
        self.conductance(dt) * v_now + i_prev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_resistor_conductance() {
        let r = Resistor::new(1000.0);
        assert_relative_eq!(r.conductance(), 0.001, epsilon = 1e-12);
    }

    #[test]
    fn test_capacitor_companion_model() {
        let c = Capacitor::new(1e-6); // 1µF
        let dt = 1e-3;

        // G_eq = C/dt = 1 mS
        assert_relative_eq!(c.conductance(dt), 1e-3, epsilon = 1e-12);

        // Uncharged capacitor has no history
        assert_eq!(c.history_current(dt, 0.0), 0.0);
        assert_relative_eq!(c.history_current(dt, 2.0), 2e-3, epsilon = 1e-12);

        // 1V rise over 1ms through 1µF is 1mA
        assert_relative_eq!(c.branch_current(dt, 1.0, 0.0), 1e-3, epsilon = 1e-12);
    }

    #[test]
    fn test_inductor_companion_model() {
        let l = Inductor::new(10e-3);
        let dt = 1e-4;
        assert_relative_eq!(l.conductance(dt), 0.01, epsilon = 1e-12);
        assert_relative_eq!(l.branch_current(dt, 5.0, 0.1), 0.15, epsilon = 1e-12);
    }

    #[test]
    fn test_polarized_reverse_limit() {
        let c: PolarizedCapacitor =
            serde_json::from_str(r#"{"capacitance": 1e-4, "reverse_voltage_limit": 1.5}"#)
                .unwrap();
        let limit = c.reverse_voltage_limit;
        assert!(!exceeds_reverse_limit(10.0, limit));
        assert!(!exceeds_reverse_limit(-1.0, limit));
        assert!(!exceeds_reverse_limit(-1.5, limit));
        assert!(exceeds_reverse_limit(-2.0, limit));
        assert!(!c.damaged);
        assert_eq!(c.leakage_resistance, CAPACITOR_LEAKAGE_RESISTANCE);
    }
}
