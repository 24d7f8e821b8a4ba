//! Voltage and current sources.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::solver::DEFAULT_SOURCE_RESISTANCE;

fn default_internal_resistance() -> f64 {
    DEFAULT_SOURCE_RESISTANCE
}

fn default_grounded() -> bool {
    true
}

/// Sinusoidal component added on top of a source's DC value in transient mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    /// Peak amplitude in volts
    pub amplitude: f64,
    /// Frequency in Hz
    pub frequency: f64,
    /// Phase in degrees
    #[serde(default)]
    pub phase: f64,
}

impl Waveform {
    /// Instantaneous value at time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        self.amplitude * (2.0 * PI * self.frequency * t + self.phase.to_radians()).sin()
    }
}

/// A voltage source component (battery, bench supply, signal generator).
///
/// The source is stamped as an ideal source behind a series resistance:
///
/// ```text
///   pos ----[R_int]---- internal ----(+ E -)---- neg
/// ```
///
/// The ideal part adds one branch-current unknown to the MNA system. With
/// `internal_resistance == 0` the internal node is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageSource {
    /// DC value in volts
    pub voltage: f64,
    #[serde(default = "default_internal_resistance")]
    pub internal_resistance: f64,
    /// Optional sine added in transient mode
    #[serde(default)]
    pub waveform: Option<Waveform>,
    /// Whether the negative terminal is tied to the global ground net
    #[serde(default = "default_grounded")]
    pub grounded: bool,
}

impl VoltageSource {
    /// Create a new grounded DC source with the default internal resistance.
    pub fn new(voltage: f64) -> Self {
        Self {
            voltage,
            internal_resistance: DEFAULT_SOURCE_RESISTANCE,
            waveform: None,
            grounded: true,
        }
    }

    /// Remove the internal resistance.
    pub fn ideal(mut self) -> Self {
        self.internal_resistance = 0.0;
        self
    }

    /// Get the source voltage at time `t`; `None` means a DC solve.
    pub fn voltage_at(&self, t: Option<f64>) -> f64 {
        match (t, &self.waveform) {
            (Some(t), Some(w)) => self.voltage + w.value_at(t),
            _ => self.voltage,
        }
    }

    /// Whether the source alternates polarity.
    pub fn is_alternating(&self) -> bool {
        self.waveform
            .as_ref()
            .map(|w| w.amplitude.abs() > self.voltage.abs())
            .unwrap_or(false)
    }
}

/// A current source component.
///
/// Current sources add directly to the RHS vector of the MNA equations.
/// `current` is delivered out of `pos` into the external circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSource {
    pub current: f64,
}

impl CurrentSource {
    /// Create a new current source.
    pub fn new(current: f64) -> Self {
        Self { current }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_dc_source_defaults() {
        let v: VoltageSource = serde_json::from_str(r#"{"voltage": 9.0}"#).unwrap();
        assert_eq!(v.internal_resistance, DEFAULT_SOURCE_RESISTANCE);
        assert!(v.grounded);
        assert_eq!(v.voltage_at(None), 9.0);
        assert_eq!(v.voltage_at(Some(0.3)), 9.0);
        assert!(!v.is_alternating());
    }

    #[test]
    fn test_sine_source() {
        let mut v = VoltageSource::new(0.0);
        v.waveform = Some(Waveform {
            amplitude: 2.0,
            frequency: 50.0,
            phase: 0.0,
        });
        // DC solve ignores the waveform
        assert_eq!(v.voltage_at(None), 0.0);
        // Quarter period of 50 Hz is 5 ms
        assert_abs_diff_eq!(v.voltage_at(Some(0.005)), 2.0, epsilon = 1e-9);
        assert!(v.is_alternating());
    }
}
