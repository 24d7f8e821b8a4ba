//! BJT (Bipolar Junction Transistor) model.
//!
//! A switching-level model for NPN and PNP transistors. The base-emitter
//! junction is a piecewise-linear diode; the collector-emitter path is picked
//! from the assumed operating region:
//!
//! | Region | Base-emitter | Collector-emitter |
//! |---|---|---|
//! | Cutoff | off resistor | off resistor |
//! | Active | `R_b` + `V_be(on)` source | current source `β·I_b` |
//! | Saturation | `R_b` + `V_be(on)` source | `V_ce(sat)` source behind the saturation resistor |
//!
//! The active-region collector current is controlled by the base branch
//! current, so one linear solve already honours `I_c = β·I_b`. The saturated
//! collector keeps its `V_ce(sat)` drop, which keeps the active and
//! saturation exit conditions disjoint.

use serde::{Deserialize, Serialize};

use super::diode::{JunctionModel, JunctionState};

/// BJT type (NPN or PNP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    Npn,
    Pnp,
}

impl Polarity {
    /// Sign that maps terminal voltages onto NPN conventions.
    pub fn sign(&self) -> f64 {
        match self {
            Polarity::Npn => 1.0,
            Polarity::Pnp => -1.0,
        }
    }

    /// Base-junction `(anode, cathode)` and collector current `(from, to)`.
    pub fn orient<T: Copy>(&self, collector: T, base: T, emitter: T) -> ((T, T), (T, T)) {
        match self {
            Polarity::Npn => ((base, emitter), (collector, emitter)),
            Polarity::Pnp => ((emitter, base), (emitter, collector)),
        }
    }
}

/// Operating region of a transistor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransistorRegion {
    #[default]
    Cutoff,
    Active,
    Saturation,
}

impl TransistorRegion {
    /// Whether the base-emitter junction conducts.
    pub fn base_on(&self) -> bool {
        !matches!(self, TransistorRegion::Cutoff)
    }
}

/// Solved quantities the region decision needs, in NPN orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiasPoint {
    pub vbe: f64,
    pub vce: f64,
    pub ib: f64,
    pub ic: f64,
}

fn default_beta() -> f64 {
    100.0
}

fn default_vbe_on() -> f64 {
    0.7
}

fn default_vce_sat() -> f64 {
    0.2
}

fn default_base_resistance() -> f64 {
    100.0
}

fn default_saturation_resistance() -> f64 {
    1.0
}

/// A BJT component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transistor {
    #[serde(default)]
    pub polarity: Polarity,
    /// Forward current gain (β_F)
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default = "default_vbe_on")]
    pub vbe_on: f64,
    #[serde(default = "default_vce_sat")]
    pub vce_sat: f64,
    #[serde(default = "default_base_resistance")]
    pub base_resistance: f64,
    #[serde(default = "default_saturation_resistance")]
    pub saturation_resistance: f64,
}

impl Default for Transistor {
    fn default() -> Self {
        Self::npn()
    }
}

impl Transistor {
    pub fn npn() -> Self {
        Self {
            polarity: Polarity::Npn,
            beta: default_beta(),
            vbe_on: default_vbe_on(),
            vce_sat: default_vce_sat(),
            base_resistance: default_base_resistance(),
            saturation_resistance: default_saturation_resistance(),
        }
    }

    pub fn pnp() -> Self {
        Self {
            polarity: Polarity::Pnp,
            ..Self::npn()
        }
    }

    /// The base-emitter junction as a plain diode model.
    pub fn base_junction(&self) -> JunctionModel {
        JunctionModel {
            forward_voltage: self.vbe_on,
            on_resistance: self.base_resistance,
            breakdown_voltage: None,
        }
    }

    /// Collector current the base drive asks for.
    pub fn target_collector_current(&self, ib: f64) -> f64 {
        self.beta * ib.max(0.0)
    }

    /// Re-derive the operating region from a solved bias point.
    pub fn next_region(
        &self,
        current: TransistorRegion,
        bias: BiasPoint,
        hysteresis: f64,
    ) -> TransistorRegion {
        let junction = if current.base_on() {
            JunctionState::On
        } else {
            JunctionState::Off
        };
        if self.base_junction().next_state(junction, bias.vbe, hysteresis) == JunctionState::Off {
            return TransistorRegion::Cutoff;
        }

        match current {
            // Freshly on: the open collector voltage picks the region
            TransistorRegion::Cutoff => {
                if bias.vce > self.vce_sat {
                    TransistorRegion::Active
                } else {
                    TransistorRegion::Saturation
                }
            }
            TransistorRegion::Active => {
                if bias.vce < self.vce_sat - hysteresis {
                    TransistorRegion::Saturation
                } else {
                    TransistorRegion::Active
                }
            }
            // Saturation holds while the base could sink more than flows
            TransistorRegion::Saturation => {
                let target = self.target_collector_current(bias.ib);
                if bias.ic > target * (1.0 + 1e-3) + 1e-9 {
                    TransistorRegion::Active
                } else {
                    TransistorRegion::Saturation
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bias(vbe: f64, vce: f64, ib: f64, ic: f64) -> BiasPoint {
        BiasPoint { vbe, vce, ib, ic }
    }

    #[test]
    fn test_cutoff_until_base_threshold() {
        let q = Transistor::npn();
        let r = q.next_region(TransistorRegion::Cutoff, bias(0.5, 5.0, 0.0, 0.0), 0.01);
        assert_eq!(r, TransistorRegion::Cutoff);
        let r = q.next_region(TransistorRegion::Cutoff, bias(0.8, 5.0, 0.0, 0.0), 0.01);
        assert_eq!(r, TransistorRegion::Active);
        let r = q.next_region(TransistorRegion::Cutoff, bias(0.8, 0.1, 0.0, 0.0), 0.01);
        assert_eq!(r, TransistorRegion::Saturation);
    }

    #[test]
    fn test_active_to_saturation() {
        let q = Transistor::npn();
        let r = q.next_region(TransistorRegion::Active, bias(0.71, -3.0, 1e-3, 0.1), 0.01);
        assert_eq!(r, TransistorRegion::Saturation);
        let r = q.next_region(TransistorRegion::Active, bias(0.71, 0.195, 1e-3, 0.1), 0.01);
        assert_eq!(r, TransistorRegion::Active);
    }

    #[test]
    fn test_saturation_releases_when_base_starved() {
        let q = Transistor::npn();
        // β·Ib = 10 mA, collector loop wants 5 mA: stays saturated
        let r = q.next_region(TransistorRegion::Saturation, bias(0.71, 0.005, 1e-4, 5e-3), 0.01);
        assert_eq!(r, TransistorRegion::Saturation);
        // β·Ib = 1 mA, collector loop wants 5 mA: back to active
        let r = q.next_region(TransistorRegion::Saturation, bias(0.71, 0.005, 1e-5, 5e-3), 0.01);
        assert_eq!(r, TransistorRegion::Active);
    }

    #[test]
    fn test_base_turn_off() {
        let q = Transistor::npn();
        let r = q.next_region(TransistorRegion::Active, bias(0.6, 4.0, -1e-3, 0.0), 0.01);
        assert_eq!(r, TransistorRegion::Cutoff);
    }
}
