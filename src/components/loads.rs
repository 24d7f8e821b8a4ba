//! Output devices: motors and buzzers.
//!
//! Both are ohmic loads in the matrix. What makes them interesting is the
//! verdict drawn from the solved current, which lives here.

use serde::{Deserialize, Serialize};

/// Supply a motor is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorDrive {
    #[default]
    Dc,
    Ac,
}

/// Rotation sense of a DC motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

fn default_motor_resistance() -> f64 {
    10.0
}

fn default_motor_min_current() -> f64 {
    0.05
}

fn default_motor_rated_current() -> f64 {
    0.5
}

/// A DC or AC motor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motor {
    #[serde(default)]
    pub drive: MotorDrive,
    /// Winding resistance in ohms
    #[serde(default = "default_motor_resistance")]
    pub resistance: f64,
    /// Stall threshold: below this the rotor does not move
    #[serde(default = "default_motor_min_current")]
    pub min_current: f64,
    /// Current at full speed
    #[serde(default = "default_motor_rated_current")]
    pub rated_current: f64,
}

impl Default for Motor {
    fn default() -> Self {
        Self {
            drive: MotorDrive::Dc,
            resistance: default_motor_resistance(),
            min_current: default_motor_min_current(),
            rated_current: default_motor_rated_current(),
        }
    }
}

impl Motor {
    /// Whether a winding current (a to b) turns the rotor.
    pub fn spins(&self, current: f64) -> bool {
        current.abs() >= self.min_current
    }

    /// Speed fraction in [0, 1].
    pub fn speed(&self, current: f64) -> f64 {
        if !self.spins(current) {
            return 0.0;
        }
        (current.abs() / self.rated_current).clamp(0.0, 1.0)
    }

    /// Rotation sense for a DC motor; AC motors have none.
    pub fn rotation(&self, current: f64) -> Option<Rotation> {
        match self.drive {
            MotorDrive::Ac => None,
            MotorDrive::Dc if !self.spins(current) => None,
            MotorDrive::Dc if current >= 0.0 => Some(Rotation::Clockwise),
            MotorDrive::Dc => Some(Rotation::CounterClockwise),
        }
    }
}

fn default_buzzer_resistance() -> f64 {
    100.0
}

fn default_buzzer_min_voltage() -> f64 {
    1.5
}

fn default_buzzer_min_current() -> f64 {
    5e-3
}

/// An active (polarized) piezo buzzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buzzer {
    #[serde(default = "default_buzzer_resistance")]
    pub resistance: f64,
    #[serde(default = "default_buzzer_min_voltage")]
    pub min_voltage: f64,
    #[serde(default = "default_buzzer_min_current")]
    pub min_current: f64,
}

impl Default for Buzzer {
    fn default() -> Self {
        Self {
            resistance: default_buzzer_resistance(),
            min_voltage: default_buzzer_min_voltage(),
            min_current: default_buzzer_min_current(),
        }
    }
}

impl Buzzer {
    /// Why the buzzer stays silent at this operating point, if it does.
    ///
    /// `voltage` is pos - neg, `current` flows pos to neg.
    pub fn silence_reason(&self, voltage: f64, current: f64) -> Option<String> {
        if voltage < 0.0 && -voltage >= self.min_voltage {
            Some("reverse polarity".to_string())
        } else if voltage < self.min_voltage {
            Some(format!(
                "voltage {:.2}V below {:.2}V minimum",
                voltage, self.min_voltage
            ))
        } else if current < self.min_current {
            Some(format!(
                "current {:.1}mA below {:.1}mA minimum",
                current * 1e3,
                self.min_current * 1e3
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_threshold_and_speed() {
        let m = Motor::default();
        assert!(!m.spins(0.01));
        assert_eq!(m.speed(0.01), 0.0);
        assert!(m.spins(-0.1));
        assert!((m.speed(0.25) - 0.5).abs() < 1e-12);
        assert_eq!(m.speed(3.0), 1.0);
    }

    #[test]
    fn test_motor_rotation() {
        let dc = Motor::default();
        assert_eq!(dc.rotation(0.2), Some(Rotation::Clockwise));
        assert_eq!(dc.rotation(-0.2), Some(Rotation::CounterClockwise));
        assert_eq!(dc.rotation(0.0), None);

        let ac = Motor {
            drive: MotorDrive::Ac,
            ..Motor::default()
        };
        assert_eq!(ac.rotation(0.2), None);
    }

    #[test]
    fn test_buzzer_reasons() {
        let b = Buzzer::default();
        assert_eq!(b.silence_reason(5.0, 0.05), None);
        assert_eq!(b.silence_reason(-5.0, -0.05).as_deref(), Some("reverse polarity"));
        assert!(b.silence_reason(1.0, 0.01).unwrap().contains("below 1.50V"));
        assert!(b.silence_reason(3.0, 1e-3).unwrap().contains("mA minimum"));
    }
}
