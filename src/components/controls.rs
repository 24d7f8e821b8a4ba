//! Control components: switches, push buttons and potentiometers.

use serde::{Deserialize, Serialize};

use crate::solver::MIN_POT_SEGMENT_RESISTANCE;

/// One pair of switch terminals and whether they touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub a: &'static str,
    pub b: &'static str,
    pub closed: bool,
}

impl Contact {
    fn new(a: &'static str, b: &'static str, closed: bool) -> Self {
        Self { a, b, closed }
    }
}

/// Throw position of a changeover switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Throw {
    #[default]
    A,
    B,
}

impl Throw {
    pub fn toggled(&self) -> Self {
        match self {
            Throw::A => Throw::B,
            Throw::B => Throw::A,
        }
    }
}

/// Single-pole single-throw switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpstSwitch {
    #[serde(default)]
    pub closed: bool,
}

impl SpstSwitch {
    pub fn contacts(&self) -> Vec<Contact> {
        vec![Contact::new("a", "b", self.closed)]
    }

    /// Toggle the switch state.
    pub fn toggle(&mut self) {
        self.closed = !self.closed;
    }
}

/// Single-pole double-throw switch: `com` meets `a` or `b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpdtSwitch {
    #[serde(default)]
    pub throw: Throw,
}

impl SpdtSwitch {
    pub fn contacts(&self) -> Vec<Contact> {
        vec![
            Contact::new("com", "a", self.throw == Throw::A),
            Contact::new("com", "b", self.throw == Throw::B),
        ]
    }

    pub fn toggle(&mut self) {
        self.throw = self.throw.toggled();
    }
}

/// Double-pole single-throw switch: two independent poles on one actuator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DpstSwitch {
    #[serde(default)]
    pub closed: bool,
}

impl DpstSwitch {
    pub fn contacts(&self) -> Vec<Contact> {
        vec![
            Contact::new("a1", "b1", self.closed),
            Contact::new("a2", "b2", self.closed),
        ]
    }

    pub fn toggle(&mut self) {
        self.closed = !self.closed;
    }
}

/// Double-pole double-throw switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DpdtSwitch {
    #[serde(default)]
    pub throw: Throw,
}

impl DpdtSwitch {
    pub fn contacts(&self) -> Vec<Contact> {
        let a = self.throw == Throw::A;
        vec![
            Contact::new("com1", "a1", a),
            Contact::new("com1", "b1", !a),
            Contact::new("com2", "a2", a),
            Contact::new("com2", "b2", !a),
        ]
    }

    pub fn toggle(&mut self) {
        self.throw = self.throw.toggled();
    }
}

/// Resting state of a momentary push button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonVariant {
    #[default]
    NormallyOpen,
    NormallyClosed,
}

/// A momentary push button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushButton {
    #[serde(default)]
    pub variant: ButtonVariant,
    #[serde(default)]
    pub pressed: bool,
}

impl PushButton {
    /// Whether the contacts currently touch.
    pub fn is_closed(&self) -> bool {
        match self.variant {
            ButtonVariant::NormallyOpen => self.pressed,
            ButtonVariant::NormallyClosed => !self.pressed,
        }
    }

    pub fn contacts(&self) -> Vec<Contact> {
        vec![Contact::new("a", "b", self.is_closed())]
    }
}

/// Resistance law of a potentiometer track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Taper {
    #[default]
    Linear,
    Logarithmic,
}

/// Exponent applied to the wiper position for a logarithmic taper.
pub const LOG_TAPER_GAMMA: f64 = 2.0;

fn default_wiper() -> f64 {
    0.5
}

/// A potentiometer component.
///
/// Modeled as two resistors in series with a wiper tap:
///   a ----[R1]---- wiper ----[R2]---- b
///
/// where R1 = α' * total_resistance
/// and   R2 = (1 - α') * total_resistance,
/// α' being the wiper position after the taper is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Potentiometer {
    /// Track resistance in ohms
    pub resistance: f64,
    /// Wiper position from 0.0 (at `a`) to 1.0 (at `b`)
    #[serde(default = "default_wiper")]
    pub wiper: f64,
    #[serde(default)]
    pub taper: Taper,
}

impl Potentiometer {
    /// Create a new linear potentiometer.
    pub fn new(resistance: f64, wiper: f64) -> Self {
        Self {
            resistance,
            wiper: wiper.clamp(0.0, 1.0),
            taper: Taper::Linear,
        }
    }

    /// Wiper position after the taper law.
    pub fn effective_position(&self) -> f64 {
        let alpha = self.wiper.clamp(0.0, 1.0);
        match self.taper {
            Taper::Linear => alpha,
            Taper::Logarithmic => alpha.powf(LOG_TAPER_GAMMA),
        }
    }

    /// Get the resistance from `a` to the wiper.
    pub fn r1(&self) -> f64 {
        (self.effective_position() * self.resistance).max(MIN_POT_SEGMENT_RESISTANCE)
    }

    /// Get the resistance from the wiper to `b`.
    pub fn r2(&self) -> f64 {
        ((1.0 - self.effective_position()) * self.resistance).max(MIN_POT_SEGMENT_RESISTANCE)
    }
}
