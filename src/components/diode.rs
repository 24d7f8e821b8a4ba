//! Junction devices: diodes, LEDs and RGB LEDs.
//!
//! Junctions use a piecewise-linear model with three discrete states:
//!
//! | State | Companion |
//! |---|---|
//! | Off | large resistor |
//! | On | `R_on` in series with a forward-voltage source, anode to cathode |
//! | Breakdown | `R_on` in series with a breakdown source, cathode to anode |
//!
//! The state is chosen from the solved junction voltage with a hysteresis
//! band, so a device sitting near its threshold does not chatter between
//! iterations.

use serde::{Deserialize, Serialize};

/// Discrete operating state of a junction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JunctionState {
    #[default]
    Off,
    On,
    Breakdown,
}

/// Electrical model shared by every junction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunctionModel {
    pub forward_voltage: f64,
    pub on_resistance: f64,
    pub breakdown_voltage: Option<f64>,
}

impl JunctionModel {
    /// Re-derive the state from the anode-to-cathode voltage.
    ///
    /// Leaving a state requires crossing its threshold by `hysteresis`.
    pub fn next_state(&self, current: JunctionState, v: f64, hysteresis: f64) -> JunctionState {
        let vf = self.forward_voltage;
        match current {
            JunctionState::Off => {
                if v > vf + hysteresis {
                    JunctionState::On
                } else if self.breakdown_voltage.is_some_and(|bv| v < -(bv + hysteresis)) {
                    JunctionState::Breakdown
                } else {
                    JunctionState::Off
                }
            }
            JunctionState::On => {
                if v < vf - hysteresis {
                    JunctionState::Off
                } else {
                    JunctionState::On
                }
            }
            JunctionState::Breakdown => match self.breakdown_voltage {
                Some(bv) if v <= -(bv - hysteresis) => JunctionState::Breakdown,
                _ => JunctionState::Off,
            },
        }
    }
}

/// LED colour, which sets the default forward voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedColor {
    #[default]
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    White,
}

impl LedColor {
    /// Typical forward voltage for this colour.
    pub fn forward_voltage(&self) -> f64 {
        match self {
            LedColor::Red | LedColor::Orange => 2.0,
            LedColor::Yellow => 2.1,
            LedColor::Green => 2.2,
            LedColor::Blue | LedColor::White => 3.0,
        }
    }
}

fn default_led_on_resistance() -> f64 {
    10.0
}

fn default_reference_current() -> f64 {
    0.02
}

fn default_min_current() -> f64 {
    1e-4
}

fn default_max_current() -> f64 {
    0.03
}

/// Snapshot form of an LED, before the colour default is resolved.
#[derive(Debug, Deserialize)]
struct LedRecord {
    #[serde(default)]
    color: LedColor,
    #[serde(default)]
    forward_voltage: Option<f64>,
    #[serde(default = "default_led_on_resistance")]
    on_resistance: f64,
    #[serde(default = "default_reference_current")]
    reference_current: f64,
    #[serde(default = "default_min_current")]
    min_current: f64,
    #[serde(default = "default_max_current")]
    max_current: f64,
    #[serde(default)]
    burned: bool,
    #[serde(default)]
    damage_ticks: u32,
}

/// A single-colour LED.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LedRecord")]
pub struct Led {
    pub color: LedColor,
    pub forward_voltage: f64,
    pub on_resistance: f64,
    /// Current that maps to full brightness
    pub reference_current: f64,
    /// Below this the LED is drawn dark
    pub min_current: f64,
    /// Above this the LED accumulates damage
    pub max_current: f64,
    pub burned: bool,
    pub damage_ticks: u32,
}

impl From<LedRecord> for Led {
    fn from(record: LedRecord) -> Self {
        Self {
            color: record.color,
            forward_voltage: record
                .forward_voltage
                .unwrap_or_else(|| record.color.forward_voltage()),
            on_resistance: record.on_resistance,
            reference_current: record.reference_current,
            min_current: record.min_current,
            max_current: record.max_current,
            burned: record.burned,
            damage_ticks: record.damage_ticks,
        }
    }
}

impl Led {
    /// Create an LED with the colour's default parameters.
    pub fn new(color: LedColor) -> Self {
        Self {
            color,
            forward_voltage: color.forward_voltage(),
            on_resistance: default_led_on_resistance(),
            reference_current: default_reference_current(),
            min_current: default_min_current(),
            max_current: default_max_current(),
            burned: false,
            damage_ticks: 0,
        }
    }

    pub fn model(&self) -> JunctionModel {
        JunctionModel {
            forward_voltage: self.forward_voltage,
            on_resistance: self.on_resistance,
            breakdown_voltage: None,
        }
    }

    /// Brightness in [0, 1] for a forward current.
    pub fn brightness(&self, current: f64) -> f64 {
        brightness(current, self.min_current, self.reference_current)
    }
}

/// Brightness with a dead zone below `min_current`.
pub fn brightness(current: f64, min_current: f64, reference_current: f64) -> f64 {
    if current < min_current {
        0.0
    } else {
        (current / reference_current).clamp(0.0, 1.0)
    }
}

/// One colour channel of an RGB LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RgbChannel {
    Red,
    Green,
    Blue,
}

impl RgbChannel {
    pub const ALL: [RgbChannel; 3] = [RgbChannel::Red, RgbChannel::Green, RgbChannel::Blue];

    /// Pin carrying this channel's anode.
    pub fn pin(&self) -> &'static str {
        match self {
            RgbChannel::Red => "red",
            RgbChannel::Green => "green",
            RgbChannel::Blue => "blue",
        }
    }
}

fn default_red_vf() -> f64 {
    2.0
}

fn default_green_vf() -> f64 {
    2.2
}

fn default_blue_vf() -> f64 {
    3.0
}

/// A common-cathode RGB LED: three independent junctions sharing `cathode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RgbLed {
    #[serde(default = "default_red_vf")]
    pub red_forward_voltage: f64,
    #[serde(default = "default_green_vf")]
    pub green_forward_voltage: f64,
    #[serde(default = "default_blue_vf")]
    pub blue_forward_voltage: f64,
    #[serde(default = "default_led_on_resistance")]
    pub on_resistance: f64,
    #[serde(default = "default_reference_current")]
    pub reference_current: f64,
    #[serde(default = "default_min_current")]
    pub min_current: f64,
    #[serde(default = "default_max_current")]
    pub max_current: f64,
    #[serde(default)]
    pub burned: bool,
}

impl Default for RgbLed {
    fn default() -> Self {
        Self {
            red_forward_voltage: default_red_vf(),
            green_forward_voltage: default_green_vf(),
            blue_forward_voltage: default_blue_vf(),
            on_resistance: default_led_on_resistance(),
            reference_current: default_reference_current(),
            min_current: default_min_current(),
            max_current: default_max_current(),
            burned: false,
        }
    }
}

impl RgbLed {
    pub fn model(&self, channel: RgbChannel) -> JunctionModel {
        let forward_voltage = match channel {
            RgbChannel::Red => self.red_forward_voltage,
            RgbChannel::Green => self.green_forward_voltage,
            RgbChannel::Blue => self.blue_forward_voltage,
        };
        JunctionModel {
            forward_voltage,
            on_resistance: self.on_resistance,
            breakdown_voltage: None,
        }
    }

    pub fn brightness(&self, current: f64) -> f64 {
        brightness(current, self.min_current, self.reference_current)
    }
}

fn default_diode_vf() -> f64 {
    0.7
}

fn default_diode_on_resistance() -> f64 {
    1.0
}

/// A rectifier or zener diode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diode {
    #[serde(default = "default_diode_vf")]
    pub forward_voltage: f64,
    #[serde(default = "default_diode_on_resistance")]
    pub on_resistance: f64,
    /// Reverse voltage at which the diode conducts backwards
    #[serde(default)]
    pub breakdown_voltage: Option<f64>,
}

impl Default for Diode {
    fn default() -> Self {
        Self {
            forward_voltage: default_diode_vf(),
            on_resistance: default_diode_on_resistance(),
            breakdown_voltage: None,
        }
    }
}

impl Diode {
    /// A zener diode with the given breakdown voltage.
    pub fn zener(breakdown_voltage: f64) -> Self {
        Self {
            breakdown_voltage: Some(breakdown_voltage),
            ..Self::default()
        }
    }

    pub fn model(&self) -> JunctionModel {
        JunctionModel {
            forward_voltage: self.forward_voltage,
            on_resistance: self.on_resistance,
            breakdown_voltage: self.breakdown_voltage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: f64 = 0.05;

    #[test]
    fn test_led_turns_on_above_margin() {
        let led = Led::new(LedColor::Red).model();
        assert_eq!(led.next_state(JunctionState::Off, 2.04, H), JunctionState::Off);
        assert_eq!(led.next_state(JunctionState::Off, 2.06, H), JunctionState::On);
    }

    #[test]
    fn test_led_hysteresis_holds_on_state() {
        let led = Led::new(LedColor::Red).model();
        // Bare threshold keeps whatever state the LED already has
        assert_eq!(led.next_state(JunctionState::On, 2.0, H), JunctionState::On);
        assert_eq!(led.next_state(JunctionState::Off, 2.0, H), JunctionState::Off);
        assert_eq!(led.next_state(JunctionState::On, 1.96, H), JunctionState::On);
        assert_eq!(led.next_state(JunctionState::On, 1.94, H), JunctionState::Off);
    }

    #[test]
    fn test_zener_breakdown() {
        let d = Diode::zener(5.1).model();
        assert_eq!(d.next_state(JunctionState::Off, -5.0, 0.01), JunctionState::Off);
        assert_eq!(d.next_state(JunctionState::Off, -5.2, 0.01), JunctionState::Breakdown);
        assert_eq!(
            d.next_state(JunctionState::Breakdown, -5.095, 0.01),
            JunctionState::Breakdown
        );
        assert_eq!(d.next_state(JunctionState::Breakdown, -4.0, 0.01), JunctionState::Off);
    }

    #[test]
    fn test_plain_diode_never_breaks_down() {
        let d = Diode::default().model();
        assert_eq!(d.next_state(JunctionState::Off, -500.0, 0.01), JunctionState::Off);
    }

    #[test]
    fn test_led_colour_default_resolved_once() {
        let led: Led = serde_json::from_str(r#"{"color": "blue"}"#).unwrap();
        assert_eq!(led.forward_voltage, 3.0);
        let led: Led = serde_json::from_str(r#"{"color": "blue", "forward_voltage": 2.8}"#).unwrap();
        assert_eq!(led.forward_voltage, 2.8);
    }

    #[test]
    fn test_brightness_dead_zone() {
        let led = Led::new(LedColor::Green);
        assert_eq!(led.brightness(5e-5), 0.0);
        assert_eq!(led.brightness(-0.01), 0.0);
        assert!((led.brightness(0.01) - 0.5).abs() < 1e-12);
        assert_eq!(led.brightness(0.5), 1.0);
    }
}
