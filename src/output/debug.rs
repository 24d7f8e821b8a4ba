//! Flat per-kind view of a solve, for the editor's debug panel.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::PathReport;
use crate::circuit::{Circuit, ComponentId};
use crate::components::{ComponentKind, JunctionState};

use super::{ComponentOutput, LedOutput};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryDebug {
    pub id: ComponentId,
    pub emf: f64,
    pub terminal_voltage: f64,
    pub current: f64,
    pub internal_resistance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchDebug {
    pub id: ComponentId,
    pub kind: &'static str,
    pub closed_contacts: Vec<String>,
    pub open_contacts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedDebug {
    /// Junction key; RGB channels appear as `id:channel`
    pub key: String,
    pub state: JunctionState,
    pub current: f64,
    pub voltage: f64,
    pub brightness: f64,
    pub on_loop: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotorDebug {
    pub id: ComponentId,
    pub current: f64,
    pub spinning: bool,
    pub has_return_path: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiodeDebug {
    pub id: ComponentId,
    pub state: JunctionState,
    pub current: f64,
    pub voltage: f64,
}

/// Everything the debug panel lists, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DebugSnapshot {
    pub batteries: Vec<BatteryDebug>,
    pub switches: Vec<SwitchDebug>,
    pub leds: Vec<LedDebug>,
    pub motors: Vec<MotorDebug>,
    pub diodes: Vec<DiodeDebug>,
}

fn led_debug(key: String, led: &LedOutput) -> LedDebug {
    LedDebug {
        key,
        state: led.state,
        current: led.current,
        voltage: led.voltage,
        brightness: led.brightness,
        on_loop: led.on_loop,
        reason: led.reason_if_not.clone(),
    }
}

impl DebugSnapshot {
    pub fn capture(
        circuit: &Circuit,
        outputs: &BTreeMap<ComponentId, ComponentOutput>,
        paths: &PathReport,
    ) -> Self {
        let mut snapshot = DebugSnapshot::default();
        for component in &circuit.components {
            let Some(output) = outputs.get(&component.id) else {
                continue;
            };
            let id = component.id.clone();
            match (&component.kind, output) {
                (
                    ComponentKind::VoltageSource(source),
                    ComponentOutput::VoltageSource {
                        emf,
                        voltage,
                        current,
                        ..
                    },
                ) => snapshot.batteries.push(BatteryDebug {
                    id,
                    emf: *emf,
                    terminal_voltage: *voltage,
                    current: *current,
                    internal_resistance: source.internal_resistance,
                }),
                (kind, ComponentOutput::Switch { contacts }) => {
                    let (closed, open): (Vec<_>, Vec<_>) = contacts.iter().partition(|c| c.closed);
                    snapshot.switches.push(SwitchDebug {
                        id,
                        kind: kind.type_name(),
                        closed_contacts: closed.into_iter().map(|c| c.pins.clone()).collect(),
                        open_contacts: open.into_iter().map(|c| c.pins.clone()).collect(),
                    });
                }
                (_, ComponentOutput::Led(led)) => {
                    snapshot.leds.push(led_debug(id.to_string(), led));
                }
                (_, ComponentOutput::RgbLed { channels, .. }) => {
                    for (channel, led) in channels {
                        snapshot
                            .leds
                            .push(led_debug(format!("{}:{}", id, channel.pin()), led));
                    }
                }
                (
                    _,
                    ComponentOutput::Motor {
                        spinning,
                        current,
                        reason_if_not,
                        ..
                    },
                ) => snapshot.motors.push(MotorDebug {
                    id,
                    current: *current,
                    spinning: *spinning,
                    has_return_path: paths.has_return_path,
                    reason: reason_if_not.clone(),
                }),
                (
                    _,
                    ComponentOutput::Diode {
                        state,
                        current,
                        voltage,
                    },
                ) => snapshot.diodes.push(DiodeDebug {
                    id,
                    state: *state,
                    current: *current,
                    voltage: *voltage,
                }),
                _ => {}
            }
        }
        snapshot
    }
}
