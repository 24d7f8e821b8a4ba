//! Typed per-component results of a solve.
//!
//! The synthesizer turns node voltages and element currents into what the
//! editor renders: LED brightness, motor spin, buzzer audibility, meter
//! readings, each with a human-readable reason when a device stays inactive.

mod debug;

pub use debug::{BatteryDebug, DebugSnapshot, DiodeDebug, LedDebug, MotorDebug, SwitchDebug};

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::{Conductivity, PathReport};
use crate::circuit::{Circuit, Component, ComponentId, NetId};
use crate::error::BreadboardError;
use crate::components::{
    BiasPoint, Buzzer, ComponentKind, JunctionState, Led, Motor, RgbChannel, RgbLed, Rotation,
    TransistorRegion,
};
use crate::netlist::{ElementKind, LedRating, LoadRole, Netlist, TopologyIssue};
use crate::solver::{
    bias_point, element_current, Analysis, Convergence, DeviceStates, SimulatorConfig,
    TransientState,
};

/// Result of one DC solve or transient step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveResult {
    /// End-of-step time for transient steps; `None` for DC
    pub time: Option<f64>,
    pub singular: bool,
    pub singular_reason: Option<String>,
    pub converged: bool,
    pub iterations: usize,
    pub used_gmin: bool,
    /// Voltage of every net that received a matrix node
    pub net_voltages: BTreeMap<NetId, f64>,
    /// One signed current per stamped component
    pub branch_currents: BTreeMap<ComponentId, f64>,
    pub components: BTreeMap<ComponentId, ComponentOutput>,
    pub device_states: DeviceStates,
    pub paths: PathReport,
    pub issues: Vec<TopologyIssue>,
    pub warnings: Vec<String>,
    pub debug: DebugSnapshot,
}

impl SolveResult {
    pub fn component(&self, id: &str) -> Option<&ComponentOutput> {
        self.components.get(&ComponentId::new(id))
    }

    pub fn current(&self, id: &str) -> Option<f64> {
        self.branch_currents.get(&ComponentId::new(id)).copied()
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string(self).map_err(|e| BreadboardError::OutputError {
            message: e.to_string(),
        })
    }
}

/// Visual state of one light-emitting junction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedOutput {
    pub state: JunctionState,
    pub lit: bool,
    pub brightness: f64,
    pub current: f64,
    pub voltage: f64,
    pub burned: bool,
    pub overcurrent: bool,
    pub damage_ticks: u32,
    pub on_loop: bool,
    pub reason_if_not: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactOutput {
    pub pins: String,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentOutput {
    pub pins: String,
    pub resistance: f64,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
}

/// Per-component result, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentOutput {
    Resistor {
        current: f64,
        voltage: f64,
        power: f64,
    },
    VoltageSource {
        /// Source value at this instant
        emf: f64,
        /// pos - neg at the terminals
        voltage: f64,
        /// Delivered out of `pos`
        current: f64,
        power: f64,
    },
    CurrentSource {
        current: f64,
        voltage: f64,
    },
    Switch {
        contacts: Vec<ContactOutput>,
    },
    Led(LedOutput),
    RgbLed {
        channels: BTreeMap<RgbChannel, LedOutput>,
        color: [u8; 3],
    },
    Diode {
        state: JunctionState,
        current: f64,
        voltage: f64,
    },
    /// Currents and voltages in NPN orientation
    Transistor {
        region: TransistorRegion,
        ib: f64,
        ic: f64,
        vbe: f64,
        vce: f64,
    },
    Motor {
        spinning: bool,
        speed: f64,
        rotation: Option<Rotation>,
        current: f64,
        reason_if_not: Option<String>,
    },
    Buzzer {
        audible: bool,
        voltage: f64,
        current: f64,
        reason_if_not: Option<String>,
    },
    Capacitor {
        voltage: f64,
        current: f64,
        charge: f64,
        damaged: bool,
    },
    Inductor {
        voltage: f64,
        current: f64,
    },
    Potentiometer {
        segments: Vec<SegmentOutput>,
    },
    Voltmeter {
        /// pos - neg; `None` when a probe is floating
        reading: Option<f64>,
    },
    Ground,
}

/// Everything the synthesizer reads.
pub struct Synthesis<'a> {
    pub circuit: &'a Circuit,
    pub netlist: &'a Netlist,
    pub convergence: &'a Convergence,
    pub analysis: Analysis<'a>,
    pub config: &'a SimulatorConfig,
    /// Run state for transient steps
    pub transient: Option<&'a TransientState>,
}

struct Context<'a> {
    input: &'a Synthesis<'a>,
    conductivity: Conductivity,
    currents: BTreeMap<&'a str, f64>,
    warnings: Vec<String>,
}

impl<'a> Context<'a> {
    fn pin_voltage(&self, component: &Component, pin: &str) -> Option<f64> {
        self.input
            .netlist
            .node_of_pin(&component.id, pin)
            .map(|node| self.input.convergence.solution.voltage(node))
    }

    /// V[a] - V[b], 0 when either pin floats.
    fn across(&self, component: &Component, a: &str, b: &str) -> f64 {
        match (self.pin_voltage(component, a), self.pin_voltage(component, b)) {
            (Some(a), Some(b)) => a - b,
            _ => 0.0,
        }
    }

    fn current(&self, key: &str) -> f64 {
        self.currents.get(key).copied().unwrap_or(0.0)
    }

    fn on_loop(&self, key: &str) -> Option<bool> {
        let netlist = self.input.netlist;
        netlist
            .element(key)
            .map(|element| self.conductivity.on_loop(netlist, element))
    }

    fn output(&mut self, component: &Component) -> ComponentOutput {
        let id = component.id.as_str();
        match &component.kind {
            ComponentKind::Resistor(_) => {
                let current = self.current(id);
                let voltage = self.across(component, "a", "b");
                ComponentOutput::Resistor {
                    current,
                    voltage,
                    power: voltage * current,
                }
            }
            ComponentKind::VoltageSource(v) => {
                let current = self.current(id);
                let voltage = self.across(component, "pos", "neg");
                ComponentOutput::VoltageSource {
                    emf: v.voltage_at(self.input.analysis.time()),
                    voltage,
                    current,
                    power: voltage * current,
                }
            }
            ComponentKind::CurrentSource(i) => ComponentOutput::CurrentSource {
                current: if self.input.netlist.element(id).is_some() {
                    i.current
                } else {
                    0.0
                },
                voltage: self.across(component, "pos", "neg"),
            },
            ComponentKind::SpstSwitch(_)
            | ComponentKind::SpdtSwitch(_)
            | ComponentKind::DpstSwitch(_)
            | ComponentKind::DpdtSwitch(_)
            | ComponentKind::PushButton(_) => ComponentOutput::Switch {
                contacts: component
                    .kind
                    .contacts()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|c| ContactOutput {
                        pins: format!("{}-{}", c.a, c.b),
                        closed: c.closed,
                    })
                    .collect(),
            },
            ComponentKind::Led(led) => {
                let output = self.junction_light(
                    component,
                    id,
                    "anode",
                    led_rating(led),
                    led.forward_voltage,
                    led.burned,
                    led.damage_ticks,
                );
                ComponentOutput::Led(output)
            }
            ComponentKind::RgbLed(led) => self.rgb(component, led),
            ComponentKind::Diode(_) => ComponentOutput::Diode {
                state: self.input.convergence.states.junction(id),
                current: self.current(id),
                voltage: self.across(component, "anode", "cathode"),
            },
            ComponentKind::Transistor(_) => {
                let bias = self
                    .input
                    .netlist
                    .element(id)
                    .and_then(|e| {
                        bias_point(e, &self.input.convergence.solution, &self.input.convergence.states)
                    })
                    .unwrap_or(BiasPoint {
                        vbe: 0.0,
                        vce: 0.0,
                        ib: 0.0,
                        ic: 0.0,
                    });
                ComponentOutput::Transistor {
                    region: self.input.convergence.states.transistor(id),
                    ib: bias.ib,
                    ic: bias.ic,
                    vbe: bias.vbe,
                    vce: bias.vce,
                }
            }
            ComponentKind::Motor(motor) => self.motor(id, motor),
            ComponentKind::Buzzer(buzzer) => self.buzzer(component, buzzer),
            ComponentKind::Capacitor(c) => {
                let voltage = self.across(component, "a", "b");
                ComponentOutput::Capacitor {
                    voltage,
                    current: self.current(id),
                    charge: c.capacitance * voltage,
                    damaged: false,
                }
            }
            ComponentKind::PolarizedCapacitor(c) => {
                let voltage = self.across(component, "pos", "neg");
                let damaged = c.damaged
                    || self
                        .input
                        .transient
                        .is_some_and(|t| t.is_damaged(&component.id));
                ComponentOutput::Capacitor {
                    voltage,
                    current: self.current(id),
                    charge: c.capacitance * voltage,
                    damaged,
                }
            }
            ComponentKind::Inductor(_) => ComponentOutput::Inductor {
                voltage: self.across(component, "a", "b"),
                current: self.current(id),
            },
            ComponentKind::Potentiometer(p) => {
                let parts = [("a", "wiper", p.r1()), ("wiper", "b", p.r2())];
                let segments = parts
                    .into_iter()
                    .map(|(from, to, resistance)| {
                        let pins = format!("{from}-{to}");
                        let voltage = self.across(component, from, to);
                        let current = self.current(&format!("{id}:{pins}"));
                        SegmentOutput {
                            pins,
                            resistance,
                            voltage,
                            current,
                            power: voltage * current,
                        }
                    })
                    .collect();
                ComponentOutput::Potentiometer { segments }
            }
            ComponentKind::Voltmeter => {
                let reading = match (
                    self.pin_voltage(component, "pos"),
                    self.pin_voltage(component, "neg"),
                ) {
                    (Some(p), Some(n)) => Some(p - n),
                    _ => None,
                };
                ComponentOutput::Voltmeter { reading }
            }
            ComponentKind::Ground => ComponentOutput::Ground,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn junction_light(
        &mut self,
        component: &Component,
        key: &str,
        anode: &str,
        rating: LedRating,
        forward_voltage: f64,
        snapshot_burned: bool,
        snapshot_ticks: u32,
    ) -> LedOutput {
        let state = self.input.convergence.states.junction(key);
        let current = self.current(key);
        let voltage = self.across(component, anode, "cathode");
        let health = self.input.transient.and_then(|t| t.led_health(key));
        let burned = snapshot_burned || health.is_some_and(|h| h.burned);
        let damage_ticks = health.map(|h| h.damage_ticks).unwrap_or(snapshot_ticks);
        let brightness = if burned || state != JunctionState::On {
            0.0
        } else {
            rating.brightness(current)
        };
        let lit = brightness > 0.0;
        let on_loop = self.on_loop(key);
        let overcurrent = current > rating.max_current;
        if overcurrent && !burned {
            self.warnings.push(format!(
                "{key}: {:.1}mA exceeds the {:.1}mA rating",
                current * 1e3,
                rating.max_current * 1e3
            ));
        }

        let reason_if_not = if lit {
            None
        } else if on_loop.is_none() {
            Some("not connected".to_string())
        } else if burned {
            Some("burned out".to_string())
        } else if state == JunctionState::Off && voltage < 0.0 {
            Some("reverse biased".to_string())
        } else if state == JunctionState::Off
            && voltage <= forward_voltage + self.input.config.led_hysteresis
        {
            Some(format!(
                "{voltage:.2}V across, needs more than {forward_voltage:.2}V"
            ))
        } else if state == JunctionState::Off {
            Some("no conductive loop through the LED".to_string())
        } else {
            Some(format!(
                "current {:.2}mA below {:.2}mA visible threshold",
                current * 1e3,
                rating.min_current * 1e3
            ))
        };

        LedOutput {
            state,
            lit,
            brightness,
            current,
            voltage,
            burned,
            overcurrent,
            damage_ticks,
            on_loop: on_loop.unwrap_or(false),
            reason_if_not,
        }
    }

    fn rgb(&mut self, component: &Component, led: &RgbLed) -> ComponentOutput {
        let rating = LedRating {
            reference_current: led.reference_current,
            min_current: led.min_current,
            max_current: led.max_current,
        };
        let mut channels = BTreeMap::new();
        let mut color = [0u8; 3];
        for (i, channel) in RgbChannel::ALL.into_iter().enumerate() {
            let key = format!("{}:{}", component.id, channel.pin());
            let forward_voltage = led.model(channel).forward_voltage;
            let output = self.junction_light(
                component,
                &key,
                channel.pin(),
                rating,
                forward_voltage,
                led.burned,
                0,
            );
            color[i] = (output.brightness * 255.0).round() as u8;
            channels.insert(channel, output);
        }
        ComponentOutput::RgbLed { channels, color }
    }

    fn motor(&self, id: &str, motor: &Motor) -> ComponentOutput {
        let current = self.current(id);
        let on_loop = self.on_loop(id);
        let has_return = self.conductivity.report.has_return_path;
        // Leakage alone never turns a rotor
        let spinning = has_return && on_loop == Some(true) && motor.spins(current);
        let reason_if_not = if spinning {
            None
        } else if on_loop.is_none() {
            Some("not connected".to_string())
        } else if !has_return {
            Some("no return path to ground".to_string())
        } else if on_loop == Some(false) {
            Some("not on a powered loop".to_string())
        } else {
            Some(format!(
                "current {:.1}mA below {:.1}mA stall threshold",
                current.abs() * 1e3,
                motor.min_current * 1e3
            ))
        };
        ComponentOutput::Motor {
            spinning,
            speed: if spinning { motor.speed(current) } else { 0.0 },
            rotation: if spinning { motor.rotation(current) } else { None },
            current,
            reason_if_not,
        }
    }

    fn buzzer(&self, component: &Component, buzzer: &Buzzer) -> ComponentOutput {
        let id = component.id.as_str();
        let voltage = self.across(component, "pos", "neg");
        let current = self.current(id);
        let reason_if_not = match self.on_loop(id) {
            None => Some("not connected".to_string()),
            Some(on_loop) => buzzer
                .silence_reason(voltage, current)
                .or_else(|| (!on_loop).then(|| "not on a powered loop".to_string())),
        };
        ComponentOutput::Buzzer {
            audible: reason_if_not.is_none(),
            voltage,
            current,
            reason_if_not,
        }
    }
}

fn led_rating(led: &Led) -> LedRating {
    LedRating {
        reference_current: led.reference_current,
        min_current: led.min_current,
        max_current: led.max_current,
    }
}

/// Build the full result of a converged solve.
pub fn synthesize(input: &Synthesis<'_>) -> SolveResult {
    let netlist = input.netlist;
    let convergence = input.convergence;
    let solution = &convergence.solution;

    let currents: BTreeMap<&str, f64> = netlist
        .elements
        .iter()
        .map(|e| {
            let current = element_current(e, solution, &convergence.states, input.analysis, input.config);
            (e.key.as_str(), current)
        })
        .collect();

    let mut branch_currents = BTreeMap::new();
    for element in &netlist.elements {
        match element.kind {
            ElementKind::Switch { .. } => continue,
            ElementKind::Resistor {
                role: LoadRole::PotSegment,
                ..
            } if !element.key.ends_with(":a-wiper") => continue,
            _ => {}
        }
        *branch_currents.entry(element.owner.clone()).or_insert(0.0) +=
            currents.get(element.key.as_str()).copied().unwrap_or(0.0);
    }

    let net_voltages = netlist
        .net_nodes()
        .map(|(net, node)| (net, solution.voltage(node)))
        .collect();

    let mut warnings = netlist.warnings.clone();
    warnings.extend(netlist.nets.issues.iter().map(ToString::to_string));
    if let Some(reason) = &convergence.singular {
        warnings.push(format!("circuit could not be solved: {reason}"));
    } else if !convergence.converged {
        warnings.push(format!(
            "device states did not settle within {} iterations; showing the last iterate",
            convergence.iterations
        ));
    }

    let mut context = Context {
        input,
        conductivity: Conductivity::analyze(netlist, &convergence.states, input.analysis),
        currents,
        warnings: Vec::new(),
    };
    let components: BTreeMap<ComponentId, ComponentOutput> = input
        .circuit
        .components
        .iter()
        .map(|c| (c.id.clone(), context.output(c)))
        .collect();
    warnings.append(&mut context.warnings);

    let paths = context.conductivity.report.clone();
    let debug = DebugSnapshot::capture(input.circuit, &components, &paths);

    SolveResult {
        time: input.analysis.time(),
        singular: convergence.singular.is_some(),
        singular_reason: convergence.singular.clone(),
        converged: convergence.converged,
        iterations: convergence.iterations,
        used_gmin: convergence.used_gmin,
        net_voltages,
        branch_currents,
        components,
        device_states: convergence.states.clone(),
        paths,
        issues: netlist.nets.issues.clone(),
        warnings,
        debug,
    }
}
