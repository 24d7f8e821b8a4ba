//! Main simulator interface.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::circuit::{validate_circuit, Circuit};
use crate::error::{BreadboardError, Result};
use crate::netlist::{build_netlist, Netlist};
use crate::output::{synthesize, SolveResult, Synthesis};

use super::assemble::Analysis;
use super::nonlinear::{converge, DeviceStates};
use super::transient::TransientState;
use super::{
    DIODE_HYSTERESIS, GMIN, INDUCTOR_NEAR_OPEN, INDUCTOR_NEAR_SHORT, LED_HYSTERESIS,
    MAX_DEVICE_ITERATIONS, PIVOT_TOLERANCE,
};

/// How an inductor is stamped in a DC solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InductorDcModel {
    /// Large resistance: the coil blocks until a transient run energizes it
    #[default]
    NearOpen,
    /// Small resistance: the classic steady-state short
    NearShort,
}

impl InductorDcModel {
    pub fn resistance(&self) -> f64 {
        match self {
            InductorDcModel::NearOpen => INDUCTOR_NEAR_OPEN,
            InductorDcModel::NearShort => INDUCTOR_NEAR_SHORT,
        }
    }
}

/// Configuration for the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Maximum device-state iterations per solve.
    pub max_iterations: usize,
    /// Conductance to ground added on a singular retry (siemens).
    pub gmin: f64,
    /// Smallest pivot magnitude accepted by the elimination.
    pub pivot_tolerance: f64,
    pub dc_inductor_model: InductorDcModel,
    /// Turn-on margin above the forward voltage for LEDs (volts).
    pub led_hysteresis: f64,
    /// Turn-on margin for plain diodes and base junctions (volts).
    pub diode_hysteresis: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_DEVICE_ITERATIONS,
            gmin: GMIN,
            pivot_tolerance: PIVOT_TOLERANCE,
            dc_inductor_model: InductorDcModel::default(),
            led_hysteresis: LED_HYSTERESIS,
            diode_hysteresis: DIODE_HYSTERESIS,
        }
    }
}

impl SimulatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum device-state iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_gmin(mut self, gmin: f64) -> Self {
        self.gmin = gmin;
        self
    }

    pub fn with_pivot_tolerance(mut self, pivot_tolerance: f64) -> Self {
        self.pivot_tolerance = pivot_tolerance;
        self
    }

    /// Choose how inductors behave in DC solves.
    pub fn with_dc_inductor_model(mut self, model: InductorDcModel) -> Self {
        self.dc_inductor_model = model;
        self
    }

    /// Set the LED turn-on margin (in volts).
    ///
    /// Larger margins damp flicker at the threshold but make an LED sitting
    /// right at its forward voltage report as off.
    pub fn with_led_hysteresis(mut self, hysteresis: f64) -> Self {
        self.led_hysteresis = hysteresis;
        self
    }

    pub fn with_diode_hysteresis(mut self, hysteresis: f64) -> Self {
        self.diode_hysteresis = hysteresis;
        self
    }

    /// Reject values no solve can work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(BreadboardError::invalid_simulation_param(
                "max_iterations must be at least 1",
            ));
        }
        if !(self.gmin.is_finite() && self.gmin > 0.0) {
            return Err(BreadboardError::invalid_simulation_param(format!(
                "gmin must be positive, got {}",
                self.gmin
            )));
        }
        if !(self.pivot_tolerance.is_finite() && self.pivot_tolerance > 0.0) {
            return Err(BreadboardError::invalid_simulation_param(format!(
                "pivot_tolerance must be positive, got {}",
                self.pivot_tolerance
            )));
        }
        for (name, value) in [
            ("led_hysteresis", self.led_hysteresis),
            ("diode_hysteresis", self.diode_hysteresis),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(BreadboardError::invalid_simulation_param(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// One stateless DC solve of a snapshot.
pub fn solve_dc(circuit: &Circuit, config: &SimulatorConfig) -> Result<SolveResult> {
    config.validate()?;
    validate_circuit(circuit)?;
    let _span = info_span!("dc_solve", components = circuit.components.len()).entered();

    let netlist = build_netlist(circuit);
    let convergence = converge(
        &netlist,
        &DeviceStates::default(),
        Analysis::Dc,
        config,
        &BTreeSet::new(),
    );
    let result = synthesize(&Synthesis {
        circuit,
        netlist: &netlist,
        convergence: &convergence,
        analysis: Analysis::Dc,
        config,
        transient: None,
    });
    for message in &result.warnings {
        warn!("{message}");
    }
    debug!(
        iterations = result.iterations,
        converged = result.converged,
        "dc solve finished"
    );
    Ok(result)
}

/// A transient run over one circuit.
///
/// Owns the Backward-Euler history, the device states carried between steps,
/// and LED and capacitor damage. DC solves through [`Simulator::solve_dc`]
/// never touch that state.
pub struct Simulator {
    /// The circuit being simulated
    circuit: Circuit,
    config: SimulatorConfig,
    state: TransientState,
    /// Warnings already logged during this run
    warned: BTreeSet<String>,
}

impl Simulator {
    /// Create a new simulator for the given circuit with default configuration.
    pub fn new(circuit: Circuit) -> Result<Self> {
        Self::with_config(circuit, SimulatorConfig::default())
    }

    /// Create a new simulator for the given circuit with custom configuration.
    pub fn with_config(circuit: Circuit, config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        validate_circuit(&circuit)?;
        Ok(Self {
            circuit,
            config,
            state: TransientState::new(),
            warned: BTreeSet::new(),
        })
    }

    /// Solve the current circuit at DC without disturbing the run.
    pub fn solve_dc(&self) -> Result<SolveResult> {
        solve_dc(&self.circuit, &self.config)
    }

    /// Advance the run by `dt` seconds.
    pub fn step(&mut self, dt: f64) -> Result<SolveResult> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(BreadboardError::invalid_simulation_param(format!(
                "time step must be positive and finite, got {dt}"
            )));
        }
        validate_circuit(&self.circuit)?;
        let netlist = build_netlist(&self.circuit);
        self.seed(&netlist);

        let step = self.state.steps + 1;
        let _span = info_span!("transient_step", step).entered();

        let history = self.state.history.clone();
        let analysis = Analysis::Transient {
            dt,
            time: self.state.time + dt,
            history: &history,
        };
        let convergence = converge(
            &netlist,
            &self.state.devices,
            analysis,
            &self.config,
            &self.state.burned(),
        );

        let events = if convergence.singular.is_some() {
            // Zero solution carries no information about the plates
            self.state.time += dt;
            self.state.steps += 1;
            Vec::new()
        } else {
            self.state.advance(&netlist, &convergence, analysis, &self.config)
        };

        let mut result = synthesize(&Synthesis {
            circuit: &self.circuit,
            netlist: &netlist,
            convergence: &convergence,
            analysis,
            config: &self.config,
            transient: Some(&self.state),
        });
        result.warnings.extend(events);
        self.log_new_warnings(&result.warnings);
        Ok(result)
    }

    /// Run for `duration` seconds in steps of `dt`, calling `on_step` after each.
    ///
    /// Returns the number of steps taken.
    pub fn run<F>(&mut self, duration: f64, dt: f64, mut on_step: F) -> Result<usize>
    where
        F: FnMut(&SolveResult),
    {
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(BreadboardError::invalid_simulation_param(format!(
                "duration must be non-negative and finite, got {duration}"
            )));
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(BreadboardError::invalid_simulation_param(format!(
                "time step must be positive and finite, got {dt}"
            )));
        }
        let steps = (duration / dt).round() as usize;
        info!(steps, dt, "starting transient run");
        for _ in 0..steps {
            let result = self.step(dt)?;
            on_step(&result);
        }
        Ok(steps)
    }

    /// Start the first step from the DC operating point's device states.
    fn seed(&mut self, netlist: &Netlist) {
        if self.state.seeded {
            return;
        }
        let _span = info_span!("transient_seed").entered();
        let convergence = converge(
            netlist,
            &DeviceStates::default(),
            Analysis::Dc,
            &self.config,
            &self.state.burned(),
        );
        self.state.devices = convergence.states;
        self.state.seeded = true;
    }

    fn log_new_warnings(&mut self, warnings: &[String]) {
        for message in warnings {
            if self.warned.insert(warning_key(message)) {
                warn!(time = self.state.time, "{message}");
            }
        }
    }

    /// Drop all history and damage; the next step starts from t = 0.
    pub fn reset(&mut self) {
        self.state = TransientState::new();
        self.warned.clear();
    }

    /// State carried between steps.
    pub fn state(&self) -> &TransientState {
        &self.state
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Get a reference to the circuit.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// Edit the circuit in place (toggle a switch, turn a pot).
    ///
    /// The run continues with its history; elements that disappeared are
    /// simply no longer read. Edits are validated by the next step.
    pub fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    /// Swap in a new snapshot, keeping the run's history.
    pub fn set_circuit(&mut self, circuit: Circuit) -> Result<()> {
        validate_circuit(&circuit)?;
        self.circuit = circuit;
        Ok(())
    }
}

/// Identity of a warning across steps: its subject and wording, without numbers.
fn warning_key(message: &str) -> String {
    match message.split_once(':') {
        Some((subject, rest)) => {
            let wording: String = rest.chars().filter(|c| !c.is_ascii_digit()).collect();
            format!("{subject}:{wording}")
        }
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Component, ComponentId};
    use crate::components::{Capacitor, ComponentKind, Resistor, VoltageSource};
    use approx::assert_relative_eq;

    fn rc_divider() -> Circuit {
        Circuit::new()
            .with_component("bat", ComponentKind::VoltageSource(VoltageSource::new(10.0).ideal()))
            .with_component("r1", ComponentKind::Resistor(Resistor::new(1000.0)))
            .with_component("r2", ComponentKind::Resistor(Resistor::new(1000.0)))
            .with_component("gnd", ComponentKind::Ground)
            .with_wire(("bat", "pos"), ("r1", "a"))
            .with_wire(("r1", "b"), ("r2", "a"))
            .with_wire(("r2", "b"), ("gnd", "gnd"))
            .with_wire(("bat", "neg"), ("gnd", "gnd"))
    }

    #[test]
    fn test_config_validation() {
        assert!(SimulatorConfig::default().validate().is_ok());
        assert!(SimulatorConfig::default()
            .with_max_iterations(0)
            .validate()
            .is_err());
        assert!(SimulatorConfig::default().with_gmin(-1.0).validate().is_err());
        assert!(SimulatorConfig::default()
            .with_led_hysteresis(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_inductor_dc_model_resistance() {
        assert_eq!(InductorDcModel::default(), InductorDcModel::NearOpen);
        assert!(InductorDcModel::NearOpen.resistance() > InductorDcModel::NearShort.resistance());
    }

    #[test]
    fn test_dc_divider() {
        let result = solve_dc(&rc_divider(), &SimulatorConfig::default()).unwrap();
        assert!(result.converged);
        assert!(!result.singular);
        assert_relative_eq!(result.current("r1").unwrap(), 5e-3, max_relative = 1e-9);
    }

    #[test]
    fn test_step_rejects_bad_dt() {
        let mut sim = Simulator::new(rc_divider()).unwrap();
        assert!(sim.step(0.0).is_err());
        assert!(sim.step(f64::NAN).is_err());
        assert_eq!(sim.state().steps, 0);
    }

    #[test]
    fn test_step_validates_edited_circuit() {
        let mut sim = Simulator::new(rc_divider()).unwrap();
        sim.step(1e-3).unwrap();

        let id = ComponentId::new("r1");
        let set_r1 = |sim: &mut Simulator, ohms: f64| {
            if let Some(Component {
                kind: ComponentKind::Resistor(r),
                ..
            }) = sim.circuit_mut().component_mut(&id)
            {
                r.resistance = ohms;
            }
        };
        set_r1(&mut sim, -5.0);
        assert!(matches!(
            sim.step(1e-3),
            Err(BreadboardError::InvalidParameter { .. })
        ));
        assert_eq!(sim.state().steps, 1);

        set_r1(&mut sim, 3000.0);
        let result = sim.step(1e-3).unwrap();
        assert_relative_eq!(result.current("r1").unwrap(), 2.5e-3, max_relative = 1e-9);
        assert_eq!(sim.state().steps, 2);
    }

    #[test]
    fn test_run_counts_steps_and_time() {
        let circuit = rc_divider()
            .with_component("c1", ComponentKind::Capacitor(Capacitor::new(1e-6)))
            .with_wire(("c1", "a"), ("r2", "a"))
            .with_wire(("c1", "b"), ("gnd", "gnd"));
        let mut sim = Simulator::new(circuit).unwrap();
        let mut seen = 0;
        let steps = sim.run(1e-3, 1e-4, |_| seen += 1).unwrap();
        assert_eq!(steps, 10);
        assert_eq!(seen, 10);
        assert_relative_eq!(sim.state().time, 1e-3, max_relative = 1e-9);

        sim.reset();
        assert_eq!(sim.state().steps, 0);
        assert_eq!(sim.state().time, 0.0);
    }

    #[test]
    fn test_dc_solve_leaves_run_untouched() {
        let mut sim = Simulator::new(rc_divider()).unwrap();
        sim.step(1e-3).unwrap();
        let before = sim.state().clone();
        sim.solve_dc().unwrap();
        assert_eq!(sim.state(), &before);
    }

    #[test]
    fn test_warning_key_ignores_numbers() {
        assert_eq!(
            warning_key("led1: 31.2mA exceeds the 30.0mA rating"),
            warning_key("led1: 33.9mA exceeds the 30.0mA rating")
        );
        assert_ne!(
            warning_key("led1: 31.2mA exceeds the 30.0mA rating"),
            warning_key("led2: 31.2mA exceeds the 30.0mA rating")
        );
    }
}
