//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations Ax = z where:
//! - x contains node voltages and branch currents
//! - A is the conductance/coefficient matrix
//! - z is the source vector
//!
//! The matrix structure is:
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   0 ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (node equations)
//! - B, C connect voltage-constrained branches to nodes
//! - v is the vector of node voltages
//! - j is the vector of branch currents (sources, conducting junctions)
//! - i is the sum of current sources into each node
//! - e is the vector of branch voltages
//!
//! Semiconductors are piecewise linear: each solve assumes a discrete state per
//! device, and [`converge`] re-solves until the assumed states reproduce
//! themselves.

mod assemble;
mod mna;
mod nonlinear;
mod simulator;
mod transient;

pub use assemble::{assemble, bias_point, element_current, Analysis, Assembly, Solution, Stamp};
pub use mna::MnaMatrix;
pub use nonlinear::{converge, Convergence, DeviceStates};
pub use simulator::{solve_dc, InductorDcModel, Simulator, SimulatorConfig};
pub use transient::{History, LedHealth, TransientState};

/// Cap on expand-solve-recheck passes per solve or time step.
pub const MAX_DEVICE_ITERATIONS: usize = 10;

/// Shunt conductance added to every node diagonal on a singular retry.
pub const GMIN: f64 = 1e-9;

/// Pivots smaller than this mark the system singular.
pub const PIVOT_TOLERANCE: f64 = 1e-13;

/// Companion resistance of a non-conducting junction.
pub const OFF_RESISTANCE: f64 = 1e9;

/// Leakage of an ideal capacitor; open in DC for all practical purposes.
pub const CAPACITOR_LEAKAGE_RESISTANCE: f64 = 1e8;

/// Series resistance given to voltage sources unless overridden.
pub const DEFAULT_SOURCE_RESISTANCE: f64 = 50.0;

/// Floor for any stamped resistance.
pub const MIN_RESISTANCE: f64 = 1e-6;

/// Floor for each potentiometer segment.
pub const MIN_POT_SEGMENT_RESISTANCE: f64 = 0.1;

/// Contact resistance of a closed switch whose pins were not merged.
pub const SWITCH_CLOSED_RESISTANCE: f64 = 0.01;

/// DC stand-in for an inductor treated as an open.
pub const INDUCTOR_NEAR_OPEN: f64 = 1e9;

/// DC stand-in for an inductor treated as a short.
pub const INDUCTOR_NEAR_SHORT: f64 = 1e-3;

/// Hysteresis band around an LED's forward voltage.
pub const LED_HYSTERESIS: f64 = 0.05;

/// Hysteresis band around diode and base-emitter thresholds.
pub const DIODE_HYSTERESIS: f64 = 0.01;

/// Overcurrent steps an LED survives before it burns out.
pub const LED_BURN_TICKS: u32 = 5;
