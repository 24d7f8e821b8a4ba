//! # Breadboard Core
//!
//! A live circuit solver for an interactive breadboard schematic editor.
//!
//! This library provides:
//! - A typed snapshot format for placed components and wires
//! - Net building with union-find and topology diagnostics
//! - Modified Nodal Analysis (MNA) with a pivoted Gaussian solver
//! - Piecewise-linear junctions and transistors resolved by a bounded state iteration
//! - Backward-Euler transient stepping for capacitors and inductors
//! - Per-component results with a reason whenever a device stays inactive
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`circuit`] - Snapshot representation and validation
//! - [`components`] - Component parameter records and device models
//! - [`netlist`] - Nets and canonical stamped elements
//! - [`solver`] - MNA assembly, device iteration and the transient stepper
//! - [`analysis`] - Supply/return reachability over the solved circuit
//! - [`output`] - Typed per-component results and the debug snapshot
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! breadboard circuit.json --pretty
//! breadboard circuit.json --transient --duration 0.5 --dt 1e-3 --every 50
//! ```
//!
//! ### Library
//!
//! ```no_run
//! use breadboard_core::{solve_dc, Circuit, SimulatorConfig};
//!
//! let circuit = Circuit::from_json(r#"{"components": [], "wires": []}"#)?;
//! let result = solve_dc(&circuit, &SimulatorConfig::default())?;
//! println!("{}", result.to_json()?);
//! # Ok::<(), breadboard_core::BreadboardError>(())
//! ```
//!
//! ## Circuit Simulation Method
//!
//! Every solve runs the same pipeline:
//!
//! 1. Group pins into nets, merging wires, closed switch contacts and grounds
//! 2. Expand components into resistors, sources and junction companions
//! 3. Assemble A and z, eliminate with partial pivoting, retry with gmin if singular
//! 4. Re-derive junction and transistor states until they reproduce themselves
//!
//! Reactive elements are discretized with Backward Euler, which stays stable
//! at the coarse steps an editor animation uses.

pub mod analysis;
pub mod circuit;
pub mod components;
pub mod error;
pub mod netlist;
pub mod output;
pub mod solver;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{BreadboardError, Result};
pub use output::{ComponentOutput, SolveResult};
pub use solver::{solve_dc, Simulator, SimulatorConfig};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmBreadboard;
