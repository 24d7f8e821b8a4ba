//! Circuit snapshot representation and validation.
//!
//! This module provides the editor's view of a circuit: placed components
//! with typed parameters and the wires between their pins. The snapshot is
//! read-only input to every solve.

mod snapshot;
mod types;
mod validate;

pub use snapshot::{Circuit, Component, PinRef, Position, Wire};
pub use types::*;
pub use validate::validate_circuit;
