//! WASM bindings for Breadboard Core.
//!
//! This module provides JavaScript-friendly bindings for the schematic
//! editor. Snapshots go in and results come out as JSON strings.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmBreadboard } from 'breadboard_core';
//!
//! await init();
//!
//! const board = new WasmBreadboard(JSON.stringify(snapshot));
//! const dc = JSON.parse(board.solve_dc());
//!
//! // In the animation loop:
//! const frame = JSON.parse(board.step(1 / 60));
//! ```

use wasm_bindgen::prelude::*;

use crate::circuit::Circuit;
use crate::error::BreadboardError;
use crate::output::SolveResult;
use crate::solver::{Simulator, SimulatorConfig};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn js_error(error: BreadboardError) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_json(result: SolveResult) -> Result<String, JsValue> {
    result.to_json().map_err(js_error)
}

/// WASM-compatible breadboard solver.
///
/// Wraps a native [`Simulator`], so transient state persists between
/// `step` calls while `solve_dc` stays stateless.
#[wasm_bindgen]
pub struct WasmBreadboard {
    simulator: Simulator,
}

#[wasm_bindgen]
impl WasmBreadboard {
    /// Create a solver from a circuit snapshot in JSON form.
    #[wasm_bindgen(constructor)]
    pub fn new(snapshot: &str) -> Result<WasmBreadboard, JsValue> {
        Self::with_config(snapshot, "{}")
    }

    /// Create a solver with a JSON simulator configuration.
    ///
    /// Missing configuration fields keep their defaults.
    #[wasm_bindgen]
    pub fn with_config(snapshot: &str, config: &str) -> Result<WasmBreadboard, JsValue> {
        let circuit = Circuit::from_json(snapshot).map_err(js_error)?;
        let config: SimulatorConfig = serde_json::from_str(config)
            .map_err(|e| js_error(BreadboardError::invalid_simulation_param(e.to_string())))?;
        let simulator = Simulator::with_config(circuit, config).map_err(js_error)?;
        Ok(WasmBreadboard { simulator })
    }

    /// Solve the current snapshot at DC.
    #[wasm_bindgen]
    pub fn solve_dc(&self) -> Result<String, JsValue> {
        to_json(self.simulator.solve_dc().map_err(js_error)?)
    }

    /// Advance the transient run by `dt` seconds.
    #[wasm_bindgen]
    pub fn step(&mut self, dt: f64) -> Result<String, JsValue> {
        to_json(self.simulator.step(dt).map_err(js_error)?)
    }

    /// Replace the snapshot after an edit, keeping the transient history.
    #[wasm_bindgen]
    pub fn set_circuit(&mut self, snapshot: &str) -> Result<(), JsValue> {
        let circuit = Circuit::from_json(snapshot).map_err(js_error)?;
        self.simulator.set_circuit(circuit).map_err(js_error)
    }

    /// Restart the transient run from t = 0.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.simulator.reset();
    }

    /// Simulated time of the transient run.
    #[wasm_bindgen(getter)]
    pub fn time(&self) -> f64 {
        self.simulator.state().time
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
