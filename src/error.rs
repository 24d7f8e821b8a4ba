//! Error types for the breadboard circuit solver.
//!
//! This module provides a unified error type [`BreadboardError`] for the
//! conditions that stop a solve before it starts: unreadable snapshots,
//! non-physical component parameters and invalid stepping requests.
//!
//! Topology problems (dangling wires, floating pins, a missing reference) and
//! singular systems are *not* errors. They are reported inside the
//! [`SolveResult`](crate::output::SolveResult) so the editor can keep rendering.

use thiserror::Error;

/// Result type alias using [`BreadboardError`].
pub type Result<T> = std::result::Result<T, BreadboardError>;

/// Unified error type for all breadboard operations.
#[derive(Error, Debug)]
pub enum BreadboardError {
    // ============ Snapshot Errors ============
    /// The circuit snapshot could not be decoded
    #[error("Failed to parse circuit snapshot: {source}")]
    SnapshotParse {
        #[source]
        source: serde_json::Error,
    },

    /// Two components share an id
    #[error("Duplicate component id '{id}'")]
    DuplicateComponent { id: String },

    /// Invalid parameter value
    #[error("Invalid parameter '{param}' for component '{component}': {message}")]
    InvalidParameter {
        component: String,
        param: String,
        message: String,
    },

    // ============ Simulation Errors ============
    /// Matrix is singular and cannot be solved
    #[error("Singular matrix: pivot {pivot:.2e} in row {row} is below tolerance")]
    SingularMatrix { row: usize, pivot: f64 },

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ I/O Errors ============
    /// Error reading circuit file
    #[error("Failed to read circuit file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing solve results
    #[error("Output error: {message}")]
    OutputError { message: String },
}

impl BreadboardError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(
        component: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            component: component.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an invalid simulation parameter error
    pub fn invalid_simulation_param(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for BreadboardError {
    fn from(source: serde_json::Error) -> Self {
        Self::SnapshotParse { source }
    }
}
