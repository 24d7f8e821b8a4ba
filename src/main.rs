//! Breadboard - live circuit solver
//!
//! Solves a circuit snapshot and prints the result as JSON.
//!
//! # Usage
//!
//! ```bash
//! breadboard circuit.json --pretty
//! breadboard circuit.json --transient --duration 0.1 --dt 1e-3 --every 10
//! ```
//!
//! Transient runs print one JSON document per reported step, one per line.
//! Logs go to stderr; set `RUST_LOG=breadboard_core=debug` to trace the
//! device iteration.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use breadboard_core::{
    error::{BreadboardError, Result},
    Circuit, Simulator, SimulatorConfig, SolveResult,
};

/// Breadboard circuit solver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the circuit snapshot (.json)
    #[arg(value_name = "CIRCUIT_FILE")]
    circuit_file: PathBuf,

    /// Run a transient simulation instead of a single DC solve
    #[arg(short, long)]
    transient: bool,

    /// Simulated time in seconds
    #[arg(long, default_value_t = 0.1)]
    duration: f64,

    /// Time step in seconds
    #[arg(long, default_value_t = 1e-3)]
    dt: f64,

    /// Print every Nth transient step (the last step is always printed)
    #[arg(long, default_value_t = 1)]
    every: usize,

    /// Maximum device-state iterations per solve
    #[arg(long, default_value_t = breadboard_core::solver::MAX_DEVICE_ITERATIONS)]
    max_iterations: usize,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

fn print(result: &SolveResult, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(result)
    } else {
        serde_json::to_string(result)
    }
    .map_err(|e| BreadboardError::OutputError {
        message: e.to_string(),
    })?;
    println!("{json}");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Read the snapshot
    let json =
        std::fs::read_to_string(&args.circuit_file).map_err(|source| BreadboardError::FileReadError {
            path: args.circuit_file.display().to_string(),
            source,
        })?;
    let circuit = Circuit::from_json(&json)?;

    let config = SimulatorConfig::new().with_max_iterations(args.max_iterations);
    let mut simulator = Simulator::with_config(circuit, config)?;

    if !args.transient {
        return print(&simulator.solve_dc()?, args.pretty);
    }

    let every = args.every.max(1);
    let steps = (args.duration / args.dt).round() as usize;
    let mut index = 0;
    let mut failure = None;
    simulator.run(args.duration, args.dt, |result| {
        index += 1;
        if failure.is_none() && (index % every == 0 || index == steps) {
            if let Err(e) = print(result, args.pretty) {
                failure = Some(e);
            }
        }
    })?;
    failure.map_or(Ok(()), Err)
}
