//! Reachability analysis over the solved circuit.

mod conductivity;

pub use conductivity::{
    build_graph, terminals, Bias, Conductivity, NetGraph, PathReport, Terminals,
};
