//! From wired snapshot to matrix-ready elements.
//!
//! [`build_nets`] groups pins into equipotential nets; [`build_netlist`] gives
//! each multi-pin net a matrix node and expands components into elements.

mod builder;
mod nets;

pub use builder::{
    build_netlist, Element, ElementKind, JunctionDevice, LedRating, LoadRole, Netlist,
};
pub use nets::{build_nets, Net, NetMap, TopologyIssue, WireEnd};
