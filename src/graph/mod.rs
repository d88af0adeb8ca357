//! Control-flow graph construction and mutation.
//!
//! The graph lives in [`cfg::ControlFlowGraph`]; [`node`] and [`edge`] hold the arena
//! slot types and their dense, never-reused identifiers; [`builder`] wires a graph up
//! from [`crate::block::BlockInfo`] descriptors.

pub mod builder;
pub mod cfg;
pub mod edge;
pub mod node;

pub use cfg::{ControlFlowGraph, MAX_REMOVAL_NESTING};
pub use edge::{EdgeFlags, EdgeId, FlowEdge};
pub use node::{FlowNode, NodeId, NodePayload};
