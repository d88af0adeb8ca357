//! # flowgraph Prelude
//!
//! Convenient single import for the types nearly every consumer touches: the graph,
//! its identifiers, block descriptors and the two analyses.
//!
//! ```rust
//! use flowgraph::prelude::*;
//!
//! let cfg = ControlFlowGraph::from_blocks(vec![BlockInfo::ret()])?;
//! # Ok::<(), flowgraph::Error>(())
//! ```

/// The error type for all flowgraph operations
pub use crate::Error;

/// The result type used throughout flowgraph
pub use crate::Result;

/// Basic-block descriptors fed into the graph builder
pub use crate::block::{BlockInfo, CatchKind, FlowKind, HandlerInfo};

/// The control-flow graph and its arena types
pub use crate::graph::{ControlFlowGraph, EdgeFlags, EdgeId, FlowEdge, FlowNode, NodeId, NodePayload};

/// Dominator and post-dominator trees
pub use crate::analysis::{Direction, Dominators};

/// Hierarchical control-flow structure
pub use crate::analysis::structure::{
    ExitEdge, RegionStructure, Structure, StructureId, StructureTree, SubGraphNode, SubNodeId,
    SubNodeKind,
};

/// Reusable visit tracking for custom walks
pub use crate::analysis::VisitContext;
