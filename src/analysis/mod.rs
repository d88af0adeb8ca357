//! Analyses over a built control-flow graph.
//!
//! - [`dominators`]: Lengauer-Tarjan dominator and post-dominator trees
//! - [`structure`]: hierarchical region decomposition (loops, improper regions,
//!   acyclic regions) driven by the dominator tree
//! - [`context`]: generation-stamped visit tracking shared by the graph walks
//!
//! The usual pipeline is prune, dominate, structure:
//!
//! ```rust
//! use flowgraph::analysis::{Direction, Dominators};
//! use flowgraph::block::BlockInfo;
//! use flowgraph::graph::ControlFlowGraph;
//!
//! let mut cfg = ControlFlowGraph::from_blocks(vec![
//!     BlockInfo::fall_through(),
//!     BlockInfo::conditional(1),
//!     BlockInfo::ret(),
//! ])
//! .unwrap();
//! cfg.remove_unreachable_blocks().unwrap();
//! let doms = Dominators::compute(&cfg, Direction::Forward).unwrap();
//! cfg.analyze_structure(&doms).unwrap();
//! assert!(cfg.structure().is_some());
//! ```

pub mod context;
pub mod dominators;
pub mod structure;

pub use context::VisitContext;
pub use dominators::{Direction, Dominators};
pub use structure::{StructureId, StructureTree};
