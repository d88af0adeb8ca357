#![doc(html_no_source)]
#![deny(missing_docs)]

//! # flowgraph
//!
//! Control-flow graph construction, dominator analysis and control-flow structuring for
//! JIT compilation. `flowgraph` models a method as a graph of basic blocks between
//! Start and End sentinels, keeps that graph consistent under aggressive mutation
//! (edge and node removal with transitive orphan cleanup, dominant-catch filtering of
//! exception edges, unreachable-block pruning), and layers two analyses on top:
//! Lengauer-Tarjan dominator / post-dominator trees and a hierarchical region
//! decomposition that recognizes natural loops, improper (irreducible) regions and
//! large acyclic regions.
//!
//! ## Features
//!
//! - **Dense, stable numbering** - Node and edge numbers are issued densely and never
//!   reused, so analyses can use plain arrays as side tables across mutations
//! - **Exception-aware flow** - Ordinary and exception edges live in separate
//!   adjacency lists, with the dominant-catch rule rejecting edges to shadowed handlers
//! - **Cascading removal** - Removing an edge transitively removes everything it
//!   orphans, including loop entries kept alive only by their own backedges
//! - **Iterative analyses** - Every walk uses an explicit stack; recursion depth never
//!   depends on the method being compiled
//! - **Snapshot structure trees** - Regions borrow their entry's node number, record
//!   their exit edges and tag themselves as natural loop, improper or acyclic
//!
//! ## Quick Start
//!
//! ```rust
//! use flowgraph::prelude::*;
//!
//! // while (cond) { body } return
//! let mut cfg = ControlFlowGraph::from_blocks(vec![
//!     BlockInfo::fall_through(),       // preheader
//!     BlockInfo::conditional(3),       // header: exit or fall into body
//!     BlockInfo::jump(1),              // latch
//!     BlockInfo::ret(),                // exit
//! ])?;
//! cfg.remove_unreachable_blocks()?;
//!
//! let doms = Dominators::compute(&cfg, Direction::Forward)?;
//! cfg.analyze_structure(&doms)?;
//!
//! let tree = cfg.structure().unwrap();
//! let header = NodeId::new(3);
//! assert_eq!(tree.loop_depth(header), 1);
//! # Ok::<(), flowgraph::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`block`] - caller-facing basic-block descriptors
//! - [`graph`] - the graph itself: arenas, mutation engine, builder
//! - [`analysis`] - dominators, structural analysis, visit tracking
//!
//! The mutation engine consults the structure tree (when one is cached) to classify
//! orphans, and every mutation except
//! [`graph::ControlFlowGraph::add_block_in_region`] invalidates the tree.

pub(crate) mod error;
pub(crate) mod utils;

pub mod analysis;
pub mod block;
pub mod graph;
pub mod prelude;

pub use error::{Error, Result};
