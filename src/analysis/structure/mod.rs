//! Hierarchical control-flow structure.
//!
//! A [`StructureTree`] is the output of structural analysis: every live node of the
//! graph is wrapped in a leaf [`Structure::Block`], and nested [`Structure::Region`]s
//! group them into natural loops, improper (irreducible) cyclic regions and large
//! acyclic regions until a single root region covers the whole graph. Each region owns
//! a private proxy subgraph of [`SubGraphNode`]s holding the control flow among its
//! direct children; edges that used to leave the region are recorded as
//! [`ExitEdge`]s.
//!
//! Region identity is borrowed from the entry: a region node carries its entry's node
//! number, so consumers can keep talking about node numbers across collapse levels.
//!
//! The tree is a snapshot. All graph mutations except
//! [`crate::graph::ControlFlowGraph::add_block_in_region`] invalidate it.

mod analyzer;

pub use analyzer::MAX_ACYCLIC_REGION_SIZE;

use std::fmt;

use crate::analysis::Dominators;
use crate::error::invariant_error;
use crate::graph::{ControlFlowGraph, NodeId};
use crate::Result;

/// Identifier of a structure (leaf block or region) within a [`StructureTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructureId(pub(crate) usize);

impl StructureId {
    /// Returns the underlying index of this structure identifier.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Identifier of a proxy node within a [`StructureTree`]'s subgraphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubNodeId(pub(crate) usize);

impl SubNodeId {
    /// Returns the underlying index of this proxy-node identifier.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SubNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// What a proxy node stands for.
///
/// Match exhaustively; there is no downcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubNodeKind {
    /// Proxy for one graph node.
    Block(NodeId),
    /// Proxy for a collapsed region.
    Region(StructureId),
}

/// A node of a region's private proxy subgraph.
///
/// Adjacency is uniform pairs of (neighbor proxy, exceptional flag). While analysis
/// runs these lists describe the current working graph; once the owning region
/// collapses they are frozen as the region's internal flow.
#[derive(Debug, Clone)]
pub struct SubGraphNode {
    pub(crate) kind: SubNodeKind,
    pub(crate) number: NodeId,
    pub(crate) successors: Vec<(SubNodeId, bool)>,
    pub(crate) predecessors: Vec<(SubNodeId, bool)>,
}

impl SubGraphNode {
    /// What this proxy stands for.
    #[must_use]
    pub fn kind(&self) -> SubNodeKind {
        self.kind
    }

    /// Node number carried by this proxy. For a region proxy this is the number of
    /// the region's entry, recursively a real graph node.
    #[must_use]
    pub fn number(&self) -> NodeId {
        self.number
    }

    /// Successor proxies with their exceptional flags.
    #[must_use]
    pub fn successors(&self) -> &[(SubNodeId, bool)] {
        &self.successors
    }

    /// Predecessor proxies with their exceptional flags.
    #[must_use]
    pub fn predecessors(&self) -> &[(SubNodeId, bool)] {
        &self.predecessors
    }
}

/// An edge that leaves a region, remembered at collapse time.
///
/// `target` is the node number of the destination as it existed when the region
/// collapsed; numbers stay meaningful across further collapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitEdge {
    /// Proxy inside the region the edge leaves from.
    pub from: SubNodeId,
    /// Node number of the destination outside the region.
    pub target: NodeId,
    /// Exception edge rather than ordinary control flow.
    pub exceptional: bool,
}

/// A collapsed region: entry proxy, member proxies, recorded exit edges and the
/// cyclicity verdict of the analysis walks.
#[derive(Debug, Clone)]
pub struct RegionStructure {
    pub(crate) entry: SubNodeId,
    pub(crate) members: Vec<SubNodeId>,
    pub(crate) exit_edges: Vec<ExitEdge>,
    pub(crate) has_backedge: bool,
    pub(crate) internal_cycles: bool,
}

impl RegionStructure {
    /// The region's entry proxy; its number names the region one level up.
    #[must_use]
    pub fn entry(&self) -> SubNodeId {
        self.entry
    }

    /// Member proxies, entry first.
    #[must_use]
    pub fn members(&self) -> &[SubNodeId] {
        &self.members
    }

    /// Edges that left the region at collapse time.
    #[must_use]
    pub fn exit_edges(&self) -> &[ExitEdge] {
        &self.exit_edges
    }

    /// Whether a member loops back to the entry.
    #[must_use]
    pub fn has_backedge(&self) -> bool {
        self.has_backedge
    }

    /// Whether the analysis walks found a cycle not passing through the entry.
    #[must_use]
    pub fn contains_internal_cycles(&self) -> bool {
        self.internal_cycles
    }

    /// A reducible loop: backedges to the entry and no internal cycles. Mutually
    /// exclusive with [`RegionStructure::is_improper`].
    #[must_use]
    pub fn is_natural_loop(&self) -> bool {
        self.has_backedge && !self.internal_cycles
    }

    /// An irreducible region: cycles that bypass the entry.
    #[must_use]
    pub fn is_improper(&self) -> bool {
        self.internal_cycles
    }

    /// No cycles at all.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        !self.has_backedge && !self.internal_cycles
    }
}

/// A node of the structure tree.
#[derive(Debug, Clone)]
pub enum Structure {
    /// Leaf wrapping one graph node.
    Block {
        /// The wrapped graph node.
        node: NodeId,
    },
    /// Interior region grouping child structures.
    Region(RegionStructure),
}

impl Structure {
    /// The region payload, if this is a region.
    #[must_use]
    pub fn as_region(&self) -> Option<&RegionStructure> {
        match self {
            Structure::Region(region) => Some(region),
            Structure::Block { .. } => None,
        }
    }
}

/// The result of structural analysis over a [`ControlFlowGraph`].
#[derive(Debug, Clone)]
pub struct StructureTree {
    pub(crate) structures: Vec<Structure>,
    pub(crate) parents: Vec<Option<StructureId>>,
    pub(crate) sub_nodes: Vec<SubGraphNode>,
    /// Leaf structure per node arena slot.
    pub(crate) block_leaf: Vec<Option<StructureId>>,
    pub(crate) root: StructureId,
}

impl StructureTree {
    /// Runs structural analysis, reducing the graph to a single root region.
    ///
    /// Requires a *valid forward* [`Dominators`] tree computed for the graph's
    /// current shape; anything else is rejected with [`crate::Error::GraphError`].
    pub fn analyze(cfg: &ControlFlowGraph, dominators: &Dominators) -> Result<StructureTree> {
        analyzer::analyze(cfg, dominators)
    }

    /// The root region, covering every live node including both sentinels.
    #[must_use]
    pub fn root(&self) -> StructureId {
        self.root
    }

    /// The structure with the given id.
    #[must_use]
    pub fn structure(&self, id: StructureId) -> &Structure {
        &self.structures[id.index()]
    }

    /// The region payload of the given structure, if it is a region.
    #[must_use]
    pub fn region(&self, id: StructureId) -> Option<&RegionStructure> {
        self.structure(id).as_region()
    }

    /// The proxy node with the given id.
    #[must_use]
    pub fn sub_node(&self, id: SubNodeId) -> &SubGraphNode {
        &self.sub_nodes[id.index()]
    }

    /// The structure a proxy node stands for.
    #[must_use]
    pub fn structure_of(&self, proxy: SubNodeId) -> Option<StructureId> {
        match self.sub_nodes[proxy.index()].kind {
            SubNodeKind::Block(node) => self.leaf_structure(node),
            SubNodeKind::Region(region) => Some(region),
        }
    }

    /// The parent region of a structure, `None` for the root.
    #[must_use]
    pub fn parent(&self, id: StructureId) -> Option<StructureId> {
        self.parents.get(id.index()).copied().flatten()
    }

    /// Direct child structures of a region, entry first. Empty for leaves.
    #[must_use]
    pub fn children(&self, id: StructureId) -> Vec<StructureId> {
        match self.structure(id) {
            Structure::Block { .. } => Vec::new(),
            Structure::Region(region) => region
                .members
                .iter()
                .filter_map(|&m| self.structure_of(m))
                .collect(),
        }
    }

    /// The leaf structure wrapping a graph node, if the node is in the tree.
    #[must_use]
    pub fn leaf_structure(&self, node: NodeId) -> Option<StructureId> {
        self.block_leaf.get(node.index()).copied().flatten()
    }

    /// All graph nodes under a structure, gathered iteratively.
    #[must_use]
    pub fn leaf_blocks(&self, id: StructureId) -> Vec<NodeId> {
        let mut blocks = Vec::new();
        let mut stack = vec![id];
        while let Some(sid) = stack.pop() {
            match self.structure(sid) {
                Structure::Block { node } => blocks.push(*node),
                Structure::Region(region) => {
                    for &member in &region.members {
                        match self.sub_nodes[member.index()].kind {
                            SubNodeKind::Block(node) => blocks.push(node),
                            SubNodeKind::Region(child) => stack.push(child),
                        }
                    }
                }
            }
        }
        blocks
    }

    /// How many cyclic regions (natural loops or improper regions) enclose a node.
    #[must_use]
    pub fn loop_depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.leaf_structure(node);
        while let Some(sid) = current {
            if self
                .region(sid)
                .is_some_and(|r| r.has_backedge || r.internal_cycles)
            {
                depth += 1;
            }
            current = self.parent(sid);
        }
        depth
    }

    /// The innermost cyclic region entered through `node`, if any.
    ///
    /// Used by edge removal to detect loop entries kept alive only by their own
    /// backedges.
    #[must_use]
    pub fn cyclic_region_with_entry(&self, node: NodeId) -> Option<StructureId> {
        let mut current = self.leaf_structure(node).and_then(|s| self.parent(s));
        while let Some(sid) = current {
            if let Some(region) = self.region(sid) {
                if (region.has_backedge || region.internal_cycles)
                    && self.sub_nodes[region.entry.index()].number == node
                {
                    return Some(sid);
                }
            }
            current = self.parent(sid);
        }
        None
    }

    /// Attaches a fresh graph node as a leaf of an existing region, keeping the tree
    /// alive across the one mutation that allows it.
    pub(crate) fn add_leaf_in_region(&mut self, node: NodeId, region: StructureId) -> Result<()> {
        let is_region = self
            .structures
            .get(region.index())
            .is_some_and(|s| s.as_region().is_some());
        if !is_region {
            return Err(invariant_error!("{region} is not a region"));
        }
        let leaf = StructureId(self.structures.len());
        self.structures.push(Structure::Block { node });
        self.parents.push(Some(region));
        let proxy = SubNodeId(self.sub_nodes.len());
        self.sub_nodes.push(SubGraphNode {
            kind: SubNodeKind::Block(node),
            number: node,
            successors: Vec::new(),
            predecessors: Vec::new(),
        });
        if let Structure::Region(r) = &mut self.structures[region.index()] {
            r.members.push(proxy);
        }
        if self.block_leaf.len() <= node.index() {
            self.block_leaf.resize(node.index() + 1, None);
        }
        self.block_leaf[node.index()] = Some(leaf);
        Ok(())
    }
}
