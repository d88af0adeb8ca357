//! Mutable control-flow graph with sentinel entry/exit nodes.
//!
//! [`ControlFlowGraph`] owns two arenas (nodes and edges) plus the optional
//! [`StructureTree`] produced by structural analysis. Nodes and edges are removed
//! *softly*: the arena slot keeps its number forever and only its validity flag is
//! cleared, so analysis side-arrays indexed by number stay coherent across mutations.
//!
//! The mutation operations preserve three invariants at every public-API boundary:
//! every live edge appears in exactly one successor list of its source and one
//! predecessor list of its target, the live edge count equals the sum of live
//! out-degrees, and an ordinary and an exception edge never connect the same node pair.
//!
//! # Examples
//!
//! ```rust
//! use flowgraph::block::BlockInfo;
//! use flowgraph::graph::ControlFlowGraph;
//!
//! let mut cfg = ControlFlowGraph::new();
//! let a = cfg.add_block(BlockInfo::fall_through());
//! cfg.add_edge(cfg.start(), a).unwrap();
//! cfg.add_edge(a, cfg.end()).unwrap();
//! assert_eq!(cfg.edge_count(), 2);
//! ```

use std::fmt::Write as _;

use crate::analysis::structure::StructureTree;
use crate::block::{BlockInfo, HandlerInfo};
use crate::error::invariant_error;
use crate::graph::edge::{EdgeId, FlowEdge};
use crate::graph::node::{FlowNode, NodeId, NodePayload};
use crate::utils::BitSet;
use crate::Result;

/// Maximum nesting level for the cascading edge-removal worklist.
///
/// Exceeding it aborts the removal with [`crate::Error::RemovalLimit`] rather than
/// churning through a pathologically deep cascade.
pub const MAX_REMOVAL_NESTING: usize = 1000;

/// A directed control-flow graph over basic blocks.
///
/// Created empty with just the Start and End sentinels by [`ControlFlowGraph::new`], or
/// wired up from block descriptors by [`ControlFlowGraph::from_blocks`].
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
    start: NodeId,
    end: NodeId,
    live_nodes: usize,
    live_edges: usize,
    structure: Option<StructureTree>,
    removing_unreachable: bool,
}

impl ControlFlowGraph {
    /// Creates a graph containing only the Start and End sentinels, with no edges.
    #[must_use]
    pub fn new() -> Self {
        let mut cfg = ControlFlowGraph {
            nodes: Vec::new(),
            edges: Vec::new(),
            start: NodeId::new(0),
            end: NodeId::new(1),
            live_nodes: 0,
            live_edges: 0,
            structure: None,
            removing_unreachable: false,
        };
        cfg.start = cfg.add_node(NodePayload::Start);
        cfg.end = cfg.add_node(NodePayload::End);
        cfg
    }

    /// The entry sentinel. Never has predecessors.
    #[must_use]
    pub fn start(&self) -> NodeId {
        self.start
    }

    /// The exit sentinel. Never has successors.
    #[must_use]
    pub fn end(&self) -> NodeId {
        self.end
    }

    /// Number of live (not removed) nodes, sentinels included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.live_nodes
    }

    /// Number of live edges, ordinary and exceptional together.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.live_edges
    }

    /// Upper bound (exclusive) on node numbers ever issued by this graph.
    ///
    /// Analyses size their side arrays with this, since numbers of removed nodes are
    /// never reused.
    #[must_use]
    pub fn node_bound(&self) -> usize {
        self.nodes.len()
    }

    /// Upper bound (exclusive) on edge numbers ever issued by this graph.
    #[must_use]
    pub fn edge_bound(&self) -> usize {
        self.edges.len()
    }

    /// The node with the given id, if it is live.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&FlowNode> {
        self.nodes.get(id.index()).filter(|n| n.is_valid())
    }

    /// Mutable access to a live node, for frequency updates.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut FlowNode> {
        self.nodes.get_mut(id.index()).filter(|n| n.is_valid())
    }

    /// The edge with the given id, if it is live.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&FlowEdge> {
        self.edges.get(id.index()).filter(|e| e.is_valid())
    }

    /// Mutable access to a live edge, for frequency and flag updates.
    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut FlowEdge> {
        self.edges.get_mut(id.index()).filter(|e| e.is_valid())
    }

    /// Iterates over all live nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.nodes.iter().filter(|n| n.is_valid())
    }

    /// Iterates over the ids of all live nodes.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes().map(FlowNode::id)
    }

    /// Iterates over all live edges.
    pub fn edges(&self) -> impl Iterator<Item = &FlowEdge> {
        self.edges.iter().filter(|e| e.is_valid())
    }

    /// Ordinary successors of a node.
    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacent(node, AdjacencyList::Successors)
    }

    /// Ordinary predecessors of a node.
    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacent(node, AdjacencyList::Predecessors)
    }

    /// Exception successors of a node, i.e. the handlers it can throw to.
    pub fn exception_successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacent(node, AdjacencyList::ExceptionSuccessors)
    }

    /// Exception predecessors of a node, i.e. the blocks it handles throws from.
    pub fn exception_predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacent(node, AdjacencyList::ExceptionPredecessors)
    }

    /// Ids of the live ordinary out-edges of a node.
    pub fn successor_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.adjacent_edges(node, AdjacencyList::Successors)
    }

    /// Ids of the live ordinary in-edges of a node.
    pub fn predecessor_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.adjacent_edges(node, AdjacencyList::Predecessors)
    }

    /// Ids of the live exception out-edges of a node.
    pub fn exception_successor_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.adjacent_edges(node, AdjacencyList::ExceptionSuccessors)
    }

    /// Ids of the live exception in-edges of a node.
    pub fn exception_predecessor_edges(&self, node: NodeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.adjacent_edges(node, AdjacencyList::ExceptionPredecessors)
    }

    /// Finds the live ordinary edge between two nodes, if one exists.
    #[must_use]
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.adjacent_edges(from, AdjacencyList::Successors)
            .find(|&e| self.edges[e.index()].to() == to)
    }

    /// Finds the live exception edge between two nodes, if one exists.
    #[must_use]
    pub fn find_exception_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.adjacent_edges(from, AdjacencyList::ExceptionSuccessors)
            .find(|&e| self.edges[e.index()].to() == to)
    }

    /// Adds a fresh block node, unconnected. Its number is issued densely and never
    /// reused.
    ///
    /// Invalidates a present structure tree: the new node is not a leaf of any
    /// region, so the tree would no longer partition the live node set. Use
    /// [`Self::add_block_in_region`] to grow the graph under a live tree.
    pub fn add_block(&mut self, info: BlockInfo) -> NodeId {
        self.structure = None;
        self.add_node(NodePayload::Block(info))
    }

    /// Adds a fresh block node inside an existing region of the current structure tree.
    ///
    /// This is the one mutation that keeps the structure tree alive: the new node is
    /// attached as a leaf proxy of `region` without re-running analysis. Fails with
    /// [`crate::Error::GraphError`] when no structure tree is present.
    pub fn add_block_in_region(
        &mut self,
        info: BlockInfo,
        region: crate::analysis::structure::StructureId,
    ) -> Result<NodeId> {
        let id = self.add_node(NodePayload::Block(info));
        match self.structure.as_mut() {
            Some(tree) => {
                tree.add_leaf_in_region(id, region)?;
                Ok(id)
            }
            None => Err(crate::Error::GraphError(format!(
                "cannot attach {id} to a region: no structure tree is present"
            ))),
        }
    }

    fn add_node(&mut self, payload: NodePayload) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(FlowNode::new(id, payload));
        self.live_nodes += 1;
        id
    }

    /// Adds an ordinary edge from `from` to `to`.
    ///
    /// The new edge's frequency is seeded conservatively as the smaller of the two
    /// endpoint frequencies, clamped at zero. Adding an edge that already exists is
    /// idempotent and returns the existing id. Fails when an exception edge already
    /// connects the pair: a node pair carries ordinary or exceptional flow, never both.
    /// Invalidates the structure tree on insertion.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<EdgeId> {
        self.check_endpoints(from, to)?;
        if self.find_exception_edge(from, to).is_some() {
            return Err(invariant_error!(
                "adding ordinary edge {from} -> {to} over an existing exception edge"
            ));
        }
        if let Some(existing) = self.find_edge(from, to) {
            return Ok(existing);
        }
        self.structure = None;
        Ok(self.insert_edge(from, to, false))
    }

    /// Adds an exception edge from a throwing block to a handler block, subject to the
    /// dominant-catch rule.
    ///
    /// If a handler already reached from `from` is consulted before `to`'s handler at
    /// runtime and catches everything `to`'s handler would catch, the new edge can never
    /// be taken and the request is silently rejected with `Ok(None)`. Handlers
    /// synthesized for on-stack replacement never shadow others. Fails when an ordinary
    /// edge already connects the pair. Invalidates the structure tree on insertion.
    pub fn add_exception_edge(&mut self, from: NodeId, to: NodeId) -> Result<Option<EdgeId>> {
        self.check_endpoints(from, to)?;
        if self.find_edge(from, to).is_some() {
            return Err(invariant_error!(
                "adding exception edge {from} -> {to} over an existing ordinary edge"
            ));
        }
        if let Some(existing) = self.find_exception_edge(from, to) {
            return Ok(Some(existing));
        }
        if let Some(new_handler) = self.handler_of(to) {
            let existing: Vec<NodeId> = self.exception_successors(from).collect();
            for handler_node in existing {
                if let Some(h) = self.handler_of(handler_node) {
                    if shadows(&h, &new_handler) {
                        return Ok(None);
                    }
                }
            }
        }
        self.structure = None;
        Ok(Some(self.insert_edge(from, to, true)))
    }

    fn check_endpoints(&self, from: NodeId, to: NodeId) -> Result<()> {
        if self.node(from).is_none() || self.node(to).is_none() {
            return Err(invariant_error!(
                "edge endpoints {from} -> {to} must both be live nodes"
            ));
        }
        Ok(())
    }

    fn handler_of(&self, node: NodeId) -> Option<HandlerInfo> {
        self.node(node).and_then(|n| n.block()).and_then(|b| b.handler)
    }

    fn insert_edge(&mut self, from: NodeId, to: NodeId, exceptional: bool) -> EdgeId {
        let id = EdgeId::new(self.edges.len());
        let frequency = self.nodes[from.index()]
            .frequency()
            .min(self.nodes[to.index()].frequency())
            .max(0);
        self.edges.push(FlowEdge::new(id, from, to, exceptional, frequency));
        if exceptional {
            self.nodes[from.index()].exception_successors.push(id);
            self.nodes[to.index()].exception_predecessors.push(id);
        } else {
            self.nodes[from.index()].successors.push(id);
            self.nodes[to.index()].predecessors.push(id);
        }
        self.live_edges += 1;
        id
    }

    /// Removes an edge, cascading into nodes the removal orphans.
    ///
    /// A node is orphaned when, after the removal, it has zero predecessors and is not
    /// the End sentinel, when its only remaining predecessor is itself, or when a
    /// current structure tree shows it as the entry of a cyclic region whose remaining
    /// predecessors (ignoring the removed edge's source) all lie inside that region.
    /// Orphaned nodes are removed transitively through an explicit worklist, exception
    /// out-edges ahead of ordinary ones, each step one nesting level deeper; exceeding
    /// [`MAX_REMOVAL_NESTING`] aborts with [`crate::Error::RemovalLimit`].
    ///
    /// Returns `true` when at least one node was removed along with the edges.
    /// Invalidates the structure tree.
    pub fn remove_edge(&mut self, edge: EdgeId) -> Result<bool> {
        if self.edge(edge).is_none() {
            return Ok(false);
        }
        // The outgoing tree is consulted for the region-entry orphan test, then dropped:
        // any edge removal invalidates it wholesale.
        let structure = self.structure.take();
        self.remove_edge_cascade(edge, structure.as_ref())
    }

    fn remove_edge_cascade(
        &mut self,
        edge: EdgeId,
        structure: Option<&StructureTree>,
    ) -> Result<bool> {
        let mut worklist: Vec<(EdgeId, usize)> = vec![(edge, 0)];
        let mut removed_nodes = false;

        while let Some((eid, depth)) = worklist.pop() {
            if depth > MAX_REMOVAL_NESTING {
                return Err(crate::Error::RemovalLimit(depth));
            }
            if self.edge(eid).is_none() {
                continue;
            }
            let (from, to) = {
                let e = &self.edges[eid.index()];
                (e.from(), e.to())
            };
            self.unlink_edge(eid);

            if self.is_orphaned(to, from, structure) {
                removed_nodes = true;
                let node = &self.nodes[to.index()];
                // Pushed so that exception out-edges pop first, then ordinary ones,
                // then any in-edges still dangling from a region-entry removal.
                let ins: Vec<EdgeId> = node
                    .predecessors
                    .iter()
                    .chain(node.exception_predecessors.iter())
                    .copied()
                    .collect();
                let ordinary = node.successors.clone();
                let exceptional = node.exception_successors.clone();
                for e in ins {
                    worklist.push((e, depth + 1));
                }
                for e in ordinary {
                    worklist.push((e, depth + 1));
                }
                for e in exceptional {
                    worklist.push((e, depth + 1));
                }
                self.nodes[to.index()].invalidate();
                self.live_nodes -= 1;
            }
        }
        Ok(removed_nodes)
    }

    /// Unhooks the edge from both endpoint lists and marks it invalid.
    fn unlink_edge(&mut self, eid: EdgeId) {
        let (from, to, exceptional) = {
            let e = &self.edges[eid.index()];
            (e.from(), e.to(), e.is_exceptional())
        };
        if exceptional {
            self.nodes[from.index()].exception_successors.retain(|&e| e != eid);
            self.nodes[to.index()].exception_predecessors.retain(|&e| e != eid);
        } else {
            self.nodes[from.index()].successors.retain(|&e| e != eid);
            self.nodes[to.index()].predecessors.retain(|&e| e != eid);
        }
        self.edges[eid.index()].invalidate();
        self.live_edges -= 1;
    }

    /// Three-way orphan classification for the target of a just-removed edge.
    fn is_orphaned(
        &self,
        target: NodeId,
        removed_from: NodeId,
        structure: Option<&StructureTree>,
    ) -> bool {
        let Some(node) = self.node(target) else {
            return false;
        };
        let preds: Vec<NodeId> = node
            .predecessors
            .iter()
            .chain(node.exception_predecessors.iter())
            .map(|&e| self.edges[e.index()].from())
            .collect();

        if preds.is_empty() {
            return target != self.end;
        }
        if preds.iter().all(|&p| p == target) {
            return true;
        }
        // A loop entry kept alive only by its own backedges is unreachable even though
        // its local predecessor count is nonzero.
        if let Some(tree) = structure {
            if let Some(region) = tree.cyclic_region_with_entry(target) {
                let mut inside = BitSet::new(self.nodes.len());
                for block in tree.leaf_blocks(region) {
                    inside.insert(block.index());
                }
                if preds
                    .iter()
                    .filter(|&&p| p != removed_from)
                    .all(|&p| inside.contains(p.index()))
                {
                    return target != self.end;
                }
            }
        }
        false
    }

    /// Removes a node that has no remaining predecessors, cascading through its own
    /// out-edges (exception edges first).
    ///
    /// Fails with an invariant violation when the node still has live in-edges.
    /// Invalidates the structure tree.
    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        let Some(n) = self.node(node) else {
            return Err(crate::Error::GraphError(format!("{node} is not a live node")));
        };
        if !n.predecessors.is_empty() || !n.exception_predecessors.is_empty() {
            return Err(invariant_error!(
                "removing {node} while it still has predecessors"
            ));
        }
        let exceptional = n.exception_successors.clone();
        let ordinary = n.successors.clone();
        for e in exceptional {
            self.remove_edge(e)?;
        }
        for e in ordinary {
            self.remove_edge(e)?;
        }
        self.nodes[node.index()].invalidate();
        self.live_nodes -= 1;
        self.structure = None;
        Ok(())
    }

    /// Removes every live node not reachable from Start, except the End sentinel.
    ///
    /// Reachability follows both ordinary and exception edges. Cascades triggered
    /// along the way are allowed; re-entrant invocations (a cascade asking for another
    /// pruning pass) are ignored. Returns `true` when anything was removed.
    /// Invalidates the structure tree when it removes anything.
    pub fn remove_unreachable_blocks(&mut self) -> Result<bool> {
        if self.removing_unreachable {
            return Ok(false);
        }
        self.removing_unreachable = true;
        let result = self.prune_unreachable();
        self.removing_unreachable = false;
        result
    }

    fn prune_unreachable(&mut self) -> Result<bool> {
        let mut reachable = BitSet::new(self.nodes.len());
        let mut stack = vec![self.start];
        reachable.insert(self.start.index());
        while let Some(n) = stack.pop() {
            let next: Vec<NodeId> = self
                .successors(n)
                .chain(self.exception_successors(n))
                .collect();
            for succ in next {
                if !reachable.contains(succ.index()) {
                    reachable.insert(succ.index());
                    stack.push(succ);
                }
            }
        }

        let mut removed = false;
        for idx in 0..self.nodes.len() {
            let id = NodeId::new(idx);
            if id == self.end || reachable.contains(idx) || self.node(id).is_none() {
                continue;
            }
            removed = true;
            // Strip any in-edges first; the cascade may take the node with them.
            let ins: Vec<EdgeId> = {
                let n = &self.nodes[idx];
                n.predecessors
                    .iter()
                    .chain(n.exception_predecessors.iter())
                    .copied()
                    .collect()
            };
            for e in ins {
                self.remove_edge(e)?;
            }
            if self.node(id).is_some() {
                self.remove_node(id)?;
            }
        }
        if removed {
            self.structure = None;
        }
        Ok(removed)
    }

    /// The current structure tree, if one has been computed and no mutation has
    /// invalidated it since.
    #[must_use]
    pub fn structure(&self) -> Option<&StructureTree> {
        self.structure.as_ref()
    }

    /// Runs structural analysis and caches the resulting tree on the graph.
    ///
    /// Requires a valid forward dominator tree for the graph's current shape.
    pub fn analyze_structure(&mut self, dominators: &crate::analysis::Dominators) -> Result<()> {
        let tree = StructureTree::analyze(self, dominators)?;
        self.structure = Some(tree);
        Ok(())
    }

    /// Drops the cached structure tree, if any.
    pub fn invalidate_structure(&mut self) {
        self.structure = None;
    }

    /// Renders the graph in Graphviz DOT format.
    ///
    /// Ordinary edges are solid, exception edges dashed red. Node labels carry the
    /// number, flow kind and frequency.
    #[must_use]
    pub fn to_dot(&self, title: &str) -> String {
        let mut dot = String::new();
        let _ = writeln!(dot, "digraph \"{}\" {{", escape_dot(title));
        let _ = writeln!(dot, "    node [shape=box, fontname=\"monospace\"];");
        for node in self.nodes() {
            let label = match node.payload() {
                NodePayload::Start => "Start".to_string(),
                NodePayload::End => "End".to_string(),
                NodePayload::Block(info) => {
                    format!("{}\\n{} freq={}", node.id(), info.flow, node.frequency())
                }
            };
            let _ = writeln!(dot, "    {} [label=\"{}\"];", node.id(), label);
        }
        for edge in self.edges() {
            if edge.is_exceptional() {
                let _ = writeln!(
                    dot,
                    "    {} -> {} [style=dashed, color=red];",
                    edge.from(),
                    edge.to()
                );
            } else {
                let _ = writeln!(dot, "    {} -> {};", edge.from(), edge.to());
            }
        }
        dot.push_str("}\n");
        dot
    }

    fn adjacent(&self, node: NodeId, list: AdjacencyList) -> impl Iterator<Item = NodeId> + '_ {
        let outgoing = matches!(
            list,
            AdjacencyList::Successors | AdjacencyList::ExceptionSuccessors
        );
        self.adjacent_edges(node, list).map(move |e| {
            let edge = &self.edges[e.index()];
            if outgoing {
                edge.to()
            } else {
                edge.from()
            }
        })
    }

    fn adjacent_edges(&self, node: NodeId, list: AdjacencyList) -> impl Iterator<Item = EdgeId> + '_ {
        self.nodes
            .get(node.index())
            .into_iter()
            .flat_map(move |n| match list {
                AdjacencyList::Successors => n.successors.iter(),
                AdjacencyList::Predecessors => n.predecessors.iter(),
                AdjacencyList::ExceptionSuccessors => n.exception_successors.iter(),
                AdjacencyList::ExceptionPredecessors => n.exception_predecessors.iter(),
            })
            .copied()
            .filter(|&e| self.edges[e.index()].is_valid())
    }
}

impl Default for ControlFlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
enum AdjacencyList {
    Successors,
    Predecessors,
    ExceptionSuccessors,
    ExceptionPredecessors,
}

/// Dominant-catch test: would `existing` be consulted before `candidate` at runtime and
/// catch everything `candidate` would?
///
/// Deeper inlined handlers run first; among handlers at the same depth, lower table
/// indices run first. A wildcard covers any type; a typed handler covers only the same
/// type at the same inlining depth.
fn shadows(existing: &HandlerInfo, candidate: &HandlerInfo) -> bool {
    if existing.osr_catch {
        return false;
    }
    let consulted_first = existing.inline_depth > candidate.inline_depth
        || (existing.inline_depth == candidate.inline_depth
            && existing.handler_index < candidate.handler_index);
    if !consulted_first {
        return false;
    }
    match existing.catch {
        crate::block::CatchKind::Any => true,
        typed => typed == candidate.catch && existing.inline_depth == candidate.inline_depth,
    }
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockInfo, HandlerInfo};

    fn linear_cfg(len: usize) -> (ControlFlowGraph, Vec<NodeId>) {
        let mut cfg = ControlFlowGraph::new();
        let ids: Vec<NodeId> = (0..len)
            .map(|_| cfg.add_block(BlockInfo::fall_through()))
            .collect();
        cfg.add_edge(cfg.start(), ids[0]).unwrap();
        for w in ids.windows(2) {
            cfg.add_edge(w[0], w[1]).unwrap();
        }
        cfg.add_edge(ids[len - 1], cfg.end()).unwrap();
        (cfg, ids)
    }

    #[test]
    fn new_graph_has_only_sentinels() {
        let cfg = ControlFlowGraph::new();
        assert_eq!(cfg.node_count(), 2);
        assert_eq!(cfg.edge_count(), 0);
        assert_eq!(cfg.start().index(), 0);
        assert_eq!(cfg.end().index(), 1);
        assert!(cfg.node(cfg.start()).is_some());
    }

    #[test]
    fn edge_count_matches_out_degrees() {
        let (cfg, _) = linear_cfg(4);
        let degree_sum: usize = cfg
            .node_ids()
            .map(|n| cfg.successor_edges(n).count() + cfg.exception_successor_edges(n).count())
            .sum();
        assert_eq!(degree_sum, cfg.edge_count());
    }

    #[test]
    fn edge_frequency_is_clamped_min_of_endpoints() {
        let mut cfg = ControlFlowGraph::new();
        let hot = cfg.add_block(BlockInfo::fall_through().with_frequency(1000));
        let cold = cfg.add_block(BlockInfo::fall_through().with_frequency(10));
        let e = cfg.add_edge(hot, cold).unwrap();
        assert_eq!(cfg.edge(e).unwrap().frequency(), 10);

        let negative = cfg.add_block(BlockInfo::fall_through().with_frequency(-5));
        let e2 = cfg.add_edge(cold, negative).unwrap();
        assert_eq!(cfg.edge(e2).unwrap().frequency(), 0);
    }

    #[test]
    fn ordinary_edge_rejected_over_exception_edge() {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.add_block(BlockInfo::fall_through());
        let h = cfg.add_block(BlockInfo::ret().as_handler(HandlerInfo::catch_all(0, 0)));
        assert!(cfg.add_exception_edge(a, h).unwrap().is_some());
        assert!(matches!(
            cfg.add_edge(a, h),
            Err(crate::Error::InvariantViolation { .. })
        ));
        // and the reverse: an exception edge over an ordinary one
        let b = cfg.add_block(BlockInfo::fall_through());
        cfg.add_edge(a, b).unwrap();
        assert!(matches!(
            cfg.add_exception_edge(a, b),
            Err(crate::Error::InvariantViolation { .. })
        ));
    }

    #[test]
    fn dominated_catch_is_silently_rejected() {
        let mut cfg = ControlFlowGraph::new();
        let thrower = cfg.add_block(BlockInfo::throw());
        // Deeper wildcard handler, consulted first at runtime.
        let inner = cfg.add_block(BlockInfo::ret().as_handler(HandlerInfo::catch_all(1, 0)));
        // Shallower typed handler that can never be reached.
        let outer = cfg.add_block(BlockInfo::ret().as_handler(HandlerInfo::catch_class(0, 0, 7)));

        assert!(cfg.add_exception_edge(thrower, inner).unwrap().is_some());
        let before = cfg.edge_count();
        assert!(cfg.add_exception_edge(thrower, outer).unwrap().is_none());
        assert_eq!(cfg.edge_count(), before);
        assert_eq!(cfg.exception_successors(thrower).count(), 1);
    }

    #[test]
    fn osr_handler_never_shadows() {
        let mut cfg = ControlFlowGraph::new();
        let thrower = cfg.add_block(BlockInfo::throw());
        let osr = cfg.add_block(BlockInfo::ret().as_handler(HandlerInfo::catch_all(1, 0).osr()));
        let outer = cfg.add_block(BlockInfo::ret().as_handler(HandlerInfo::catch_class(0, 0, 7)));

        assert!(cfg.add_exception_edge(thrower, osr).unwrap().is_some());
        assert!(cfg.add_exception_edge(thrower, outer).unwrap().is_some());
        assert_eq!(cfg.exception_successors(thrower).count(), 2);
    }

    #[test]
    fn typed_handler_shadows_same_type_same_depth() {
        let mut cfg = ControlFlowGraph::new();
        let thrower = cfg.add_block(BlockInfo::throw());
        let first = cfg.add_block(BlockInfo::ret().as_handler(HandlerInfo::catch_class(0, 0, 7)));
        let second = cfg.add_block(BlockInfo::ret().as_handler(HandlerInfo::catch_class(0, 1, 7)));
        let other = cfg.add_block(BlockInfo::ret().as_handler(HandlerInfo::catch_class(0, 2, 8)));

        assert!(cfg.add_exception_edge(thrower, first).unwrap().is_some());
        // Same type, later table slot: dead.
        assert!(cfg.add_exception_edge(thrower, second).unwrap().is_none());
        // Different type: live.
        assert!(cfg.add_exception_edge(thrower, other).unwrap().is_some());
    }

    #[test]
    fn remove_edge_without_orphan_keeps_nodes() {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.add_block(BlockInfo::fall_through());
        let b = cfg.add_block(BlockInfo::fall_through());
        cfg.add_edge(cfg.start(), a).unwrap();
        cfg.add_edge(cfg.start(), b).unwrap();
        let ab = cfg.add_edge(a, b).unwrap();

        assert!(!cfg.remove_edge(ab).unwrap());
        assert!(cfg.node(b).is_some());
        assert_eq!(cfg.edge_count(), 2);
    }

    #[test]
    fn remove_edge_cascades_through_orphans() {
        let (mut cfg, ids) = linear_cfg(3);
        let first = cfg.find_edge(cfg.start(), ids[0]).unwrap();
        // Severing the entry edge orphans the whole chain.
        assert!(cfg.remove_edge(first).unwrap());
        for id in ids {
            assert!(cfg.node(id).is_none());
        }
        assert_eq!(cfg.edge_count(), 0);
        assert_eq!(cfg.node_count(), 2);
        // End survives with zero predecessors.
        assert!(cfg.node(cfg.end()).is_some());
    }

    #[test]
    fn self_loop_only_predecessor_is_orphaned() {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.add_block(BlockInfo::fall_through());
        let b = cfg.add_block(BlockInfo::jump(0));
        let entry = cfg.add_edge(cfg.start(), a).unwrap();
        cfg.add_edge(a, b).unwrap();
        cfg.add_edge(b, b).unwrap();
        cfg.add_edge(b, cfg.end()).unwrap();

        // Removing Start -> A orphans A; B's only remaining predecessor is then itself.
        assert!(cfg.remove_edge(entry).unwrap());
        assert!(cfg.node(a).is_none());
        assert!(cfg.node(b).is_none());
        assert_eq!(cfg.edge_count(), 0);
    }

    #[test]
    fn remove_then_readd_restores_adjacency() {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.add_block(BlockInfo::fall_through());
        let b = cfg.add_block(BlockInfo::fall_through());
        cfg.add_edge(cfg.start(), a).unwrap();
        cfg.add_edge(cfg.start(), b).unwrap();
        let ab = cfg.add_edge(a, b).unwrap();

        cfg.remove_edge(ab).unwrap();
        assert_eq!(cfg.successors(a).count(), 0);
        cfg.add_edge(a, b).unwrap();
        assert_eq!(cfg.successors(a).count(), 1);
        assert_eq!(cfg.predecessors(b).collect::<Vec<_>>(), vec![cfg.start(), a]);
    }

    #[test]
    fn remove_node_requires_no_predecessors() {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.add_block(BlockInfo::fall_through());
        let b = cfg.add_block(BlockInfo::fall_through());
        cfg.add_edge(cfg.start(), a).unwrap();
        cfg.add_edge(a, b).unwrap();

        assert!(matches!(
            cfg.remove_node(b),
            Err(crate::Error::InvariantViolation { .. })
        ));
        assert!(cfg.node(b).is_some());
    }

    #[test]
    fn remove_unreachable_blocks_prunes_dead_subgraph() {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.add_block(BlockInfo::ret());
        cfg.add_edge(cfg.start(), a).unwrap();
        cfg.add_edge(a, cfg.end()).unwrap();
        // Dead little cycle on the side.
        let x = cfg.add_block(BlockInfo::jump(0));
        let y = cfg.add_block(BlockInfo::jump(0));
        cfg.add_edge(x, y).unwrap();
        cfg.add_edge(y, x).unwrap();

        assert!(cfg.remove_unreachable_blocks().unwrap());
        assert!(cfg.node(x).is_none());
        assert!(cfg.node(y).is_none());
        assert!(cfg.node(a).is_some());
        assert_eq!(cfg.edge_count(), 2);
        // Idempotent once clean.
        assert!(!cfg.remove_unreachable_blocks().unwrap());
    }

    #[test]
    fn node_numbers_are_never_reused() {
        let (mut cfg, ids) = linear_cfg(2);
        let first = cfg.find_edge(cfg.start(), ids[0]).unwrap();
        cfg.remove_edge(first).unwrap();
        let fresh = cfg.add_block(BlockInfo::fall_through());
        assert!(fresh.index() > ids[1].index());
    }

    #[test]
    fn dot_output_mentions_all_live_nodes() {
        let (cfg, _) = linear_cfg(2);
        let dot = cfg.to_dot("linear");
        assert!(dot.contains("digraph \"linear\""));
        assert!(dot.contains("Start"));
        assert!(dot.contains("End"));
        assert!(dot.contains("n2 -> n3"));
    }
}
