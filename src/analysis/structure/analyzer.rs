//! Interval-style structural analysis over a working proxy graph.
//!
//! The analyzer seeds one proxy per live graph node, then repeatedly collapses groups
//! of proxies into region proxies until a single node remains. Each round makes two
//! passes over the surviving proxies in decreasing depth-first order:
//!
//! 1. every proxy that is the target of a backedge (a predecessor it dominates)
//!    becomes the entry of a cyclic region, gathered by walking predecessor lists
//!    backward from the backedge sources while they stay dominated by the entry;
//! 2. every remaining proxy grows an acyclic candidate region by walking its
//!    dominated successors forward; it collapses when the walk found a cycle that
//!    bypasses the entry, when the candidate crosses a size threshold, or when the
//!    entry is the Start sentinel, which absorbs everything still standing.
//!
//! Both walks revisit-detect with on-path marking: meeting a proxy that is still on
//! the active walk path means a cycle avoiding the entry, which tags the region as
//! improper. All walks use explicit stacks.

use crate::analysis::structure::{
    ExitEdge, RegionStructure, Structure, StructureId, StructureTree, SubGraphNode, SubNodeId,
    SubNodeKind,
};
use crate::analysis::{Direction, Dominators};
use crate::error::invariant_error;
use crate::graph::{ControlFlowGraph, NodeId};
use crate::utils::BitSet;
use crate::{Error, Result};

/// An acyclic candidate region collapses once it gathers this many proxies. Keeps
/// straight-line regions from growing without bound on large methods.
pub const MAX_ACYCLIC_REGION_SIZE: usize = 64;

pub(crate) fn analyze(cfg: &ControlFlowGraph, dominators: &Dominators) -> Result<StructureTree> {
    if dominators.direction() != Direction::Forward || !dominators.is_valid() {
        return Err(Error::GraphError(
            "structural analysis requires a valid forward dominator tree".to_string(),
        ));
    }
    Analyzer::new(cfg, dominators)?.run()
}

struct Analyzer<'a> {
    cfg: &'a ControlFlowGraph,
    dominators: &'a Dominators,
    structures: Vec<Structure>,
    parents: Vec<Option<StructureId>>,
    sub_nodes: Vec<SubGraphNode>,
    block_leaf: Vec<Option<StructureId>>,
    /// Proxies still present in the outer working graph.
    active: Vec<bool>,
}

/// Result of one backward or forward gathering walk.
struct Gathered {
    members: Vec<SubNodeId>,
    /// A walk revisited a proxy still on its active path: cycle bypassing the entry.
    internal_cycles: bool,
}

impl<'a> Analyzer<'a> {
    fn new(cfg: &'a ControlFlowGraph, dominators: &'a Dominators) -> Result<Self> {
        let mut analyzer = Analyzer {
            cfg,
            dominators,
            structures: Vec::new(),
            parents: Vec::new(),
            sub_nodes: Vec::new(),
            block_leaf: vec![None; cfg.node_bound()],
            active: Vec::new(),
        };
        analyzer.seed()?;
        Ok(analyzer)
    }

    /// Creates one leaf structure and one active proxy per live graph node, then
    /// mirrors the graph's edges onto the proxies.
    fn seed(&mut self) -> Result<()> {
        let mut proxy_of: Vec<Option<SubNodeId>> = vec![None; self.cfg.node_bound()];
        for node in self.cfg.node_ids() {
            if self.dominators.dfs_number(node).is_none() {
                return Err(invariant_error!(
                    "live node {node} has no depth-first number; the dominator tree is stale"
                ));
            }
            let leaf = StructureId(self.structures.len());
            self.structures.push(Structure::Block { node });
            self.parents.push(None);
            let proxy = SubNodeId(self.sub_nodes.len());
            self.sub_nodes.push(SubGraphNode {
                kind: SubNodeKind::Block(node),
                number: node,
                successors: Vec::new(),
                predecessors: Vec::new(),
            });
            self.active.push(true);
            self.block_leaf[node.index()] = Some(leaf);
            proxy_of[node.index()] = Some(proxy);
        }
        for edge in self.cfg.edges() {
            let (Some(from), Some(to)) = (
                proxy_of[edge.from().index()],
                proxy_of[edge.to().index()],
            ) else {
                return Err(invariant_error!(
                    "edge {} references a node outside the live set",
                    edge.id()
                ));
            };
            let exceptional = edge.is_exceptional();
            self.sub_nodes[from.index()].successors.push((to, exceptional));
            self.sub_nodes[to.index()].predecessors.push((from, exceptional));
        }
        Ok(())
    }

    fn run(mut self) -> Result<StructureTree> {
        loop {
            let mut progressed = false;

            // Pass 1: cyclic regions around backedge targets.
            for entry in self.candidates() {
                if !self.active[entry.index()] {
                    continue;
                }
                let sources = self.backedge_sources(entry);
                if sources.is_empty() {
                    continue;
                }
                let gathered = self.gather_loop(entry, &sources);
                self.collapse(entry, gathered.members, true, gathered.internal_cycles)?;
                progressed = true;
            }

            // Pass 2: acyclic and improper regions around the remaining proxies.
            let mut deferred_backedges = false;
            for entry in self.candidates() {
                if !self.active[entry.index()] {
                    continue;
                }
                if !self.backedge_sources(entry).is_empty() {
                    // A fresh region proxy became a backedge target; let the next
                    // round's first pass structure its loop.
                    deferred_backedges = true;
                    continue;
                }
                let is_root = self.sub_nodes[entry.index()].number == self.cfg.start();
                if is_root && deferred_backedges {
                    continue;
                }
                let mut gathered = self.gather_region(entry);
                if is_root {
                    self.absorb_remaining(entry, &mut gathered.members);
                }
                if gathered.internal_cycles
                    || gathered.members.len() >= MAX_ACYCLIC_REGION_SIZE
                    || is_root
                {
                    self.collapse(entry, gathered.members, false, gathered.internal_cycles)?;
                    progressed = true;
                }
            }

            let alive = self.active.iter().filter(|&&a| a).count();
            if alive == 1 {
                break;
            }
            if !progressed {
                return Err(invariant_error!(
                    "structural analysis stalled with {alive} proxies remaining"
                ));
            }
        }
        self.finish()
    }

    /// Active proxies in decreasing depth-first order of their numbers; Start comes
    /// last.
    fn candidates(&self) -> Vec<SubNodeId> {
        let mut order: Vec<SubNodeId> = (0..self.sub_nodes.len())
            .filter(|&i| self.active[i])
            .map(SubNodeId)
            .collect();
        order.sort_by_key(|&p| {
            std::cmp::Reverse(self.dominators.dfs_number(self.sub_nodes[p.index()].number))
        });
        order
    }

    /// Predecessor proxies of `entry` that it dominates.
    fn backedge_sources(&self, entry: SubNodeId) -> Vec<SubNodeId> {
        let entry_number = self.sub_nodes[entry.index()].number;
        let mut sources: Vec<SubNodeId> = Vec::new();
        for &(pred, _) in &self.sub_nodes[entry.index()].predecessors {
            if sources.contains(&pred) {
                continue;
            }
            if self
                .dominators
                .dominates(entry_number, self.sub_nodes[pred.index()].number)
            {
                sources.push(pred);
            }
        }
        sources
    }

    /// Backward walk from the backedge sources toward the entry, gathering every
    /// proxy dominated by the entry.
    fn gather_loop(&self, entry: SubNodeId, sources: &[SubNodeId]) -> Gathered {
        let entry_number = self.sub_nodes[entry.index()].number;
        let mut in_set = BitSet::new(self.sub_nodes.len());
        let mut on_path = BitSet::new(self.sub_nodes.len());
        let mut internal_cycles = false;

        for &source in sources {
            let mut stack: Vec<(SubNodeId, bool)> = vec![(source, false)];
            while let Some((proxy, leaving)) = stack.pop() {
                if leaving {
                    on_path.remove(proxy.index());
                    continue;
                }
                if proxy == entry {
                    continue;
                }
                if on_path.contains(proxy.index()) {
                    internal_cycles = true;
                    continue;
                }
                if in_set.contains(proxy.index()) {
                    continue;
                }
                if !self
                    .dominators
                    .dominates(entry_number, self.sub_nodes[proxy.index()].number)
                {
                    continue;
                }
                in_set.insert(proxy.index());
                on_path.insert(proxy.index());
                stack.push((proxy, true));
                for &(pred, _) in &self.sub_nodes[proxy.index()].predecessors {
                    stack.push((pred, false));
                }
            }
        }

        let mut members = vec![entry];
        members.extend(in_set.iter().map(SubNodeId));
        Gathered {
            members,
            internal_cycles,
        }
    }

    /// Forward walk from `entry` over the proxies it dominates. The entry itself
    /// stays marked on-path for the whole walk, so a cycle back to it counts as
    /// internal.
    fn gather_region(&self, entry: SubNodeId) -> Gathered {
        let entry_number = self.sub_nodes[entry.index()].number;
        let mut in_set = BitSet::new(self.sub_nodes.len());
        let mut on_path = BitSet::new(self.sub_nodes.len());
        let mut internal_cycles = false;
        on_path.insert(entry.index());

        let mut stack: Vec<(SubNodeId, bool)> = self.sub_nodes[entry.index()]
            .successors
            .iter()
            .map(|&(succ, _)| (succ, false))
            .collect();
        while let Some((proxy, leaving)) = stack.pop() {
            if leaving {
                on_path.remove(proxy.index());
                continue;
            }
            if on_path.contains(proxy.index()) {
                internal_cycles = true;
                continue;
            }
            if in_set.contains(proxy.index()) {
                continue;
            }
            if !self
                .dominators
                .dominates(entry_number, self.sub_nodes[proxy.index()].number)
            {
                continue;
            }
            in_set.insert(proxy.index());
            on_path.insert(proxy.index());
            stack.push((proxy, true));
            for &(succ, _) in &self.sub_nodes[proxy.index()].successors {
                stack.push((succ, false));
            }
        }

        let mut members = vec![entry];
        members.extend(in_set.iter().map(SubNodeId));
        Gathered {
            members,
            internal_cycles,
        }
    }

    /// Folds every proxy still active (other than the members themselves) into the
    /// root candidate. Start must end up containing the whole graph, including
    /// proxies no forward walk reaches, like an unreachable End.
    fn absorb_remaining(&self, entry: SubNodeId, members: &mut Vec<SubNodeId>) {
        let mut present = BitSet::new(self.sub_nodes.len());
        for &m in members.iter() {
            present.insert(m.index());
        }
        for index in 0..self.sub_nodes.len() {
            if self.active[index] && !present.contains(index) && index != entry.index() {
                members.push(SubNodeId(index));
            }
        }
    }

    /// Replaces `members` in the working graph with a single region proxy carrying
    /// the entry's number. Internal edges stay behind as the region's private
    /// subgraph; boundary edges are rehomed to the region proxy, the outgoing ones
    /// recorded as exit edges.
    fn collapse(
        &mut self,
        entry: SubNodeId,
        members: Vec<SubNodeId>,
        has_backedge: bool,
        internal_cycles: bool,
    ) -> Result<StructureId> {
        let mut member_set = BitSet::new(self.sub_nodes.len());
        for &m in &members {
            member_set.insert(m.index());
        }
        let region_proxy = SubNodeId(self.sub_nodes.len());
        let region_id = StructureId(self.structures.len());
        let number = self.sub_nodes[entry.index()].number;

        let mut exit_edges: Vec<ExitEdge> = Vec::new();
        let mut region_successors: Vec<(SubNodeId, bool)> = Vec::new();
        let mut region_predecessors: Vec<(SubNodeId, bool)> = Vec::new();

        for &member in &members {
            let successors = self.sub_nodes[member.index()].successors.clone();
            self.sub_nodes[member.index()]
                .successors
                .retain(|&(to, _)| member_set.contains(to.index()));
            for (to, exceptional) in successors {
                if member_set.contains(to.index()) {
                    continue;
                }
                exit_edges.push(ExitEdge {
                    from: member,
                    target: self.sub_nodes[to.index()].number,
                    exceptional,
                });
                let preds = &mut self.sub_nodes[to.index()].predecessors;
                preds.retain(|&(p, ex)| !(p == member && ex == exceptional));
                if !preds.contains(&(region_proxy, exceptional)) {
                    preds.push((region_proxy, exceptional));
                }
                if !region_successors.contains(&(to, exceptional)) {
                    region_successors.push((to, exceptional));
                }
            }

            let predecessors = self.sub_nodes[member.index()].predecessors.clone();
            self.sub_nodes[member.index()]
                .predecessors
                .retain(|&(from, _)| member_set.contains(from.index()));
            for (from, exceptional) in predecessors {
                if member_set.contains(from.index()) {
                    continue;
                }
                let succs = &mut self.sub_nodes[from.index()].successors;
                succs.retain(|&(t, ex)| !(t == member && ex == exceptional));
                if !succs.contains(&(region_proxy, exceptional)) {
                    succs.push((region_proxy, exceptional));
                }
                if !region_predecessors.contains(&(from, exceptional)) {
                    region_predecessors.push((from, exceptional));
                }
            }
        }

        for &member in &members {
            let Some(child) = self.structure_of(member) else {
                return Err(invariant_error!("proxy {member} has no structure"));
            };
            self.parents[child.index()] = Some(region_id);
            self.active[member.index()] = false;
        }

        self.structures.push(Structure::Region(RegionStructure {
            entry,
            members,
            exit_edges,
            has_backedge,
            internal_cycles,
        }));
        self.parents.push(None);
        self.sub_nodes.push(SubGraphNode {
            kind: SubNodeKind::Region(region_id),
            number,
            successors: region_successors,
            predecessors: region_predecessors,
        });
        self.active.push(true);
        Ok(region_id)
    }

    fn structure_of(&self, proxy: SubNodeId) -> Option<StructureId> {
        match self.sub_nodes[proxy.index()].kind {
            SubNodeKind::Block(node) => self.block_leaf.get(node.index()).copied().flatten(),
            SubNodeKind::Region(region) => Some(region),
        }
    }

    /// Wraps up the arenas into a tree and checks the partition postcondition: the
    /// root's leaves are exactly the live nodes of the graph.
    fn finish(self) -> Result<StructureTree> {
        let survivor = (0..self.sub_nodes.len())
            .find(|&i| self.active[i])
            .map(SubNodeId)
            .ok_or_else(|| invariant_error!("structural analysis consumed every proxy"))?;
        let root = self
            .structure_of(survivor)
            .ok_or_else(|| invariant_error!("surviving proxy {survivor} has no structure"))?;
        let tree = StructureTree {
            structures: self.structures,
            parents: self.parents,
            sub_nodes: self.sub_nodes,
            block_leaf: self.block_leaf,
            root,
        };

        if tree.region(root).is_none() {
            return Err(invariant_error!("structural analysis root is not a region"));
        }
        let mut seen = BitSet::new(self.cfg.node_bound());
        let mut leaves = 0usize;
        for node in tree.leaf_blocks(root) {
            if self.cfg.node(node).is_none() || seen.contains(node.index()) {
                return Err(invariant_error!(
                    "structure tree leaf {node} is dead or duplicated"
                ));
            }
            seen.insert(node.index());
            leaves += 1;
        }
        if leaves != self.cfg.node_count()
            || !seen.contains(self.cfg.start().index())
            || !seen.contains(self.cfg.end().index())
        {
            return Err(invariant_error!(
                "structure tree covers {leaves} of {} live nodes",
                self.cfg.node_count()
            ));
        }
        Ok(tree)
    }
}
