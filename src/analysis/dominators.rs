//! Dominator trees via the Lengauer-Tarjan algorithm.
//!
//! [`Dominators::compute`] runs the sophisticated O(E * alpha(E, N)) variant of
//! Lengauer-Tarjan: semidominators over a depth-first spanning tree, bucket-deferred
//! provisional dominators, and a size-balanced link-eval forest with path compression.
//! Every phase is iterative with explicit stacks; recursion depth never depends on the
//! graph shape.
//!
//! The same engine serves both directions. [`Direction::Forward`] roots the walk at
//! Start over successor edges and yields the dominator tree; [`Direction::Reverse`]
//! roots it at End over predecessor edges and yields the post-dominator tree. A
//! forward walk that cannot reach every live node is a fatal invariant violation
//! (callers prune unreachable blocks first). In reverse the same shortfall is an
//! expected consequence of infinite loops: the result is returned with its validity
//! flag cleared and every query declines to answer.
//!
//! # Examples
//!
//! ```rust
//! use flowgraph::analysis::{Direction, Dominators};
//! use flowgraph::block::BlockInfo;
//! use flowgraph::graph::ControlFlowGraph;
//!
//! let cfg = ControlFlowGraph::from_blocks(vec![
//!     BlockInfo::conditional(2),
//!     BlockInfo::fall_through(),
//!     BlockInfo::ret(),
//! ])
//! .unwrap();
//! let doms = Dominators::compute(&cfg, Direction::Forward).unwrap();
//! assert!(doms.dominates(cfg.start(), cfg.end()));
//! ```

use crate::error::invariant_error;
use crate::graph::{ControlFlowGraph, NodeId};
use crate::Result;

/// Which dominance relation to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Dominance proper: walk successor edges from Start.
    Forward,
    /// Post-dominance: walk predecessor edges from End.
    Reverse,
}

/// An immutable dominator (or post-dominator) tree.
///
/// Queries are indexed by node number, so the tree stays usable as long as the graph
/// shape it was computed from is unchanged. [`Dominators::dominates`] answers in
/// O(depth) by walking the immediate-dominator chain, pruned by depth-first numbers.
#[derive(Debug, Clone)]
pub struct Dominators {
    direction: Direction,
    root: NodeId,
    valid: bool,
    /// Immediate dominator per node arena slot; the root maps to itself and
    /// unreachable or removed slots map to `None`.
    idom: Vec<Option<NodeId>>,
    /// Depth-first number per node arena slot, 1-based; 0 means unnumbered.
    dfnum: Vec<usize>,
}

impl Dominators {
    /// Computes the dominance relation of `direction` over the live nodes of `cfg`.
    ///
    /// Exception edges are walked ahead of ordinary edges at every node, so handler
    /// subtrees receive their depth-first numbers first. At most one sentinel may be
    /// missed by the walk (End forward, Start reverse); it is stitched in with the
    /// last depth-first number and the root as its spanning parent. Any further
    /// shortfall is fatal in the forward direction and clears the validity flag in
    /// reverse.
    pub fn compute(cfg: &ControlFlowGraph, direction: Direction) -> Result<Self> {
        Builder::new(cfg, direction).run()
    }

    /// Which relation this tree describes.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The tree root: Start for forward, End for reverse.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// `false` when the reverse walk could not number every live node (an infinite
    /// loop keeps part of the graph from reaching End). An invalid tree answers no
    /// queries.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The immediate dominator of `node`, or `None` for the root and for nodes the
    /// tree knows nothing about.
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        if !self.valid || node == self.root {
            return None;
        }
        self.idom.get(node.index()).copied().flatten()
    }

    /// The depth-first number assigned to `node`, or `None` if it was never numbered.
    #[must_use]
    pub fn dfs_number(&self, node: NodeId) -> Option<usize> {
        if !self.valid {
            return None;
        }
        match self.dfnum.get(node.index()) {
            Some(&n) if n > 0 => Some(n),
            _ => None,
        }
    }

    /// Whether `a` dominates `b` (every path from the root to `b` passes through `a`).
    ///
    /// Reflexive: every node dominates itself. Walks `b`'s immediate-dominator chain,
    /// stopping as soon as an ancestor's depth-first number drops below `a`'s. Returns
    /// `false` on an invalid tree or unnumbered operands.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if !self.valid {
            return false;
        }
        if a == b {
            return self.dfs_number(a).is_some();
        }
        let (Some(a_num), Some(_)) = (self.dfs_number(a), self.dfs_number(b)) else {
            return false;
        };
        let mut current = b;
        while let Some(dominator) = self.immediate_dominator(current) {
            if dominator == a {
                return true;
            }
            match self.dfs_number(dominator) {
                Some(n) if n >= a_num => current = dominator,
                _ => return false,
            }
        }
        false
    }

    /// Whether `a` dominates `b` and `a != b`.
    #[must_use]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// All dominators of `node`, from the node itself up to the root.
    #[must_use]
    pub fn dominators_of(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        if !self.valid || self.dfs_number(node).is_none() {
            return chain;
        }
        chain.push(node);
        let mut current = node;
        while let Some(dominator) = self.immediate_dominator(current) {
            chain.push(dominator);
            current = dominator;
        }
        chain
    }
}

/// Scratch state for one Lengauer-Tarjan run.
///
/// All per-node arrays except `dfnum` are indexed by depth-first number (1-based,
/// slot 0 is the "nobody" sentinel for the link-eval forest).
struct Builder<'a> {
    cfg: &'a ControlFlowGraph,
    direction: Direction,
    root: NodeId,
    /// Depth-first number per node arena slot.
    dfnum: Vec<usize>,
    /// Node for each depth-first number.
    vertex: Vec<NodeId>,
    /// Spanning-tree parent, as a depth-first number.
    parent: Vec<usize>,
    semi: Vec<usize>,
    idom: Vec<usize>,
    bucket: Vec<Vec<usize>>,
    // Size-balanced link-eval forest.
    ancestor: Vec<usize>,
    label: Vec<usize>,
    size: Vec<usize>,
    child: Vec<usize>,
    count: usize,
}

impl<'a> Builder<'a> {
    fn new(cfg: &'a ControlFlowGraph, direction: Direction) -> Self {
        let bound = cfg.node_bound();
        let slots = cfg.node_count() + 1;
        let root = match direction {
            Direction::Forward => cfg.start(),
            Direction::Reverse => cfg.end(),
        };
        Builder {
            cfg,
            direction,
            root,
            dfnum: vec![0; bound],
            vertex: vec![NodeId::new(0); slots],
            parent: vec![0; slots],
            semi: vec![0; slots],
            idom: vec![0; slots],
            bucket: vec![Vec::new(); slots],
            ancestor: vec![0; slots],
            label: vec![0; slots],
            size: vec![0; slots],
            child: vec![0; slots],
            count: 0,
        }
    }

    fn run(mut self) -> Result<Dominators> {
        self.depth_first_number();

        let live = self.cfg.node_count();
        if self.count < live {
            // The opposite sentinel is allowed to be missed: End when no block
            // returns or throws, Start in a reverse walk of an empty graph.
            let sentinel = match self.direction {
                Direction::Forward => self.cfg.end(),
                Direction::Reverse => self.cfg.start(),
            };
            if self.dfnum[sentinel.index()] == 0 {
                self.number(sentinel, self.dfnum[self.root.index()]);
            }
        }
        if self.count < live {
            return match self.direction {
                Direction::Forward => Err(invariant_error!(
                    "forward dominator walk numbered {} of {} live nodes; \
                     unreachable blocks must be pruned first",
                    self.count,
                    live
                )),
                Direction::Reverse => Ok(Dominators {
                    direction: self.direction,
                    root: self.root,
                    valid: false,
                    idom: Vec::new(),
                    dfnum: Vec::new(),
                }),
            };
        }

        self.compute_idoms();

        let mut idom = vec![None; self.cfg.node_bound()];
        for number in 1..=self.count {
            let node = self.vertex[number];
            idom[node.index()] = Some(self.vertex[self.idom[number]]);
        }
        Ok(Dominators {
            direction: self.direction,
            root: self.root,
            valid: true,
            idom,
            dfnum: std::mem::take(&mut self.dfnum),
        })
    }

    /// Assigns depth-first numbers from the root with an explicit stack, visiting
    /// exception edges before ordinary ones at every node.
    fn depth_first_number(&mut self) {
        let mut stack = vec![(self.root, 0)];
        while let Some((node, parent_number)) = stack.pop() {
            if self.dfnum[node.index()] != 0 {
                continue;
            }
            self.number(node, parent_number);
            let my_number = self.dfnum[node.index()];
            // Pushed ordinary-first so exception targets pop, and get numbered,
            // ahead of ordinary ones.
            let ordinary: Vec<NodeId> = self.walk_targets(node, false);
            let exceptional: Vec<NodeId> = self.walk_targets(node, true);
            for next in ordinary.into_iter().rev().chain(exceptional.into_iter().rev()) {
                if self.dfnum[next.index()] == 0 {
                    stack.push((next, my_number));
                }
            }
        }
    }

    fn number(&mut self, node: NodeId, parent_number: usize) {
        self.count += 1;
        let n = self.count;
        self.dfnum[node.index()] = n;
        self.vertex[n] = node;
        self.parent[n] = parent_number;
        self.semi[n] = n;
        self.label[n] = n;
        self.size[n] = 1;
    }

    /// Edges leaving `node` in walk direction: successors forward, predecessors in
    /// reverse.
    fn walk_targets(&self, node: NodeId, exceptional: bool) -> Vec<NodeId> {
        match (self.direction, exceptional) {
            (Direction::Forward, false) => self.cfg.successors(node).collect(),
            (Direction::Forward, true) => self.cfg.exception_successors(node).collect(),
            (Direction::Reverse, false) => self.cfg.predecessors(node).collect(),
            (Direction::Reverse, true) => self.cfg.exception_predecessors(node).collect(),
        }
    }

    /// Edges arriving at `node` in walk direction, the inputs to its semidominator.
    fn semi_sources(&self, node: NodeId) -> Vec<NodeId> {
        match self.direction {
            Direction::Forward => self
                .cfg
                .predecessors(node)
                .chain(self.cfg.exception_predecessors(node))
                .collect(),
            Direction::Reverse => self
                .cfg
                .successors(node)
                .chain(self.cfg.exception_successors(node))
                .collect(),
        }
    }

    fn compute_idoms(&mut self) {
        for w in (2..=self.count).rev() {
            let node = self.vertex[w];
            for source in self.semi_sources(node) {
                let v = self.dfnum[source.index()];
                if v == 0 {
                    continue;
                }
                let u = self.eval(v);
                if self.semi[u] < self.semi[w] {
                    self.semi[w] = self.semi[u];
                }
            }
            let p = self.parent[w];
            if self.semi[w] == w {
                // No numbered sources at all; only the stitched-in sentinel gets
                // here. Its dominator is its spanning parent, the root.
                self.idom[w] = p;
                self.link(p, w);
                continue;
            }
            self.bucket[self.semi[w]].push(w);
            self.link(p, w);
            for v in std::mem::take(&mut self.bucket[p]) {
                let u = self.eval(v);
                self.idom[v] = if self.semi[u] < self.semi[v] { u } else { p };
            }
        }
        self.idom[1] = 1;
        // Correction pass, in increasing number order: provisional dominators that
        // are not the semidominator inherit their dominator's dominator.
        for w in 2..=self.count {
            if self.idom[w] != self.semi[w] {
                self.idom[w] = self.idom[self.idom[w]];
            }
        }
    }

    /// Path compression over the link-eval forest, iteratively.
    fn compress(&mut self, v: usize) {
        let mut path = Vec::new();
        let mut current = v;
        while self.ancestor[self.ancestor[current]] != 0 {
            path.push(current);
            current = self.ancestor[current];
        }
        for &w in path.iter().rev() {
            let a = self.ancestor[w];
            if self.semi[self.label[a]] < self.semi[self.label[w]] {
                self.label[w] = self.label[a];
            }
            self.ancestor[w] = self.ancestor[a];
        }
    }

    fn eval(&mut self, v: usize) -> usize {
        if self.ancestor[v] == 0 {
            return self.label[v];
        }
        self.compress(v);
        if self.semi[self.label[self.ancestor[v]]] >= self.semi[self.label[v]] {
            self.label[v]
        } else {
            self.label[self.ancestor[v]]
        }
    }

    /// Balanced link: grafts `w` under `v`, rotating subtree roots by size so that
    /// compressed paths stay short.
    fn link(&mut self, v: usize, w: usize) {
        let mut s = w;
        while self.semi[self.label[w]] < self.semi[self.label[self.child[s]]] {
            if self.size[s] + self.size[self.child[self.child[s]]] >= 2 * self.size[self.child[s]] {
                self.ancestor[self.child[s]] = s;
                self.child[s] = self.child[self.child[s]];
            } else {
                self.size[self.child[s]] = self.size[s];
                self.ancestor[s] = self.child[s];
                s = self.child[s];
            }
        }
        self.label[s] = self.label[w];
        self.size[v] += self.size[w];
        if self.size[v] < 2 * self.size[w] {
            std::mem::swap(&mut s, &mut self.child[v]);
        }
        while s != 0 {
            self.ancestor[s] = v;
            s = self.child[s];
        }
    }
}
