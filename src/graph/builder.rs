//! Wiring a [`ControlFlowGraph`] from caller-supplied block descriptors.
//!
//! The builder resolves the index-based successor and handler lists of each
//! [`BlockInfo`] into graph edges, following the block's [`FlowKind`]. Duplicate switch
//! targets collapse to a single edge through a per-call [`VisitContext`] generation.

use crate::analysis::VisitContext;
use crate::block::{BlockInfo, FlowKind};
use crate::graph::cfg::ControlFlowGraph;
use crate::graph::node::NodeId;
use crate::{Error, Result};

impl ControlFlowGraph {
    /// Builds a graph from an ordered list of block descriptors.
    ///
    /// Block `0` receives the edge from Start. Ordinary edges follow each block's
    /// [`FlowKind`]:
    ///
    /// - [`FlowKind::ConditionalBranch`]: taken target plus fall-through to the next
    ///   block in the list (it is an error for the last block to be conditional)
    /// - [`FlowKind::Switch`]: one edge per *distinct* case target
    /// - [`FlowKind::Jump`]: the single target
    /// - [`FlowKind::Return`] and [`FlowKind::Throw`]: the End sentinel
    /// - [`FlowKind::FallThrough`]: the next block, or End for the last block
    ///
    /// Exception edges are added for every handler listed in `handlers`, subject to the
    /// dominant-catch rule of [`ControlFlowGraph::add_exception_edge`].
    ///
    /// Fails with [`Error::GraphError`] on an empty block list or an out-of-range
    /// target or handler index.
    pub fn from_blocks(blocks: Vec<BlockInfo>) -> Result<Self> {
        if blocks.is_empty() {
            return Err(Error::GraphError(
                "cannot build a control-flow graph from an empty block list".to_string(),
            ));
        }

        let mut cfg = ControlFlowGraph::new();
        let ids: Vec<NodeId> = blocks
            .iter()
            .map(|info| cfg.add_block(info.clone()))
            .collect();

        cfg.add_edge(cfg.start(), ids[0])?;

        let mut visited = VisitContext::new();
        for (index, info) in blocks.iter().enumerate() {
            cfg.wire_block(index, info, &ids, &mut visited)?;
        }
        Ok(cfg)
    }

    fn wire_block(
        &mut self,
        index: usize,
        info: &BlockInfo,
        ids: &[NodeId],
        visited: &mut VisitContext,
    ) -> Result<()> {
        let from = ids[index];
        match info.flow {
            FlowKind::ConditionalBranch => {
                self.add_edge(from, resolve(ids, info, 0, index)?)?;
                match ids.get(index + 1) {
                    Some(&next) => {
                        self.add_edge(from, next)?;
                    }
                    None => {
                        return Err(Error::GraphError(format!(
                            "block {index} is a conditional branch with no fall-through block"
                        )));
                    }
                }
            }
            FlowKind::Switch => {
                visited.begin();
                for slot in 0..info.targets.len() {
                    let to = resolve(ids, info, slot, index)?;
                    if visited.mark(to) {
                        self.add_edge(from, to)?;
                    }
                }
            }
            FlowKind::Jump => {
                self.add_edge(from, resolve(ids, info, 0, index)?)?;
            }
            FlowKind::Return | FlowKind::Throw => {
                self.add_edge(from, self.end())?;
            }
            FlowKind::FallThrough => {
                let to = ids.get(index + 1).copied().unwrap_or(self.end());
                self.add_edge(from, to)?;
            }
        }

        for &handler in &info.handlers {
            let Some(&to) = ids.get(handler) else {
                return Err(Error::GraphError(format!(
                    "block {index} names handler {handler}, but only {} blocks exist",
                    ids.len()
                )));
            };
            self.add_exception_edge(from, to)?;
        }
        Ok(())
    }
}

fn resolve(ids: &[NodeId], info: &BlockInfo, slot: usize, index: usize) -> Result<NodeId> {
    let Some(&target) = info.targets.get(slot) else {
        return Err(Error::GraphError(format!(
            "block {index} ({}) is missing target {slot}",
            info.flow
        )));
    };
    ids.get(target).copied().ok_or_else(|| {
        Error::GraphError(format!(
            "block {index} targets block {target}, but only {} blocks exist",
            ids.len()
        ))
    })
}
