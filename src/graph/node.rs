//! Node identifiers and arena slots for the control-flow graph.

use std::fmt;

use crate::graph::edge::EdgeId;
use crate::block::BlockInfo;

/// Unique identifier for a node within a [`crate::graph::ControlFlowGraph`].
///
/// Node ids double as the node's *number*: a dense index assigned at creation and never
/// reused, even after the node is removed. Analyses index their side arrays with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new node identifier from an index.
    #[must_use]
    pub fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the underlying index of this node identifier.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

/// What a graph node stands for.
///
/// The two sentinels carry no block payload; every other node wraps the
/// [`BlockInfo`] it was created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePayload {
    /// The unique entry sentinel. Has no predecessors.
    Start,
    /// The unique exit sentinel. Has no successors.
    End,
    /// An ordinary basic block.
    Block(BlockInfo),
}

/// A node slot in the graph arena.
///
/// Adjacency is stored as four edge-id lists so that ordinary and exception flow can be
/// iterated independently. Removal is soft: the slot stays in the arena with its
/// validity flag cleared, keeping node numbers stable for the lifetime of the graph.
#[derive(Debug, Clone)]
pub struct FlowNode {
    id: NodeId,
    payload: NodePayload,
    frequency: i32,
    valid: bool,
    pub(crate) successors: Vec<EdgeId>,
    pub(crate) predecessors: Vec<EdgeId>,
    pub(crate) exception_successors: Vec<EdgeId>,
    pub(crate) exception_predecessors: Vec<EdgeId>,
}

impl FlowNode {
    pub(crate) fn new(id: NodeId, payload: NodePayload) -> Self {
        let frequency = match &payload {
            NodePayload::Block(info) => info.frequency,
            NodePayload::Start | NodePayload::End => 0,
        };
        FlowNode {
            id,
            payload,
            frequency,
            valid: true,
            successors: Vec::new(),
            predecessors: Vec::new(),
            exception_successors: Vec::new(),
            exception_predecessors: Vec::new(),
        }
    }

    /// This node's identifier, which is also its stable number.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// What this node stands for.
    #[must_use]
    pub fn payload(&self) -> &NodePayload {
        &self.payload
    }

    /// The block descriptor, or `None` for the sentinels.
    #[must_use]
    pub fn block(&self) -> Option<&BlockInfo> {
        match &self.payload {
            NodePayload::Block(info) => Some(info),
            _ => None,
        }
    }

    /// `true` until the node is removed from the graph.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Execution frequency estimate for this node.
    #[must_use]
    pub fn frequency(&self) -> i32 {
        self.frequency
    }

    /// Updates the execution frequency estimate.
    pub fn set_frequency(&mut self, frequency: i32) {
        self.frequency = frequency;
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }
}
