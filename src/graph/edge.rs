//! Edge identifiers and arena slots for the control-flow graph.

use std::fmt;

use bitflags::bitflags;

use crate::graph::node::NodeId;

/// Unique identifier for an edge within a [`crate::graph::ControlFlowGraph`].
///
/// Assigned densely at creation and never reused, mirroring [`NodeId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) usize);

impl EdgeId {
    /// Creates a new edge identifier from an index.
    #[must_use]
    pub fn new(index: usize) -> Self {
        EdgeId(index)
    }

    /// Returns the underlying index of this edge identifier.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl From<usize> for EdgeId {
    fn from(index: usize) -> Self {
        EdgeId(index)
    }
}

bitflags! {
    /// Optimization annotations carried on an edge.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EdgeFlags: u16 {
        /// The call ending the source block was tail-call eliminated into this edge.
        const TAIL_CALL_ELIMINATED = 1 << 0;
        /// Edge synthesized for an on-stack-replacement transition.
        const OSR_INDUCED = 1 << 1;
    }
}

/// An edge slot in the graph arena.
///
/// An edge is either ordinary or exceptional for its whole lifetime; the two kinds live
/// in separate adjacency lists on the endpoints. Removal is soft, like nodes.
#[derive(Debug, Clone)]
pub struct FlowEdge {
    id: EdgeId,
    from: NodeId,
    to: NodeId,
    exceptional: bool,
    frequency: i32,
    flags: EdgeFlags,
    valid: bool,
}

impl FlowEdge {
    pub(crate) fn new(id: EdgeId, from: NodeId, to: NodeId, exceptional: bool, frequency: i32) -> Self {
        FlowEdge {
            id,
            from,
            to,
            exceptional,
            frequency,
            flags: EdgeFlags::empty(),
            valid: true,
        }
    }

    /// This edge's identifier.
    #[must_use]
    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// Source node of the edge.
    #[must_use]
    pub fn from(&self) -> NodeId {
        self.from
    }

    /// Target node of the edge.
    #[must_use]
    pub fn to(&self) -> NodeId {
        self.to
    }

    /// `true` for exception flow, `false` for ordinary control flow.
    #[must_use]
    pub fn is_exceptional(&self) -> bool {
        self.exceptional
    }

    /// `true` until the edge is removed from the graph.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Execution frequency estimate for this edge.
    #[must_use]
    pub fn frequency(&self) -> i32 {
        self.frequency
    }

    /// Updates the execution frequency estimate.
    pub fn set_frequency(&mut self, frequency: i32) {
        self.frequency = frequency;
    }

    /// Optimization annotations on this edge.
    #[must_use]
    pub fn flags(&self) -> EdgeFlags {
        self.flags
    }

    /// Adds optimization annotations to this edge.
    pub fn set_flags(&mut self, flags: EdgeFlags) {
        self.flags |= flags;
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_id_display() {
        assert_eq!(EdgeId::new(3).to_string(), "e3");
    }

    #[test]
    fn new_edge_has_no_flags() {
        let mut edge = FlowEdge::new(EdgeId::new(0), NodeId::new(1), NodeId::new(2), false, 10);
        assert!(edge.flags().is_empty());
        assert!(edge.is_valid());
        assert!(!edge.is_exceptional());

        edge.set_flags(EdgeFlags::OSR_INDUCED);
        assert!(edge.flags().contains(EdgeFlags::OSR_INDUCED));
        assert!(!edge.flags().contains(EdgeFlags::TAIL_CALL_ELIMINATED));
    }
}
