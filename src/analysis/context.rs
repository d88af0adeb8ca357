//! Generation-stamped visit tracking for graph walks.

use crate::graph::NodeId;

/// Per-walk visited set that is reset in O(1).
///
/// Each node slot holds the generation that last visited it; bumping the generation in
/// [`VisitContext::begin`] invalidates every stamp at once, so one context can be
/// reused across any number of traversals without clearing or reallocating. All visit
/// state lives here, in the caller's hands, never on the graph nodes themselves.
#[derive(Debug)]
pub struct VisitContext {
    generation: u32,
    stamps: Vec<u32>,
}

impl Default for VisitContext {
    fn default() -> Self {
        Self::new()
    }
}

impl VisitContext {
    /// Creates a context ready for its first walk.
    #[must_use]
    pub fn new() -> Self {
        VisitContext {
            generation: 1,
            stamps: Vec::new(),
        }
    }

    /// Starts a fresh walk, forgetting every mark of the previous one.
    pub fn begin(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            // u32 wrap: stale stamps from four billion walks ago would read as
            // current, so clear them and restart. Zero never matches a generation.
            self.stamps.iter_mut().for_each(|s| *s = 0);
            self.generation = 1;
        }
    }

    /// Marks a node as visited in the current walk.
    ///
    /// Returns `true` on the first visit, `false` if the node was already marked.
    pub fn mark(&mut self, node: NodeId) -> bool {
        let index = node.index();
        if index >= self.stamps.len() {
            self.stamps.resize(index + 1, 0);
        }
        if self.stamps[index] == self.generation {
            false
        } else {
            self.stamps[index] = self.generation;
            true
        }
    }

    /// Whether a node has been marked in the current walk.
    #[must_use]
    pub fn seen(&self, node: NodeId) -> bool {
        self.stamps
            .get(node.index())
            .is_some_and(|&s| s == self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_mark_wins() {
        let mut ctx = VisitContext::new();
        ctx.begin();
        assert!(ctx.mark(NodeId::new(3)));
        assert!(!ctx.mark(NodeId::new(3)));
        assert!(ctx.seen(NodeId::new(3)));
        assert!(!ctx.seen(NodeId::new(4)));
    }

    #[test]
    fn begin_forgets_previous_walk() {
        let mut ctx = VisitContext::new();
        ctx.begin();
        ctx.mark(NodeId::new(0));
        ctx.begin();
        assert!(!ctx.seen(NodeId::new(0)));
        assert!(ctx.mark(NodeId::new(0)));
    }

    #[test]
    fn stamps_grow_on_demand() {
        let mut ctx = VisitContext::new();
        ctx.begin();
        assert!(ctx.mark(NodeId::new(1000)));
        assert!(ctx.seen(NodeId::new(1000)));
    }
}
