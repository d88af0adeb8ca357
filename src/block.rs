//! Basic-block descriptors consumed by the graph builder.
//!
//! A [`BlockInfo`] describes one basic block of the method being compiled: how control
//! leaves it, which blocks it can branch to, how hot it is, and whether it doubles as an
//! exception handler. The descriptors carry *indices into the caller's block list*, not
//! node ids; [`crate::graph::ControlFlowGraph::from_blocks`] resolves them while wiring
//! the graph.
//!
//! # Examples
//!
//! ```rust
//! use flowgraph::block::{BlockInfo, FlowKind};
//!
//! // if (cond) goto 2; fall through to 1
//! let header = BlockInfo::conditional(2);
//! assert_eq!(header.flow, FlowKind::ConditionalBranch);
//! assert_eq!(header.targets, vec![2]);
//! ```

use strum::Display;

/// How control leaves a basic block.
///
/// The builder derives outgoing ordinary edges from this classification; see
/// [`crate::graph::ControlFlowGraph::from_blocks`] for the exact wiring rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum FlowKind {
    /// Two-way branch: one taken target plus fall-through to the next block.
    ConditionalBranch,
    /// Multi-way dispatch over an arbitrary target list.
    Switch,
    /// Unconditional jump to a single target.
    Jump,
    /// Method return; control flows to the End sentinel.
    Return,
    /// Unhandled throw; control flows to the End sentinel.
    Throw,
    /// Straight-line fall-through into the next block.
    FallThrough,
}

/// What a handler block catches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CatchKind {
    /// Wildcard handler: catches every exception type.
    Any,
    /// Handler for a single exception class, identified by a caller-chosen token.
    Class(u32),
}

impl CatchKind {
    /// `true` for the wildcard handler.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, CatchKind::Any)
    }
}

/// Exception-handler metadata attached to a block that acts as a catch block.
///
/// The dominant-catch rule in
/// [`add_exception_edge`](crate::graph::ControlFlowGraph::add_exception_edge) compares
/// these fields across handlers guarding the same throwing block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerInfo {
    /// Inlining depth of the handler's owning method. Deeper handlers are consulted
    /// before shallower ones at runtime.
    pub inline_depth: u32,
    /// Position of the handler in its method's exception table. Lower indices are
    /// consulted first among handlers at the same depth.
    pub handler_index: u32,
    /// Exception type this handler catches.
    pub catch: CatchKind,
    /// Handler synthesized for on-stack replacement. Such handlers never shadow others.
    pub osr_catch: bool,
}

impl HandlerInfo {
    /// Wildcard handler at the given inlining depth and table position.
    #[must_use]
    pub fn catch_all(inline_depth: u32, handler_index: u32) -> Self {
        HandlerInfo {
            inline_depth,
            handler_index,
            catch: CatchKind::Any,
            osr_catch: false,
        }
    }

    /// Typed handler at the given inlining depth and table position.
    #[must_use]
    pub fn catch_class(inline_depth: u32, handler_index: u32, class: u32) -> Self {
        HandlerInfo {
            inline_depth,
            handler_index,
            catch: CatchKind::Class(class),
            osr_catch: false,
        }
    }

    /// Marks the handler as synthesized for on-stack replacement.
    #[must_use]
    pub fn osr(mut self) -> Self {
        self.osr_catch = true;
        self
    }
}

/// Caller-supplied description of a single basic block.
///
/// `targets` and `handlers` hold indices into the block list passed to
/// [`crate::graph::ControlFlowGraph::from_blocks`]. For a [`FlowKind::ConditionalBranch`]
/// or [`FlowKind::Jump`] the first entry of `targets` is the taken target; for a
/// [`FlowKind::Switch`] every entry is a case target (duplicates are collapsed to a
/// single edge). `handlers` lists the blocks that catch exceptions raised in this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// How control leaves this block.
    pub flow: FlowKind,
    /// Branch / switch targets as indices into the block list.
    pub targets: Vec<usize>,
    /// Exception-handler blocks covering this block, as indices into the block list.
    pub handlers: Vec<usize>,
    /// Static or profiled execution frequency estimate.
    pub frequency: i32,
    /// Present when this block is itself an exception handler.
    pub handler: Option<HandlerInfo>,
}

impl BlockInfo {
    /// Block with the given control-flow kind, no targets and zero frequency.
    #[must_use]
    pub fn new(flow: FlowKind) -> Self {
        BlockInfo {
            flow,
            targets: Vec::new(),
            handlers: Vec::new(),
            frequency: 0,
            handler: None,
        }
    }

    /// Fall-through block.
    #[must_use]
    pub fn fall_through() -> Self {
        Self::new(FlowKind::FallThrough)
    }

    /// Conditional branch with the given taken target; the fall-through edge goes to
    /// the next block in the list.
    #[must_use]
    pub fn conditional(target: usize) -> Self {
        let mut info = Self::new(FlowKind::ConditionalBranch);
        info.targets.push(target);
        info
    }

    /// Unconditional jump to the given target.
    #[must_use]
    pub fn jump(target: usize) -> Self {
        let mut info = Self::new(FlowKind::Jump);
        info.targets.push(target);
        info
    }

    /// Multi-way dispatch over the given case targets.
    #[must_use]
    pub fn switch(targets: Vec<usize>) -> Self {
        let mut info = Self::new(FlowKind::Switch);
        info.targets = targets;
        info
    }

    /// Method return.
    #[must_use]
    pub fn ret() -> Self {
        Self::new(FlowKind::Return)
    }

    /// Unhandled throw.
    #[must_use]
    pub fn throw() -> Self {
        Self::new(FlowKind::Throw)
    }

    /// Sets the execution frequency estimate.
    #[must_use]
    pub fn with_frequency(mut self, frequency: i32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Adds an exception-handler block covering this block.
    #[must_use]
    pub fn with_handler_target(mut self, handler: usize) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Marks this block as an exception handler with the given metadata.
    #[must_use]
    pub fn as_handler(mut self, info: HandlerInfo) -> Self {
        self.handler = Some(info);
        self
    }
}
