use thiserror::Error;

macro_rules! invariant_error {
    // Single format string version (inline captures allowed)
    ($msg:expr) => {
        $crate::Error::InvariantViolation {
            message: format!($msg),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::InvariantViolation {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

pub(crate) use invariant_error;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The taxonomy follows the three failure classes of the flow-graph core: fatal invariant
/// violations that indicate a corrupted graph, bounded-resource exhaustion that a caller may
/// recover from by retrying with less aggressive settings, and plain construction-input errors.
/// Degraded-but-valid conditions (an unreachable exit during post-dominance) are *not* errors;
/// they are reported as data through validity flags on the analysis results.
///
/// # Error Categories
///
/// ## Invariant Violations (fatal)
/// - [`Error::InvariantViolation`] - The graph or structure tree is in a state that should be
///   impossible. Continuing would silently miscompile, so analysis of the current compilation
///   unit must be aborted.
///
/// ## Bounded-Resource Exhaustion (recoverable)
/// - [`Error::RemovalLimit`] - The cascading edge-removal worklist exceeded its nesting bound
///   on a pathologically large method. Callers are expected to fall back, for example by
///   recompiling at a lower optimization level.
///
/// ## Construction Errors
/// - [`Error::GraphError`] - Invalid input while building a graph (empty block list, successor
///   index out of range).
///
/// # Examples
///
/// ```rust
/// use flowgraph::{graph::ControlFlowGraph, Error};
///
/// match ControlFlowGraph::from_blocks(vec![]) {
///     Err(Error::GraphError(message)) => {
///         eprintln!("bad input: {message}");
///     }
///     Err(e) => eprintln!("other error: {e}"),
///     Ok(_) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An internal invariant of the flow graph or structure tree was violated.
    ///
    /// Examples: removing a node that still has predecessors, adding an ordinary edge
    /// where an exception edge already connects the same pair, or a structural analyzer
    /// postcondition failure. The only safe action is to abort the current compilation
    /// unit; the graph can no longer be trusted.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the violated invariant
    /// * `file` - Source file where the violation was detected
    /// * `line` - Source line where the violation was detected
    #[error("Invariant violated - {file}:{line}: {message}")]
    InvariantViolation {
        /// The message to be printed for the violation
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Cascading edge removal exceeded the maximum nesting level allowed.
    ///
    /// This guards against unbounded cascades on pathologically large or irreducible
    /// methods. It is a reported compilation failure, not a crash: the associated value
    /// is the nesting level that was reached, and callers may retry with reduced
    /// optimization.
    #[error("Reached the maximum edge-removal nesting level allowed - {0}")]
    RemovalLimit(usize),

    /// Error while constructing or wiring a graph from external block descriptors.
    ///
    /// This covers invalid caller input such as an empty block list or a branch target
    /// index that exceeds the block count.
    #[error("{0}")]
    GraphError(String),
}

/// Convenience `Result` alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
