//! Control flow edge labels.

use strum::{AsRefStr, Display, EnumIter};

/// The kind of control transfer an edge of the [`ControlFlowGraph`](super::ControlFlowGraph)
/// represents.
///
/// Edges are derived from the blocks' branches and from the region tree. The engine
/// itself follows [`Branch`](super::Branch)es and regions; the labelled edges serve
/// reachability, predecessor queries and rendering.
///
/// # Examples
///
/// ```rust
/// use symscope::analysis::cfg::CfgEdgeKind;
///
/// assert!(CfgEdgeKind::ConditionalTrue.is_conditional());
/// assert!(CfgEdgeKind::Error.is_exceptional());
/// assert!(!CfgEdgeKind::Regular.is_exceptional());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
pub enum CfgEdgeKind {
    /// Unconditional transfer, including `return`.
    Regular,
    /// Taken when the branch value is `true`.
    ConditionalTrue,
    /// Taken when the branch value is `false`.
    ConditionalFalse,
    /// An exception transfers control to a handler, a finally region or the exit.
    Error,
    /// A branch leaving a try region enters the innermost finally region.
    FinallyEntry,
    /// The end of a finally region continues to where the leaving branch was headed.
    EndFinally,
}

impl CfgEdgeKind {
    /// Returns `true` for the two conditional edge kinds.
    #[must_use]
    pub const fn is_conditional(self) -> bool {
        matches!(self, Self::ConditionalTrue | Self::ConditionalFalse)
    }

    /// Returns `true` for edges that exist because of exception handling.
    #[must_use]
    pub const fn is_exceptional(self) -> bool {
        matches!(self, Self::Error | Self::FinallyEntry | Self::EndFinally)
    }
}
