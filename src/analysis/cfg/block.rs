//! Basic blocks and branches.

use strum::{AsRefStr, Display, EnumIter};

use crate::{
    analysis::cfg::{BlockId, RegionId},
    operation::OperationId,
};

/// Position of a block in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
pub enum BlockKind {
    /// The unique entry block. It holds no operations.
    Entry,
    /// An ordinary block.
    Block,
    /// The unique exit block. It holds no operations and has no successors.
    Exit,
}

/// When the conditional successor of a block is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, AsRefStr, EnumIter)]
pub enum ConditionKind {
    /// The block has no conditional successor.
    #[default]
    None,
    /// The conditional successor is taken when the branch value is `true`.
    WhenTrue,
    /// The conditional successor is taken when the branch value is `false`.
    WhenFalse,
}

/// How control leaves a block through a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, AsRefStr, EnumIter)]
pub enum BranchSemantics {
    /// The block does not leave (only used by the exit block).
    #[default]
    None,
    /// Ordinary transfer to the destination.
    Regular,
    /// `return`; the destination is the exit block.
    Return,
    /// End of a finally or filter region; the destination depends on how the
    /// region was entered.
    StructuredExceptionHandling,
    /// The program terminates (e.g. `Environment.FailFast`).
    ProgramTermination,
    /// `throw expression`; the thrown value is the block's branch value.
    Throw,
    /// `throw;` inside a catch handler.
    Rethrow,
    /// Invalid code the host could not lower.
    Error,
}

impl BranchSemantics {
    /// Returns `true` if following the branch raises an exception.
    #[must_use]
    pub const fn is_exceptional(self) -> bool {
        matches!(self, BranchSemantics::Throw | BranchSemantics::Rethrow)
    }
}

/// A transfer of control from one block to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// Block the branch leaves.
    pub source: BlockId,
    /// Block the branch enters, `None` for throws and ends of finally regions.
    pub destination: Option<BlockId>,
    /// Kind of transfer.
    pub semantics: BranchSemantics,
    /// `true` for the conditional successor of a block.
    pub is_conditional: bool,
    /// Regions left by this branch, innermost first.
    pub leaving_regions: Vec<RegionId>,
    /// Regions entered by this branch, outermost first.
    pub entering_regions: Vec<RegionId>,
    /// Finally regions that run before the destination is reached, innermost first.
    pub finally_regions: Vec<RegionId>,
}

impl Branch {
    pub(crate) fn new(
        source: BlockId,
        destination: Option<BlockId>,
        semantics: BranchSemantics,
        is_conditional: bool,
    ) -> Self {
        Branch {
            source,
            destination,
            semantics,
            is_conditional,
            leaving_regions: Vec::new(),
            entering_regions: Vec::new(),
            finally_regions: Vec::new(),
        }
    }
}

/// A straight-line sequence of operations.
///
/// A block runs its root operations in order, then evaluates its branch value (if
/// any) and leaves through either the conditional or the fall-through branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// Position of the block.
    pub ordinal: usize,
    /// Entry, exit or ordinary block.
    pub kind: BlockKind,
    /// Root operations in execution order.
    pub operations: Vec<OperationId>,
    /// Condition of the conditional branch, thrown value of a throw, or returned value.
    pub branch_value: Option<OperationId>,
    /// When the conditional successor is taken.
    pub condition_kind: ConditionKind,
    /// Successor taken when the condition does not hold (or the only successor).
    pub fall_through: Option<Branch>,
    /// Successor taken when the condition holds.
    pub conditional: Option<Branch>,
    /// Innermost region containing this block.
    pub region: RegionId,
    /// `true` if the block can be reached from the entry block.
    pub is_reachable: bool,
}

impl BasicBlock {
    pub(crate) fn new(ordinal: usize, kind: BlockKind, region: RegionId) -> Self {
        BasicBlock {
            ordinal,
            kind,
            operations: Vec::new(),
            branch_value: None,
            condition_kind: ConditionKind::None,
            fall_through: None,
            conditional: None,
            region,
            is_reachable: false,
        }
    }

    /// Iterates over the outgoing branches, conditional first.
    pub fn branches(&self) -> impl Iterator<Item = &Branch> + '_ {
        self.conditional.iter().chain(self.fall_through.iter())
    }
}
