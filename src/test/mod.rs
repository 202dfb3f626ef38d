//! Helpers shared by the unit tests.

use proptest::prelude::*;

use crate::{
    analysis::{
        cfg::ControlFlowGraph,
        symbolic::{
            checks::StateRecorder, ExecutionConfig, NumberConstraint, SymbolicExecution,
            WalkOutcome,
        },
    },
    syntax::Lowerer,
    Result,
};

/// An empty body: the entry block falls through to the exit block.
pub(crate) fn trivial_cfg() -> Result<ControlFlowGraph> {
    Lowerer::new().lower(&[])
}

/// Walks `cfg` with a `Tag` recorder as the only check.
pub(crate) fn walk_recorded(
    cfg: &ControlFlowGraph,
    config: ExecutionConfig,
) -> (WalkOutcome, StateRecorder) {
    let recorder = StateRecorder::new("Tag");
    let mut execution = SymbolicExecution::new(cfg, recorder.clone().into(), config).unwrap();
    (execution.walk(), recorder)
}

/// Small bounds keep the arithmetic away from `i128` overflow.
fn bound() -> impl Strategy<Value = Option<i128>> {
    prop::option::of(-1_000_000i128..1_000_000)
}

/// Ranges with at least one bound.
pub(crate) fn number_range() -> impl Strategy<Value = NumberConstraint> {
    (bound(), bound()).prop_filter_map("unbounded", |(min, max)| NumberConstraint::from(min, max))
}

/// A range together with a value inside it.
pub(crate) fn number_member() -> impl Strategy<Value = (NumberConstraint, i128)> {
    number_range().prop_flat_map(|range| {
        let low = range.lower().unwrap_or(-2_000_000);
        let high = range.upper().unwrap_or(2_000_000);
        (Just(range), low..=high)
    })
}
