//! The exploded-graph walker.
//!
//! [`SymbolicExecution`] walks a [`ControlFlowGraph`] with a worklist of exploded
//! nodes. An exploded node is a block together with the program state the path
//! arrives in and, while finally regions are being replayed, the continuation to
//! resume once the innermost finally completes. Nodes are deduplicated on all three
//! parts, so two paths that arrive at a block in the same state are explored once.
//!
//! # Algorithm
//!
//! 1. Seed the worklist with the entry block and [`ProgramState::empty`]
//! 2. Pop a node; skip it if an equal node was already processed
//! 3. Drop it if the block was already entered `max_block_visits` times on this path
//! 4. Run the block's operations and branch value through the checks and the
//!    built-in semantics, forking exceptional successors for operations that may throw
//! 5. Follow the branches, learning constraints on conditional ones
//! 6. Stop when the worklist is empty, the step budget is spent or the walk is
//!    cancelled
//!
//! A walk that stops early is *incomplete*: it reports no exit state and drops every
//! diagnostic that needs a complete walk.

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    analysis::{
        cfg::{
            BasicBlock, BlockId, BlockKind, Branch, BranchSemantics, ConditionKind,
            ControlFlowGraph, ExceptionTarget, RegionId, RegionKind,
        },
        symbolic::{
            learning::learn_branch, processors, Diagnostic, DiagnosticSink, ExecutionConfig,
            ProgramState, SymbolicCheckList, SymbolicContext, SymbolicValue,
        },
    },
    operation::{OperationId, OperationKind, SymbolFlags},
    Error, Result,
};

/// A cooperative cancellation flag shared between a driver and its walks.
///
/// The walk polls the flag between worklist iterations; a cancelled walk ends like a
/// walk that ran out of steps.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        CancellationToken::default()
    }

    /// Requests cancellation of every walk observing this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`cancel`](Self::cancel) was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The result of one walk.
#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    /// `false` if the walk ran out of steps or was cancelled.
    pub completed: bool,
    /// `true` if the walk stopped because of cancellation.
    pub cancelled: bool,
    /// The distinct states that reached the exit block, in arrival order. Empty for
    /// an incomplete walk.
    pub exit_states: Vec<ProgramState>,
    /// Number of operations processed.
    pub steps: usize,
    /// Diagnostics raised by the checks.
    pub diagnostics: Vec<Diagnostic>,
}

impl WalkOutcome {
    /// Returns how many distinct states reached the exit block.
    #[must_use]
    pub fn exit_reach_count(&self) -> usize {
        self.exit_states.len()
    }

    /// Turns a cancelled walk into [`Error::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the walk was cancelled.
    pub fn check_cancelled(self) -> Result<Self> {
        if self.cancelled {
            Err(Error::Cancelled)
        } else {
            Ok(self)
        }
    }
}

/// Where control resumes once a chain of finally regions completes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Continuation {
    /// The destination of the branch that left the try.
    Destination(BlockId),
    /// An exception raised inside the try keeps propagating outward from the
    /// try/finally region.
    Exception { from: RegionId },
}

/// The finally region being replayed and what follows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FinallyPoint {
    region: RegionId,
    /// Finally regions still to run after this one, innermost first.
    pending: Vec<RegionId>,
    continuation: Continuation,
    /// The finally point that was active when this one was entered.
    previous: Option<Arc<FinallyPoint>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ExplodedNode {
    block: BlockId,
    state: ProgramState,
    finally_point: Option<Arc<FinallyPoint>>,
}

/// Raised when the step budget is spent.
struct StepBudgetExhausted;

/// Symbolic execution of one control flow graph.
///
/// # Examples
///
/// ```rust
/// use symscope::{
///     analysis::symbolic::{ExecutionConfig, SymbolicCheckList, SymbolicExecution},
///     syntax::{Expression, Lowerer, Statement},
/// };
///
/// let cfg = Lowerer::new().parameter_bool("condition").local_bool("value").lower(&[
///     Statement::If {
///         condition: Expression::parameter("condition"),
///         then: vec![Statement::assign("value", Expression::bool(true))],
///         otherwise: vec![Statement::assign("value", Expression::bool(false))],
///     },
/// ])?;
///
/// let mut execution =
///     SymbolicExecution::new(&cfg, SymbolicCheckList::default(), ExecutionConfig::default())?;
/// let outcome = execution.walk();
/// assert!(outcome.completed);
/// assert_eq!(outcome.exit_reach_count(), 2);
/// # Ok::<(), symscope::Error>(())
/// ```
pub struct SymbolicExecution<'a> {
    cfg: &'a ControlFlowGraph,
    checks: SymbolicCheckList,
    config: ExecutionConfig,
    /// Blocks nested in a try region, where operations may raise into a handler.
    protected: HashSet<BlockId>,
}

impl<'a> SymbolicExecution<'a> {
    /// Prepares a walk of `cfg` feeding `checks`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the graph has no entry or exit block, or
    /// if the configuration allows no block visit at all.
    pub fn new(
        cfg: &'a ControlFlowGraph,
        checks: SymbolicCheckList,
        config: ExecutionConfig,
    ) -> Result<Self> {
        let entry_ok = cfg
            .block(cfg.entry_block())
            .is_some_and(|block| block.kind == BlockKind::Entry);
        let exit_ok = cfg
            .block(cfg.exit_block())
            .is_some_and(|block| block.kind == BlockKind::Exit);
        if !entry_ok || !exit_ok {
            return Err(Error::InvalidArgument(
                "control flow graph has no entry or exit block".to_string(),
            ));
        }
        if config.max_block_visits == 0 {
            return Err(Error::InvalidArgument(
                "max_block_visits must be at least 1".to_string(),
            ));
        }

        let protected = cfg
            .blocks()
            .filter(|(_, block)| {
                cfg.region_chain(block.region).into_iter().any(|region| {
                    cfg.region(region)
                        .is_some_and(|region| region.kind == RegionKind::Try)
                })
            })
            .map(|(id, _)| id)
            .collect();

        Ok(SymbolicExecution {
            cfg,
            checks,
            config,
            protected,
        })
    }

    /// Returns the graph being walked.
    #[must_use]
    pub fn cfg(&self) -> &'a ControlFlowGraph {
        self.cfg
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Walks the graph to completion or until the step budget is spent.
    pub fn walk(&mut self) -> WalkOutcome {
        self.run(None)
    }

    /// Walks the graph, stopping early once `cancellation` is cancelled.
    pub fn walk_with_cancellation(&mut self, cancellation: &CancellationToken) -> WalkOutcome {
        self.run(Some(cancellation))
    }

    fn run(&mut self, cancellation: Option<&CancellationToken>) -> WalkOutcome {
        let sink = DiagnosticSink::new();
        let cfg = self.cfg;
        tracing::debug!(
            blocks = cfg.block_count(),
            max_steps = self.config.max_step_count,
            "symbolic execution started"
        );

        let mut walker = Walker {
            cfg,
            checks: &mut self.checks,
            config: &self.config,
            protected: &self.protected,
            sink: &sink,
            worklist: VecDeque::new(),
            visited: HashSet::new(),
            exit_states: Vec::new(),
            steps: 0,
        };
        walker.worklist.push_back(ExplodedNode {
            block: cfg.entry_block(),
            state: ProgramState::empty(),
            finally_point: None,
        });

        let mut cancelled = false;
        let mut exhausted = false;
        while let Some(node) = walker.worklist.pop_front() {
            if cancellation.is_some_and(CancellationToken::is_cancelled) {
                tracing::debug!(steps = walker.steps, "symbolic execution cancelled");
                cancelled = true;
                break;
            }
            if walker.process(node).is_err() {
                tracing::debug!(
                    steps = walker.steps,
                    pending = walker.worklist.len(),
                    "symbolic execution ran out of steps"
                );
                exhausted = true;
                break;
            }
        }

        let completed = !cancelled && !exhausted;
        let steps = walker.steps;
        let mut exit_states = std::mem::take(&mut walker.exit_states);
        if completed {
            for state in &exit_states {
                let context = SymbolicContext::new(cfg, cfg.exit_block(), None, state.clone(), &sink);
                self.checks.exit_reached(&context);
            }
        } else {
            exit_states.clear();
        }
        self.checks.execution_completed(completed);

        let diagnostics = sink.finish(completed);
        tracing::debug!(
            completed,
            steps,
            exit_states = exit_states.len(),
            diagnostics = diagnostics.len(),
            "symbolic execution finished"
        );
        WalkOutcome {
            completed,
            cancelled,
            exit_states,
            steps,
            diagnostics,
        }
    }
}

impl std::fmt::Debug for SymbolicExecution<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolicExecution")
            .field("blocks", &self.cfg.block_count())
            .field("checks", &self.checks)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Mutable state of a single walk.
struct Walker<'w, 'a> {
    cfg: &'a ControlFlowGraph,
    checks: &'w mut SymbolicCheckList,
    config: &'w ExecutionConfig,
    protected: &'w HashSet<BlockId>,
    sink: &'w DiagnosticSink,
    worklist: VecDeque<ExplodedNode>,
    visited: HashSet<ExplodedNode>,
    exit_states: Vec<ProgramState>,
    steps: usize,
}

impl Walker<'_, '_> {
    fn process(&mut self, node: ExplodedNode) -> std::result::Result<(), StepBudgetExhausted> {
        if !self.visited.insert(node.clone()) {
            return Ok(());
        }
        let ExplodedNode {
            block: id,
            state,
            finally_point,
        } = node;
        let cfg = self.cfg;
        let Some(block) = cfg.block(id) else {
            return Ok(());
        };

        if block.kind == BlockKind::Exit {
            if !self.exit_states.contains(&state) {
                self.exit_states.push(state);
            }
            return Ok(());
        }
        if state.visit_count(id) >= self.config.max_block_visits {
            tracing::trace!(block = block.ordinal, "visit limit reached");
            return Ok(());
        }
        let mut state = state.add_visit(id);

        let roots = block.operations.iter().chain(block.branch_value.iter());
        for root in roots {
            match self.execute_tree(id, block, state, *root, &finally_point)? {
                Some(next) => state = next,
                None => return Ok(()),
            }
        }

        self.follow_branches(id, block, state, &finally_point);
        Ok(())
    }

    /// Runs every operation under `root` in execution order.
    fn execute_tree(
        &mut self,
        id: BlockId,
        block: &BasicBlock,
        mut state: ProgramState,
        root: OperationId,
        finally_point: &Option<Arc<FinallyPoint>>,
    ) -> std::result::Result<Option<ProgramState>, StepBudgetExhausted> {
        for operation in self.cfg.operations().execution_order(root) {
            match self.execute_operation(id, block, state, operation, finally_point)? {
                Some(next) => state = next,
                None => return Ok(None),
            }
        }
        Ok(Some(state))
    }

    fn execute_operation(
        &mut self,
        id: BlockId,
        block: &BasicBlock,
        state: ProgramState,
        operation: OperationId,
        finally_point: &Option<Arc<FinallyPoint>>,
    ) -> std::result::Result<Option<ProgramState>, StepBudgetExhausted> {
        self.steps += 1;
        if self.steps > self.config.max_step_count {
            return Err(StepBudgetExhausted);
        }

        let cfg = self.cfg;
        let context = SymbolicContext::new(cfg, id, Some(operation), state, self.sink);
        let Some(state) = self.checks.pre_process(&context) else {
            return Ok(None);
        };
        let context = context.with_state(state);
        let mut state = processors::process(&context, self.config);

        let kind = cfg.operation(operation).map(|node| &node.kind);
        if kind.is_some_and(processors::is_creation) {
            state = self.checks.object_created(&context.with_state(state));
        }
        let Some(state) = self.checks.post_process(&context.with_state(state)) else {
            return Ok(None);
        };

        if self.protected.contains(&id) && kind.is_some_and(|kind| self.may_throw(kind)) {
            self.raise(state.clone(), block.region, finally_point);
        }
        Ok(Some(state))
    }

    fn may_throw(&self, kind: &OperationKind) -> bool {
        match kind {
            OperationKind::Invocation { method, .. } => !self
                .cfg
                .symbol(*method)
                .is_some_and(|symbol| symbol.flags.contains(SymbolFlags::NO_THROW)),
            OperationKind::ObjectCreation { .. } | OperationKind::ArrayElementReference { .. } => {
                true
            }
            _ => false,
        }
    }

    fn follow_branches(
        &mut self,
        id: BlockId,
        block: &BasicBlock,
        state: ProgramState,
        finally_point: &Option<Arc<FinallyPoint>>,
    ) {
        let condition = match (block.condition_kind, &block.conditional, block.branch_value) {
            (ConditionKind::None, _, _) | (_, None, _) | (_, _, None) => None,
            (kind, Some(conditional), Some(value)) => Some((kind, conditional, value)),
        };
        let Some((kind, conditional, value)) = condition else {
            if let Some(branch) = &block.fall_through {
                self.follow(branch, state, finally_point);
            }
            return;
        };

        let cfg = self.cfg;
        let known = state
            .value(cfg.operations(), value)
            .and_then(SymbolicValue::bool);
        let taken_when = kind == ConditionKind::WhenTrue;
        let successors = [
            (Some(conditional), taken_when),
            (block.fall_through.as_ref(), !taken_when),
        ];
        for (branch, outcome) in successors {
            let Some(branch) = branch else {
                continue;
            };
            if known.is_some_and(|known| known != outcome) {
                continue;
            }
            let context = SymbolicContext::new(cfg, id, Some(value), state.clone(), self.sink);
            let Some(learned) = learn_branch(&context, value, outcome) else {
                continue;
            };
            let Some(refined) = self.checks.condition_evaluated(&context.with_state(learned)) else {
                continue;
            };
            self.follow(branch, refined, finally_point);
        }
    }

    fn follow(&mut self, branch: &Branch, state: ProgramState, finally_point: &Option<Arc<FinallyPoint>>) {
        let state = self.leave_regions(state, &branch.leaving_regions);
        match branch.semantics {
            BranchSemantics::Throw | BranchSemantics::Rethrow => {
                let region = self
                    .cfg
                    .block(branch.source)
                    .map_or(RegionId::ROOT, |block| block.region);
                self.raise(state, region, finally_point);
            }
            BranchSemantics::StructuredExceptionHandling => self.end_finally(state, finally_point),
            BranchSemantics::Regular | BranchSemantics::Return => {
                let Some(destination) = branch.destination else {
                    return;
                };
                match branch.finally_regions.split_first() {
                    Some((first, rest)) => {
                        let point = FinallyPoint {
                            region: *first,
                            pending: rest.to_vec(),
                            continuation: Continuation::Destination(destination),
                            previous: finally_point.clone(),
                        };
                        self.enter_finally(state, point);
                    }
                    None => self.enqueue(destination, state, finally_point),
                }
            }
            BranchSemantics::None | BranchSemantics::ProgramTermination | BranchSemantics::Error => {}
        }
    }

    /// Forgets the flow captures (and, when configured, the locals) of regions a branch
    /// leaves.
    fn leave_regions(&self, mut state: ProgramState, regions: &[RegionId]) -> ProgramState {
        for region in regions.iter().filter_map(|id| self.cfg.region(*id)) {
            state = state.forget_captures(region.captures.iter().copied());
            if self.config.forget_locals_on_scope_exit {
                state = state.forget_symbols(region.locals.iter().copied());
            }
        }
        state
    }

    /// Delivers an exception raised in `from` to every handler that may receive it.
    fn raise(&mut self, state: ProgramState, from: RegionId, finally_point: &Option<Arc<FinallyPoint>>) {
        let cfg = self.cfg;
        for target in cfg.exception_targets(from) {
            let Some(block) = cfg.exception_target_block(target) else {
                continue;
            };
            match target {
                ExceptionTarget::Catch(_) => self.enqueue(block, state.clone(), finally_point),
                ExceptionTarget::Exit => self.enqueue(block, state.clone(), &None),
                ExceptionTarget::Finally(region) => {
                    let Some(owner) = cfg.region(region).and_then(|r| r.parent) else {
                        continue;
                    };
                    let point = FinallyPoint {
                        region,
                        pending: Vec::new(),
                        continuation: Continuation::Exception { from: owner },
                        previous: self.surviving(finally_point, block),
                    };
                    self.enter_finally(state.clone(), point);
                }
            }
        }
    }

    fn enter_finally(&mut self, state: ProgramState, point: FinallyPoint) {
        let Some(first) = self.cfg.region(point.region).map(|region| region.first_block) else {
            return;
        };
        self.enqueue(first, state, &Some(Arc::new(point)));
    }

    /// Resumes after the end of the finally region being replayed.
    fn end_finally(&mut self, state: ProgramState, finally_point: &Option<Arc<FinallyPoint>>) {
        let Some(point) = finally_point else {
            tracing::trace!("end of finally without a pending continuation");
            return;
        };
        if let Some((next, rest)) = point.pending.split_first() {
            let next = FinallyPoint {
                region: *next,
                pending: rest.to_vec(),
                continuation: point.continuation.clone(),
                previous: point.previous.clone(),
            };
            self.enter_finally(state, next);
            return;
        }
        match point.continuation {
            Continuation::Destination(destination) => {
                self.enqueue(destination, state, &point.previous);
            }
            Continuation::Exception { from } => self.raise(state, from, &point.previous),
        }
    }

    /// Returns the innermost finally point still active at `block`.
    fn surviving(
        &self,
        finally_point: &Option<Arc<FinallyPoint>>,
        block: BlockId,
    ) -> Option<Arc<FinallyPoint>> {
        let mut current = finally_point.clone();
        while let Some(point) = &current {
            if self.cfg.region_contains(point.region, block) {
                break;
            }
            current = point.previous.clone();
        }
        current
    }

    fn enqueue(&mut self, block: BlockId, state: ProgramState, finally_point: &Option<Arc<FinallyPoint>>) {
        let finally_point = self.surviving(finally_point, block);
        self.worklist.push_back(ExplodedNode {
            block,
            state: state.reset_operations(),
            finally_point,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::symbolic::Constraint,
        syntax::{CatchClause, Expression, Lowerer, Statement},
        test::walk_recorded,
    };

    #[test]
    fn test_known_condition_prunes_branch() {
        let cfg = Lowerer::new()
            .local_bool("value")
            .lower(&[
                Statement::assign("value", Expression::bool(true)),
                Statement::If {
                    condition: Expression::local("value"),
                    then: vec![Statement::tag("Then", None)],
                    otherwise: vec![Statement::tag("Else", None)],
                },
            ])
            .unwrap();

        let (outcome, recorder) = walk_recorded(&cfg, ExecutionConfig::default());
        assert!(outcome.completed);
        assert_eq!(outcome.exit_reach_count(), 1);
        assert_eq!(recorder.recording().borrow().tag_names(), vec!["Then"]);
    }

    #[test]
    fn test_counting_loop_is_left_with_bounded_counter() {
        let lowerer = Lowerer::new().local_int("i");
        let i = lowerer.symbol("i").unwrap();
        let cfg = lowerer
            .lower(&[
                Statement::For {
                    initializer: vec![Statement::assign("i", Expression::int(0))],
                    condition: Some(Expression::less_than(Expression::local("i"), Expression::int(10))),
                    step: vec![Expression::increment(Expression::local("i"))],
                    body: vec![Statement::tag("Inside", None)],
                },
                Statement::tag("After", None),
            ])
            .unwrap();

        let (outcome, recorder) = walk_recorded(&cfg, ExecutionConfig::default());
        assert!(outcome.completed);
        assert_eq!(outcome.exit_reach_count(), 1);

        let recording = recorder.recording();
        let recording = recording.borrow();
        let inside = recording.states("Inside");
        assert!(!inside.is_empty());
        assert!(inside.iter().all(|state| state
            .symbol_value(i)
            .and_then(SymbolicValue::number)
            .and_then(|range| range.upper())
            .is_some_and(|max| max <= 9)));

        let after = recording.states("After");
        assert_eq!(after.len(), 1);
        let range = after[0].symbol_value(i).and_then(SymbolicValue::number).unwrap();
        assert_eq!(range.lower(), Some(10));
    }

    #[test]
    fn test_step_budget_marks_walk_incomplete() {
        let cfg = Lowerer::new()
            .local_int("x")
            .lower(&[
                Statement::assign("x", Expression::int(1)),
                Statement::assign("x", Expression::int(2)),
                Statement::assign("x", Expression::int(3)),
            ])
            .unwrap();

        let config = ExecutionConfig::default().with_max_step_count(4);
        let (outcome, recorder) = walk_recorded(&cfg, config);
        assert!(!outcome.completed);
        assert!(!outcome.cancelled);
        assert!(outcome.exit_states.is_empty());
        assert_eq!(recorder.recording().borrow().completed, Some(false));
    }

    #[test]
    fn test_cancelled_walk_reports_cancellation() {
        let cfg = Lowerer::new()
            .lower(&[Statement::tag("Never", None)])
            .unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let mut execution =
            SymbolicExecution::new(&cfg, SymbolicCheckList::default(), ExecutionConfig::default()).unwrap();
        let outcome = execution.walk_with_cancellation(&token);
        assert!(outcome.cancelled);
        assert!(!outcome.completed);
        assert!(matches!(outcome.check_cancelled(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_zero_visits_is_rejected() {
        let cfg = Lowerer::new().lower(&[]).unwrap();
        let config = ExecutionConfig::default().with_max_block_visits(0);
        let result = SymbolicExecution::new(&cfg, SymbolicCheckList::default(), config);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_finally_runs_before_return() {
        let cfg = Lowerer::new()
            .lower(&[
                Statement::try_finally(
                    vec![Statement::tag("InTry", None), Statement::Return(None)],
                    vec![Statement::tag("Finally", None)],
                ),
                Statement::tag("After", None),
            ])
            .unwrap();

        let (outcome, recorder) = walk_recorded(&cfg, ExecutionConfig::default());
        assert!(outcome.completed);
        assert_eq!(outcome.exit_reach_count(), 1);
        assert_eq!(
            recorder.recording().borrow().tag_names(),
            vec!["InTry", "Finally"]
        );
    }

    #[test]
    fn test_throwing_call_reaches_handler() {
        let cfg = Lowerer::new()
            .lower(&[
                Statement::try_catch(
                    vec![Statement::expression(Expression::call("Work", vec![]))],
                    vec![CatchClause::all(vec![Statement::tag("Caught", None)])],
                ),
                Statement::tag("After", None),
            ])
            .unwrap();

        let (outcome, recorder) = walk_recorded(&cfg, ExecutionConfig::default());
        assert!(outcome.completed);
        let recording = recorder.recording();
        let names = recording.borrow().tag_names().join(",");
        assert!(names.contains("Caught"));
        assert!(names.contains("After"));
    }

    #[test]
    fn test_lock_is_released_after_statement() {
        let lowerer = Lowerer::new().parameter_object("gate");
        let gate = lowerer.symbol("gate").unwrap();
        let cfg = lowerer
            .lower(&[
                Statement::Lock {
                    target: Expression::parameter("gate"),
                    body: vec![Statement::tag("Held", None)],
                },
                Statement::tag("After", None),
            ])
            .unwrap();

        let (outcome, recorder) = walk_recorded(&cfg, ExecutionConfig::default());
        assert!(outcome.completed);
        let recording = recorder.recording();
        let recording = recording.borrow();
        assert!(recording.symbol_has("Held", gate, Constraint::LOCK_HELD));
        assert!(recording.symbol_has("After", gate, Constraint::LOCK_RELEASED));
    }
}
