//! The check API: hooks that observe and refine the walk.

use std::{cell::RefCell, fmt, sync::Arc};

use crate::{
    analysis::{
        cfg::{BlockId, ControlFlowGraph},
        symbolic::{Constraint, ProgramState, SymbolicValue},
    },
    operation::{tracked_symbol, Operation, OperationId, OperationKind, SymbolId},
};

/// A finding raised by a check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    /// Identifier of the rule that raised it.
    pub rule: Arc<str>,
    /// Human readable message.
    pub message: String,
    /// Operation the finding is about.
    pub operation: Option<OperationId>,
    /// Source text of that operation.
    pub syntax: Option<Arc<str>>,
    /// Drop the finding when the walk does not complete (default: `true`).
    pub requires_complete_walk: bool,
}

impl Diagnostic {
    /// Creates a diagnostic that is only kept when the walk completes.
    #[must_use]
    pub fn new(rule: impl Into<Arc<str>>, message: impl Into<String>) -> Self {
        Diagnostic {
            rule: rule.into(),
            message: message.into(),
            operation: None,
            syntax: None,
            requires_complete_walk: true,
        }
    }

    /// Attaches the operation (and its source text) the finding is about.
    #[must_use]
    pub fn at(mut self, operation: OperationId, syntax: Option<Arc<str>>) -> Self {
        self.operation = Some(operation);
        self.syntax = syntax;
        self
    }

    /// Keeps the finding even when the walk is abandoned.
    #[must_use]
    pub fn keep_on_incomplete_walk(mut self) -> Self {
        self.requires_complete_walk = false;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.syntax {
            Some(syntax) => write!(f, "{}: {} ({syntax})", self.rule, self.message),
            None => write!(f, "{}: {}", self.rule, self.message),
        }
    }
}

/// Collects the diagnostics raised during one walk.
///
/// A diagnostic reported twice (typically the same finding on two paths) is kept once.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        DiagnosticSink::default()
    }

    /// Records `diagnostic` unless an equal one was already reported.
    pub fn report(&self, diagnostic: Diagnostic) {
        let mut diagnostics = self.diagnostics.borrow_mut();
        if !diagnostics.contains(&diagnostic) {
            diagnostics.push(diagnostic);
        }
    }

    /// Returns the number of recorded diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.diagnostics.borrow().len()
    }

    /// Returns `true` if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.borrow().is_empty()
    }

    /// Returns the recorded diagnostics, dropping those that need a complete walk
    /// when `completed` is `false`.
    #[must_use]
    pub fn finish(self, completed: bool) -> Vec<Diagnostic> {
        let mut diagnostics = self.diagnostics.into_inner();
        if !completed {
            diagnostics.retain(|diagnostic| !diagnostic.requires_complete_walk);
        }
        diagnostics
    }
}

/// What a check sees at one point of the walk.
///
/// The context names the operation being processed (none at branch evaluation and at
/// the exit), the state the path is in, the graph and the diagnostic sink. Contexts are
/// cheap to copy: [`with_state`](Self::with_state) is how a fold hands the refined
/// state from one check to the next.
#[derive(Clone)]
pub struct SymbolicContext<'a> {
    cfg: &'a ControlFlowGraph,
    block: BlockId,
    operation: Option<OperationId>,
    state: ProgramState,
    sink: &'a DiagnosticSink,
}

impl<'a> SymbolicContext<'a> {
    /// Creates a context.
    #[must_use]
    pub fn new(
        cfg: &'a ControlFlowGraph,
        block: BlockId,
        operation: Option<OperationId>,
        state: ProgramState,
        sink: &'a DiagnosticSink,
    ) -> Self {
        SymbolicContext {
            cfg,
            block,
            operation,
            state,
            sink,
        }
    }

    /// Returns the same context with another state.
    #[must_use]
    pub fn with_state(&self, state: ProgramState) -> Self {
        SymbolicContext {
            state,
            ..self.clone()
        }
    }

    /// Returns the graph being walked.
    #[must_use]
    pub fn cfg(&self) -> &'a ControlFlowGraph {
        self.cfg
    }

    /// Returns the block being executed.
    #[must_use]
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Returns the operation being processed.
    #[must_use]
    pub fn operation(&self) -> Option<OperationId> {
        self.operation
    }

    /// Returns the node of the operation being processed.
    #[must_use]
    pub fn operation_node(&self) -> Option<&'a Operation> {
        self.cfg.operation(self.operation?)
    }

    /// Returns the kind of the operation being processed.
    #[must_use]
    pub fn operation_kind(&self) -> Option<&'a OperationKind> {
        self.operation_node().map(|operation| &operation.kind)
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> &ProgramState {
        &self.state
    }

    /// Returns how often the current block was entered on this path.
    #[must_use]
    pub fn visit_count(&self) -> u32 {
        self.state.visit_count(self.block)
    }

    /// Returns the value of `operation`, resolving flow captures.
    #[must_use]
    pub fn value_of(&self, operation: OperationId) -> Option<&SymbolicValue> {
        self.state.value(self.cfg.operations(), operation)
    }

    /// Returns `true` if the value of `operation` holds `constraint`.
    #[must_use]
    pub fn has_constraint(&self, operation: OperationId, constraint: Constraint) -> bool {
        self.value_of(operation)
            .is_some_and(|value| value.has_constraint(constraint))
    }

    /// Returns the tracked symbol `operation` denotes, resolving flow captures.
    #[must_use]
    pub fn tracked_symbol(&self, operation: OperationId) -> Option<SymbolId> {
        let resolved = self.state.resolve_capture(self.cfg.operations(), operation);
        tracked_symbol(self.cfg.operations(), self.cfg.symbols(), resolved)
    }

    /// Returns the source text of `operation`.
    #[must_use]
    pub fn syntax(&self, operation: OperationId) -> Option<Arc<str>> {
        self.cfg.operation(operation)?.syntax.clone()
    }

    /// Reports a diagnostic.
    pub fn report(&self, diagnostic: Diagnostic) {
        self.sink.report(diagnostic);
    }
}

impl fmt::Debug for SymbolicContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolicContext")
            .field("block", &self.block)
            .field("operation", &self.operation)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// A rule plugged into the walk.
///
/// Every hook has a default that leaves the state untouched, so a check overrides only
/// the hooks it needs. Returning `None` from [`pre_process`](Self::pre_process),
/// [`post_process`](Self::post_process) or
/// [`condition_evaluated`](Self::condition_evaluated) declares the path impossible and
/// drops it.
///
/// # Examples
///
/// ```rust
/// use symscope::{
///     analysis::symbolic::{Constraint, ProgramState, SymbolicCheck, SymbolicContext},
///     operation::SymbolId,
/// };
///
/// /// Assumes `flag` is never false.
/// struct AssumeTrue(SymbolId);
///
/// impl SymbolicCheck for AssumeTrue {
///     fn condition_evaluated(&mut self, context: &SymbolicContext<'_>) -> Option<ProgramState> {
///         let value = context.state().symbol_value(self.0);
///         if value.is_some_and(|v| v.has_constraint(Constraint::FALSE)) {
///             None
///         } else {
///             Some(context.state().clone())
///         }
///     }
/// }
/// ```
pub trait SymbolicCheck {
    /// Runs before the built-in semantics of an operation.
    fn pre_process(&mut self, context: &SymbolicContext<'_>) -> Option<ProgramState> {
        Some(context.state().clone())
    }

    /// Runs after the built-in semantics of an operation.
    fn post_process(&mut self, context: &SymbolicContext<'_>) -> Option<ProgramState> {
        Some(context.state().clone())
    }

    /// Runs on each successor of a conditional branch, after constraint learning.
    fn condition_evaluated(&mut self, context: &SymbolicContext<'_>) -> Option<ProgramState> {
        Some(context.state().clone())
    }

    /// Runs after an object or array creation was given its built-in constraints.
    fn object_created(&mut self, context: &SymbolicContext<'_>) -> ProgramState {
        context.state().clone()
    }

    /// Runs once for each distinct state reaching the exit block.
    fn exit_reached(&mut self, _context: &SymbolicContext<'_>) {}

    /// Runs once when the walk ends. `completed` is `false` when the walk was
    /// abandoned.
    fn execution_completed(&mut self, _completed: bool) {}
}

/// The checks of one walk, folded in order.
///
/// Each hook runs the checks one after the other, handing the state returned by one
/// check to the next; the first check that drops the path stops the fold.
#[derive(Default)]
pub struct SymbolicCheckList {
    checks: Vec<Box<dyn SymbolicCheck>>,
}

impl SymbolicCheckList {
    /// Creates a list from boxed checks.
    #[must_use]
    pub fn new(checks: Vec<Box<dyn SymbolicCheck>>) -> Self {
        SymbolicCheckList { checks }
    }

    /// Appends a check.
    pub fn push<C: SymbolicCheck + 'static>(&mut self, check: C) {
        self.checks.push(Box::new(check));
    }

    /// Appends a check, builder style.
    #[must_use]
    pub fn with<C: SymbolicCheck + 'static>(mut self, check: C) -> Self {
        self.push(check);
        self
    }

    /// Returns the number of checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Returns `true` if the list holds no check.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Folds [`SymbolicCheck::pre_process`].
    pub fn pre_process(&mut self, context: &SymbolicContext<'_>) -> Option<ProgramState> {
        self.fold(context, |check, context| check.pre_process(context))
    }

    /// Folds [`SymbolicCheck::post_process`].
    pub fn post_process(&mut self, context: &SymbolicContext<'_>) -> Option<ProgramState> {
        self.fold(context, |check, context| check.post_process(context))
    }

    /// Folds [`SymbolicCheck::condition_evaluated`].
    pub fn condition_evaluated(&mut self, context: &SymbolicContext<'_>) -> Option<ProgramState> {
        self.fold(context, |check, context| check.condition_evaluated(context))
    }

    /// Folds [`SymbolicCheck::object_created`].
    pub fn object_created(&mut self, context: &SymbolicContext<'_>) -> ProgramState {
        let mut current = context.clone();
        for check in &mut self.checks {
            let state = check.object_created(&current);
            current = current.with_state(state);
        }
        current.state
    }

    /// Notifies every check of an exit state.
    pub fn exit_reached(&mut self, context: &SymbolicContext<'_>) {
        for check in &mut self.checks {
            check.exit_reached(context);
        }
    }

    /// Notifies every check that the walk ended.
    pub fn execution_completed(&mut self, completed: bool) {
        for check in &mut self.checks {
            check.execution_completed(completed);
        }
    }

    fn fold<F>(&mut self, context: &SymbolicContext<'_>, mut hook: F) -> Option<ProgramState>
    where
        F: FnMut(&mut dyn SymbolicCheck, &SymbolicContext<'_>) -> Option<ProgramState>,
    {
        let mut current = context.clone();
        for check in &mut self.checks {
            let state = hook(check.as_mut(), &current)?;
            current = current.with_state(state);
        }
        Some(current.state)
    }
}

impl fmt::Debug for SymbolicCheckList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolicCheckList")
            .field("checks", &self.checks.len())
            .finish()
    }
}

impl<C: SymbolicCheck + 'static> From<C> for SymbolicCheckList {
    fn from(check: C) -> Self {
        SymbolicCheckList::new(vec![Box::new(check)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::trivial_cfg;

    struct SetSymbol(SymbolId, Constraint);

    impl SymbolicCheck for SetSymbol {
        fn pre_process(&mut self, context: &SymbolicContext<'_>) -> Option<ProgramState> {
            Some(context.state().set_symbol_constraint(self.0, self.1))
        }
    }

    struct Kill;

    impl SymbolicCheck for Kill {
        fn pre_process(&mut self, _context: &SymbolicContext<'_>) -> Option<ProgramState> {
            None
        }
    }

    #[test]
    fn test_fold_passes_state_along() {
        let cfg = trivial_cfg().unwrap();
        let sink = DiagnosticSink::new();
        let symbol = SymbolId::new(0);
        let context = SymbolicContext::new(&cfg, cfg.entry_block(), None, ProgramState::empty(), &sink);

        let mut checks = SymbolicCheckList::default()
            .with(SetSymbol(symbol, Constraint::TRUE))
            .with(SetSymbol(symbol, Constraint::NOT_NULL));
        let state = checks.pre_process(&context).unwrap();
        let value = state.symbol_value(symbol).unwrap();
        assert!(value.has_constraint(Constraint::TRUE));
        assert!(value.has_constraint(Constraint::NOT_NULL));
    }

    #[test]
    fn test_fold_stops_at_killed_path() {
        let cfg = trivial_cfg().unwrap();
        let sink = DiagnosticSink::new();
        let context = SymbolicContext::new(&cfg, cfg.entry_block(), None, ProgramState::empty(), &sink);

        let mut checks = SymbolicCheckList::from(Kill).with(SetSymbol(SymbolId::new(1), Constraint::NULL));
        assert!(checks.pre_process(&context).is_none());
        assert_eq!(checks.len(), 2);
        assert!(checks.post_process(&context).is_some());
    }

    #[test]
    fn test_sink_deduplicates_and_filters() {
        let sink = DiagnosticSink::new();
        let diagnostic = Diagnostic::new("S2259", "'o' is null").at(OperationId::new(1), Some("o".into()));
        sink.report(diagnostic.clone());
        sink.report(diagnostic);
        sink.report(Diagnostic::new("S0000", "always").keep_on_incomplete_walk());
        assert_eq!(sink.len(), 2);

        let kept = sink.finish(false);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].to_string(), "S0000: always");
    }
}
